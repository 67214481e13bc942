//! The schema tree arena and its builder.
//!
//! Nodes are stored in a single `Vec<SchemaNode>`:
//!
//! - `parent` is a non-owning index (the root has none),
//! - `children` are the indices of nodes whose parent is this node,
//! - the occurrence index lists, per item, every node carrying that item in
//!   node-creation order (the "same-item chain").
//!
//! Every transaction is inserted with its items sorted by rank, so an item
//! never appears twice on a path and any two transactions sharing a prefix
//! share the nodes for it.

use ahash::AHashMap;
use roaring::RoaringBitmap;
use tracing::debug;

use crate::registry::{ItemRegistry, RegistryBuilder};
use crate::{ItemId, NodeId};

/// One position in the prefix tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaNode {
    /// `None` only for the root (the empty set).
    item: Option<ItemId>,
    /// Number of transactions whose path passes through this node.
    support: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SchemaNode {
    fn root() -> Self {
        Self {
            item: None,
            support: 0,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn item(&self) -> Option<ItemId> {
        self.item
    }

    pub fn support(&self) -> u32 {
        self.support
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Prefix tree of observed item sets plus its sealed registry.
#[derive(Debug, Clone)]
pub struct SchemaTree {
    registry: ItemRegistry,
    nodes: Vec<SchemaNode>,
    /// `chain_offsets[i]..chain_offsets[i + 1]` is item `i`'s slice of `chain_nodes`.
    chain_offsets: Vec<u32>,
    chain_nodes: Vec<NodeId>,
}

impl SchemaTree {
    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    pub fn root(&self) -> &SchemaNode {
        &self.nodes[NodeId::ROOT.index()]
    }

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.index()]
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Total number of training transactions (the root's support).
    pub fn total_transactions(&self) -> u64 {
        u64::from(self.root().support)
    }

    /// Every node carrying `item`, in creation order.
    pub fn occurrences(&self, item: ItemId) -> &[NodeId] {
        let i = item.index();
        let (Some(&start), Some(&end)) = (self.chain_offsets.get(i), self.chain_offsets.get(i + 1))
        else {
            return &[];
        };
        &self.chain_nodes[start as usize..end as usize]
    }

    /// Walk from `id` up to (but excluding) the root, starting with `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: Some(id),
        }
    }

    /// Every node strictly below `id`, depth first.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: self.node(id).children.iter().rev().copied().collect(),
        }
    }

    /// Whether every item in `set` lies on the path from the root to `id`.
    ///
    /// Paths never repeat an item, so counting hits is enough.
    pub fn prefix_contains(&self, id: NodeId, set: &RoaringBitmap) -> bool {
        let wanted = set.len();
        let mut found = 0u64;
        for ancestor in self.ancestors(id) {
            let Some(item) = self.node(ancestor).item else {
                continue;
            };
            if set.contains(item.raw()) {
                found += 1;
                if found == wanted {
                    return true;
                }
            }
        }
        wanted == 0
    }

    /// Items on the path from the root to `id`, root side first.
    pub fn path_items(&self, id: NodeId) -> Vec<ItemId> {
        let mut out: Vec<ItemId> = self
            .ancestors(id)
            .filter_map(|n| self.node(n).item)
            .collect();
        out.reverse();
        out
    }
}

pub struct Ancestors<'a> {
    tree: &'a SchemaTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        let node = self.tree.node(id);
        if node.is_root() {
            self.next = None;
            return None;
        }
        self.next = node.parent;
        Some(id)
    }
}

pub struct Descendants<'a> {
    tree: &'a SchemaTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.node(id).children.iter().rev().copied());
        Some(id)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Collects training transactions, then builds a [`SchemaTree`].
///
/// Insertion order depends on final global counts, so transactions are
/// buffered until [`SchemaTreeBuilder::build`].
#[derive(Default)]
pub struct SchemaTreeBuilder {
    registry: RegistryBuilder,
    transactions: Vec<Vec<ItemId>>,
}

impl SchemaTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one transaction. Repeated labels count once.
    pub fn add_transaction<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut items: Vec<ItemId> = labels
            .into_iter()
            .map(|label| self.registry.intern(label.as_ref()))
            .collect();
        items.sort_unstable();
        items.dedup();

        for &item in &items {
            self.registry.record_occurrence(item);
        }
        self.registry.record_transaction();
        self.transactions.push(items);
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn build(self) -> SchemaTree {
        let registry = self.registry.seal();
        let mut nodes = vec![SchemaNode::root()];
        let mut child_of: AHashMap<(NodeId, ItemId), NodeId> = AHashMap::new();

        for mut items in self.transactions {
            items.sort_by_key(|&item| registry.rank_of(item));
            nodes[NodeId::ROOT.index()].support += 1;

            let mut cur = NodeId::ROOT;
            for item in items {
                let next = *child_of.entry((cur, item)).or_insert_with(|| {
                    let id = NodeId(nodes.len() as u32);
                    nodes.push(SchemaNode {
                        item: Some(item),
                        support: 0,
                        parent: Some(cur),
                        children: Vec::new(),
                    });
                    nodes[cur.index()].children.push(id);
                    id
                });
                nodes[next.index()].support += 1;
                cur = next;
            }
        }

        let (chain_offsets, chain_nodes) = build_occurrence_index(&nodes, registry.len());
        debug!(
            items = registry.len(),
            nodes = nodes.len(),
            transactions = nodes[NodeId::ROOT.index()].support,
            "built schema tree"
        );

        SchemaTree {
            registry,
            nodes,
            chain_offsets,
            chain_nodes,
        }
    }
}

/// Counting sort of non-root nodes by item, keeping creation order per item.
fn build_occurrence_index(nodes: &[SchemaNode], item_count: usize) -> (Vec<u32>, Vec<NodeId>) {
    let mut offsets = vec![0u32; item_count + 1];
    for node in nodes {
        if let Some(item) = node.item {
            offsets[item.index() + 1] += 1;
        }
    }
    for i in 1..offsets.len() {
        offsets[i] += offsets[i - 1];
    }

    let mut cursor = offsets.clone();
    let mut chain = vec![NodeId::ROOT; offsets[item_count] as usize];
    for (idx, node) in nodes.iter().enumerate() {
        let Some(item) = node.item else {
            continue;
        };
        let slot = &mut cursor[item.index()];
        chain[*slot as usize] = NodeId(idx as u32);
        *slot += 1;
    }
    (offsets, chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_tree() -> SchemaTree {
        let mut builder = SchemaTreeBuilder::new();
        builder.add_transaction(["a", "b", "c"]);
        builder.add_transaction(["a", "b"]);
        builder.add_transaction(["a", "c"]);
        builder.add_transaction(["b", "c", "c"]);
        builder.build()
    }

    fn id(tree: &SchemaTree, label: &str) -> ItemId {
        tree.registry().resolve(label).expect("registered").id()
    }

    #[test]
    fn root_counts_transactions() {
        let tree = small_tree();
        assert_eq!(tree.total_transactions(), 4);
        assert_eq!(tree.registry().total_transactions(), 4);
    }

    #[test]
    fn occurrences_cover_global_counts() {
        let tree = small_tree();
        for item in tree.registry().rank_order_snapshot() {
            let on_chain: u32 = tree
                .occurrences(item.id())
                .iter()
                .map(|&n| tree.node(n).support())
                .sum();
            assert_eq!(on_chain, item.total_count(), "item {}", item.label());
            for &n in tree.occurrences(item.id()) {
                assert_eq!(tree.node(n).item(), Some(item.id()));
            }
        }
    }

    #[test]
    fn duplicate_labels_collapse_within_a_transaction() {
        let tree = small_tree();
        let c = tree.registry().resolve("c").expect("c");
        assert_eq!(c.total_count(), 3);
    }

    #[test]
    fn paths_follow_rank_order_and_never_repeat() {
        let tree = small_tree();
        for raw in 1..tree.len() as u32 {
            let items = tree.path_items(NodeId(raw));
            let ranks: Vec<u32> = items
                .iter()
                .map(|&i| tree.registry().rank_of(i))
                .collect();
            assert!(ranks.windows(2).all(|w| w[0] < w[1]), "ranks {ranks:?}");
        }
    }

    #[test]
    fn prefix_contains_checks_whole_set() {
        let tree = small_tree();
        let (a, b, c) = (id(&tree, "a"), id(&tree, "b"), id(&tree, "c"));

        let ab: RoaringBitmap = [a.raw(), b.raw()].into_iter().collect();
        let abc: RoaringBitmap = [a.raw(), b.raw(), c.raw()].into_iter().collect();

        let deepest_c = tree
            .occurrences(c)
            .iter()
            .copied()
            .find(|&n| tree.path_items(n).len() == 3)
            .expect("path a,b,c exists");
        assert!(tree.prefix_contains(deepest_c, &abc));
        assert!(tree.prefix_contains(deepest_c, &ab));

        let shallow_b = tree
            .occurrences(b)
            .iter()
            .copied()
            .find(|&n| tree.path_items(n).len() == 2)
            .expect("path a,b exists");
        assert!(tree.prefix_contains(shallow_b, &ab));
        assert!(!tree.prefix_contains(shallow_b, &abc));
    }

    #[test]
    fn descendants_visit_every_subtree_node_once() {
        let tree = small_tree();
        let below_root: Vec<NodeId> = tree.descendants(NodeId::ROOT).collect();
        assert_eq!(below_root.len(), tree.len() - 1);
    }
}
