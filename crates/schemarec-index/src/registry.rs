//! Item registry: interned labels with global counts and dense ranks.
//!
//! Registration and serving are split at the type level:
//!
//! - [`RegistryBuilder`] interns labels and accumulates counts. It is safe to
//!   share across threads while training transactions are being read.
//! - [`ItemRegistry`] is produced by [`RegistryBuilder::seal`]. It is immutable,
//!   so lookups and full rank-ordered scans can run concurrently without any
//!   locking and can never observe a half-finished insertion.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use dashmap::DashMap;

use crate::{is_type_label, ItemId};

/// An interned label with its corpus statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: ItemId,
    label: Arc<str>,
    total_count: u32,
    rank: u32,
}

impl Item {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of training transactions containing this item.
    pub fn total_count(&self) -> u32 {
        self.total_count
    }

    /// Dense rank: 0 for the most frequent item, ties broken by label.
    pub fn rank(&self) -> u32 {
        self.rank
    }

    pub fn is_type(&self) -> bool {
        is_type_label(&self.label)
    }

    pub fn is_property(&self) -> bool {
        !self.is_type()
    }
}

// ============================================================================
// Build phase
// ============================================================================

/// Mutable registry used while training transactions are ingested.
pub struct RegistryBuilder {
    str_to_id: DashMap<Arc<str>, ItemId>,
    id_to_str: DashMap<ItemId, Arc<str>>,
    counts: DashMap<ItemId, u32>,
    next_id: AtomicU32,
    transactions: AtomicU64,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            str_to_id: DashMap::new(),
            id_to_str: DashMap::new(),
            counts: DashMap::new(),
            next_id: AtomicU32::new(0),
            transactions: AtomicU64::new(0),
        }
    }

    /// Intern a label, returning its ID.
    pub fn intern(&self, label: &str) -> ItemId {
        if let Some(id) = self.str_to_id.get(label) {
            return *id;
        }

        let label: Arc<str> = Arc::from(label);
        // `entry` keeps two racing interners of the same label on one id.
        *self
            .str_to_id
            .entry(Arc::clone(&label))
            .or_insert_with(|| {
                let id = ItemId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
                self.id_to_str.insert(id, label);
                id
            })
    }

    /// Look up an existing ID without inserting.
    pub fn id_of(&self, label: &str) -> Option<ItemId> {
        self.str_to_id.get(label).map(|id| *id)
    }

    /// Record one occurrence of `item` in a transaction.
    pub fn record_occurrence(&self, item: ItemId) {
        *self.counts.entry(item).or_insert(0) += 1;
    }

    /// Record one transaction (the root of the tree counts these).
    pub fn record_transaction(&self) {
        self.transactions.fetch_add(1, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze the registry and assign dense ranks.
    ///
    /// Rank order is global count descending, then label ascending.
    pub fn seal(self) -> ItemRegistry {
        let len = self.next_id.load(Ordering::SeqCst);
        let mut items: Vec<Item> = (0..len)
            .filter_map(|raw| {
                let id = ItemId::new(raw);
                let label = self.id_to_str.get(&id).map(|l| l.value().clone())?;
                let total_count = self.counts.get(&id).map(|c| *c).unwrap_or(0);
                Some(Item {
                    id,
                    label,
                    total_count,
                    rank: 0,
                })
            })
            .collect();

        let mut by_rank: Vec<ItemId> = items.iter().map(|item| item.id).collect();
        by_rank.sort_by(|a, b| {
            let (a, b) = (&items[a.index()], &items[b.index()]);
            b.total_count
                .cmp(&a.total_count)
                .then_with(|| a.label.cmp(&b.label))
        });
        for (rank, id) in by_rank.iter().enumerate() {
            items[id.index()].rank = rank as u32;
        }

        let by_label = items
            .iter()
            .map(|item| (Arc::clone(&item.label), item.id))
            .collect();

        ItemRegistry {
            items,
            by_label,
            by_rank,
            total_transactions: self.transactions.load(Ordering::SeqCst),
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Serve phase
// ============================================================================

/// Sealed, read-only registry shared by every recommendation request.
#[derive(Debug, Clone, Default)]
pub struct ItemRegistry {
    /// Indexed by `ItemId`.
    items: Vec<Item>,
    by_label: AHashMap<Arc<str>, ItemId>,
    /// Indexed by rank.
    by_rank: Vec<ItemId>,
    total_transactions: u64,
}

impl ItemRegistry {
    /// Exact-match lookup; never creates an item.
    pub fn resolve(&self, label: &str) -> Option<&Item> {
        let id = self.by_label.get(label)?;
        self.items.get(id.index())
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id.index())
    }

    /// Every registered item, in strictly increasing rank order.
    pub fn rank_order_snapshot(&self) -> impl ExactSizeIterator<Item = &Item> + '_ {
        self.by_rank.iter().map(|id| &self.items[id.index()])
    }

    /// Number of training transactions (the root node's count).
    pub fn total_transactions(&self) -> u64 {
        self.total_transactions
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ordering key used to place items on tree paths: more frequent first.
    /// Unknown ids sort last.
    pub(crate) fn rank_of(&self, id: ItemId) -> u32 {
        self.items.get(id.index()).map_or(u32::MAX, |item| item.rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let builder = RegistryBuilder::new();
        let a = builder.intern("name");
        let b = builder.intern("name");
        assert_eq!(a, b);
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.id_of("name"), Some(a));
        assert_eq!(builder.id_of("missing"), None);
    }

    #[test]
    fn seal_assigns_dense_ranks_by_count_then_label() {
        let builder = RegistryBuilder::new();
        let rare = builder.intern("rare");
        let common = builder.intern("common");
        let tied_b = builder.intern("b");
        let tied_a = builder.intern("a");

        for _ in 0..5 {
            builder.record_occurrence(common);
        }
        for _ in 0..3 {
            builder.record_occurrence(tied_a);
            builder.record_occurrence(tied_b);
        }
        builder.record_occurrence(rare);

        let registry = builder.seal();
        let labels: Vec<&str> = registry.rank_order_snapshot().map(Item::label).collect();
        assert_eq!(labels, vec!["common", "a", "b", "rare"]);

        let ranks: Vec<u32> = registry.rank_order_snapshot().map(Item::rank).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
        assert_eq!(registry.get(rare).map(Item::total_count), Some(1));
    }

    #[test]
    fn resolve_distinguishes_types() {
        let builder = RegistryBuilder::new();
        builder.intern("t#Person");
        builder.intern("name");
        let registry = builder.seal();

        assert!(registry.resolve("t#Person").is_some_and(Item::is_type));
        assert!(registry.resolve("name").is_some_and(Item::is_property));
        assert!(registry.resolve("Person").is_none());
    }
}
