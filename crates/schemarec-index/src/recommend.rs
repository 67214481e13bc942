//! Candidate generation and ranking over the schema tree.
//!
//! For a non-empty input set `S`, every transaction containing `S` has a path
//! through exactly one node of the rarest input item `r` whose ancestors hold
//! all of `S` (paths are sorted by rank, and `r` ranks last within `S`).
//! Walking `r`'s occurrence chain therefore visits each matching branch once:
//!
//! - ancestors of such a node that are not in `S` co-occur with `S` in every
//!   transaction counted by the node;
//! - each descendant co-occurs with `S` in exactly its own count.
//!
//! Dividing by the summed support of the matching nodes gives, per candidate
//! `c`, the conditional frequency `|T ⊇ S ∪ {c}| / |T ⊇ S|`.

use ahash::AHashMap;
use tracing::debug;

use crate::item_list::ItemList;
use crate::output::{Recommendation, Recommendations};
use crate::registry::Item;
use crate::tree::SchemaTree;
use crate::ItemId;

/// Which items may be returned as candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidateKinds {
    /// Only property items.
    #[default]
    PropertiesOnly,
    /// Properties and types.
    PropertiesAndTypes,
}

impl CandidateKinds {
    pub fn from_include_types(include_types: bool) -> Self {
        if include_types {
            Self::PropertiesAndTypes
        } else {
            Self::PropertiesOnly
        }
    }

    fn admits(self, item: &Item) -> bool {
        match self {
            Self::PropertiesOnly => item.is_property(),
            Self::PropertiesAndTypes => true,
        }
    }
}

impl SchemaTree {
    /// Rank property candidates for `input`.
    pub fn recommend_property(&self, input: ItemList) -> Recommendations {
        self.recommend(input, CandidateKinds::PropertiesOnly)
    }

    /// Rank property and type candidates for `input`.
    pub fn recommend_properties_and_types(&self, input: ItemList) -> Recommendations {
        self.recommend(input, CandidateKinds::PropertiesAndTypes)
    }

    pub fn recommend(&self, mut input: ItemList, kinds: CandidateKinds) -> Recommendations {
        if input.is_empty() {
            return self.marginal_recommendations();
        }

        input.sort_by_support(self.registry());
        let in_input = input.to_set();
        let Some(rarest) = input.rarest() else {
            return Recommendations::new();
        };

        let mut candidates: AHashMap<ItemId, u64> = AHashMap::new();
        let mut set_support: u64 = 0;
        let mut visited = 0usize;

        for &leaf in self.occurrences(rarest) {
            if !self.prefix_contains(leaf, &in_input) {
                continue;
            }
            visited += 1;
            let leaf_support = u64::from(self.node(leaf).support());
            set_support += leaf_support;

            // walk up
            for ancestor in self.ancestors(leaf) {
                let Some(item) = self.node(ancestor).item() else {
                    continue;
                };
                if in_input.contains(item.raw()) || !self.admits(kinds, item) {
                    continue;
                }
                *candidates.entry(item).or_insert(0) += leaf_support;
            }

            // walk down
            for descendant in self.descendants(leaf) {
                let node = self.node(descendant);
                let Some(item) = node.item() else {
                    continue;
                };
                if !self.admits(kinds, item) {
                    continue;
                }
                *candidates.entry(item).or_insert(0) += u64::from(node.support());
            }
        }

        debug!(
            input = input.len(),
            chain = self.occurrences(rarest).len(),
            matched = visited,
            set_support,
            candidates = candidates.len(),
            "tree recommendation"
        );

        if set_support == 0 {
            return Recommendations::new();
        }

        let set_support = set_support as f64;
        let mut ranked: Recommendations = candidates
            .into_iter()
            .filter_map(|(item, support)| {
                let label = self.registry().get(item)?.label();
                Some(Recommendation::for_item(
                    item,
                    label,
                    support as f64 / set_support,
                ))
            })
            .collect();
        ranked.sort_by_score();
        ranked
    }

    /// No evidence: every item's corpus-wide frequency, in rank order.
    fn marginal_recommendations(&self) -> Recommendations {
        let registry = self.registry();
        let total = registry.total_transactions();
        if total == 0 {
            return Recommendations::new();
        }
        let total = total as f64;
        registry
            .rank_order_snapshot()
            .map(|item| {
                Recommendation::for_item(
                    item.id(),
                    item.label(),
                    f64::from(item.total_count()) / total,
                )
            })
            .collect()
    }

    fn admits(&self, kinds: CandidateKinds, item: ItemId) -> bool {
        self.registry()
            .get(item)
            .is_some_and(|item| kinds.admits(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::SchemaTreeBuilder;

    fn tree() -> SchemaTree {
        let mut builder = SchemaTreeBuilder::new();
        builder.add_transaction(["name", "height", "t#Person"]);
        builder.add_transaction(["name", "height"]);
        builder.add_transaction(["name", "birth", "t#Person"]);
        builder.add_transaction(["name"]);
        builder.build()
    }

    fn list(tree: &SchemaTree, labels: &[&str]) -> ItemList {
        ItemList::resolve(tree.registry(), labels, Vec::<&str>::new())
    }

    #[test]
    fn properties_only_skips_types() {
        let tree = tree();
        let recs = tree.recommend_property(list(&tree, &["name"]));
        assert_eq!(recs.score_of("height"), Some(0.5));
        assert_eq!(recs.score_of("birth"), Some(0.25));
        assert_eq!(recs.score_of("t#Person"), None);
        assert_eq!(recs.score_of("name"), None);
    }

    #[test]
    fn combined_mode_includes_types() {
        let tree = tree();
        let recs = tree.recommend_properties_and_types(list(&tree, &["height"]));
        assert_eq!(recs.score_of("name"), Some(1.0));
        assert_eq!(recs.score_of("t#Person"), Some(0.5));
    }

    #[test]
    fn unseen_combination_yields_nothing() {
        let tree = tree();
        let recs = tree.recommend_property(list(&tree, &["height", "birth"]));
        assert!(recs.is_empty());
    }

    #[test]
    fn empty_input_returns_marginals_in_rank_order() {
        let tree = tree();
        let recs = tree.recommend_property(ItemList::default());
        assert_eq!(recs.len(), tree.registry().len());
        assert_eq!(recs.as_slice()[0].label, "name");
        assert_eq!(recs.as_slice()[0].score, 1.0);
        assert_eq!(recs.score_of("t#Person"), Some(0.5));
    }
}
