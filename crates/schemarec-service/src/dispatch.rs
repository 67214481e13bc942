//! Strategy selection between the hierarchy and the schema tree.

use schemarec_hierarchy::Hierarchy;
use schemarec_index::{CandidateKinds, ItemList, Recommendations, SchemaTree};
use tracing::debug;

use crate::config::{RecoMode, DEFAULT_HIERARCHY_LIMIT};

/// Per-request knobs that do not depend on the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    pub kinds: CandidateKinds,
    pub hierarchy_limit: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            kinds: CandidateKinds::PropertiesOnly,
            hierarchy_limit: DEFAULT_HIERARCHY_LIMIT,
        }
    }
}

/// Answer one request.
///
/// - `Hierarchy`: the hierarchy's list as-is, even when empty.
/// - `Hybrid`: hierarchy and tree lists merged by label, keeping the larger
///   score. Hierarchy scores are counts, so they dominate tree probabilities.
/// - `Tree`, or no hierarchy with indexed tags: the schema tree.
///
/// The hierarchy only sees property labels.
pub fn recommend<P, T>(
    tree: &SchemaTree,
    hierarchy: Option<&Hierarchy>,
    properties: &[P],
    types: &[T],
    mode: RecoMode,
    options: DispatchOptions,
) -> Recommendations
where
    P: AsRef<str>,
    T: AsRef<str>,
{
    let hierarchy = hierarchy.filter(|h| !h.is_empty());
    match (mode, hierarchy) {
        (RecoMode::Hierarchy, Some(h)) => {
            debug!(mode = %mode, "dispatching to hierarchy");
            h.recommend_from_hierarchy(properties, options.hierarchy_limit)
        }
        (RecoMode::Hybrid, Some(h)) => {
            debug!(mode = %mode, "merging hierarchy and tree candidates");
            let from_hierarchy = h.recommend_from_hierarchy(properties, options.hierarchy_limit);
            let from_tree = recommend_from_tree(tree, properties, types, options.kinds);
            from_hierarchy.merge_max(from_tree)
        }
        _ => {
            debug!(mode = %mode, "dispatching to schema tree");
            recommend_from_tree(tree, properties, types, options.kinds)
        }
    }
}

/// Resolve labels through the registry and run the tree recommender.
pub fn recommend_from_tree<P, T>(
    tree: &SchemaTree,
    properties: &[P],
    types: &[T],
    kinds: CandidateKinds,
) -> Recommendations
where
    P: AsRef<str>,
    T: AsRef<str>,
{
    let list = ItemList::resolve(tree.registry(), properties, types);
    tree.recommend(list, kinds)
}
