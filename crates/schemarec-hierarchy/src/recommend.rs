use ahash::AHashMap;
use schemarec_index::{Recommendation, Recommendations};
use tracing::debug;

use crate::Hierarchy;

impl Hierarchy {
    /// Score tags that share a group with the input tags.
    ///
    /// For each input tag with an enclosing group, every other tag of that
    /// group (sibling) and every tag of its child groups (cousin) gains one
    /// point; the input tag itself never scores. Scores are raw counts, not
    /// probabilities. At most `limit` candidates are returned.
    pub fn recommend_from_hierarchy<S: AsRef<str>>(
        &self,
        input: &[S],
        limit: usize,
    ) -> Recommendations {
        if self.is_empty() {
            return Recommendations::new();
        }

        let mut candidates: AHashMap<&str, u32> = AHashMap::new();
        let mut matched = 0usize;
        for tag in input {
            let tag = tag.as_ref();
            let Some(group) = self.enclosing_group(tag) else {
                continue;
            };
            matched += 1;

            // siblings
            for sibling in group.tags() {
                if sibling != tag {
                    *candidates.entry(sibling.as_str()).or_insert(0) += 1;
                }
            }
            // cousins
            for &child in group.children() {
                for cousin in self.group(child).tags() {
                    if cousin != tag {
                        *candidates.entry(cousin.as_str()).or_insert(0) += 1;
                    }
                }
            }
        }

        debug!(
            input = input.len(),
            matched,
            candidates = candidates.len(),
            "hierarchy recommendation"
        );

        let mut ranked: Recommendations = candidates
            .into_iter()
            .map(|(tag, score)| Recommendation::new(tag, f64::from(score)))
            .collect();
        ranked.sort_by_score();
        ranked.truncate(limit);
        ranked
    }
}
