//! Ranked recommendation lists.
//!
//! Both recommenders produce a [`Recommendations`] list. Tree-sourced scores
//! are conditional frequencies in `(0, 1]`; hierarchy-sourced scores are raw
//! co-occurrence counts stored in the same field. The two scales are not
//! comparable.

use std::cmp::Ordering;
use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::ItemId;

/// Number of leading entries averaged by [`Recommendations::top10_avg_probability`].
pub const TOP_AVG_WIDTH: usize = 10;

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "property")]
    pub label: String,
    #[serde(rename = "probability")]
    pub score: f64,
    /// Registry handle; absent for candidates that never went through the tree.
    #[serde(skip)]
    pub item: Option<ItemId>,
}

impl Recommendation {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
            item: None,
        }
    }

    pub fn for_item(item: ItemId, label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
            item: Some(item),
        }
    }
}

/// A ranked list of candidates, best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    recommendations: Vec<Recommendation>,
}

impl Recommendations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.recommendations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Recommendation> {
        self.recommendations.iter()
    }

    pub fn as_slice(&self) -> &[Recommendation] {
        &self.recommendations
    }

    pub fn into_vec(self) -> Vec<Recommendation> {
        self.recommendations
    }

    pub fn labels(&self) -> Vec<&str> {
        self.recommendations
            .iter()
            .map(|r| r.label.as_str())
            .collect()
    }

    pub fn score_of(&self, label: &str) -> Option<f64> {
        self.recommendations
            .iter()
            .find(|r| r.label == label)
            .map(|r| r.score)
    }

    pub fn truncate(&mut self, len: usize) {
        self.recommendations.truncate(len);
    }

    /// Sort descending by score; equal scores fall back to label order.
    pub fn sort_by_score(&mut self) {
        self.recommendations.sort_by(compare_ranked);
    }

    /// Average of the first ten scores.
    ///
    /// Always divides by ten, so lists shorter than ten entries are penalized.
    pub fn top10_avg_probability(&self) -> f32 {
        let sum: f64 = self
            .recommendations
            .iter()
            .take(TOP_AVG_WIDTH)
            .map(|r| r.score)
            .sum();
        sum as f32 / TOP_AVG_WIDTH as f32
    }

    /// Union by label keeping the larger score, then re-rank.
    pub fn merge_max(self, other: Recommendations) -> Recommendations {
        let mut by_label: AHashMap<String, Recommendation> = AHashMap::new();
        for rec in self.recommendations.into_iter().chain(other.recommendations) {
            match by_label.get_mut(&rec.label) {
                Some(existing) => {
                    if rec.score > existing.score {
                        existing.score = rec.score;
                    }
                    if existing.item.is_none() {
                        existing.item = rec.item;
                    }
                }
                None => {
                    by_label.insert(rec.label.clone(), rec);
                }
            }
        }
        let mut merged: Recommendations = by_label.into_iter().map(|(_, rec)| rec).collect();
        merged.sort_by_score();
        merged
    }
}

fn compare_ranked(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.label.cmp(&b.label))
}

impl From<Vec<Recommendation>> for Recommendations {
    fn from(recommendations: Vec<Recommendation>) -> Self {
        Self { recommendations }
    }
}

impl FromIterator<Recommendation> for Recommendations {
    fn from_iter<I: IntoIterator<Item = Recommendation>>(iter: I) -> Self {
        Self {
            recommendations: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Recommendations {
    type Item = Recommendation;
    type IntoIter = std::vec::IntoIter<Recommendation>;

    fn into_iter(self) -> Self::IntoIter {
        self.recommendations.into_iter()
    }
}

impl<'a> IntoIterator for &'a Recommendations {
    type Item = &'a Recommendation;
    type IntoIter = std::slice::Iter<'a, Recommendation>;

    fn into_iter(self) -> Self::IntoIter {
        self.recommendations.iter()
    }
}

/// One `"<label>: <score>"` line per candidate, in ranked order.
impl fmt::Display for Recommendations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rec in &self.recommendations {
            writeln!(f, "{}: {}", rec.label, rec.score)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(pairs: &[(&str, f64)]) -> Recommendations {
        pairs
            .iter()
            .map(|&(label, score)| Recommendation::new(label, score))
            .collect()
    }

    #[test]
    fn renders_one_line_per_candidate() {
        let recs = ranked(&[("height", 0.4), ("width", 1.0)]);
        assert_eq!(recs.to_string(), "height: 0.4\nwidth: 1\n");
        assert_eq!(Recommendations::new().to_string(), "");
    }

    #[test]
    fn top10_average_always_divides_by_ten() {
        let recs = ranked(&[("a", 1.0), ("b", 1.0)]);
        assert!((recs.top10_avg_probability() - 0.2).abs() < 1e-6);

        let many: Recommendations = (0..12)
            .map(|i| Recommendation::new(format!("p{i}"), 0.5))
            .collect();
        assert!((many.top10_avg_probability() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn merge_keeps_max_and_reranks() {
        let left = ranked(&[("a", 0.9), ("b", 0.1)]);
        let right = ranked(&[("b", 2.0), ("c", 0.5)]);
        let merged = left.merge_max(right);
        assert_eq!(merged.labels(), vec!["b", "a", "c"]);
        assert_eq!(merged.score_of("b"), Some(2.0));
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let recs = ranked(&[("name", 0.5)]);
        let json = serde_json::to_value(&recs).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"recommendations": [{"property": "name", "probability": 0.5}]})
        );
    }
}
