//! Tag co-occurrence graph: the weighted edge list hierarchies are clustered from.
//!
//! Every record with at least two distinct tags contributes one count to each
//! unordered pair of its tags. Pairs are stored with the lexicographically
//! smaller tag as `source`.

use std::io::Write;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Pairs seen fewer times than this are dropped by default.
pub const DEFAULT_MIN_COUNT: u64 = 2;

/// One weighted, undirected edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub weight: u64,
}

/// Accumulates pair counts over records.
#[derive(Debug, Default)]
pub struct CooccurrenceCounter {
    pairs: AHashMap<(String, String), u64>,
    records: usize,
}

impl CooccurrenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every pair of distinct tags in one record.
    pub fn add_record<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let owned: Vec<S> = tags.into_iter().collect();
        let mut tags: Vec<&str> = owned.iter().map(|t| t.as_ref()).collect();
        tags.sort_unstable();
        tags.dedup();
        if tags.len() < 2 {
            return;
        }

        self.records += 1;
        for (i, a) in tags.iter().enumerate() {
            for b in &tags[i + 1..] {
                *self
                    .pairs
                    .entry(((*a).to_string(), (*b).to_string()))
                    .or_insert(0) += 1;
            }
        }
    }

    /// Records that had at least two tags.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Distinct pairs seen so far.
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Edges with `weight >= min_count`, heaviest first, ties by tag order.
    pub fn edges(&self, min_count: u64) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .pairs
            .iter()
            .filter(|(_, &weight)| weight >= min_count)
            .map(|((source, target), &weight)| Edge {
                source: source.clone(),
                target: target.clone(),
                weight,
            })
            .collect();
        edges.sort_by(|a, b| {
            b.weight
                .cmp(&a.weight)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.target.cmp(&b.target))
        });
        debug!(
            records = self.records,
            pairs = self.pairs.len(),
            kept = edges.len(),
            min_count,
            "co-occurrence edges"
        );
        edges
    }
}

/// Write edges as one JSON array of `{source, target, weight}` objects.
pub fn write_edges_json<W: Write>(edges: &[Edge], out: W) -> serde_json::Result<()> {
    serde_json::to_writer(out, edges)
}
