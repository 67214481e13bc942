//! Property tests for the tree recommender.
//!
//! The tree must agree with a brute-force scan over the raw transactions:
//! for input set `S` and candidate `c`, the score is
//! `|{T : S ∪ {c} ⊆ T}| / |{T : S ⊆ T}|`.

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;
use schemarec_index::{is_type_label, CandidateKinds, ItemList, SchemaTree, SchemaTreeBuilder};

const LABELS: &[&str] = &[
    "name", "height", "birth", "death", "spouse", "t#Person", "t#Place",
];

fn transactions_strategy() -> impl Strategy<Value = Vec<BTreeSet<&'static str>>> {
    prop::collection::vec(
        prop::collection::btree_set(prop::sample::select(LABELS), 0..=5),
        1..40,
    )
}

fn input_strategy() -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(prop::sample::select(LABELS), 0..=3)
}

fn build(transactions: &[BTreeSet<&'static str>]) -> SchemaTree {
    let mut builder = SchemaTreeBuilder::new();
    for tx in transactions {
        builder.add_transaction(tx.iter().copied());
    }
    builder.build()
}

fn brute_force(
    transactions: &[BTreeSet<&'static str>],
    input: &BTreeSet<&'static str>,
    kinds: CandidateKinds,
) -> HashMap<&'static str, f64> {
    let matching: Vec<&BTreeSet<&'static str>> = transactions
        .iter()
        .filter(|tx| input.is_subset(tx))
        .collect();
    let mut out = HashMap::new();
    if matching.is_empty() {
        return out;
    }
    for &candidate in LABELS {
        if input.contains(candidate) {
            continue;
        }
        if kinds == CandidateKinds::PropertiesOnly && is_type_label(candidate) {
            continue;
        }
        let hits = matching.iter().filter(|tx| tx.contains(candidate)).count();
        if hits > 0 {
            out.insert(candidate, hits as f64 / matching.len() as f64);
        }
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn tree_scores_match_brute_force(
        transactions in transactions_strategy(),
        input in input_strategy(),
        include_types in any::<bool>(),
    ) {
        let tree = build(&transactions);
        let kinds = CandidateKinds::from_include_types(include_types);

        let resolved: BTreeSet<&'static str> = input
            .iter()
            .copied()
            .filter(|l| tree.registry().resolve(l).is_some())
            .collect();
        prop_assume!(!resolved.is_empty());

        let list = ItemList::resolve(tree.registry(), &input, Vec::<&str>::new());
        let got = tree.recommend(list, kinds);
        let expected = brute_force(&transactions, &resolved, kinds);

        prop_assert_eq!(got.len(), expected.len());
        for rec in &got {
            let want = expected.get(rec.label.as_str()).copied();
            prop_assert!(want.is_some(), "unexpected candidate {}", rec.label);
            prop_assert!((rec.score - want.unwrap_or_default()).abs() < 1e-9);
        }
    }

    #[test]
    fn scores_are_ranked_and_bounded(
        transactions in transactions_strategy(),
        input in input_strategy(),
    ) {
        let tree = build(&transactions);
        let list = ItemList::resolve(tree.registry(), &input, Vec::<&str>::new());
        prop_assume!(!list.is_empty());

        let recs = tree.recommend(list, CandidateKinds::PropertiesAndTypes);
        for rec in &recs {
            prop_assert!(rec.score > 0.0 && rec.score <= 1.0, "score {}", rec.score);
        }
        let scores: Vec<f64> = recs.iter().map(|r| r.score).collect();
        prop_assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn recommendation_is_idempotent(
        transactions in transactions_strategy(),
        input in input_strategy(),
    ) {
        let tree = build(&transactions);
        let list = ItemList::resolve(tree.registry(), &input, Vec::<&str>::new());
        let first = tree.recommend_property(list.clone());
        let second = tree.recommend_property(list);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn empty_input_yields_marginals_for_every_item(transactions in transactions_strategy()) {
        let tree = build(&transactions);
        let recs = tree.recommend_property(ItemList::default());
        let total = transactions.len() as f64;

        prop_assert_eq!(recs.len(), tree.registry().len());
        for (rec, item) in recs.iter().zip(tree.registry().rank_order_snapshot()) {
            prop_assert_eq!(rec.label.as_str(), item.label());
            let expected = f64::from(item.total_count()) / total;
            prop_assert!((rec.score - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn rank_order_snapshot_is_dense(transactions in transactions_strategy()) {
        let tree = build(&transactions);
        let ranks: Vec<u32> = tree.registry().rank_order_snapshot().map(|i| i.rank()).collect();
        let expected: Vec<u32> = (0..tree.registry().len() as u32).collect();
        prop_assert_eq!(ranks, expected);

        let counts: Vec<u32> = tree
            .registry()
            .rank_order_snapshot()
            .map(|i| i.total_count())
            .collect();
        prop_assert!(counts.windows(2).all(|w| w[0] >= w[1]));
    }
}
