//! Dispatch tests for the recommender service

use super::*;
use schemarec_index::SchemaTreeBuilder;
use tempfile::tempdir;

const NO_TYPES: [&str; 0] = [];

fn test_tree() -> SchemaTree {
    let mut builder = SchemaTreeBuilder::new();
    for _ in 0..3 {
        builder.add_transaction(["building=yes", "roof:shape=flat", "t#Building"]);
    }
    builder.add_transaction(["building=yes", "levels=2"]);
    builder.add_transaction(["amenity=cafe", "name"]);
    builder.build()
}

fn test_hierarchy() -> Hierarchy {
    Hierarchy::from_json_str(
        r#"[{"name": "building", "tags": ["building=yes", "levels=2"],
             "children": [{"name": "roof", "tags": ["roof:shape=flat", "roof:colour=red"]}]}]"#,
    )
    .unwrap()
}

fn service(mode: RecoMode) -> RecommenderService {
    let config = ServiceConfig {
        mode,
        ..ServiceConfig::default()
    };
    RecommenderService::new(config, test_tree())
}

#[test]
fn test_tree_mode_ignores_hierarchy() {
    let svc = service(RecoMode::Tree).with_hierarchy(test_hierarchy());
    let recs = svc.recommend(&["building=yes"], &NO_TYPES);

    assert_eq!(recs.labels(), vec!["roof:shape=flat", "levels=2"]);
    assert_eq!(recs.score_of("roof:shape=flat"), Some(0.75));
    assert!(recs.iter().all(|r| r.item.is_some()));
}

#[test]
fn test_hierarchy_mode_uses_sibling_and_cousin_counts() {
    let svc = service(RecoMode::Hierarchy).with_hierarchy(test_hierarchy());
    let recs = svc.recommend(&["building=yes"], &NO_TYPES);

    assert_eq!(
        recs.labels(),
        vec!["levels=2", "roof:colour=red", "roof:shape=flat"]
    );
    assert!(recs.iter().all(|r| r.score == 1.0 && r.item.is_none()));
}

#[test]
fn test_hierarchy_mode_returns_empty_without_fallback() {
    let svc = service(RecoMode::Hierarchy).with_hierarchy(test_hierarchy());
    let recs = svc.recommend(&["amenity=cafe"], &NO_TYPES);
    assert!(recs.is_empty());
}

#[test]
fn test_hierarchy_mode_falls_back_when_nothing_is_loaded() {
    let svc = service(RecoMode::Hierarchy);
    let recs = svc.recommend(&["amenity=cafe"], &NO_TYPES);
    assert_eq!(recs.labels(), vec!["name"]);

    let svc = service(RecoMode::Hierarchy).with_hierarchy(Hierarchy::default());
    let recs = svc.recommend(&["amenity=cafe"], &NO_TYPES);
    assert_eq!(recs.labels(), vec!["name"]);
}

#[test]
fn test_hybrid_mode_merges_by_label() {
    let svc = service(RecoMode::Hybrid).with_hierarchy(test_hierarchy());
    let recs = svc.recommend(&["building=yes"], &NO_TYPES);

    // Hierarchy counts (1.0) win over tree probabilities for shared labels.
    assert_eq!(recs.len(), 3);
    assert_eq!(recs.score_of("roof:shape=flat"), Some(1.0));
    assert_eq!(recs.score_of("levels=2"), Some(1.0));
    assert_eq!(recs.score_of("roof:colour=red"), Some(1.0));

    // A tag unknown to the hierarchy still gets tree candidates.
    let recs = svc.recommend(&["amenity=cafe"], &NO_TYPES);
    assert_eq!(recs.labels(), vec!["name"]);
    assert_eq!(recs.score_of("name"), Some(1.0));
}

#[test]
fn test_types_resolved_under_prefix() {
    let config = ServiceConfig {
        include_types: true,
        ..ServiceConfig::default()
    };
    let svc = RecommenderService::new(config, test_tree());
    let recs = svc.recommend(&NO_TYPES, &["Building"]);

    assert_eq!(recs.score_of("building=yes"), Some(1.0));
    assert_eq!(recs.score_of("roof:shape=flat"), Some(1.0));
    assert_eq!(recs.score_of("t#Building"), None);
}

#[test]
fn test_open_tolerates_broken_hierarchy() {
    let dir = tempdir().unwrap();
    let tsv = dir.path().join("tags.tsv");
    let hierarchy = dir.path().join("hierarchy.json");
    std::fs::write(&tsv, "a\tb\na\n").unwrap();
    std::fs::write(&hierarchy, "not json").unwrap();

    let config = ServiceConfig {
        transactions_path: tsv,
        hierarchy_path: Some(hierarchy.clone()),
        mode: RecoMode::Hierarchy,
        ..ServiceConfig::default()
    };
    let svc = RecommenderService::open(config).unwrap();
    assert!(svc.hierarchy().is_none());
    assert_eq!(svc.recommend(&["a"], &NO_TYPES).score_of("b"), Some(0.5));

    // A failed reload keeps the hierarchy that is already installed.
    std::fs::write(&hierarchy, r#"[{"name": "g", "tags": ["a", "c"]}]"#).unwrap();
    svc.reload_hierarchy(&hierarchy).unwrap();
    std::fs::write(&hierarchy, "[").unwrap();
    assert!(svc.reload_hierarchy(&hierarchy).is_err());
    assert_eq!(svc.recommend(&["a"], &NO_TYPES).labels(), vec!["c"]);

    svc.clear_hierarchy();
    assert_eq!(svc.recommend(&["a"], &NO_TYPES).labels(), vec!["b"]);
}

#[test]
fn test_open_requires_transactions() {
    let dir = tempdir().unwrap();
    let config = ServiceConfig {
        transactions_path: dir.path().join("missing.tsv"),
        ..ServiceConfig::default()
    };
    assert!(RecommenderService::open(config).is_err());
}

#[test]
fn test_evaluation_over_service() {
    let svc = service(RecoMode::Tree);
    let cases = eval::read_eval_cases(std::io::Cursor::new(
        "building=yes\troof:shape=flat\namenity=cafe\tlevels=2\n",
    ))
    .unwrap();
    let report = eval::evaluate(&svc, &cases, 3, RecoMode::Tree);

    assert_eq!(report.overall.cases, 2);
    assert_eq!(report.overall.mean_hit_at_1, 0.5);
    assert_eq!(report.slices["building"].cases, 1);
    assert_eq!(report.slices["misc"].mean_hit_at_k, 0.0);

    let mut csv = Vec::new();
    eval::write_csv(&report, &mut csv).unwrap();
    let csv = String::from_utf8(csv).unwrap();
    assert_eq!(csv, "slice,prec1,prec3,map3\nbuilding,1,1,1\nmisc,0,0,0\n");
}
