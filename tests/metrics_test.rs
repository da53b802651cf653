// Unit tests for graph metrics: degrees, centralities, cycles.

use riskgraph_rs::graph::DependencyGraph;
use riskgraph_rs::metrics::compute;
use riskgraph_rs::rules::danger::RuleTable;
use riskgraph_rs::rules::routes::RouteCatalog;
use riskgraph_rs::scanner::{scan_file, FileRecord};
use std::path::Path;

fn build(files: &[(&str, &str)]) -> DependencyGraph {
    let rules = RuleTable::default();
    let catalog = RouteCatalog::default();
    let mut records: Vec<FileRecord> = files
        .iter()
        .map(|(path, source)| {
            scan_file(Path::new(path), source, &rules, &catalog).expect("scan should succeed")
        })
        .collect();
    records.sort_by(|a, b| a.module.cmp(&b.module));
    DependencyGraph::build(&records)
}

#[test]
fn test_degrees_and_degree_centrality() {
    let deps = build(&[
        ("a.py", "import b\nimport c\n"),
        ("b.py", ""),
        ("c.py", ""),
    ]);
    let metrics = compute(&deps, 100);

    let a = &metrics.per_module["a"];
    assert_eq!(a.out_degree, 2);
    assert_eq!(a.in_degree, 0);
    // (0 + 2) / (3 - 1)
    assert!((a.degree_centrality - 1.0).abs() < 1e-9);

    let b = &metrics.per_module["b"];
    assert_eq!(b.in_degree, 1);
    assert_eq!(b.out_degree, 0);
    assert!((b.degree_centrality - 0.5).abs() < 1e-9);
}

#[test]
fn test_isolated_node_scores_zero() {
    let deps = build(&[
        ("a.py", "import b\n"),
        ("b.py", ""),
        ("lonely.py", "x = 1\n"),
    ]);
    let metrics = compute(&deps, 100);
    let lonely = &metrics.per_module["lonely"];
    assert_eq!(lonely.in_degree, 0);
    assert_eq!(lonely.out_degree, 0);
    assert_eq!(lonely.betweenness, 0.0);
}

#[test]
fn test_betweenness_of_a_bridge() {
    // a -> b -> c: every a-to-c shortest path passes through b.
    let deps = build(&[
        ("a.py", "import b\n"),
        ("b.py", "import c\n"),
        ("c.py", ""),
    ]);
    let metrics = compute(&deps, 100);
    // One pair (a, c) out of (N-1)(N-2) = 2 ordered pairs per source.
    assert!((metrics.per_module["b"].betweenness - 0.5).abs() < 1e-9);
    assert_eq!(metrics.per_module["a"].betweenness, 0.0);
    assert_eq!(metrics.per_module["c"].betweenness, 0.0);
}

#[test]
fn test_mutual_import_is_one_cycle() {
    let deps = build(&[("a.py", "import b\n"), ("b.py", "import a\n")]);
    let metrics = compute(&deps, 100);
    assert!(!metrics.is_dag);
    assert_eq!(metrics.cycles.len(), 1);
    assert!(!metrics.cycles_saturated);

    let cycle = &metrics.cycles[0];
    assert_eq!(cycle.len(), 2);
    assert!(cycle.contains(&"a".to_string()));
    assert!(cycle.contains(&"b".to_string()));
}

#[test]
fn test_tree_shape_is_a_dag() {
    let deps = build(&[
        ("root.py", "import left\nimport right\n"),
        ("left.py", "import leaf\n"),
        ("right.py", "import leaf\n"),
        ("leaf.py", ""),
    ]);
    let metrics = compute(&deps, 100);
    assert!(metrics.is_dag);
    assert!(metrics.cycles.is_empty());
    assert!(!metrics.cycles_saturated);
}

#[test]
fn test_three_node_cycle_found_once() {
    let deps = build(&[
        ("a.py", "import b\n"),
        ("b.py", "import c\n"),
        ("c.py", "import a\n"),
    ]);
    let metrics = compute(&deps, 100);
    assert_eq!(metrics.cycles.len(), 1);
    assert_eq!(metrics.cycles[0].len(), 3);
}

#[test]
fn test_cycle_bound_saturates() {
    // Two independent two-node cycles, but room for only one.
    let deps = build(&[
        ("a.py", "import b\n"),
        ("b.py", "import a\n"),
        ("c.py", "import d\n"),
        ("d.py", "import c\n"),
    ]);
    let metrics = compute(&deps, 1);
    assert_eq!(metrics.cycles.len(), 1);
    assert!(metrics.cycles_saturated);
    assert!(!metrics.is_dag);
}

#[test]
fn test_top_degree_centrality_ranking() {
    let deps = build(&[
        ("hub.py", "import a\nimport b\nimport c\n"),
        ("a.py", ""),
        ("b.py", ""),
        ("c.py", ""),
    ]);
    let metrics = compute(&deps, 100);
    let top = metrics.top_degree_centrality(2);
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].0, "hub");
}
