// Unit tests for attack-surface mapping and the risk table.

use riskgraph_rs::graph::DependencyGraph;
use riskgraph_rs::rules::danger::{RuleTable, Severity};
use riskgraph_rs::rules::routes::{EntryPoint, RouteCatalog};
use riskgraph_rs::scanner::{scan_file, FileRecord};
use riskgraph_rs::security::collect_findings;
use riskgraph_rs::surface::{map_attack_surface, risk_level, RiskLevel};
use std::path::Path;

fn scan_all(files: &[(&str, &str)]) -> Vec<FileRecord> {
    let rules = RuleTable::default();
    let catalog = RouteCatalog::default();
    let mut records: Vec<FileRecord> = files
        .iter()
        .map(|(path, source)| {
            scan_file(Path::new(path), source, &rules, &catalog).expect("scan should succeed")
        })
        .collect();
    records.sort_by(|a, b| a.module.cmp(&b.module));
    records
}

fn entry_points(records: &[FileRecord]) -> Vec<EntryPoint> {
    records.iter().flat_map(|r| r.routes.clone()).collect()
}

#[test]
fn test_risk_table_rows() {
    // Critical row.
    assert_eq!(risk_level(Severity::Critical, Some(0)), RiskLevel::Critical);
    assert_eq!(risk_level(Severity::Critical, Some(1)), RiskLevel::Critical);
    assert_eq!(risk_level(Severity::Critical, Some(2)), RiskLevel::High);
    assert_eq!(risk_level(Severity::Critical, Some(3)), RiskLevel::High);
    assert_eq!(risk_level(Severity::Critical, Some(5)), RiskLevel::Medium);
    assert_eq!(risk_level(Severity::Critical, None), RiskLevel::Medium);

    // High row.
    assert_eq!(risk_level(Severity::High, Some(1)), RiskLevel::High);
    assert_eq!(risk_level(Severity::High, Some(2)), RiskLevel::Medium);
    assert_eq!(risk_level(Severity::High, Some(4)), RiskLevel::Low);
    assert_eq!(risk_level(Severity::High, None), RiskLevel::Low);

    // Medium row.
    assert_eq!(risk_level(Severity::Medium, Some(0)), RiskLevel::Medium);
    assert_eq!(risk_level(Severity::Medium, Some(2)), RiskLevel::Low);
    assert_eq!(risk_level(Severity::Medium, None), RiskLevel::Low);
}

#[test]
fn test_direct_import_distance_is_one() {
    let records = scan_all(&[
        (
            "app.py",
            "import core\n\n@app.route(\"/run\")\ndef run():\n    return core.go()\n",
        ),
        ("core.py", "def go():\n    return eval('1')\n"),
    ]);
    let deps = DependencyGraph::build(&records);
    let (findings, _) = collect_findings(&records);
    let paths = map_attack_surface(&deps, &entry_points(&records), &findings);

    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].target_module, "core");
    assert_eq!(paths[0].distance, Some(1));
    assert_eq!(paths[0].risk, RiskLevel::Critical);
}

#[test]
fn test_entry_module_distance_to_itself_is_zero() {
    let records = scan_all(&[(
        "app.py",
        "@app.route(\"/run\")\ndef run(data):\n    return eval(data)\n",
    )]);
    let deps = DependencyGraph::build(&records);
    let (findings, _) = collect_findings(&records);
    let paths = map_attack_surface(&deps, &entry_points(&records), &findings);

    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].distance, Some(0));
    assert_eq!(paths[0].risk, RiskLevel::Critical);
}

#[test]
fn test_modules_without_findings_are_excluded() {
    let records = scan_all(&[
        (
            "app.py",
            "import clean\n\n@app.route(\"/run\")\ndef run():\n    return clean.go()\n",
        ),
        ("clean.py", "def go():\n    return 1\n"),
    ]);
    let deps = DependencyGraph::build(&records);
    let (findings, _) = collect_findings(&records);
    let paths = map_attack_surface(&deps, &entry_points(&records), &findings);
    assert!(paths.is_empty());
}

#[test]
fn test_unreachable_module_uses_unreachable_column() {
    let records = scan_all(&[
        (
            "app.py",
            "@app.route(\"/run\")\ndef run():\n    return 1\n",
        ),
        ("hidden.py", "def go(x):\n    return eval(x)\n"),
    ]);
    let deps = DependencyGraph::build(&records);
    let (findings, _) = collect_findings(&records);
    let paths = map_attack_surface(&deps, &entry_points(&records), &findings);

    assert_eq!(paths.len(), 1);
    let path = &paths[0];
    assert_eq!(path.target_module, "hidden");
    assert_eq!(path.entry_module, None);
    assert_eq!(path.distance, None);
    // Critical severity capped at Medium when unreachable.
    assert_eq!(path.risk, RiskLevel::Medium);
}

#[test]
fn test_no_entry_points_yields_unscored() {
    let records = scan_all(&[("util.py", "def go(x):\n    return eval(x)\n")]);
    let deps = DependencyGraph::build(&records);
    let (findings, _) = collect_findings(&records);
    let paths = map_attack_surface(&deps, &[], &findings);

    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].risk, RiskLevel::Unscored);
    assert_eq!(paths[0].distance, None);
}

#[test]
fn test_paths_sorted_by_risk_then_distance() {
    let records = scan_all(&[
        (
            "app.py",
            "import near\nimport far_hop\n\n@app.route(\"/run\")\ndef run():\n    return 1\n",
        ),
        ("near.py", "def go(x):\n    return eval(x)\n"),
        ("far_hop.py", "import far\n"),
        ("far.py", "import deeper\n"),
        ("deeper.py", "def go(x):\n    return eval(x)\n"),
    ]);
    let deps = DependencyGraph::build(&records);
    let (findings, _) = collect_findings(&records);
    let paths = map_attack_surface(&deps, &entry_points(&records), &findings);

    assert_eq!(paths.len(), 2);
    // near at distance 1 (Critical) sorts before deeper at distance 3 (High).
    assert_eq!(paths[0].target_module, "near");
    assert_eq!(paths[0].risk, RiskLevel::Critical);
    assert_eq!(paths[1].target_module, "deeper");
    assert_eq!(paths[1].distance, Some(3));
    assert_eq!(paths[1].risk, RiskLevel::High);
}

#[test]
fn test_worst_severity_drives_the_row() {
    // Module with both a Medium and a Critical finding scores by Critical.
    let records = scan_all(&[
        (
            "app.py",
            "import mixed\n\n@app.route(\"/run\")\ndef run():\n    return 1\n",
        ),
        (
            "mixed.py",
            "def go(x):\n    answer = input('y/n? ')\n    return eval(x)\n",
        ),
    ]);
    let deps = DependencyGraph::build(&records);
    let (findings, _) = collect_findings(&records);
    let paths = map_attack_surface(&deps, &entry_points(&records), &findings);

    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].worst_severity, Severity::Critical);
    assert_eq!(paths[0].risk, RiskLevel::Critical);
}
