use crate::graph::DependencyGraph;
use crate::rules::danger::Severity;
use crate::rules::routes::EntryPoint;
use crate::security::{worst_by_module, Finding};
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

/// Derived risk of a vulnerable module as seen from the attack surface.
/// Variants are declared in rank order so `Ord` makes `Critical` greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskLevel {
    Unscored,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::Low => "LOW",
            RiskLevel::Unscored => "UNSCORED",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One (entry point, vulnerable module) pair with its reachability distance
/// and derived risk. A module unreachable from every entry point gets a
/// single path with no entry and no distance. Recomputed fully per run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AttackPath {
    pub entry_module: Option<String>,
    pub entry_route: Option<String>,
    pub target_module: String,
    /// Minimum hop count over forward import edges; `None` if unreachable.
    pub distance: Option<usize>,
    pub worst_severity: Severity,
    pub risk: RiskLevel,
}

/// Fixed precedence table combining worst finding severity with distance
/// from the entry point. Unreachable modules use the rightmost column:
/// dangerous code nobody routes to is lower priority, not irrelevant.
pub fn risk_level(severity: Severity, distance: Option<usize>) -> RiskLevel {
    match (severity, distance) {
        (Severity::Critical, Some(0..=1)) => RiskLevel::Critical,
        (Severity::Critical, Some(2..=3)) => RiskLevel::High,
        (Severity::Critical, _) => RiskLevel::Medium,
        (Severity::High, Some(0..=1)) => RiskLevel::High,
        (Severity::High, Some(2..=3)) => RiskLevel::Medium,
        (Severity::High, _) => RiskLevel::Low,
        (Severity::Medium, Some(0..=1)) => RiskLevel::Medium,
        (Severity::Medium, _) => RiskLevel::Low,
    }
}

/// Computes the attack-path list. Only modules with at least one finding
/// appear; modules without findings have nothing to protect.
pub fn map_attack_surface(
    deps: &DependencyGraph,
    entry_points: &[EntryPoint],
    findings: &[Finding],
) -> Vec<AttackPath> {
    let worst = worst_by_module(findings);
    if worst.is_empty() {
        return Vec::new();
    }

    // One BFS per distinct entry module, shared by its entry points.
    let entry_modules: BTreeSet<&str> = entry_points.iter().map(|e| e.module.as_str()).collect();
    let mut distances: BTreeMap<&str, HashMap<usize, usize>> = BTreeMap::new();
    for module in entry_modules {
        if let Some(start) = deps.node_index(module) {
            distances.insert(module, bfs_distances(deps, start));
        }
    }

    let mut paths = Vec::new();
    let mut reached: BTreeSet<&String> = BTreeSet::new();

    for entry in entry_points {
        let Some(dist_map) = distances.get(entry.module.as_str()) else {
            continue;
        };
        for (module, &severity) in &worst {
            let Some(target) = deps.node_index(module) else {
                continue;
            };
            if let Some(&distance) = dist_map.get(&target.index()) {
                reached.insert(module);
                paths.push(AttackPath {
                    entry_module: Some(entry.module.clone()),
                    entry_route: entry.route.clone(),
                    target_module: module.clone(),
                    distance: Some(distance),
                    worst_severity: severity,
                    risk: risk_level(severity, Some(distance)),
                });
            }
        }
    }

    for (module, &severity) in &worst {
        if reached.contains(module) {
            continue;
        }
        // No entry point reaches this module. With no entry points at all
        // there is no distance to measure, so the table does not apply.
        let risk = if entry_points.is_empty() {
            RiskLevel::Unscored
        } else {
            risk_level(severity, None)
        };
        paths.push(AttackPath {
            entry_module: None,
            entry_route: None,
            target_module: module.clone(),
            distance: None,
            worst_severity: severity,
            risk,
        });
    }

    paths.sort_by(|a, b| {
        b.risk
            .cmp(&a.risk)
            .then_with(|| {
                a.distance
                    .unwrap_or(usize::MAX)
                    .cmp(&b.distance.unwrap_or(usize::MAX))
            })
            .then_with(|| a.target_module.cmp(&b.target_module))
            .then_with(|| a.entry_module.cmp(&b.entry_module))
            .then_with(|| a.entry_route.cmp(&b.entry_route))
    });
    paths
}

/// Hop counts from `start` to every module reachable over forward import
/// edges. The entry module's distance to itself is 0.
fn bfs_distances(deps: &DependencyGraph, start: NodeIndex) -> HashMap<usize, usize> {
    let mut distances = HashMap::new();
    distances.insert(start.index(), 0);

    let mut queue = VecDeque::new();
    queue.push_back(start);
    while let Some(v) = queue.pop_front() {
        let next = distances[&v.index()] + 1;
        for w in deps.graph.neighbors_directed(v, Direction::Outgoing) {
            if !distances.contains_key(&w.index()) {
                distances.insert(w.index(), next);
                queue.push_back(w);
            }
        }
    }
    distances
}
