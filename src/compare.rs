use crate::analyzer::AnalysisResult;
use crate::security::Finding;
use serde::Serialize;
use std::collections::BTreeMap;

/// Direction of a count change between two runs, for counts where lower is
/// better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Improvement,
    Regression,
    Stable,
}

/// A before/after count pair. `trend` is set only for counts with a
/// direction worth judging.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Delta {
    pub old: usize,
    pub new: usize,
    pub delta: i64,
    pub trend: Option<Trend>,
}

impl Delta {
    fn counted(old: usize, new: usize) -> Self {
        Self {
            old,
            new,
            delta: new as i64 - old as i64,
            trend: None,
        }
    }

    fn lower_is_better(old: usize, new: usize) -> Self {
        let delta = new as i64 - old as i64;
        let trend = if delta < 0 {
            Trend::Improvement
        } else if delta > 0 {
            Trend::Regression
        } else {
            Trend::Stable
        };
        Self {
            old,
            new,
            delta,
            trend: Some(trend),
        }
    }
}

/// Differences between two analysis runs of the same project. Pure
/// derivation; storing and retrieving past runs is the caller's concern.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub modules: Delta,
    pub edges: Delta,
    pub cycles: Delta,
    pub findings: Delta,
    pub attack_paths: Delta,
    pub modules_added: Vec<String>,
    pub modules_removed: Vec<String>,
    pub findings_fixed: Vec<Finding>,
    pub findings_introduced: Vec<Finding>,
}

/// Compares an older run against a newer one. Findings are matched by
/// (module, line, rule), so a finding that merely moved severity text still
/// pairs up.
pub fn compare(old: &AnalysisResult, new: &AnalysisResult) -> ComparisonReport {
    let old_modules: BTreeMap<&String, ()> =
        old.modules.iter().map(|m| (&m.id, ())).collect();
    let new_modules: BTreeMap<&String, ()> =
        new.modules.iter().map(|m| (&m.id, ())).collect();

    let modules_added: Vec<String> = new_modules
        .keys()
        .filter(|id| !old_modules.contains_key(**id))
        .map(|id| (*id).clone())
        .collect();
    let modules_removed: Vec<String> = old_modules
        .keys()
        .filter(|id| !new_modules.contains_key(**id))
        .map(|id| (*id).clone())
        .collect();

    let old_findings = findings_by_key(&old.findings);
    let new_findings = findings_by_key(&new.findings);

    let mut findings_fixed: Vec<Finding> = old_findings
        .iter()
        .filter(|(key, _)| !new_findings.contains_key(*key))
        .map(|(_, f)| (*f).clone())
        .collect();
    let mut findings_introduced: Vec<Finding> = new_findings
        .iter()
        .filter(|(key, _)| !old_findings.contains_key(*key))
        .map(|(_, f)| (*f).clone())
        .collect();
    findings_fixed.sort_by(|a, b| {
        a.module
            .cmp(&b.module)
            .then(a.line.cmp(&b.line))
            .then(a.rule_id.cmp(&b.rule_id))
    });
    findings_introduced.sort_by(|a, b| {
        a.module
            .cmp(&b.module)
            .then(a.line.cmp(&b.line))
            .then(a.rule_id.cmp(&b.rule_id))
    });

    ComparisonReport {
        modules: Delta::counted(old.summary.modules, new.summary.modules),
        edges: Delta::counted(old.summary.edges, new.summary.edges),
        cycles: Delta::lower_is_better(old.summary.cycles, new.summary.cycles),
        findings: Delta::lower_is_better(old.summary.findings.total(), new.summary.findings.total()),
        attack_paths: Delta::lower_is_better(old.summary.attack_paths, new.summary.attack_paths),
        modules_added,
        modules_removed,
        findings_fixed,
        findings_introduced,
    }
}

fn findings_by_key(findings: &[Finding]) -> BTreeMap<String, &Finding> {
    findings
        .iter()
        .map(|f| (format!("{}:{}:{}", f.module, f.line, f.rule_id), f))
        .collect()
}
