use crate::rules::danger::Severity;
use crate::scanner::FileRecord;
use serde::Serialize;
use std::collections::BTreeMap;

/// One detected occurrence of a security-relevant pattern, attributed to a
/// module. Append-only once emitted.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Finding {
    pub module: String,
    pub rule_id: String,
    pub severity: Severity,
    pub line: usize,
    pub snippet: String,
    pub message: String,
}

/// Finding counts per severity for the run summary.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SeveritySummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
}

impl SeveritySummary {
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium
    }

    fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
        }
    }
}

/// Buckets the scanner's pattern matches into findings. No parsing happens
/// here; the severity taxonomy stays decoupled from the detection table.
pub fn collect_findings(records: &[FileRecord]) -> (Vec<Finding>, SeveritySummary) {
    let mut findings = Vec::new();
    let mut summary = SeveritySummary::default();

    for record in records {
        for m in &record.matches {
            summary.bump(m.severity);
            findings.push(Finding {
                module: record.module.clone(),
                rule_id: m.rule_id.clone(),
                severity: m.severity,
                line: m.line,
                snippet: m.snippet.clone(),
                message: m.message.clone(),
            });
        }
    }

    (findings, summary)
}

/// Worst finding severity per module; modules without findings are absent.
pub fn worst_by_module(findings: &[Finding]) -> BTreeMap<String, Severity> {
    let mut worst: BTreeMap<String, Severity> = BTreeMap::new();
    for finding in findings {
        worst
            .entry(finding.module.clone())
            .and_modify(|s| *s = (*s).max(finding.severity))
            .or_insert(finding.severity);
    }
    worst
}
