use crate::graph::{DependencyGraph, EdgeRecord};
use crate::metrics::{self, GraphMetrics};
use crate::rules::danger::{PatternMatch, RuleTable};
use crate::rules::routes::{EntryPoint, RouteCatalog};
use crate::scanner::{scan_file, FileRecord, ImportRecord, ScanFailure};
use crate::security::{self, Finding, SeveritySummary};
use crate::surface::{self, AttackPath};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Default upper bound on enumerated import cycles. Cycle enumeration is
/// combinatorial on dense graphs; the summary carries a saturation flag
/// when the bound is hit.
pub const DEFAULT_CYCLE_BOUND: usize = 100;

/// Immutable per-run configuration. Passing it in (rather than reading
/// process-wide state) keeps concurrent runs independent.
#[derive(Debug, Clone)]
pub struct AnalyzeConfig {
    pub rules: RuleTable,
    pub routes: RouteCatalog,
    pub max_cycles: usize,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            rules: RuleTable::default(),
            routes: RouteCatalog::default(),
            max_cycles: DEFAULT_CYCLE_BOUND,
        }
    }
}

/// Cooperative cancellation flag, checked between file scans and between
/// pipeline stages. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Run-level failures. Per-file scan problems are not here; they ride on
/// the result as `ScanFailure` entries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalyzeError {
    /// The supplied file tree was empty.
    #[error("no source files supplied")]
    EmptyInput,
    /// Cancellation was observed; partial outputs are discarded.
    #[error("analysis cancelled")]
    Cancelled,
}

/// One input file: a project-relative path and its decoded text. Retrieval
/// and decoding are the caller's concern.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// A scanned module in the result object.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleRecord {
    pub id: String,
    pub path: PathBuf,
    pub line_count: usize,
    pub imports: Vec<ImportRecord>,
    pub matches: Vec<PatternMatch>,
    pub is_entry_point: bool,
}

/// Counts for the run, suitable for dashboards and diffing.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub total_files: usize,
    pub modules: usize,
    pub edges: usize,
    pub external_dependencies: usize,
    pub cycles: usize,
    pub cycles_saturated: bool,
    pub ambiguous_imports: usize,
    pub findings: SeveritySummary,
    pub entry_points: usize,
    pub attack_paths: usize,
    pub scan_failures: usize,
}

/// The immutable aggregate handed to reporting and storage collaborators.
/// Plain data throughout; serializable as-is.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub modules: Vec<ModuleRecord>,
    pub edges: Vec<EdgeRecord>,
    pub externals: Vec<String>,
    pub metrics: GraphMetrics,
    pub findings: Vec<Finding>,
    pub entry_points: Vec<EntryPoint>,
    pub attack_paths: Vec<AttackPath>,
    pub scan_failures: Vec<ScanFailure>,
    pub summary: AnalysisSummary,
}

/// The analysis pipeline. Each stage consumes the immutable output of the
/// stage before it; only file scanning runs on the thread pool.
pub struct RiskGraph {
    config: AnalyzeConfig,
}

impl Default for RiskGraph {
    fn default() -> Self {
        Self::new(AnalyzeConfig::default())
    }
}

impl RiskGraph {
    pub fn new(config: AnalyzeConfig) -> Self {
        Self { config }
    }

    /// Runs the full pipeline without external cancellation.
    pub fn analyze(&self, files: &[SourceFile]) -> Result<AnalysisResult, AnalyzeError> {
        self.analyze_with_cancel(files, &CancelToken::new())
    }

    /// Runs the full pipeline:
    /// 1. scan every file in parallel (per-file failures collected, not fatal),
    /// 2. sort records by module id so downstream output is independent of
    ///    scan completion order,
    /// 3. build the dependency graph,
    /// 4. compute metrics,
    /// 5. aggregate findings,
    /// 6. map the attack surface,
    /// 7. assemble the result.
    pub fn analyze_with_cancel(
        &self,
        files: &[SourceFile],
        cancel: &CancelToken,
    ) -> Result<AnalysisResult, AnalyzeError> {
        if files.is_empty() {
            return Err(AnalyzeError::EmptyInput);
        }
        ensure_live(cancel)?;

        let outcomes: Vec<Option<Result<FileRecord, ScanFailure>>> = files
            .par_iter()
            .map(|file| {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(scan_file(
                    &file.path,
                    &file.text,
                    &self.config.rules,
                    &self.config.routes,
                ))
            })
            .collect();
        ensure_live(cancel)?;

        let mut records = Vec::new();
        let mut scan_failures = Vec::new();
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Ok(record) => records.push(record),
                Err(failure) => scan_failures.push(failure),
            }
        }
        records.sort_by(|a, b| a.module.cmp(&b.module));
        scan_failures.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(
            files = files.len(),
            modules = records.len(),
            failures = scan_failures.len(),
            "scan stage complete"
        );

        let deps = DependencyGraph::build(&records);
        debug!(
            nodes = deps.node_count(),
            edges = deps.edge_count(),
            externals = deps.externals.len(),
            "graph stage complete"
        );
        ensure_live(cancel)?;

        let graph_metrics = metrics::compute(&deps, self.config.max_cycles);
        ensure_live(cancel)?;

        let (findings, severity_summary) = security::collect_findings(&records);
        ensure_live(cancel)?;

        let entry_points: Vec<EntryPoint> =
            records.iter().flat_map(|r| r.routes.clone()).collect();
        let attack_paths = surface::map_attack_surface(&deps, &entry_points, &findings);
        debug!(
            entry_points = entry_points.len(),
            findings = findings.len(),
            attack_paths = attack_paths.len(),
            "surface stage complete"
        );
        ensure_live(cancel)?;

        let edges = deps.edge_records();
        let externals: Vec<String> = deps.externals.iter().cloned().collect();
        let summary = AnalysisSummary {
            total_files: files.len(),
            modules: deps.node_count(),
            edges: edges.len(),
            external_dependencies: externals.len(),
            cycles: graph_metrics.cycles.len(),
            cycles_saturated: graph_metrics.cycles_saturated,
            ambiguous_imports: deps.ambiguous_imports,
            findings: severity_summary,
            entry_points: entry_points.len(),
            attack_paths: attack_paths.len(),
            scan_failures: scan_failures.len(),
        };

        let modules: Vec<ModuleRecord> = records
            .into_iter()
            .map(|r| ModuleRecord {
                id: r.module,
                path: r.path,
                line_count: r.line_count,
                imports: r.imports,
                matches: r.matches,
                is_entry_point: !r.routes.is_empty(),
            })
            .collect();

        Ok(AnalysisResult {
            modules,
            edges,
            externals,
            metrics: graph_metrics,
            findings,
            entry_points,
            attack_paths,
            scan_failures,
            summary,
        })
    }
}

fn ensure_live(cancel: &CancelToken) -> Result<(), AnalyzeError> {
    if cancel.is_cancelled() {
        Err(AnalyzeError::Cancelled)
    } else {
        Ok(())
    }
}

/// Walks a project directory for `*.py` files and reads them into
/// project-relative (path, text) pairs. Convenience for callers holding a
/// filesystem tree rather than an in-memory one. Unreadable files are
/// logged and skipped, so undecodable content never reaches the pipeline.
pub fn collect_source_files(root: &Path) -> Vec<SourceFile> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.extension().map_or(false, |ext| ext == "py") {
            continue;
        }
        match fs::read_to_string(path) {
            Ok(text) => {
                let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
                files.push(SourceFile::new(relative, text));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}
