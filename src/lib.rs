// Library root exposing the analysis pipeline to the CLI binary, tests,
// and embedding callers.

/// Pipeline orchestration: configuration, cancellation, the `RiskGraph`
/// entry operation and the `AnalysisResult` it produces.
pub mod analyzer;

/// Comparison of two analysis runs into a difference report.
pub mod compare;

/// Dependency-graph construction and import resolution.
pub mod graph;

/// Degree and centrality statistics plus cycle structure.
pub mod metrics;

/// Detection rule tables: security patterns and route-registration idioms.
pub mod rules;

/// Per-file source scanning into structural records.
pub mod scanner;

/// Aggregation of pattern matches into severity-tagged findings.
pub mod security;

/// Attack-surface reachability and risk scoring.
pub mod surface;

/// Shared helpers: line mapping and module identifiers.
pub mod utils;
