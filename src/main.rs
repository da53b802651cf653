use anyhow::Result;
use clap::Parser;
use colored::*;
use riskgraph_rs::analyzer::{
    collect_source_files, AnalysisResult, AnalyzeConfig, RiskGraph, DEFAULT_CYCLE_BOUND,
};
use riskgraph_rs::rules::danger::Severity;
use riskgraph_rs::surface::RiskLevel;
use std::path::PathBuf;

/// Command line interface. The binary owns file collection and rendering;
/// the analysis itself is a pure library call.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root of the Python project to analyze.
    path: PathBuf,

    /// Output the raw analysis result as JSON.
    #[arg(long)]
    json: bool,

    /// Upper bound on enumerated import cycles.
    #[arg(long, default_value_t = DEFAULT_CYCLE_BOUND)]
    max_cycles: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let files = collect_source_files(&cli.path);

    let config = AnalyzeConfig {
        max_cycles: cli.max_cycles,
        ..AnalyzeConfig::default()
    };
    let result = RiskGraph::new(config).analyze(&files)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&result);
    }

    Ok(())
}

fn print_report(result: &AnalysisResult) {
    println!("\n{}", "Dependency & Attack Surface Analysis".bold());
    println!("====================================\n");

    let s = &result.summary;
    println!("Summary:");
    println!(" * Files scanned: {}", s.total_files);
    println!(" * Modules: {}", s.modules);
    println!(" * Import edges: {}", s.edges);
    println!(" * External dependencies: {}", s.external_dependencies);
    if s.cycles_saturated {
        println!(" * Import cycles: {}+ (enumeration capped)", s.cycles);
    } else {
        println!(" * Import cycles: {}", s.cycles);
    }
    println!(" * Entry points: {}", s.entry_points);
    println!(
        " * Findings: {} ({} critical, {} high, {} medium)",
        s.findings.total(),
        s.findings.critical,
        s.findings.high,
        s.findings.medium
    );
    if s.scan_failures > 0 {
        println!(" * Scan failures: {}", s.scan_failures);
    }

    let hubs = result.metrics.top_degree_centrality(5);
    if !hubs.is_empty() {
        println!("\n - Hub Modules");
        println!("=============");
        for (i, (module, score)) in hubs.iter().enumerate() {
            println!(" {}. {} ({:.3})", i + 1, module, score);
        }
    }

    if !result.metrics.cycles.is_empty() {
        println!("\n - Import Cycles");
        println!("===============");
        for cycle in result.metrics.cycles.iter().take(3) {
            println!(" * {} -> {}", cycle.join(" -> "), cycle[0]);
        }
        if result.metrics.cycles.len() > 3 {
            println!(" ... and {} more", result.metrics.cycles.len() - 3);
        }
    }

    if !result.findings.is_empty() {
        println!("\n - Security Findings");
        println!("===================");
        for (i, f) in result.findings.iter().enumerate() {
            println!(
                " {}. {} [{}] Severity: {}",
                i + 1,
                f.message,
                f.rule_id,
                severity_colored(f.severity)
            );
            println!("    └─ {}:{}", f.module, f.line);
        }
    }

    if !result.attack_paths.is_empty() {
        println!("\n - Attack Paths");
        println!("==============");
        for (i, p) in result.attack_paths.iter().enumerate() {
            let entry = match (&p.entry_module, &p.entry_route) {
                (Some(module), Some(route)) => format!("{route} ({module})"),
                (Some(module), None) => module.clone(),
                _ => "(no entry point)".to_string(),
            };
            let distance = p
                .distance
                .map_or("unreachable".to_string(), |d| format!("{d} hops"));
            println!(
                " {}. {} -> {} [{}] Risk: {}",
                i + 1,
                entry,
                p.target_module,
                distance,
                risk_colored(p.risk)
            );
        }
    }

    if !result.scan_failures.is_empty() {
        println!("\n - Scan Failures");
        println!("===============");
        for (i, failure) in result.scan_failures.iter().enumerate() {
            println!(" {}. {}: {}", i + 1, failure.path.display(), failure.reason);
        }
    }
}

fn severity_colored(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => severity.label().red().bold(),
        Severity::High => severity.label().yellow(),
        Severity::Medium => severity.label().normal(),
    }
}

fn risk_colored(risk: RiskLevel) -> ColoredString {
    match risk {
        RiskLevel::Critical => risk.label().red().bold(),
        RiskLevel::High => risk.label().red(),
        RiskLevel::Medium => risk.label().yellow(),
        RiskLevel::Low => risk.label().normal(),
        RiskLevel::Unscored => risk.label().dimmed(),
    }
}
