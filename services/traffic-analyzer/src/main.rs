use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgesec_core::{encode_metrics, init_tracing, load_config, register_metrics};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use traffic_analyzer::{analyze, parse_corpus, parse_rule, render_analysis, render_simulation, simulate, ActionBucket, AnalyzerConfig, LogEntry};

#[derive(Parser)]
#[command(name = "edgesec")]
#[command(version)]
#[command(about = "Edge traffic analysis and WAF rule simulation", long_about = None)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON); EDGESEC_CONFIG_FILE is read when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print Prometheus counters after the run
    #[arg(long, global = true, env = "EDGESEC_METRICS")]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect anomalies in a traffic log and recommend mitigations
    Analyze {
        logs: PathBuf,
        /// Defaults to <logs>_analysis.json
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Estimate the impact of a rule on a traffic log
    Simulate {
        logs: PathBuf,
        rule: PathBuf,
        /// Defaults to <rule>_simulation_results.json
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

/// `dir/name.json` -> `dir/name<suffix>`
fn sibling_output(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    input.with_file_name(format!("{stem}{suffix}"))
}

fn read_corpus(path: &Path) -> Result<Vec<LogEntry>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading log file {}", path.display()))?;
    let entries = parse_corpus(&text).with_context(|| format!("decoding log file {}", path.display()))?;
    info!(path = %path.display(), entries = entries.len(), "corpus loaded");
    Ok(entries)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("edgesec")?;
    let cfg: AnalyzerConfig = load_config("edgesec", cli.config.as_deref())?;
    info!(?cfg, "config loaded");
    let metrics = register_metrics()?;

    match cli.command {
        Commands::Analyze { logs, output } => {
            let entries = read_corpus(&logs)?;
            let result = analyze(&entries, &cfg.analysis);
            metrics.entries_analyzed.inc_by(result.stats.total_requests);
            for anomaly in &result.anomalies {
                metrics.anomalies.with_label_values(&[anomaly.kind.as_str()]).inc();
            }
            println!("{}", render_analysis(&result, cfg.analysis.top_addresses));
            let out = output.unwrap_or_else(|| sibling_output(&logs, "_analysis.json"));
            write_json(&out, &result)?;
            println!("\nDetailed analysis saved to: {}", out.display());
        }
        Commands::Simulate { logs, rule, output } => {
            let entries = read_corpus(&logs)?;
            let text = std::fs::read_to_string(&rule).with_context(|| format!("reading rule file {}", rule.display()))?;
            let parsed = parse_rule(&text).with_context(|| format!("decoding rule file {}", rule.display()))?;
            let result = simulate(&entries, &parsed, &cfg.simulation);
            metrics.simulations.inc();
            for (bucket, n) in [(ActionBucket::Block, result.would_block), (ActionBucket::Challenge, result.would_challenge), (ActionBucket::Log, result.would_log)] {
                metrics.rule_matches.with_label_values(&[bucket.as_str()]).inc_by(n);
            }
            println!("{}", render_simulation(&result));
            let out = output.unwrap_or_else(|| sibling_output(&rule, "_simulation_results.json"));
            write_json(&out, &result)?;
            println!("\nDetailed results saved to: {}", out.display());
        }
    }

    if cli.metrics {
        print!("{}", encode_metrics()?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_lands_next_to_input() {
        assert_eq!(sibling_output(Path::new("data/logs.json"), "_analysis.json"), PathBuf::from("data/logs_analysis.json"));
        assert_eq!(sibling_output(Path::new("rule.json"), "_simulation_results.json"), PathBuf::from("rule_simulation_results.json"));
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["edgesec", "simulate", "l.json", "r.json", "--metrics"]).unwrap();
        assert!(cli.metrics);
        assert!(matches!(cli.command, Commands::Simulate { .. }));
    }
}
