//! Plain-text banner reports.

use itertools::Itertools;

use crate::analysis::AnalysisResult;
use crate::anomaly::format_percent;
use crate::simulation::SimulationResult;

const WIDTH: usize = 80;

#[derive(Default)]
struct Lines(Vec<String>);

impl Lines {
    fn push(&mut self, line: impl Into<String>) { self.0.push(line.into()); }

    fn banner(&mut self, title: &str) {
        self.push("=".repeat(WIDTH));
        self.push(title);
        self.push("=".repeat(WIDTH));
        self.push("");
    }

    fn section(&mut self, title: &str) {
        self.push(title);
        self.push("-".repeat(WIDTH));
    }

    fn close(mut self) -> String {
        self.push("=".repeat(WIDTH));
        self.0.join("\n")
    }
}

pub fn render_analysis(result: &AnalysisResult, top_addresses: usize) -> String {
    let stats = &result.stats;
    let mut out = Lines::default();
    out.banner("EDGESEC TRAFFIC ANALYSIS REPORT");

    out.section("SUMMARY");
    out.push(format!("Total Requests: {}", stats.total_requests));
    out.push(format!("Unique IPs: {}", stats.ip_stats.len()));
    out.push(format!("Unique Paths: {}", stats.path_stats.len()));
    out.push(format!("Time Window: {:.0} seconds", stats.duration_seconds()));
    out.push("");

    if !result.anomalies.is_empty() {
        out.section("DETECTED ANOMALIES");
        for anomaly in result.anomalies_by_severity() {
            out.push(format!("[{}] {}", anomaly.severity, anomaly.description));
            for detail in &anomaly.details {
                out.push(format!("  - {detail}"));
            }
        }
        out.push("");
    }

    if !result.recommendations.is_empty() {
        out.section("RECOMMENDATIONS");
        for rec in &result.recommendations {
            out.push(format!("[{}] {}", rec.priority, rec.description));
            out.push(format!("  Action: {}", rec.action));
            out.push(format!("  Rule Type: {}", rec.rule_type));
            if let Some(params) = &rec.params {
                out.push(format!("  Parameters: {}", params.iter().map(|(k, v)| format!("{k}={v}")).join(", ")));
            }
        }
        out.push("");
    }

    out.section(&format!("TOP {top_addresses} IPS BY REQUEST COUNT"));
    for (ip, count) in stats.top_addresses(top_addresses) {
        out.push(format!("{ip}: {count} requests"));
    }
    out.push("");
    out.close()
}

pub fn render_simulation(result: &SimulationResult) -> String {
    let mut out = Lines::default();
    out.banner("WAF RULE SIMULATION REPORT");

    out.section("RULE DETAILS");
    out.push(format!("Expression: {}", result.rule.expression));
    out.push(format!("Action: {}", result.rule.action));
    out.push(format!("Description: {}", result.rule.description));
    out.push("");

    out.section("SIMULATION RESULTS");
    out.push(format!("Total Requests Analyzed: {}", result.total_requests));
    out.push(format!("Matched Requests: {} ({}%)", result.matched, format_percent(result.match_rate)));
    out.push(format!("Would Block: {}", result.would_block));
    out.push(format!("Would Challenge: {}", result.would_challenge));
    out.push(format!("Would Log: {}", result.would_log));
    out.push("");

    out.section("FALSE POSITIVE ANALYSIS");
    out.push(format!("Potential False Positives: {}", result.false_positive_count));
    out.push(format!("Estimated FP Rate: {}%", format_percent(result.false_positive_rate_estimate)));
    out.push("");
    if result.high_false_positive_risk {
        out.push("WARNING: High false positive rate detected!");
        out.push("Consider refining the rule expression before deployment.");
    } else {
        out.push("False positive rate is acceptable");
    }
    out.push("");
    out.close()
}
