//! Threshold detectors over aggregated traffic statistics.

use serde::{Serialize, Serializer};
use std::fmt;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::model::Severity;
use crate::patterns::AttackCategory;
use crate::stats::{top_n, TrafficStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnomalyKind {
    Pattern(AttackCategory),
    PotentialDdos,
    BotSpike,
    HighErrorRate,
}

impl AnomalyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnomalyKind::Pattern(c) => c.as_str(),
            AnomalyKind::PotentialDdos => "potential_ddos",
            AnomalyKind::BotSpike => "bot_spike",
            AnomalyKind::HighErrorRate => "high_error_rate",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl Serialize for AnomalyKind {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.serialize_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressCount {
    pub ip: String,
    pub requests: u64,
}

impl fmt::Display for AddressCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}: {} requests", self.ip, self.requests) }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<AddressCount>,
}

/// Unrounded `part / whole * 100`; zero for an empty whole.
pub fn ratio_percent(part: u64, whole: u64) -> f64 {
    if whole == 0 { return 0.0; }
    part as f64 / whole as f64 * 100.0
}

/// [`ratio_percent`] rounded to two decimals, for reporting.
pub fn percent(part: u64, whole: u64) -> f64 { round2(ratio_percent(part, whole)) }

pub fn round2(v: f64) -> f64 { (v * 100.0).round() / 100.0 }

/// Whole values keep one decimal (`31.0`), others print as-is (`66.67`).
pub fn format_percent(v: f64) -> String {
    if v.fract() == 0.0 { format!("{v:.1}") } else { format!("{v}") }
}

pub fn pattern_anomalies(stats: &TrafficStats) -> Vec<Anomaly> {
    let total = stats.total_requests;
    AttackCategory::ALL
        .iter()
        .filter_map(|&cat| {
            let count = stats.pattern_count(cat);
            (count > 0).then(|| Anomaly {
                kind: AnomalyKind::Pattern(cat),
                severity: cat.severity(),
                count,
                percentage: Some(percent(count, total)),
                description: format!("Detected {} {} attempts", count, cat.label()),
                details: Vec::new(),
            })
        })
        .collect()
}

/// Busiest addresses whose volume is strictly above `ddos_multiplier` times the mean.
pub fn ddos_anomaly(stats: &TrafficStats, cfg: &AnalysisConfig) -> Option<Anomaly> {
    let distinct = stats.ip_stats.len().max(1) as f64;
    let average = stats.total_requests as f64 / distinct;
    let limit = average * cfg.ddos_multiplier;
    let flagged: Vec<AddressCount> = top_n(&stats.ip_stats, cfg.ddos_candidates)
        .into_iter()
        .filter(|(_, count)| *count as f64 > limit)
        .map(|(ip, requests)| AddressCount { ip, requests })
        .collect();
    if flagged.is_empty() { return None; }
    debug!(target: "traffic_analyzer", flagged = flagged.len(), average, "volumetric outliers");
    Some(Anomaly {
        kind: AnomalyKind::PotentialDdos,
        severity: Severity::Critical,
        count: flagged.len() as u64,
        percentage: None,
        description: format!("Potential DDoS: {} IPs with abnormally high request rates", flagged.len()),
        details: flagged.into_iter().take(cfg.ddos_details).collect(),
    })
}

pub fn bot_spike_anomaly(stats: &TrafficStats, cfg: &AnalysisConfig) -> Option<Anomaly> {
    let bots = stats.user_agent_stats.bot;
    let raw = ratio_percent(bots, stats.total_requests);
    let pct = round2(raw);
    (raw > cfg.bot_spike_percent).then(|| Anomaly {
        kind: AnomalyKind::BotSpike,
        severity: Severity::Medium,
        count: bots,
        percentage: Some(pct),
        description: format!("High bot traffic: {}% of requests", format_percent(pct)),
        details: Vec::new(),
    })
}

pub fn error_rate_anomaly(stats: &TrafficStats, cfg: &AnalysisConfig) -> Option<Anomaly> {
    let errors = stats.error_count();
    let raw = ratio_percent(errors, stats.total_requests);
    let pct = round2(raw);
    (raw > cfg.error_rate_percent).then(|| Anomaly {
        kind: AnomalyKind::HighErrorRate,
        severity: Severity::Medium,
        count: errors,
        percentage: Some(pct),
        description: format!("High error rate: {}% of requests returning 4xx/5xx", format_percent(pct)),
        details: Vec::new(),
    })
}

/// All detectors, in detection order.
pub fn detect(stats: &TrafficStats, cfg: &AnalysisConfig) -> Vec<Anomaly> {
    let mut out = pattern_anomalies(stats);
    out.extend(ddos_anomaly(stats, cfg));
    out.extend(bot_spike_anomaly(stats, cfg));
    out.extend(error_rate_anomaly(stats, cfg));
    out
}

/// Presentation order: CRITICAL, HIGH, MEDIUM; detection order within a severity.
pub fn by_severity(anomalies: &[Anomaly]) -> Vec<&Anomaly> {
    let mut sorted: Vec<&Anomaly> = anomalies.iter().collect();
    sorted.sort_by(|a, b| b.severity.cmp(&a.severity));
    sorted
}
