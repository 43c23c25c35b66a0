use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::anomaly::{by_severity, detect, Anomaly};
use crate::config::AnalysisConfig;
use crate::model::LogEntry;
use crate::patterns::PatternCatalog;
use crate::recommend::{recommend_all, Recommendation};
use crate::stats::{aggregate, TrafficAccumulator, TrafficStats};

/// Statistics, anomalies in detection order, and one recommendation per
/// actionable anomaly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    #[serde(flatten)]
    pub stats: TrafficStats,
    pub anomalies: Vec<Anomaly>,
    pub recommendations: Vec<Recommendation>,
}

impl AnalysisResult {
    pub fn anomalies_by_severity(&self) -> Vec<&Anomaly> { by_severity(&self.anomalies) }
}

pub fn analyze(entries: &[LogEntry], cfg: &AnalysisConfig) -> AnalysisResult {
    analyze_with(entries, PatternCatalog::builtin(), cfg)
}

pub fn analyze_with(entries: &[LogEntry], catalog: &PatternCatalog, cfg: &AnalysisConfig) -> AnalysisResult {
    let stats = if entries.len() >= cfg.parallel_min_entries.max(1) {
        debug!(target: "traffic_analyzer", entries = entries.len(), threads = rayon::current_num_threads(), "partitioned reduction");
        entries
            .par_iter()
            .enumerate()
            .fold(TrafficAccumulator::new, |mut acc, (i, e)| {
                acc.absorb(i, e, catalog);
                acc
            })
            .reduce(TrafficAccumulator::new, TrafficAccumulator::merge)
            .finish()
    } else {
        aggregate(entries, catalog)
    };
    let anomalies = detect(&stats, cfg);
    let recommendations = recommend_all(&anomalies);
    info!(
        target: "traffic_analyzer",
        total = stats.total_requests,
        addresses = stats.ip_stats.len(),
        anomalies = anomalies.len(),
        recommendations = recommendations.len(),
        "traffic analysis complete"
    );
    AnalysisResult { stats, anomalies, recommendations }
}
