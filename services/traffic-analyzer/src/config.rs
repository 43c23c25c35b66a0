use serde::{Deserialize, Serialize};

/// Tunables for both engines. Defaults are the stock detection thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub analysis: AnalysisConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Flag an address whose count exceeds this multiple of the per-address mean.
    pub ddos_multiplier: f64,
    /// How many of the busiest addresses are considered for DDoS flagging.
    pub ddos_candidates: usize,
    /// Flagged addresses carried in the anomaly detail.
    pub ddos_details: usize,
    pub bot_spike_percent: f64,
    pub error_rate_percent: f64,
    pub top_addresses: usize,
    /// Corpora at least this large are reduced on the rayon pool.
    pub parallel_min_entries: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ddos_multiplier: 5.0,
            ddos_candidates: 10,
            ddos_details: 5,
            bot_spike_percent: 30.0,
            error_rate_percent: 20.0,
            top_addresses: 10,
            parallel_min_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Upper bound on retained matched-request summaries and false-positive candidates.
    pub sample_cap: usize,
    pub fp_warning_percent: f64,
    pub parallel_min_entries: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self { Self { sample_cap: 500, fp_warning_percent: 10.0, parallel_min_entries: 10_000 } }
}
