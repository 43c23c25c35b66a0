//! Prometheus counters for analysis and simulation runs.

use once_cell::sync::OnceCell;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct EdgesecMetrics {
    registry: Registry,
    pub entries_analyzed: IntCounter,
    pub anomalies: IntCounterVec,
    pub simulations: IntCounter,
    pub rule_matches: IntCounterVec,
}

static METRICS: OnceCell<EdgesecMetrics> = OnceCell::new();

/// Register and return the process-wide metric group (idempotent).
pub fn register_metrics() -> Result<&'static EdgesecMetrics, prometheus::Error> {
    METRICS.get_or_try_init(|| {
        let registry = Registry::new();
        let entries_analyzed = IntCounter::new("edgesec_entries_analyzed_total", "Log entries reduced by the traffic analyzer")?;
        let anomalies = IntCounterVec::new(Opts::new("edgesec_anomalies_total", "Anomalies emitted by kind"), &["kind"])?;
        let simulations = IntCounter::new("edgesec_simulations_total", "Rule simulations executed")?;
        let rule_matches = IntCounterVec::new(Opts::new("edgesec_rule_matches_total", "Simulated rule matches by action bucket"), &["bucket"])?;
        registry.register(Box::new(entries_analyzed.clone()))?;
        registry.register(Box::new(anomalies.clone()))?;
        registry.register(Box::new(simulations.clone()))?;
        registry.register(Box::new(rule_matches.clone()))?;
        Ok(EdgesecMetrics { registry, entries_analyzed, anomalies, simulations, rule_matches })
    })
}

/// Text exposition of everything registered so far.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let Some(m) = METRICS.get() else { return Ok(String::new()) };
    let mut buf = Vec::new();
    TextEncoder::new().encode(&m.registry.gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        let m = register_metrics().unwrap();
        m.entries_analyzed.inc_by(3);
        m.anomalies.with_label_values(&["bot_spike"]).inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("edgesec_entries_analyzed_total"));
        assert!(text.contains("kind=\"bot_spike\""));
    }
}
