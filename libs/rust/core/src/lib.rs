//! Core shared utilities for EdgeSec tools.

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter, Layer};

pub mod config;
pub mod metrics;

pub use crate::config::{load_config, ConfigError, CONFIG_ENV_PREFIX, CONFIG_FILE_ENV};
pub use crate::metrics::{encode_metrics, register_metrics, EdgesecMetrics};

static TRACING_INIT: OnceCell<()> = OnceCell::new();

fn json_logging_requested() -> bool {
    std::env::var("EDGESEC_JSON_LOG")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Installs the global subscriber once. Output goes to stderr so reports on
/// stdout stay machine-readable.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let fmt_layer = if json_logging_requested() {
            tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .boxed()
        };
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init()?;
        Ok(())
    })?;
    info!(target: "edgesec", service, "tracing initialized");
    Ok(())
}
