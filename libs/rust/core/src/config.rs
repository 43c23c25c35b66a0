//! Layered configuration: struct defaults, then an optional file, then
//! `EDGESEC__SECTION__KEY` environment variables.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const CONFIG_ENV_PREFIX: &str = "EDGESEC";
pub const CONFIG_FILE_ENV: &str = "EDGESEC_CONFIG_FILE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    MissingFile(PathBuf),
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Loads `T` for `service`. An explicit `file` must exist; a file named by
/// `EDGESEC_CONFIG_FILE` is optional. Fields absent from every source fall back
/// to `T`'s serde defaults.
pub fn load_config<T: DeserializeOwned>(service: &str, file: Option<&Path>) -> Result<T, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = file {
        if !path.exists() {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }
        builder = builder.add_source(config::File::from(path).required(true));
    } else if let Ok(env_file) = std::env::var(CONFIG_FILE_ENV) {
        builder = builder.add_source(config::File::with_name(&env_file).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(CONFIG_ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );
    let cfg = builder.build()?;
    debug!(target: "edgesec", service, "configuration sources merged");
    Ok(cfg.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize, Default)]
    #[serde(default)]
    struct Sample {
        limits: Limits,
    }

    #[derive(Debug, Deserialize)]
    #[serde(default)]
    struct Limits {
        multiplier: f64,
        cap: usize,
    }

    impl Default for Limits {
        fn default() -> Self { Self { multiplier: 5.0, cap: 500 } }
    }

    #[test]
    fn file_overrides_defaults() {
        let mut f = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(f, "limits:\n  cap: 42").unwrap();
        let cfg: Sample = load_config("test", Some(f.path())).unwrap();
        assert_eq!(cfg.limits.cap, 42);
        assert_eq!(cfg.limits.multiplier, 5.0);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let res: Result<Sample, _> = load_config("test", Some(Path::new("/nonexistent/edgesec.yaml")));
        assert!(matches!(res, Err(ConfigError::MissingFile(_))));
    }
}
