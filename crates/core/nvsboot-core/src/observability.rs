//! Logging setup.
//!
//! All nvsboot crates log through `tracing`. Binaries call [`init_logging`]
//! once at startup; `RUST_LOG` takes precedence over the configured level.

use crate::{NvsbootError, NvsbootResult};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human readable output
    #[default]
    Pretty,
    /// Single-line human readable output
    Compact,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `nvsboot_storage=debug`
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,

    /// Include the event target in each line
    #[serde(default = "default_true")]
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            with_target: true,
        }
    }
}

impl LogConfig {
    /// Build the filter, preferring `RUST_LOG` when it is set
    pub fn env_filter(&self) -> NvsbootResult<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level).map_err(|e| {
                NvsbootError::config(format!("invalid log level '{}': {e}", self.level))
            }),
        }
    }
}

/// Install the global `tracing` subscriber
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> NvsbootResult<()> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let installed = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| NvsbootError::internal(format!("failed to install logger: {e}")))
}

/// Install a test-friendly subscriber, ignoring repeated calls
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
