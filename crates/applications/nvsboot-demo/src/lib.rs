//! Boot-time read list demo
//!
//! Replays three request lists against a partition: one that fails
//! validation, one whose records fail individually, and one where every
//! record is found. Each list is logged before the read and evaluated after
//! it.

#![warn(missing_docs)]

use nvsboot_core::config::ConfigLoader;
use nvsboot_core::{LogConfig, NvsbootResult};
use nvsboot_storage::{
    log_read_list, summarize, BatchReader, ImageManifest, ItemType, ListPhase, MemoryFlash,
    PartitionRegistry, ReadRequest, ReaderConfig,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Partition manifest used when no partition is configured
pub const DEMO_MANIFEST: &str = include_str!("../demo/nvs_data.toml");

/// Size of the bundled partition in pages
pub const DEMO_PAGES: usize = 3;

/// Environment prefix for configuration overrides
pub const ENV_PREFIX: &str = "NVSBOOT";

/// Room for ten characters and the terminator
const STR_BUF_LEN: usize = 10 + 1;

/// Demo configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Partition the lists are read from
    #[serde(default = "default_label")]
    pub label: String,

    /// Print a JSON summary of each list to stdout
    #[serde(default)]
    pub json_summary: bool,

    /// Logging setup
    #[serde(default)]
    pub log: LogConfig,

    /// Partitions to open
    #[serde(default)]
    pub reader: ReaderConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            json_summary: false,
            log: LogConfig::default(),
            reader: ReaderConfig::default(),
        }
    }
}

fn default_label() -> String {
    "nvs".to_string()
}

impl DemoConfig {
    /// Load from an optional file with the environment on top
    pub fn load(path: Option<&Path>) -> NvsbootResult<Self> {
        let mut loader = ConfigLoader::new();
        if let Some(path) = path {
            loader = loader.with_file(path)?;
        }
        loader.with_env_prefix(ENV_PREFIX).load()
    }
}

/// Open the configured partitions, or the bundled one when none are listed
pub async fn build_registry(config: &DemoConfig) -> anyhow::Result<PartitionRegistry> {
    let registry = PartitionRegistry::from_config(&config.reader).await?;
    if registry.is_empty() {
        let image = ImageManifest::from_toml_str(DEMO_MANIFEST)?
            .into_builder(DEMO_PAGES)?
            .build()?;
        registry.register(config.label.clone(), MemoryFlash::new(image))?;
        tracing::info!(
            partition = %config.label,
            pages = DEMO_PAGES,
            "using bundled demo partition"
        );
    }
    Ok(registry)
}

/// How a list ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ListOutcome {
    /// The batch was accepted; `found` records resolved
    Completed {
        /// Records with an OK status
        found: usize,
    },
    /// The batch failed validation
    Rejected,
    /// The partition could not be read
    Failed {
        /// Error text
        error: String,
    },
}

/// Log a list, read it, and report the outcome
pub fn log_request_read_evaluate(
    reader: &BatchReader,
    label: &str,
    requests: &mut [ReadRequest<'_>],
    json_summary: bool,
) -> ListOutcome {
    log_read_list(ListPhase::Request, requests);

    let outcome = match reader.read(label, requests) {
        Ok(()) => {
            tracing::info!("data read from partition");
            log_read_list(ListPhase::Completed, requests);
            ListOutcome::Completed {
                found: requests.iter().filter(|r| r.is_ok()).count(),
            }
        }
        Err(e) if e.is_invalid_argument() => {
            tracing::error!(error = %e, "invalid arguments passed to the read");
            log_read_list(ListPhase::Rejected, requests);
            ListOutcome::Rejected
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to read partition");
            return ListOutcome::Failed { error: e.to_string() };
        }
    };

    if json_summary {
        match serde_json::to_string_pretty(&summarize(requests)) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!(error = %e, "could not render summary"),
        }
    }
    outcome
}

/// Run the three demo lists against `label`
pub fn run_demo(reader: &BatchReader, label: &str, json_summary: bool) -> Vec<ListOutcome> {
    let mut outcomes = Vec::with_capacity(3);
    let mut str_buf = [0u8; STR_BUF_LEN];

    // Validation errors: the whole batch is rejected
    {
        let mut requests = [
            // Valid; stays NOT_FOUND because nothing is looked up
            ReadRequest::new("sunny_day", "u8", ItemType::U8),
            ReadRequest::new("too_long_sunny_day", "u8", ItemType::I8),
            ReadRequest::new("sunny_day", "too_long_dark_key", ItemType::I32),
            ReadRequest::new("clowny_day", "blobeee", ItemType::Blob),
            ReadRequest::string("sunny_day", "string_10_chars", Some(&mut str_buf[..0])),
            ReadRequest::string("sunny_day", "string_10_chars", None),
        ];
        outcomes.push(log_request_read_evaluate(reader, label, &mut requests, json_summary));
    }

    // Runtime errors: accepted, but records fail one by one
    {
        let mut requests = [
            ReadRequest::new("sunny_day", "u8", ItemType::I8),
            ReadRequest::new("sunny_day", "i32_", ItemType::I32),
            ReadRequest::new("clowny_day", "i8", ItemType::I8),
            ReadRequest::string("sunny_day", "string_10_chars", Some(&mut str_buf[..2])),
            ReadRequest::new("sunny_day", "u32", ItemType::U32),
            // Repeated lookups are not served twice
            ReadRequest::new("sunny_day", "u32", ItemType::U32),
        ];
        outcomes.push(log_request_read_evaluate(reader, label, &mut requests, json_summary));
    }

    // Everything found, namespaces and types mixed
    {
        let mut requests = [
            ReadRequest::new("sunny_day", "u8", ItemType::U8),
            ReadRequest::new("sunny_day", "i32", ItemType::I32),
            ReadRequest::new("cloudy_day", "i8", ItemType::I8),
            ReadRequest::new("sunny_day", "u16", ItemType::U16),
            ReadRequest::string("sunny_day", "string_10_chars", Some(&mut str_buf[..])),
        ];
        outcomes.push(log_request_read_evaluate(reader, label, &mut requests, json_summary));
    }

    outcomes
}
