//! nvsboot demo binary
//!
//! Usage: `nvsboot-demo [config.toml]`

use nvsboot_core::init_logging;
use nvsboot_demo::{build_registry, run_demo, DemoConfig, ListOutcome};
use nvsboot_storage::BatchReader;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = DemoConfig::load(config_path.as_deref())?;
    init_logging(&config.log)?;

    tracing::info!(
        version = nvsboot_core::VERSION,
        partition = %config.label,
        "before reading from partition"
    );

    let registry = build_registry(&config).await?;
    let reader = BatchReader::new(registry);
    let outcomes = run_demo(&reader, &config.label, config.json_summary);

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, ListOutcome::Failed { .. }))
        .count();
    tracing::info!(lists = outcomes.len(), failed, "finished");

    if failed > 0 {
        anyhow::bail!("{failed} read list(s) could not be read");
    }
    Ok(())
}
