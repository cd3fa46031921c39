//! Emotion recognition server - main entry point
//!
//! Usage: `fer-server [config.toml]`; `FER__*` environment variables
//! override file values.

use anyhow::{anyhow, Context};
use api::{init_logging, run_server, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).or_else(|| std::env::var("FER_CONFIG").ok());
    let config = AppConfig::load(path.as_deref()).context("loading configuration")?;

    init_logging(&config.server.log_level, config.server.json_logs).map_err(|e| anyhow!(e))?;

    info!("=== FER Ensemble Server v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "{}: {} models, mock={}",
        config.ensemble.kind,
        config.ensemble.models.len(),
        config.mock_models
    );

    run_server(config).await.map_err(|e| anyhow!(e.to_string()))?;

    Ok(())
}
