//! # Hydrabase Node
//!
//! Entry point of a Hydrabase node.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`HB_LOG_LEVEL`, `HB_LOG_JSON`)
//! 2. Load configuration from `HB_*` variables
//! 3. Start the node runtime and bootstrap peers
//! 4. Run until Ctrl+C, then close every session

use anyhow::{Context, Result};
use hb_telemetry::{init_logging, LoggingConfig};
use node_runtime::{NodeConfig, NodeRuntime};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let logging = LoggingConfig::from_env().with_service_name("hydrabase-node");
    init_logging(&logging).context("Failed to initialize logging")?;

    let config = NodeConfig::from_env().context("Invalid configuration")?;
    info!(
        port = config.port,
        hostname = %config.hostname,
        bootstrap = config.bootstrap_peers.len(),
        "Starting Hydrabase node v{}",
        env!("CARGO_PKG_VERSION")
    );

    let runtime = NodeRuntime::start(config).await?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
