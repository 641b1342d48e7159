//! # Validator Worker
//!
//! Consumes validation job messages from the spool-directory queue until
//! interrupted. An optional first argument names a config file; otherwise
//! `config/worker.*` and the environment are used.

use anyhow::Context;
use tokio::signal;
use tracing::info;
use validator_worker::config::ConfigLoader;
use validator_worker::logging::init_structured_logging;
use validator_worker::worker::bootstrap_worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let mut loader = ConfigLoader::new();
    if let Some(path) = std::env::args().nth(1) {
        loader = loader.with_config_file(path);
    }
    let config = loader.load().context("loading worker configuration")?;
    info!(config = %config.sanitized(), "Starting validator worker");

    let runtime = bootstrap_worker(config)
        .await
        .context("bootstrapping worker")?;

    runtime
        .run_until(signal::ctrl_c())
        .await
        .context("listening for shutdown signal")?;

    info!("Validator worker stopped");
    Ok(())
}
