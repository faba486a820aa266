//! my-copilot-gate entry point
//!
//! Reads configuration, installs logging, picks the authentication strategy
//! and serves the gated router until Ctrl-C.

mod cli;
mod logging;
mod routes;

use anyhow::Context;
use clap::Parser;
use my_copilot_auth::gate::GateConfig;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(cli.log_format, &cli.log_level)?;

    let strategy = cli
        .strategy()
        .context("invalid authentication configuration")?;

    info!(
        mode = %cli.mode,
        strategy = strategy.name(),
        bind = %cli.bind,
        "Starting my-copilot gate"
    );

    let app = routes::router(strategy, GateConfig::default());
    let listener = TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
