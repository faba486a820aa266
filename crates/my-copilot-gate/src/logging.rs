//! Tracing subscriber setup

use std::io;

use anyhow::Context;
use clap::ValueEnum;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Install the global subscriber, writing to stderr
///
/// `RUST_LOG` takes precedence over `default_filter`.
pub fn init(format: LogFormat, default_filter: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => subscriber
            .with(fmt::layer().with_writer(io::stderr))
            .try_init(),
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
    }
    .context("failed to install tracing subscriber")
}
