//! Tracing subscriber setup.
//!
//! `RUST_LOG` selects the filter, defaulting to `info`. JSON output is meant
//! for containers; the compact formatter for development.

use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_tracing(json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .map_err(|e| anyhow!("invalid log filter: {e}"))?;

    if json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_ansi(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;
    }

    tracing::info!(json, "Tracing initialized");
    Ok(())
}
