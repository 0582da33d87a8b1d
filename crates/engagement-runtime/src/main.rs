//! Engagement feed service binary.

use anyhow::{Context, Result};
use engagement_runtime::{init_tracing, AppContext, EngagementConfig, LocalDelivery};
use tracing::{error, info};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = EngagementConfig::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_json)?;

    info!("===========================================");
    info!("  Engagement Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("  Environment: {}", config.environment);
    info!("===========================================");

    let ctx = AppContext::build(config).await?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let delivery = if ctx.config.local_delivery {
        let handle =
            LocalDelivery::new(&ctx.bus, ctx.topic_router.clone()).spawn(shutdown_rx);
        info!("Local delivery started");
        Some(handle)
    } else {
        None
    };

    let gateway = ctx.gateway()?;
    info!(addr = %ctx.config.gateway.http_addr(), "Service is running. Press Ctrl+C to stop.");
    let served = gateway
        .run(shutdown_signal())
        .await
        .context("API gateway failed");

    shutdown_tx.send_replace(true);
    if let Some(handle) = delivery {
        if let Err(e) = handle.await {
            error!("Local delivery task failed: {}", e);
        }
    }

    info!(
        published = ctx.dispatcher.published_count(),
        "Shutdown complete"
    );
    served
}
