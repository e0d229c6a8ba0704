//! Modem Bridge - OpenWRT cellular router → MQTT
//!
//! Configuration comes from the environment (or a `.env` file), see
//! `config.rs` for the variable list.

use anyhow::{Context, Result};
use modem_bridge::{Bridge, BridgeConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("📡 Modem bridge starting...");

    let config = BridgeConfig::from_env().context("Invalid configuration")?;
    info!(
        router = config.router.base_url(),
        publish_topic = %config.publish_topic,
        heartbeat_topic = %config.heartbeat_topic,
        interval_secs = config.poll_interval.as_secs(),
        "configuration loaded"
    );

    let bridge = Bridge::new(config).context("Failed to create router client")?;
    bridge
        .run(shutdown_signal())
        .await
        .context("Bridge execution failed")?;

    info!("Modem bridge stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
