//! Multi-room chat node.
//!
//! Run several nodes against the same Redis (`--features redis`) and a
//! message sent in a room on one node reaches that room on all of them.
//!
//! Environment:
//! - `CHAT_BIND` — listen address (default `0.0.0.0:8080`)
//! - `CHAT_BROKER_HOST`, `CHAT_BROKER_PORT`, `CHAT_PREFIX` — relay options
//! - `RUST_LOG` — log filter (default `info`)

use std::collections::HashMap;

use roomcast::prelude::*;
use tracing_subscriber::EnvFilter;

/// Maps `CHAT_*` environment variables onto relay option keys.
fn relay_options() -> HashMap<String, String> {
    [
        ("CHAT_BROKER_HOST", "host"),
        ("CHAT_BROKER_PORT", "port"),
        ("CHAT_PREFIX", "prefix"),
    ]
    .into_iter()
    .filter_map(|(var, key)| std::env::var(var).ok().map(|v| (key.to_string(), v)))
    .collect()
}

#[cfg(feature = "redis")]
async fn broker(config: &RelayConfig) -> Result<RedisBroker, RoomcastError> {
    tracing::info!(url = %config.broker_url(), "connecting to redis");
    Ok(RedisBroker::connect(&config.broker_url()).await?)
}

#[cfg(not(feature = "redis"))]
async fn broker(_config: &RelayConfig) -> Result<MemoryBroker, RoomcastError> {
    tracing::warn!("built without redis; rooms are not shared with other nodes");
    Ok(MemoryBroker::new())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bind = std::env::var("CHAT_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let config = RelayConfig::from_options(&relay_options());
    tracing::info!(%bind, namespace = %config.channel_namespace, "starting chat node");

    let server = RoomcastServer::builder()
        .bind(&bind)
        .relay_config(config.clone())
        .build(broker(&config).await?)
        .await?;

    server.run().await?;
    Ok(())
}
