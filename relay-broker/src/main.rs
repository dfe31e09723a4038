//! topic-relay-broker binary entry point.
//!
//! Usage:
//! ```bash
//! topic-relay-broker --config relay.toml
//! ```
//!
//! The transport layer is wired in by the embedding server; this binary
//! starts the broker core and keeps it alive until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use topic_relay_broker::config::Config;
use topic_relay_broker::error::Result;
use topic_relay_broker::server::Broker;
use topic_relay_broker::store::MemoryStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = get_config_path();
    let config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        tracing::info!(path = %config_path.display(), "config file not found, using defaults");
        Config::default()
    };

    let store = Arc::new(MemoryStore::new());
    let broker = Arc::new(Broker::new(config, store));
    let notification_task = broker.spawn_notification_task();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        broker_enabled = broker.config().broker.enabled,
        "topic-relay-broker started"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    notification_task.abort();

    Ok(())
}

fn get_config_path() -> PathBuf {
    std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("relay.toml"))
}
