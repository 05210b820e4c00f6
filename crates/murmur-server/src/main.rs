//! Murmur Server - WebSocket chat relay
//!
//! Accepts WebSocket connections, assigns each a numeric id and relays JSON
//! chat messages between them through a single relay hub task.

use anyhow::Result;
use clap::Parser;
use murmur_relay::RelayHub;
use tracing::info;

mod config;
mod server;
mod shutdown;
mod telemetry;

use config::{Cli, ServerConfig};
use shutdown::GracefulShutdown;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init()?;

    info!("Murmur Server starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env()?.with_cli(&cli);
    config.log_config();

    let shutdown = GracefulShutdown::new(config.drain_timeout);
    let (relay, hub) = murmur_relay::spawn(RelayHub::new(config.relay()), shutdown.token());

    let signals = shutdown.clone();
    tokio::spawn(async move {
        signals.wait_for_signal().await;
    });

    let served = server::start(&config, relay, shutdown.token()).await;

    // Also reached on bind failure, before any signal.
    shutdown.trigger();
    shutdown.drain(hub).await;
    telemetry::shutdown();

    served
}
