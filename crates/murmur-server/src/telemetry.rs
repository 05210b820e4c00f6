//! Logging setup for the relay server.
//!
//! Relay metrics are recorded through the OpenTelemetry global meter in
//! `murmur_relay::metrics`; with no meter provider installed they cost
//! nothing.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info,murmur_server=debug,murmur_relay=debug";

/// Install the global tracing subscriber.
///
/// # Configuration
///
/// Environment variables:
/// - `RUST_LOG`: Log filter (default: [`DEFAULT_FILTER`])
pub fn init() -> anyhow::Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter())
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("Telemetry initialized");

    Ok(())
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Flush and tear down telemetry before exit.
pub fn shutdown() {
    tracing::info!("Telemetry shutdown complete");
}
