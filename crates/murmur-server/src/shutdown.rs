//! Graceful shutdown coordinator.
//!
//! - `SIGINT` / `SIGTERM` → stop accepting, stop the relay hub, exit
//!
//! The HTTP listener and the relay hub share one `CancellationToken`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Signal indicating why shutdown was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Ctrl-C from the terminal
    Interrupt,
    /// SIGTERM from a supervisor
    Terminate,
    /// Cancelled programmatically
    Requested,
}

/// Coordinator for graceful shutdown.
#[derive(Debug, Clone)]
pub struct GracefulShutdown {
    token: CancellationToken,
    drain_timeout: Duration,
}

impl GracefulShutdown {
    /// Create a new shutdown coordinator.
    pub fn new(drain_timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            drain_timeout,
        }
    }

    /// Token cancelled once shutdown begins.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger shutdown programmatically.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Wait for SIGINT, SIGTERM or a programmatic trigger, then cancel the
    /// shared token.
    pub async fn wait_for_signal(&self) -> ShutdownSignal {
        let signal = tokio::select! {
            _ = interrupt() => {
                info!("Received SIGINT, initiating graceful shutdown");
                ShutdownSignal::Interrupt
            }
            _ = terminate() => {
                info!("Received SIGTERM, initiating graceful shutdown");
                ShutdownSignal::Terminate
            }
            _ = self.token.cancelled() => ShutdownSignal::Requested,
        };
        self.token.cancel();
        signal
    }

    /// Wait for the relay hub task to finish, up to the drain timeout.
    ///
    /// Returns `true` if the hub stopped in time.
    pub async fn drain(&self, hub: JoinHandle<()>) -> bool {
        info!(
            timeout_secs = self.drain_timeout.as_secs(),
            "Waiting for relay hub to stop"
        );
        match tokio::time::timeout(self.drain_timeout, hub).await {
            Ok(Ok(())) => {
                info!("Relay hub stopped cleanly");
                true
            }
            Ok(Err(e)) => {
                error!(error = %e, "Relay hub task failed");
                false
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.drain_timeout.as_secs(),
                    "Drain timeout expired, exiting anyway"
                );
                false
            }
        }
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for SIGINT");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to register SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
