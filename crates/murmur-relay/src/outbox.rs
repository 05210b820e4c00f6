//! Outbound send seam between the relay core and the transport layer.
//!
//! The hub never awaits a send. Each connection's handle only has to accept
//! a serialized frame and report, without blocking, what became of it.

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Result of attempting to hand a frame to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendResult {
    /// Frame was queued for delivery
    Sent,
    /// The connection's queue is full (slow client), frame dropped
    ChannelFull,
    /// The connection's queue is closed, transport close is pending
    ChannelClosed,
}

/// Transport-owned send primitive for one connection.
pub trait Outbox: Send + 'static {
    /// Queue a serialized frame for delivery. Must not block.
    fn send(&self, frame: &str) -> SendResult;
}

impl Outbox for mpsc::Sender<String> {
    fn send(&self, frame: &str) -> SendResult {
        match self.try_send(frame.to_owned()) {
            Ok(()) => SendResult::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Outbound queue full, dropping frame");
                SendResult::ChannelFull
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Outbound queue closed, connection may have dropped");
                SendResult::ChannelClosed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_send() {
        let (tx, mut rx) = mpsc::channel::<String>(4);
        assert_eq!(Outbox::send(&tx, "hello"), SendResult::Sent);
        assert_eq!(rx.try_recv().unwrap(), "hello");
    }

    #[test]
    fn test_bounded_full() {
        let (tx, _rx) = mpsc::channel::<String>(1);
        assert_eq!(Outbox::send(&tx, "one"), SendResult::Sent);
        assert_eq!(Outbox::send(&tx, "two"), SendResult::ChannelFull);
    }

    #[test]
    fn test_bounded_closed() {
        let (tx, rx) = mpsc::channel::<String>(1);
        drop(rx);
        assert_eq!(Outbox::send(&tx, "lost"), SendResult::ChannelClosed);
    }
}
