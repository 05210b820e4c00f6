//! Roster broadcasting.
//!
//! Every membership or naming change pushes the full roster to every live
//! connection: one serialization, then one send per connection. There is no
//! batching or debouncing, so cost is linear in the number of connections.

use tracing::{debug, error};

use crate::outbox::{Outbox, SendResult};
use crate::protocol::{Outbound, ServerMessage};
use crate::registry::Registry;

/// Build the roster message for the registry's current contents.
pub fn snapshot<H>(registry: &Registry<H>) -> ServerMessage {
    ServerMessage::Roster {
        users: registry.snapshot_names(),
    }
}

/// Serialize the current roster and send it to every live connection.
///
/// Returns the number of connections the frame was queued for.
pub fn broadcast<H: Outbox>(registry: &Registry<H>) -> usize {
    let frame = match Outbound::from(snapshot(registry)).encode() {
        Ok(frame) => frame,
        Err(e) => {
            error!(error = %e, "Failed to encode roster");
            return 0;
        }
    };

    let mut sent = 0;
    registry.for_each(|connection| {
        if connection.handle().send(&frame) == SendResult::Sent {
            sent += 1;
        }
    });
    debug!(recipients = registry.len(), sent, "Roster broadcast");
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ConnectionId;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    #[test]
    fn test_snapshot_includes_unnamed_placeholders() {
        let mut registry: Registry<()> = Registry::new();
        registry.insert(ConnectionId::new(1), ());
        registry.insert(ConnectionId::new(2), ());
        registry.set_name(ConnectionId::new(2), "bob".to_string()).unwrap();

        assert_eq!(
            snapshot(&registry),
            ServerMessage::Roster {
                users: vec![None, Some("bob".to_string())]
            }
        );
    }

    #[test]
    fn test_broadcast_reaches_every_connection() {
        let mut registry = Registry::new();
        let (tx1, mut rx1) = mpsc::channel::<String>(4);
        let (tx2, mut rx2) = mpsc::channel::<String>(4);
        registry.insert(ConnectionId::new(1), tx1);
        registry.insert(ConnectionId::new(2), tx2);
        registry.set_name(ConnectionId::new(1), "alice".to_string()).unwrap();

        assert_eq!(broadcast(&registry), 2);

        for rx in [&mut rx1, &mut rx2] {
            let frame: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
            assert_eq!(frame, json!({"type":"userlist","users":["alice",null]}));
        }
    }

    #[test]
    fn test_broadcast_skips_closed_connections() {
        let mut registry = Registry::new();
        let (tx1, rx1) = mpsc::channel::<String>(4);
        let (tx2, mut rx2) = mpsc::channel::<String>(4);
        registry.insert(ConnectionId::new(1), tx1);
        registry.insert(ConnectionId::new(2), tx2);
        drop(rx1);

        assert_eq!(broadcast(&registry), 1);
        assert!(rx2.try_recv().is_ok());
    }
}
