//! Connection lifecycle handling.
//!
//! [`RelayHub`] is the only component the transport talks to. It reacts to
//! three transport events per connection:
//!
//! ```text
//!   accepted ──> Active ──(message)──> Active ──(closed)──> Closed
//! ```
//!
//! - accepted: assign an id, register the connection, send it its identity.
//! - message: decode, route, execute the resulting sends, rebroadcast the
//!   roster if routing asked for it.
//! - closed: unregister, rebroadcast the roster to whoever is left.
//!
//! All events are processed one at a time to completion. In a threaded
//! runtime this is achieved by running the hub on a single task fed by an
//! mpsc queue ([`spawn`]); transport tasks only hold a [`RelayHandle`].

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::id::{ConnectionId, IdGenerator};
use crate::metrics;
use crate::outbox::Outbox;
use crate::protocol::{self, Outbound, ServerMessage};
use crate::registry::Registry;
use crate::roster;
use crate::router::{Dispatch, Recipients, Router};
use crate::RelayError;

/// Default capacity of the hub's event queue.
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Relay behaviour settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Also broadcast the roster when a connection is accepted, before it
    /// has a name. Off by default: rosters go out on rename and close only.
    pub announce_on_connect: bool,
    /// Capacity of the hub's event queue
    pub event_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            announce_on_connect: false,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Lifecycle state of a connection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Registered and exchanging messages
    Active,
    /// Closed; the id will never be handed out again
    Closed,
}

/// Point-in-time counters for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    /// Live connections
    pub connections: usize,
    /// Live connections with a display name
    pub named: usize,
}

/// The connection lifecycle handler.
///
/// Owns the registry, the router (and with it the name resolver) and the id
/// generator.
#[derive(Debug)]
pub struct RelayHub<H> {
    config: RelayConfig,
    registry: Registry<H>,
    router: Router,
    ids: IdGenerator,
    first_id: u64,
}

impl<H: Outbox> RelayHub<H> {
    /// Create a hub whose ids are seeded from the wall clock.
    pub fn new(config: RelayConfig) -> Self {
        Self::with_ids(config, IdGenerator::from_clock())
    }

    /// Create a hub with an explicit id generator.
    pub fn with_ids(config: RelayConfig, ids: IdGenerator) -> Self {
        let first_id = ids.peek().get();
        info!(
            announce_on_connect = config.announce_on_connect,
            first_id,
            "Relay hub created"
        );
        Self {
            config,
            registry: Registry::new(),
            router: Router::new(),
            ids,
            first_id,
        }
    }

    /// Read access to the live registry.
    pub fn registry(&self) -> &Registry<H> {
        &self.registry
    }

    /// Current counters.
    pub fn stats(&self) -> RelayStats {
        RelayStats {
            connections: self.registry.len(),
            named: self.registry.named_count(),
        }
    }

    /// Lifecycle state of an id, or `None` if it was never issued.
    pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        if self.registry.find_by_id(id).is_some() {
            Some(ConnectionState::Active)
        } else if id.get() >= self.first_id && id < self.ids.peek() {
            Some(ConnectionState::Closed)
        } else {
            None
        }
    }

    /// Transport accepted a new connection.
    #[instrument(skip(self, handle))]
    pub fn on_accept(&mut self, handle: H) -> ConnectionId {
        let id = self.ids.next_id();
        self.registry.insert(id, handle);
        info!(id = %id, connections = self.registry.len(), "Connection accepted");
        metrics::record_accept(self.registry.len());

        self.send_to(id, &ServerMessage::Identity { id }.into());

        if self.config.announce_on_connect {
            roster::broadcast(&self.registry);
        }
        id
    }

    /// Transport received a frame on a connection.
    #[instrument(skip(self, raw), fields(id = %id, len = raw.len()))]
    pub fn on_message(&mut self, id: ConnectionId, raw: &[u8]) {
        if self.registry.find_by_id(id).is_none() {
            debug!("Message for inactive connection ignored");
            metrics::record_dropped("inactive");
            return;
        }
        debug!(payload = %String::from_utf8_lossy(raw), "Received message");

        let message = match protocol::decode(raw) {
            Ok(message) => message,
            Err(e) if e.is_client_error() => {
                debug!(error = %e, "Discarding undecodable message");
                metrics::record_dropped("malformed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to decode message");
                metrics::record_dropped("decode_failed");
                return;
            }
        };

        let dispatch = self.router.route(id, message, &mut self.registry);
        self.execute(dispatch);
    }

    /// Transport closed a connection.
    #[instrument(skip(self), fields(id = %id))]
    pub fn on_close(&mut self, id: ConnectionId) {
        let Some(closed) = self.registry.remove(id) else {
            debug!("Close for unknown connection ignored");
            return;
        };
        info!(
            name = closed.display_name().unwrap_or_default(),
            connections = self.registry.len(),
            "Connection closed"
        );
        metrics::record_close(self.registry.len());
        roster::broadcast(&self.registry);
    }

    fn execute(&self, dispatch: Dispatch) {
        for delivery in &dispatch.deliveries {
            match delivery.recipients {
                Recipients::One(recipient) => self.send_to(recipient, &delivery.payload),
                Recipients::All => self.send_to_all(&delivery.payload),
            }
        }
        if dispatch.roster_changed {
            roster::broadcast(&self.registry);
        }
    }

    fn send_to(&self, recipient: ConnectionId, payload: &Outbound) {
        let Some(connection) = self.registry.find_by_id(recipient) else {
            debug!(recipient = %recipient, "Recipient not connected");
            return;
        };
        match payload.encode() {
            Ok(frame) => {
                connection.handle().send(&frame);
            }
            Err(e) => error!(error = %e, "Failed to encode outbound message"),
        }
    }

    fn send_to_all(&self, payload: &Outbound) {
        let frame = match payload.encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "Failed to encode outbound message");
                return;
            }
        };
        self.registry.for_each(|connection| {
            connection.handle().send(&frame);
        });
    }

    /// Consume events until every [`RelayHandle`] is dropped or `shutdown`
    /// is cancelled.
    pub async fn run(mut self, mut events: mpsc::Receiver<RelayEvent<H>>, shutdown: CancellationToken) {
        info!("Relay hub running");
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!(connections = self.registry.len(), "Relay hub shutting down");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => event,
                    None => {
                        info!("All relay handles dropped, hub stopping");
                        break;
                    }
                },
            };
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: RelayEvent<H>) {
        match event {
            RelayEvent::Accepted { handle, reply } => {
                let id = self.on_accept(handle);
                if reply.send(id).is_err() {
                    // The transport task went away before learning its id.
                    warn!(id = %id, "Accept reply dropped, closing connection");
                    self.on_close(id);
                }
            }
            RelayEvent::Received { id, payload } => self.on_message(id, &payload),
            RelayEvent::Closed { id } => self.on_close(id),
            RelayEvent::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }
}

/// Events delivered from the transport to the hub task.
#[derive(Debug)]
pub enum RelayEvent<H> {
    /// A connection was accepted; the hub replies with its id
    Accepted {
        /// Send handle for the new connection
        handle: H,
        /// Receives the assigned id
        reply: oneshot::Sender<ConnectionId>,
    },
    /// A frame arrived on a connection
    Received {
        /// Originating connection
        id: ConnectionId,
        /// Raw frame bytes
        payload: Vec<u8>,
    },
    /// A connection closed
    Closed {
        /// The closed connection
        id: ConnectionId,
    },
    /// Request current counters
    Stats {
        /// Receives the counters
        reply: oneshot::Sender<RelayStats>,
    },
}

/// Cloneable handle used by transport tasks to reach the hub.
#[derive(Debug)]
pub struct RelayHandle<H> {
    events: mpsc::Sender<RelayEvent<H>>,
}

impl<H> Clone for RelayHandle<H> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<H: Outbox> RelayHandle<H> {
    /// Register a new connection and learn its id.
    pub async fn accept(&self, handle: H) -> Result<ConnectionId, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(RelayEvent::Accepted { handle, reply })
            .await
            .map_err(|_| RelayError::HubClosed)?;
        rx.await.map_err(|_| RelayError::HubClosed)
    }

    /// Forward a received frame.
    pub async fn received(
        &self,
        id: ConnectionId,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), RelayError> {
        self.events
            .send(RelayEvent::Received {
                id,
                payload: payload.into(),
            })
            .await
            .map_err(|_| RelayError::HubClosed)
    }

    /// Report a closed connection.
    pub async fn closed(&self, id: ConnectionId) -> Result<(), RelayError> {
        self.events
            .send(RelayEvent::Closed { id })
            .await
            .map_err(|_| RelayError::HubClosed)
    }

    /// Query current counters.
    pub async fn stats(&self) -> Result<RelayStats, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(RelayEvent::Stats { reply })
            .await
            .map_err(|_| RelayError::HubClosed)?;
        rx.await.map_err(|_| RelayError::HubClosed)
    }
}

/// Run `hub` on its own task.
pub fn spawn<H: Outbox>(
    hub: RelayHub<H>,
    shutdown: CancellationToken,
) -> (RelayHandle<H>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(hub.config.event_buffer.max(1));
    let task = tokio::spawn(hub.run(rx, shutdown));
    (RelayHandle { events: tx }, task)
}
