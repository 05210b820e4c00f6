//! Message routing.
//!
//! The [`Router`] turns one decoded inbound message into send instructions.
//! It never talks to the transport: the hub executes the returned
//! [`Dispatch`] against the registry's send handles.
//!
//! # Routing Logic
//!
//! - rename: resolve the requested name, write it to the registry, tell the
//!   originator if the name was altered, and request a roster rebroadcast.
//!   Never forwarded to other clients.
//! - text and passthrough: stamp the sender's display name, strip markup
//!   from the body, then deliver to the connection named by `target`, or to
//!   every live connection (sender included) when there is no target. An
//!   unknown target drops the message silently.

use tracing::{debug, warn};

use crate::id::ConnectionId;
use crate::metrics;
use crate::names::NameResolver;
use crate::protocol::{Envelope, Inbound, Outbound, RenameRequest, ServerMessage};
use crate::registry::Registry;

/// Who receives a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    /// Exactly one connection
    One(ConnectionId),
    /// Every live connection
    All,
}

/// One send instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Recipient set
    pub recipients: Recipients,
    /// Payload to send
    pub payload: Outbound,
}

/// Everything the hub must do as a result of one inbound message.
#[derive(Debug, Default, PartialEq)]
pub struct Dispatch {
    /// Sends to perform, in order
    pub deliveries: Vec<Delivery>,
    /// Whether the roster must be rebroadcast afterwards
    pub roster_changed: bool,
}

impl Dispatch {
    fn deliver(recipients: Recipients, payload: impl Into<Outbound>) -> Self {
        Self {
            deliveries: vec![Delivery {
                recipients,
                payload: payload.into(),
            }],
            roster_changed: false,
        }
    }

    /// Whether nothing is to be sent.
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty() && !self.roster_changed
    }
}

/// Routes inbound messages and owns the process-wide name resolver.
#[derive(Debug, Default)]
pub struct Router {
    resolver: NameResolver,
}

impl Router {
    /// Create a router with a fresh name resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a message from `origin`.
    ///
    /// Messages from connections not in the registry produce an empty
    /// dispatch.
    pub fn route<H>(
        &mut self,
        origin: ConnectionId,
        message: Inbound,
        registry: &mut Registry<H>,
    ) -> Dispatch {
        if registry.find_by_id(origin).is_none() {
            debug!(origin = %origin, "Message from unregistered connection ignored");
            return Dispatch::default();
        }

        let kind = message.kind();
        match message {
            Inbound::Rename(request) => self.route_rename(origin, request, registry),
            Inbound::Text(envelope) | Inbound::Passthrough(envelope) => {
                Self::route_text(origin, kind, envelope, registry)
            }
        }
    }

    fn route_rename<H>(
        &mut self,
        origin: ConnectionId,
        request: RenameRequest,
        registry: &mut Registry<H>,
    ) -> Dispatch {
        let resolved = self.resolver.resolve(&request.name, registry);
        metrics::record_rename(resolved.changed);

        if let Err(e) = registry.set_name(origin, resolved.name.clone()) {
            warn!(origin = %origin, error = %e, "Resolved name rejected by registry");
            return Dispatch::default();
        }
        debug!(origin = %origin, name = %resolved.name, changed = resolved.changed, "Display name set");

        let mut dispatch = if resolved.changed {
            Dispatch::deliver(
                Recipients::One(origin),
                ServerMessage::NameRejected {
                    id: request.correlation_id,
                    name: resolved.name,
                },
            )
        } else {
            Dispatch::default()
        };
        dispatch.roster_changed = true;
        dispatch
    }

    fn route_text<H>(
        origin: ConnectionId,
        kind: &'static str,
        mut envelope: Envelope,
        registry: &Registry<H>,
    ) -> Dispatch {
        let sender = registry
            .find_by_id(origin)
            .and_then(|c| c.display_name());
        envelope.stamp_sender(sender);
        envelope.sanitize_body();
        debug!(
            origin = %origin,
            message_type = envelope.message_type().unwrap_or_default(),
            "Routing client message"
        );

        let Some(target) = envelope.target() else {
            metrics::record_routed(kind, false);
            return Dispatch::deliver(Recipients::All, envelope);
        };

        match registry.find_by_name(target) {
            Some(recipient) => {
                let recipient = recipient.id();
                metrics::record_routed(kind, true);
                Dispatch::deliver(Recipients::One(recipient), envelope)
            }
            None => {
                debug!(origin = %origin, target = %target, "Target not online, message dropped");
                metrics::record_dropped("unknown_target");
                Dispatch::default()
            }
        }
    }
}
