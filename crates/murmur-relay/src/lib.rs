//! # murmur-relay
//!
//! Connection registry and message routing core for the Murmur chat relay.
//!
//! Clients connect over a persistent bidirectional channel, register a display
//! name and exchange JSON text messages, either broadcast to everyone or
//! addressed to one named client. This crate is transport-agnostic: the
//! embedding server feeds it accept/message/close events and supplies a
//! non-blocking send primitive per connection.
//!
//! ## Architecture
//!
//! ```text
//! transport ──> RelayHandle ──mpsc──> RelayHub ──┬──> Registry
//!                                                ├──> Router ──> NameResolver
//!                                                └──> roster::broadcast
//!                                                          │
//! transport <──────────── Outbox::send <───────────────────┘
//! ```
//!
//! - **Registry**: live connections in insertion order, unique display names
//! - **NameResolver**: grants a free name, suffixing on collision
//! - **Router**: decides recipients and payload for one inbound message
//! - **roster**: pushes the full roster to every connection
//! - **RelayHub**: the per-connection lifecycle; the only writer of all of the above

pub mod hub;
pub mod id;
pub mod metrics;
pub mod names;
pub mod outbox;
pub mod protocol;
pub mod registry;
pub mod roster;
pub mod router;
pub mod sanitize;

mod error;

pub use error::RelayError;
pub use hub::{spawn, ConnectionState, RelayConfig, RelayEvent, RelayHandle, RelayHub, RelayStats};
pub use id::{ConnectionId, IdGenerator};
pub use names::{NameResolver, ResolvedName};
pub use outbox::{Outbox, SendResult};
pub use protocol::{Inbound, Outbound, ServerMessage};
pub use registry::{Connection, Registry};
pub use router::{Delivery, Dispatch, Recipients, Router};
