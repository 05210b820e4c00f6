//! Relay metrics.
//!
//! Instruments are created from the global OpenTelemetry meter provider,
//! which the host binary may install. Without one they are no-ops.

use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

static METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    METER.get_or_init(|| opentelemetry::global::meter("murmur-relay"))
}

// ============================================================================
// Counters
// ============================================================================

/// Counter for accepted connections.
pub fn connections_accepted() -> Counter<u64> {
    meter()
        .u64_counter("relay.connections.accepted")
        .with_description("Total connections accepted")
        .with_unit("connection")
        .build()
}

/// Counter for closed connections.
pub fn connections_closed() -> Counter<u64> {
    meter()
        .u64_counter("relay.connections.closed")
        .with_description("Total connections closed")
        .with_unit("connection")
        .build()
}

/// Counter for routed client messages.
pub fn messages_routed() -> Counter<u64> {
    meter()
        .u64_counter("relay.messages.routed")
        .with_description("Client messages routed to at least one recipient set")
        .with_unit("message")
        .build()
}

/// Counter for inbound messages that were discarded.
pub fn messages_dropped() -> Counter<u64> {
    meter()
        .u64_counter("relay.messages.dropped")
        .with_description("Inbound messages discarded without delivery")
        .with_unit("message")
        .build()
}

/// Counter for rename requests.
pub fn renames() -> Counter<u64> {
    meter()
        .u64_counter("relay.renames")
        .with_description("Display name registrations")
        .with_unit("rename")
        .build()
}

// ============================================================================
// Gauges
// ============================================================================

/// Gauge for live connections.
pub fn connections_active() -> Gauge<i64> {
    meter()
        .i64_gauge("relay.connections.active")
        .with_description("Current number of live connections")
        .with_unit("connection")
        .build()
}

// ============================================================================
// Recording Helpers
// ============================================================================

/// Record an accepted connection and the resulting live count.
pub fn record_accept(active: usize) {
    connections_accepted().add(1, &[]);
    record_active(active);
}

/// Record a closed connection and the resulting live count.
pub fn record_close(active: usize) {
    connections_closed().add(1, &[]);
    record_active(active);
}

/// Record a routed message.
pub fn record_routed(kind: &str, addressed: bool) {
    messages_routed().add(
        1,
        &[
            KeyValue::new("kind", kind.to_string()),
            KeyValue::new("scope", if addressed { "direct" } else { "broadcast" }),
        ],
    );
}

/// Record a discarded inbound message.
pub fn record_dropped(reason: &'static str) {
    messages_dropped().add(1, &[KeyValue::new("reason", reason)]);
}

/// Record a rename and whether the name had to be altered.
pub fn record_rename(changed: bool) {
    renames().add(1, &[KeyValue::new("changed", changed)]);
}

fn record_active(active: usize) {
    connections_active().record(i64::try_from(active).unwrap_or(i64::MAX), &[]);
}
