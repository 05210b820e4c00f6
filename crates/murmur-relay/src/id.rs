//! Connection identity.
//!
//! Ids are handed out by a single [`IdGenerator`] owned by the hub. The
//! generator is seeded from wall-clock milliseconds so that two process runs
//! are unlikely to reuse the same ids, and it only ever counts upwards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned identifier of a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw id value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric value sent on the wire.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id generator.
///
/// Pre-increments: a generator seeded with `1000` yields `1001` first.
#[derive(Debug)]
pub struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    /// Seed the generator with the current Unix time in milliseconds.
    pub fn from_clock() -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self::starting_at(u64::try_from(now).unwrap_or_default())
    }

    /// Seed the generator with an explicit base value.
    pub fn starting_at(seed: u64) -> Self {
        Self { last: seed }
    }

    /// The id the next call to [`next_id`](Self::next_id) will return.
    pub fn peek(&self) -> ConnectionId {
        ConnectionId(self.last.saturating_add(1))
    }

    /// Produce the next id.
    ///
    /// # Panics
    ///
    /// Panics if the id space is exhausted; repeating an id would break the
    /// registry's identity invariant.
    pub fn next_id(&mut self) -> ConnectionId {
        self.last = self
            .last
            .checked_add(1)
            .unwrap_or_else(|| panic!("connection id space exhausted"));
        ConnectionId(self.last)
    }
}
