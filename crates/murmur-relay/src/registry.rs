//! Connection Registry.
//!
//! Owns the live set of connections and their display names. Connections are
//! kept in insertion order, which is the order rosters are reported in. A
//! secondary index over set names makes uniqueness checks and addressed
//! routing cheap and lets the registry refuse a duplicate name outright.
//!
//! The registry is plain owned data with no interior locking: it lives inside
//! the hub task, which is the single writer.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, instrument};

use crate::id::ConnectionId;
use crate::RelayError;

/// One live transport session.
pub struct Connection<H> {
    id: ConnectionId,
    display_name: Option<String>,
    handle: H,
}

impl<H> Connection<H> {
    /// The server-assigned id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The display name, if the client has registered one.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// The transport send handle.
    pub fn handle(&self) -> &H {
        &self.handle
    }
}

impl<H> fmt::Debug for Connection<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

/// Registry of live connections.
pub struct Registry<H> {
    /// Live connections in insertion order
    connections: Vec<Connection<H>>,
    /// Set display names to their holder
    names: HashMap<String, ConnectionId>,
}

impl<H> Registry<H> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Add a new connection with no display name.
    ///
    /// # Panics
    ///
    /// Panics if `id` is already registered. Ids come from a monotonic
    /// generator, so a repeat means the identity invariant is broken.
    #[instrument(skip(self, handle), fields(id = %id))]
    pub fn insert(&mut self, id: ConnectionId, handle: H) {
        assert!(
            self.position(id).is_none(),
            "connection id {id} registered twice"
        );
        self.connections.push(Connection {
            id,
            display_name: None,
            handle,
        });
        debug!(count = self.connections.len(), "Registered connection");
    }

    /// Remove a connection. Absent ids are a no-op.
    #[instrument(skip(self), fields(id = %id))]
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection<H>> {
        let Some(index) = self.position(id) else {
            debug!("Connection was not registered");
            return None;
        };
        let removed = self.connections.remove(index);
        if let Some(name) = &removed.display_name {
            self.names.remove(name);
        }
        debug!(count = self.connections.len(), "Unregistered connection");
        Some(removed)
    }

    /// Look up a connection by id.
    pub fn find_by_id(&self, id: ConnectionId) -> Option<&Connection<H>> {
        self.position(id).map(|index| &self.connections[index])
    }

    /// Look up a connection by exact display name.
    pub fn find_by_name(&self, name: &str) -> Option<&Connection<H>> {
        self.names.get(name).and_then(|id| self.find_by_id(*id))
    }

    /// Whether some live connection holds exactly this name.
    pub fn is_name_taken(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Assign a display name to a connection.
    ///
    /// Returns `Ok(false)` if the connection is not registered. Fails with
    /// [`RelayError::NameTaken`] if another connection holds the name; names
    /// must be resolved before they are written.
    pub fn set_name(&mut self, id: ConnectionId, name: String) -> Result<bool, RelayError> {
        if let Some(holder) = self.names.get(&name) {
            if *holder != id {
                return Err(RelayError::NameTaken {
                    name,
                    holder: *holder,
                });
            }
            return Ok(true);
        }

        let Some(index) = self.position(id) else {
            return Ok(false);
        };
        let connection = &mut self.connections[index];
        if let Some(previous) = connection.display_name.replace(name.clone()) {
            self.names.remove(&previous);
        }
        self.names.insert(name, id);
        Ok(true)
    }

    /// All display names in insertion order; unnamed connections are `None`.
    pub fn snapshot_names(&self) -> Vec<Option<String>> {
        self.connections
            .iter()
            .map(|c| c.display_name.clone())
            .collect()
    }

    /// Apply `f` to every live connection in insertion order.
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&Connection<H>),
    {
        self.connections.iter().for_each(f);
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether there are no live connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of connections that have a display name.
    pub fn named_count(&self) -> usize {
        self.names.len()
    }

    fn position(&self, id: ConnectionId) -> Option<usize> {
        self.connections.iter().position(|c| c.id == id)
    }
}

impl<H> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for Registry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("connection_count", &self.connections.len())
            .field("named_count", &self.names.len())
            .finish()
    }
}
