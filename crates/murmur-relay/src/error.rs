//! Error types for the relay core.

use thiserror::Error;

use crate::id::ConnectionId;

/// Relay errors.
///
/// None of these are fatal: the hub absorbs every variant locally by
/// logging and dropping the offending event.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Inbound payload is not valid JSON
    #[error("Malformed payload: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Inbound payload parsed, but is not a JSON object
    #[error("Payload is not an object")]
    NotAnObject,

    /// Rename request without a usable requested name
    #[error("Invalid rename request: {0}")]
    InvalidRename(String),

    /// Attempt to assign a display name already held by another connection
    #[error("Name {name:?} is already taken by connection {holder}")]
    NameTaken {
        /// The contested name
        name: String,
        /// Connection currently holding the name
        holder: ConnectionId,
    },

    /// Outbound message could not be serialized
    #[error("Failed to encode outbound message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The hub task has stopped and no longer accepts events
    #[error("Relay hub is not running")]
    HubClosed,
}

impl RelayError {
    /// Create a new invalid rename error.
    pub fn invalid_rename(msg: impl Into<String>) -> Self {
        Self::InvalidRename(msg.into())
    }

    /// Whether this error stems from client input (as opposed to hub state).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Malformed(_) | Self::NotAnObject | Self::InvalidRename(_)
        )
    }
}
