//! Payload formatting seam.
//!
//! Connections do not know what their messages look like; they ask a
//! [`PayloadBuilder`] for the registration and heartbeat text and for
//! whether an inbound message marks the node as ready.

// ============================================================================
// Imports
// ============================================================================

use crate::error::Result;
use crate::identifiers::ConnectionId;

use super::message::NodeMessage;

// ============================================================================
// Constants
// ============================================================================

/// Marker whose presence anywhere in an inbound message means the server
/// finished sending the node its initial state.
pub const READY_MARKER: &str = "FRONT_END_UI_INITIAL_STATE";

/// Default auth token prefix.
pub const DEFAULT_AUTH_PREFIX: &str = "loadtest";

// ============================================================================
// PayloadBuilder
// ============================================================================

/// Builds outbound payloads and classifies inbound ones.
pub trait PayloadBuilder: Send + Sync + 'static {
    /// Returns the registration payload for a freshly opened connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    fn registration(&self, id: ConnectionId) -> Result<String>;

    /// Returns the heartbeat payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    fn heartbeat(&self, id: ConnectionId) -> Result<String>;

    /// Returns `true` if `message` marks the connection as ready.
    ///
    /// The default is a raw substring check for [`READY_MARKER`], not a
    /// structured decode. Any message mentioning the marker counts.
    fn is_ready(&self, message: &str) -> bool {
        message.contains(READY_MARKER)
    }
}

// ============================================================================
// NodePayloads
// ============================================================================

/// Default payload builder producing [`NodeMessage`] JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePayloads {
    auth_prefix: String,
}

impl Default for NodePayloads {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_PREFIX)
    }
}

impl NodePayloads {
    /// Creates a builder deriving tokens as `<auth_prefix><id>`.
    #[inline]
    #[must_use]
    pub fn new(auth_prefix: impl Into<String>) -> Self {
        Self {
            auth_prefix: auth_prefix.into(),
        }
    }

    /// Returns the auth token prefix.
    #[inline]
    #[must_use]
    pub fn auth_prefix(&self) -> &str {
        &self.auth_prefix
    }
}

impl PayloadBuilder for NodePayloads {
    fn registration(&self, id: ConnectionId) -> Result<String> {
        NodeMessage::registration(&self.auth_prefix, id).to_text()
    }

    fn heartbeat(&self, id: ConnectionId) -> Result<String> {
        NodeMessage::heartbeat(&self.auth_prefix, id).to_text()
    }
}

// ============================================================================
// Tests
// ============================================================================
