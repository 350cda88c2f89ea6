//! Node message types.
//!
//! Defines the JSON bodies a pool member sends to the server.
//!
//! # Format
//!
//! Registration (sent once, right after the connection opens):
//!
//! ```json
//! {"NODE_REGISTRATION":{"authToken":"loadtest7","username":"loadtest7"}}
//! ```
//!
//! Heartbeat (sent on the heartbeat schedule):
//!
//! ```json
//! {"NODE_HEARTBEAT":{"authToken":"loadtest7","serverId":"907"}}
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

use crate::error::Result;
use crate::identifiers::ConnectionId;

// ============================================================================
// Constants
// ============================================================================

/// Prefix of the server-facing identifier in heartbeats.
pub const SERVER_ID_PREFIX: &str = "90";

// ============================================================================
// NodeMessage
// ============================================================================

/// Outbound message from a pool member.
///
/// Serialized externally tagged, so the variant name is the single key of
/// the top-level object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NodeMessage {
    /// Announces a new node to the server.
    #[serde(rename = "NODE_REGISTRATION")]
    Registration {
        /// Opaque token derived from the connection id.
        #[serde(rename = "authToken")]
        auth_token: String,
        /// Display name, same as the token.
        username: String,
    },

    /// Keeps the node session alive.
    #[serde(rename = "NODE_HEARTBEAT")]
    Heartbeat {
        /// Opaque token derived from the connection id.
        #[serde(rename = "authToken")]
        auth_token: String,
        /// Server-facing identifier derived from the connection id.
        #[serde(rename = "serverId")]
        server_id: String,
    },
}

impl NodeMessage {
    /// Creates a registration message for `id`.
    #[must_use]
    pub fn registration(auth_prefix: &str, id: ConnectionId) -> Self {
        let token = auth_token(auth_prefix, id);
        Self::Registration {
            username: token.clone(),
            auth_token: token,
        }
    }

    /// Creates a heartbeat message for `id`.
    #[must_use]
    pub fn heartbeat(auth_prefix: &str, id: ConnectionId) -> Self {
        Self::Heartbeat {
            auth_token: auth_token(auth_prefix, id),
            server_id: format!("{SERVER_ID_PREFIX}{id}"),
        }
    }

    /// Serializes the message to its wire text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Derives the opaque auth token for a connection.
#[inline]
#[must_use]
pub fn auth_token(prefix: &str, id: ConnectionId) -> String {
    format!("{prefix}{id}")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_wire_format() {
        let text = NodeMessage::registration("loadtest", ConnectionId::new(7))
            .to_text()
            .expect("serialize");
        assert_eq!(
            text,
            r#"{"NODE_REGISTRATION":{"authToken":"loadtest7","username":"loadtest7"}}"#
        );
    }

    #[test]
    fn test_heartbeat_wire_format() {
        let text = NodeMessage::heartbeat("loadtest", ConnectionId::new(12))
            .to_text()
            .expect("serialize");
        assert_eq!(
            text,
            r#"{"NODE_HEARTBEAT":{"authToken":"loadtest12","serverId":"9012"}}"#
        );
    }

    #[test]
    fn test_custom_prefix() {
        assert_eq!(auth_token("soak", ConnectionId::new(3)), "soak3");
    }
}
