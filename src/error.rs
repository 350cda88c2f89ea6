//! Error types for the load generator.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ws_loadpool::{LoadGenerator, RampOptions, Result};
//!
//! async fn example(generator: &LoadGenerator) -> Result<()> {
//!     generator.start(RampOptions::new(10), "ws://127.0.0.1:9000/ws").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidEndpoint`] |
//! | Connection | [`Error::Transport`], [`Error::NotConnected`], [`Error::ConnectionClosed`] |
//! | Control | [`Error::Cancelled`] |
//! | External | [`Error::Json`] |
//!
//! Connection errors never escape a pool member: the connection logs them,
//! tears itself down and the controller replaces it on its next run.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::ConnectionId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when the generator builder is missing a required part.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint URI could not be used.
    ///
    /// Returned by `start` when the URI is malformed or its scheme is not
    /// served by the configured connector. The pool is not started.
    #[error("Invalid endpoint '{uri}': {message}")]
    InvalidEndpoint {
        /// The rejected URI as supplied.
        uri: String,
        /// Why it was rejected.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport-level failure of a single connection.
    #[error("Transport error on connection {id}: {message}")]
    Transport {
        /// Connection the failure belongs to.
        id: ConnectionId,
        /// Description of the failure.
        message: String,
    },

    /// Send attempted on a connection that is not open.
    #[error("Connection {id} is not connected")]
    NotConnected {
        /// Connection the send was attempted on.
        id: ConnectionId,
    },

    /// Transport link went away underneath a sender.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Control Errors
    // ========================================================================
    /// A ramp wait was interrupted by a stop request.
    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid endpoint error.
    #[inline]
    pub fn invalid_endpoint(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(id: ConnectionId, message: impl Into<String>) -> Self {
        Self::Transport {
            id,
            message: message.into(),
        }
    }

    /// Creates a not connected error.
    #[inline]
    pub fn not_connected(id: ConnectionId) -> Self {
        Self::NotConnected { id }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::NotConnected { .. }
                | Self::ConnectionClosed
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors are contained at a single connection; the pool
    /// keeps running and replaces the connection on its next run.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::NotConnected { .. }
                | Self::ConnectionClosed
                | Self::Cancelled
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_endpoint("not a uri", "relative URL without a base");
        assert_eq!(
            err.to_string(),
            "Invalid endpoint 'not a uri': relative URL without a base"
        );
    }

    #[test]
    fn test_not_connected_display() {
        let err = Error::not_connected(ConnectionId::new(7));
        assert_eq!(err.to_string(), "Connection 7 is not connected");
    }

    #[test]
    fn test_is_connection_error() {
        let transport = Error::transport(ConnectionId::new(1), "reset by peer");
        let closed = Error::ConnectionClosed;
        let config = Error::config("missing connector");

        assert!(transport.is_connection_error());
        assert!(closed.is_connection_error());
        assert!(!config.is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::not_connected(ConnectionId::new(3)).is_recoverable());
        assert!(Error::Cancelled.is_recoverable());
        assert!(!Error::invalid_endpoint("x", "y").is_recoverable());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
