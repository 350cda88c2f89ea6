//! Transport layer.
//!
//! A pool member never touches sockets directly. It asks a [`Connector`]
//! for a [`TransportLink`], writes payloads into the link and consumes
//! [`TransportEvent`]s out of it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   Outbound (Text / Close)   ┌─────────────────┐
//! │   Connection    │ ──────────────────────────► │   Link driver   │
//! │   (pool member) │                             │   (per socket)  │
//! │                 │ ◄────────────────────────── │                 │
//! └─────────────────┘   TransportEvent            └─────────────────┘
//! ```
//!
//! A returned link means the handshake succeeded. Every link ends with
//! exactly one [`TransportEvent::Closed`], whether the remote side went
//! away or [`LinkSender::close`] was called.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | tokio-tungstenite client connector |
//! | `memory` | In-process connector for dry runs and tests |

// ============================================================================
// Submodules
// ============================================================================

/// In-process connector.
pub mod memory;

/// WebSocket client connector.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::MemoryConnector;
pub use websocket::WebSocketConnector;

// ============================================================================
// Constants
// ============================================================================

/// Close code for a normal, locally requested shutdown.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code reported when the link vanished without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

// ============================================================================
// Connector
// ============================================================================

/// Opens transport links to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Rejects endpoints this connector cannot serve.
    ///
    /// Called once by `start` before any connection is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the endpoint is unusable.
    fn check_endpoint(&self, endpoint: &Url) -> Result<()> {
        let _ = endpoint;
        Ok(())
    }

    /// Performs the handshake for connection `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the handshake fails.
    async fn connect(&self, id: ConnectionId, endpoint: &Url) -> Result<TransportLink>;
}

// ============================================================================
// Messages
// ============================================================================

/// Request from a connection to its link driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send a text frame.
    Text(String),
    /// Shut the link down.
    Close,
}

/// Notification from a link driver to its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Text frame received.
    Message(String),
    /// Non-fatal failure; a `Closed` event is expected to follow.
    Error(String),
    /// The link is gone. Always the last event.
    Closed {
        /// Close code.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
        /// `true` if the remote side initiated the close.
        remote: bool,
    },
}

impl TransportEvent {
    /// Creates a `Closed` event.
    #[inline]
    #[must_use]
    pub fn closed(code: u16, reason: impl Into<String>, remote: bool) -> Self {
        Self::Closed {
            code,
            reason: reason.into(),
            remote,
        }
    }
}

// ============================================================================
// TransportLink
// ============================================================================

/// Connection-side half of an established link.
#[derive(Debug)]
pub struct TransportLink {
    sender: LinkSender,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Driver-side half of an established link.
///
/// Connector implementations own this and pump it from a spawned task.
#[derive(Debug)]
pub struct LinkDriver {
    /// Requests from the connection.
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    /// Events to the connection.
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

impl LinkDriver {
    /// Forwards an event to the connection, ignoring a departed receiver.
    #[inline]
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}

impl TransportLink {
    /// Creates a connected pair of link halves.
    #[must_use]
    pub fn channel() -> (Self, LinkDriver) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let link = Self {
            sender: LinkSender { tx: outbound_tx },
            events: events_rx,
        };
        let driver = LinkDriver {
            outbound: outbound_rx,
            events: events_tx,
        };
        (link, driver)
    }

    /// Splits the link into its sending half and its event stream.
    #[must_use]
    pub fn split(self) -> (LinkSender, mpsc::UnboundedReceiver<TransportEvent>) {
        (self.sender, self.events)
    }
}

// ============================================================================
// LinkSender
// ============================================================================

/// Cloneable handle for writing into a link.
#[derive(Debug, Clone)]
pub struct LinkSender {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl LinkSender {
    /// Queues a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the link driver has stopped.
    pub fn send(&self, text: String) -> Result<()> {
        self.tx
            .send(Outbound::Text(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Requests shutdown. A `Closed` event with `remote = false` follows
    /// unless the link is already gone.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    /// Returns `true` if the link driver has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_round_trip() {
        let (link, mut driver) = TransportLink::channel();
        let (sender, mut events) = link.split();

        sender.send("hello".into()).expect("send");
        sender.close();
        assert_eq!(driver.outbound.recv().await, Some(Outbound::Text("hello".into())));
        assert_eq!(driver.outbound.recv().await, Some(Outbound::Close));

        driver.emit(TransportEvent::Message("pong".into()));
        assert_eq!(events.recv().await, Some(TransportEvent::Message("pong".into())));
    }

    #[test]
    fn test_send_after_driver_dropped() {
        let (link, driver) = TransportLink::channel();
        let (sender, _events) = link.split();
        drop(driver);

        assert!(sender.is_closed());
        assert!(matches!(sender.send("x".into()), Err(Error::ConnectionClosed)));
    }
}
