//! WebSocket client connector.
//!
//! Opens one tokio-tungstenite client per pool member and spawns a link
//! driver task that owns the socket.
//!
//! # Link Driver
//!
//! The driver task handles:
//!
//! - Incoming text frames (forwarded as [`TransportEvent::Message`])
//! - Outgoing text frames queued by the connection
//! - Close frames and stream termination in both directions

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

use super::{CLOSE_ABNORMAL, CLOSE_NORMAL, Connector, LinkDriver, Outbound, TransportEvent, TransportLink};

// ============================================================================
// Types
// ============================================================================

/// Client socket as returned by `connect_async`.
type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code used when the peer sent a close frame without a payload.
const CLOSE_NO_STATUS: u16 = 1005;

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Connector speaking WebSocket over tokio-tungstenite.
///
/// Accepts `ws://` endpoints, and `wss://` when built with the `rustls`
/// feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Creates a new connector.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    fn check_endpoint(&self, endpoint: &Url) -> Result<()> {
        match endpoint.scheme() {
            "ws" => Ok(()),
            "wss" if cfg!(feature = "rustls") => Ok(()),
            "wss" => Err(Error::invalid_endpoint(
                endpoint.as_str(),
                "wss:// requires the `rustls` feature",
            )),
            other => Err(Error::invalid_endpoint(
                endpoint.as_str(),
                format!("unsupported scheme '{other}', expected ws or wss"),
            )),
        }
    }

    async fn connect(&self, id: ConnectionId, endpoint: &Url) -> Result<TransportLink> {
        let (ws_stream, _response) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| Error::transport(id, format!("WebSocket handshake failed: {e}")))?;

        debug!(id = %id, endpoint = %endpoint, "WebSocket connection established");

        let (link, driver) = TransportLink::channel();
        tokio::spawn(run_link(id, ws_stream, driver));

        Ok(link)
    }
}

// ============================================================================
// Link Driver
// ============================================================================

/// Owns the socket until either side closes it.
async fn run_link(id: ConnectionId, ws_stream: ClientStream, mut driver: LinkDriver) {
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let closed = loop {
        tokio::select! {
            // Incoming frames from the server
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(id = %id, len = text.len(), "Frame received");
                        driver.emit(TransportEvent::Message(text.as_str().to_owned()));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                            .unwrap_or((CLOSE_NO_STATUS, String::new()));
                        debug!(id = %id, code, "WebSocket closed by remote");
                        break TransportEvent::closed(code, reason, true);
                    }

                    Some(Err(e)) => {
                        warn!(id = %id, error = %e, "WebSocket error");
                        driver.emit(TransportEvent::Error(e.to_string()));
                        break TransportEvent::closed(CLOSE_ABNORMAL, e.to_string(), true);
                    }

                    None => {
                        debug!(id = %id, "WebSocket stream ended");
                        break TransportEvent::closed(CLOSE_ABNORMAL, "stream ended", true);
                    }

                    // Binary, Ping, Pong carry nothing for the pool
                    _ => {}
                }
            }

            // Requests from the connection
            command = driver.outbound.recv() => {
                match command {
                    Some(Outbound::Text(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            warn!(id = %id, error = %e, "Failed to send frame");
                            driver.emit(TransportEvent::Error(e.to_string()));
                            break TransportEvent::closed(CLOSE_ABNORMAL, e.to_string(), false);
                        }
                    }

                    Some(Outbound::Close) | None => {
                        let _ = ws_write.close().await;
                        break TransportEvent::closed(CLOSE_NORMAL, "", false);
                    }
                }
            }
        }
    };

    driver.emit(closed);
    trace!(id = %id, "Link driver terminated");
}

// ============================================================================
// Tests
// ============================================================================
