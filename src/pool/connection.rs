//! Pool member connection.
//!
//! One [`Connection`] is one logical session to the endpoint. It drives its
//! own link: the handshake, the registration message, the heartbeat task,
//! readiness detection and teardown.
//!
//! # Lifecycle
//!
//! ```text
//! Pending ──handshake ok──► Open ──close / remote close / link lost──► Closed
//!    │                       │
//!    └──handshake failed─────┴──────────────────────────────────────► Closed
//! ```
//!
//! `ready` is a flag on top of `Open`. It is set by the first inbound
//! message carrying the readiness marker and cleared by closing.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;
use crate::protocol::PayloadBuilder;
use crate::transport::{CLOSE_ABNORMAL, Connector, LinkSender, TransportEvent};

use super::registry::Registry;

// ============================================================================
// ConnectionContext
// ============================================================================

/// Everything a connection needs from the pool that created it.
///
/// One context is built per `start` and shared by every connection opened
/// during that run.
pub struct ConnectionContext {
    /// Registry the connection joins once open.
    pub registry: Arc<Registry>,
    /// Transport used for the handshake.
    pub connector: Arc<dyn Connector>,
    /// Formats outbound payloads and classifies inbound ones.
    pub payloads: Arc<dyn PayloadBuilder>,
    /// Remote endpoint.
    pub endpoint: Url,
    /// Heartbeat period; zero sends a single heartbeat.
    pub heartbeat_interval: Duration,
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("endpoint", &self.endpoint.as_str())
            .field("heartbeat_interval", &self.heartbeat_interval)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake issued, not yet confirmed.
    Pending,
    /// Transport established.
    Open,
    /// Terminal.
    Closed,
}

/// Mutable part of a connection, guarded as a unit.
#[derive(Debug)]
struct Lifecycle {
    state: ConnectionState,
    ready: bool,
    link: Option<LinkSender>,
}

// ============================================================================
// Connection
// ============================================================================

/// One pool member.
///
/// Always handled through `Arc<Connection>`; the registry, the I/O task and
/// the heartbeat task each hold a reference.
pub struct Connection {
    id: ConnectionId,
    context: Arc<ConnectionContext>,
    lifecycle: Mutex<Lifecycle>,
    heartbeat: CancellationToken,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Public API
// ============================================================================

impl Connection {
    /// Creates a pending connection. Nothing happens until [`open`](Self::open).
    #[must_use]
    pub fn new(id: ConnectionId, context: Arc<ConnectionContext>) -> Arc<Self> {
        Arc::new(Self {
            id,
            context,
            lifecycle: Mutex::new(Lifecycle {
                state: ConnectionState::Pending,
                ready: false,
                link: None,
            }),
            heartbeat: CancellationToken::new(),
        })
    }

    /// Returns the connection id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.lifecycle.lock().state
    }

    /// Returns `true` once the readiness marker has been seen and the
    /// connection has not closed since.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.lifecycle.lock().ready
    }

    /// Starts the handshake in the background and returns immediately.
    ///
    /// The connection counts as a pending registry member until the
    /// handshake settles.
    pub fn open(self: &Arc<Self>) {
        {
            let lifecycle = self.lifecycle.lock();
            if lifecycle.state == ConnectionState::Pending {
                self.context.registry.put_pending(Arc::clone(self));
            }
        }

        let connection = Arc::clone(self);
        tokio::spawn(async move { connection.run().await });
    }

    /// Requests shutdown.
    ///
    /// An open connection asks its link to close and is torn down when the
    /// link reports the close. A pending connection is closed on the spot;
    /// its link is shut down as soon as the handshake completes.
    pub fn close(&self) {
        let mut lifecycle = self.lifecycle.lock();
        match lifecycle.state {
            ConnectionState::Pending => {
                lifecycle.state = ConnectionState::Closed;
                self.context.registry.remove(self.id);
                drop(lifecycle);
                self.heartbeat.cancel();
                debug!(id = %self.id, "Connection closed before open");
            }
            ConnectionState::Open => {
                if let Some(link) = &lifecycle.link {
                    link.close();
                }
            }
            ConnectionState::Closed => {}
        }
    }

    /// Sends one heartbeat.
    ///
    /// A heartbeat tick racing a close is dropped quietly.
    pub fn send_heartbeat(&self) {
        let result = self
            .context
            .payloads
            .heartbeat(self.id)
            .and_then(|payload| self.send(payload));

        match result {
            Ok(()) => trace!(id = %self.id, "Heartbeat sent"),
            Err(Error::NotConnected { .. } | Error::ConnectionClosed) => {
                trace!(id = %self.id, "Heartbeat discarded, not connected");
            }
            Err(e) => warn!(id = %self.id, error = %e, "Heartbeat failed"),
        }
    }

    /// Sends a text payload.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the connection is not open
    /// - [`Error::ConnectionClosed`] if the link has already gone away
    pub fn send(&self, payload: String) -> Result<()> {
        let lifecycle = self.lifecycle.lock();
        match (&lifecycle.state, &lifecycle.link) {
            (ConnectionState::Open, Some(link)) => link.send(payload),
            _ => Err(Error::not_connected(self.id)),
        }
    }
}

// ============================================================================
// Connection - Event Handlers
// ============================================================================

impl Connection {
    /// Handles an inbound message.
    pub fn on_message(&self, payload: &str) {
        trace!(id = %self.id, len = payload.len(), "Message received");

        if !self.context.payloads.is_ready(payload) {
            return;
        }

        let newly_ready = {
            let mut lifecycle = self.lifecycle.lock();
            // An evicted member stays Open until its link reports the close
            let newly_ready = lifecycle.state == ConnectionState::Open
                && !lifecycle.ready
                && self.context.registry.mark_ready(self.id);
            if newly_ready {
                lifecycle.ready = true;
            }
            newly_ready
        };

        if newly_ready {
            debug!(id = %self.id, "Connection ready");
        }
    }

    /// Handles the end of the link. Repeated calls are no-ops.
    pub fn on_closed(&self, code: u16, reason: &str, remote: bool) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == ConnectionState::Closed {
                return;
            }
            lifecycle.state = ConnectionState::Closed;
            lifecycle.ready = false;
            lifecycle.link = None;
        }

        self.heartbeat.cancel();
        self.context.registry.remove(self.id);

        debug!(
            id = %self.id,
            code,
            reason,
            by = if remote { "remote peer" } else { "us" },
            "Connection closed"
        );
    }

    /// Handles a non-fatal transport failure. A close is expected to follow.
    pub fn on_transport_error(&self, message: &str) {
        warn!(id = %self.id, error = message, "Transport error");
    }
}

// ============================================================================
// Connection - I/O Task
// ============================================================================

impl Connection {
    /// Handshake, then pump link events until the link closes.
    async fn run(self: Arc<Self>) {
        let context = Arc::clone(&self.context);
        let link = match context.connector.connect(self.id, &context.endpoint).await {
            Ok(link) => link,
            Err(e) => {
                warn!(id = %self.id, error = %e, "Connect failed");
                self.on_closed(CLOSE_ABNORMAL, &e.to_string(), false);
                return;
            }
        };

        let (sender, mut events) = link.split();
        if !self.on_open(sender) {
            return;
        }

        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Message(text) => self.on_message(&text),
                TransportEvent::Error(message) => self.on_transport_error(&message),
                TransportEvent::Closed {
                    code,
                    reason,
                    remote,
                } => {
                    self.on_closed(code, &reason, remote);
                    return;
                }
            }
        }

        self.on_closed(CLOSE_ABNORMAL, "link dropped", true);
    }

    /// Moves to `Open`, joins the registry, registers with the server and
    /// starts the heartbeat.
    ///
    /// Returns `false` if the connection was closed while pending.
    fn on_open(self: &Arc<Self>, sender: LinkSender) -> bool {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != ConnectionState::Pending {
                drop(lifecycle);
                sender.close();
                debug!(id = %self.id, "Handshake completed after close, dropping link");
                return false;
            }
            lifecycle.state = ConnectionState::Open;
            lifecycle.link = Some(sender);

            // Joined under the lifecycle lock so a concurrent close cannot
            // slip in between state change and membership.
            self.context.registry.put(Arc::clone(self));
        }

        debug!(id = %self.id, "Opened connection");

        match self
            .context
            .payloads
            .registration(self.id)
            .and_then(|payload| self.send(payload))
        {
            Ok(()) => debug!(id = %self.id, "Sent node registration"),
            Err(e) => warn!(id = %self.id, error = %e, "Failed to send node registration"),
        }

        self.start_heartbeat();
        true
    }

    /// Spawns the heartbeat task. First tick fires immediately.
    fn start_heartbeat(self: &Arc<Self>) {
        let period = self.context.heartbeat_interval;
        let cancel = self.heartbeat.clone();
        let connection: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            if period.is_zero() {
                if let Some(connection) = connection.upgrade() {
                    connection.send_heartbeat();
                }
                return;
            }

            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(connection) = connection.upgrade() else { break };
                        connection.send_heartbeat();
                    }
                }
            }
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
