//! In-process connector.
//!
//! [`MemoryConnector`] completes handshakes after a configurable delay
//! (none by default) and keeps a log of what happened on each link. The
//! caller plays the server: it can push messages, close links from the
//! remote side, inject errors, and refuse new connections to simulate an
//! outage.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tracing::trace;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

use super::{CLOSE_NORMAL, Connector, LinkDriver, Outbound, TransportEvent, TransportLink};

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    /// Event senders of links that are still up.
    peers: FxHashMap<ConnectionId, mpsc::UnboundedSender<TransportEvent>>,
    /// Completed handshakes, in order.
    opened: Vec<(ConnectionId, Instant)>,
    /// Locally requested closes, in order.
    closed: Vec<ConnectionId>,
    /// Text frames written by each connection.
    sent: FxHashMap<ConnectionId, Vec<String>>,
    /// When set, handshakes fail.
    refuse: bool,
    /// Time each handshake takes.
    handshake_delay: Duration,
}

// ============================================================================
// MemoryConnector
// ============================================================================

/// Connector whose links live entirely in memory.
///
/// Cloning shares the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    /// Creates a connector that accepts every handshake.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent handshakes fail (`true`) or succeed (`false`).
    pub fn set_refuse(&self, refuse: bool) {
        self.state.lock().refuse = refuse;
    }

    /// Makes subsequent handshakes take `delay` before settling.
    pub fn set_handshake_delay(&self, delay: Duration) {
        self.state.lock().handshake_delay = delay;
    }

    /// Delivers a text message to connection `id`.
    ///
    /// Returns `false` if the link is not up.
    pub fn deliver(&self, id: ConnectionId, text: impl Into<String>) -> bool {
        self.emit(id, TransportEvent::Message(text.into()), false)
    }

    /// Reports a transport error on connection `id` without closing it.
    pub fn fail(&self, id: ConnectionId, message: impl Into<String>) -> bool {
        self.emit(id, TransportEvent::Error(message.into()), false)
    }

    /// Closes connection `id` from the server side.
    pub fn close_remote(&self, id: ConnectionId, code: u16, reason: impl Into<String>) -> bool {
        self.emit(id, TransportEvent::closed(code, reason, true), true)
    }

    /// Returns the ids of completed handshakes, in order.
    #[must_use]
    pub fn opened(&self) -> Vec<ConnectionId> {
        self.state.lock().opened.iter().map(|(id, _)| *id).collect()
    }

    /// Returns the instants of completed handshakes, in order.
    #[must_use]
    pub fn open_times(&self) -> Vec<Instant> {
        self.state.lock().opened.iter().map(|(_, at)| *at).collect()
    }

    /// Returns the ids of locally closed links, in close order.
    #[must_use]
    pub fn closed(&self) -> Vec<ConnectionId> {
        self.state.lock().closed.clone()
    }

    /// Returns the frames connection `id` has written so far.
    #[must_use]
    pub fn sent(&self, id: ConnectionId) -> Vec<String> {
        self.state.lock().sent.get(&id).cloned().unwrap_or_default()
    }

    /// Returns the number of links still up.
    #[must_use]
    pub fn live_links(&self) -> usize {
        self.state.lock().peers.len()
    }

    fn emit(&self, id: ConnectionId, event: TransportEvent, last: bool) -> bool {
        let mut state = self.state.lock();
        let peer = if last {
            state.peers.remove(&id)
        } else {
            state.peers.get(&id).cloned()
        };
        peer.is_some_and(|tx| tx.send(event).is_ok())
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, id: ConnectionId, _endpoint: &Url) -> Result<TransportLink> {
        let delay = self.state.lock().handshake_delay;
        if !delay.is_zero() {
            sleep(delay).await;
        }

        let (link, driver) = TransportLink::channel();
        {
            let mut state = self.state.lock();
            if state.refuse {
                return Err(Error::transport(id, "connection refused"));
            }
            state.peers.insert(id, driver.events.clone());
            state.opened.push((id, Instant::now()));
        }

        tokio::spawn(run_link(id, Arc::clone(&self.state), driver));
        Ok(link)
    }
}

// ============================================================================
// Link Driver
// ============================================================================

async fn run_link(id: ConnectionId, state: Arc<Mutex<MemoryState>>, mut driver: LinkDriver) {
    while let Some(command) = driver.outbound.recv().await {
        match command {
            Outbound::Text(text) => {
                trace!(id = %id, "Memory frame written");
                state.lock().sent.entry(id).or_default().push(text);
            }
            Outbound::Close => {
                let was_up = {
                    let mut state = state.lock();
                    let was_up = state.peers.remove(&id).is_some();
                    if was_up {
                        state.closed.push(id);
                    }
                    was_up
                };
                if was_up {
                    driver.emit(TransportEvent::closed(CLOSE_NORMAL, "", false));
                }
                return;
            }
        }
    }

    // Connection dropped its sender
    state.lock().peers.remove(&id);
}

// ============================================================================
// Tests
// ============================================================================
