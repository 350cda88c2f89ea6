//! Shared helpers for unit tests.

use std::sync::{Arc, Once};
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::identifiers::ConnectionId;
use crate::pool::{Connection, ConnectionContext, Registry};
use crate::protocol::NodePayloads;
use crate::transport::MemoryConnector;

/// Upper bound for [`eventually`].
const EVENTUALLY_TIMEOUT: Duration = Duration::from_secs(5);

static TRACING: Once = Once::new();

/// Installs a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Polls `condition` until it holds, panicking after a bounded wait.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let polled = timeout(EVENTUALLY_TIMEOUT, async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not reached in {EVENTUALLY_TIMEOUT:?}");
}

/// Context wired to an in-memory connector and a fresh registry.
pub fn memory_context(connector: &MemoryConnector, heartbeat: Duration) -> Arc<ConnectionContext> {
    init_tracing();
    Arc::new(ConnectionContext {
        registry: Arc::new(Registry::new()),
        connector: Arc::new(connector.clone()),
        payloads: Arc::new(NodePayloads::default()),
        endpoint: Url::parse("ws://memory.invalid/ws").expect("static url"),
        heartbeat_interval: heartbeat,
    })
}

/// A connection that is never opened, for registry bookkeeping tests.
pub fn detached_connection(id: ConnectionId) -> Arc<Connection> {
    let context = memory_context(&MemoryConnector::new(), Duration::from_secs(60));
    Connection::new(id, context)
}
