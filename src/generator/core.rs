//! Load generator facade.
//!
//! The [`LoadGenerator`] is the only surface a control panel talks to. It
//! validates the endpoint, hands ramp plans to the [`PoolController`] and
//! exposes the registry counts for display.
//!
//! # Example
//!
//! ```no_run
//! use ws_loadpool::{LoadGenerator, RampOptions};
//!
//! # async fn example() -> ws_loadpool::Result<()> {
//! let generator = LoadGenerator::builder().build()?;
//!
//! generator
//!     .start(RampOptions::from_millis(100, 200, 1000), "ws://127.0.0.1:9000/sdpws")
//!     .await?;
//!
//! println!("connected: {}", generator.current_size());
//! generator.stop().await;
//! generator.reset();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;
use tracing::info;
use url::Url;

use crate::error::{Error, Result};
use crate::pool::{ConnectionContext, PoolController, PoolReport, RampPlan, Registry};
use crate::protocol::PayloadBuilder;
use crate::transport::Connector;

use super::builder::LoadGeneratorBuilder;
use super::options::RampOptions;

// ============================================================================
// Types
// ============================================================================

/// Snapshot of the pool for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Live connections.
    pub connected: usize,
    /// Ready connections.
    pub ready: usize,
    /// Target of the most recent `start`.
    pub target: usize,
    /// Whether a reconciliation run is active.
    pub running: bool,
}

/// Internal shared state for the generator.
pub(crate) struct GeneratorInner {
    /// Live connections, shared with every connection context.
    pub registry: Arc<Registry>,

    /// Reconciliation task owner.
    pub controller: PoolController,

    /// Transport used for every connection.
    pub connector: Arc<dyn Connector>,

    /// Payload formatting for every connection.
    pub payloads: Arc<dyn PayloadBuilder>,

    /// Target of the most recent `start`.
    pub target: AtomicUsize,
}

// ============================================================================
// LoadGenerator
// ============================================================================

/// Dynamic connection-pool load generator.
///
/// Cheap to clone; clones share the same pool.
#[derive(Clone)]
pub struct LoadGenerator {
    /// Shared inner state.
    pub(crate) inner: Arc<GeneratorInner>,
}

// ============================================================================
// LoadGenerator - Display
// ============================================================================

impl fmt::Debug for LoadGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadGenerator")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// LoadGenerator - Constructor
// ============================================================================

impl LoadGenerator {
    /// Creates a configuration builder for the generator.
    #[inline]
    #[must_use]
    pub fn builder() -> LoadGeneratorBuilder {
        LoadGeneratorBuilder::new()
    }

    /// Creates a generator from validated parts.
    pub(crate) fn new(connector: Arc<dyn Connector>, payloads: Arc<dyn PayloadBuilder>) -> Self {
        let registry = Arc::new(Registry::new());
        let controller = PoolController::new(Arc::clone(&registry));

        Self {
            inner: Arc::new(GeneratorInner {
                registry,
                controller,
                connector,
                payloads,
                target: AtomicUsize::new(0),
            }),
        }
    }
}

// ============================================================================
// LoadGenerator - Control
// ============================================================================

impl LoadGenerator {
    /// Ramps the pool toward `options.target` against `endpoint`.
    ///
    /// Any running reconciliation is stopped and awaited first. Returns once
    /// the new run is scheduled; ramping continues in the background.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if `endpoint` is not a well-formed
    /// URI or the connector cannot serve it. Nothing is stopped or started
    /// in that case.
    pub async fn start(&self, options: RampOptions, endpoint: &str) -> Result<()> {
        let endpoint_url =
            Url::parse(endpoint).map_err(|e| Error::invalid_endpoint(endpoint, e.to_string()))?;
        self.inner.connector.check_endpoint(&endpoint_url)?;

        let context = Arc::new(ConnectionContext {
            registry: Arc::clone(&self.inner.registry),
            connector: Arc::clone(&self.inner.connector),
            payloads: Arc::clone(&self.inner.payloads),
            endpoint: endpoint_url,
            heartbeat_interval: options.heartbeat_interval,
        });

        let plan = RampPlan {
            target: options.target,
            join_interval: options.join_interval,
            report_interval: options.report_interval(),
            context,
        };

        self.inner.target.store(options.target, Ordering::SeqCst);
        self.inner.controller.start(plan).await;

        info!(target_size = options.target, endpoint, "Load generator started");
        Ok(())
    }

    /// Stops the running reconciliation. Connections stay open.
    ///
    /// Returns `true` if a run was stopped.
    pub async fn stop(&self) -> bool {
        let stopped = self.inner.controller.stop().await;
        if stopped {
            info!("Load generator stopped");
        }
        stopped
    }

    /// Closes every member, highest id first, including connections whose
    /// handshake is still in flight.
    ///
    /// Works whether or not a run is active. Returns the number of
    /// connections closed.
    pub fn reset(&self) -> usize {
        let mut closed = 0;
        while let Some(connection) = self.inner.registry.evict_max() {
            connection.close();
            closed += 1;
        }

        info!(closed, "Pool reset");
        closed
    }

    /// Stops the running reconciliation and closes every connection.
    pub async fn shutdown(&self) {
        self.stop().await;
        self.reset();
    }
}

// ============================================================================
// LoadGenerator - Observers
// ============================================================================

impl LoadGenerator {
    /// Returns the number of live connections.
    #[inline]
    #[must_use]
    pub fn current_size(&self) -> usize {
        self.inner.registry.size()
    }

    /// Returns the number of ready connections.
    #[inline]
    #[must_use]
    pub fn ready_count(&self) -> usize {
        self.inner.registry.ready_count()
    }

    /// Returns `true` while a reconciliation run is active.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.controller.is_running()
    }

    /// Returns a snapshot of the pool.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            connected: self.current_size(),
            ready: self.ready_count(),
            target: self.inner.target.load(Ordering::SeqCst),
            running: self.is_running(),
        }
    }

    /// Subscribes to the periodic ready-count reports.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PoolReport> {
        self.inner.controller.subscribe()
    }
}

// ============================================================================
// Tests
// ============================================================================
