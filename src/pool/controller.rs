//! Pool reconciliation.
//!
//! [`PoolController`] runs at most one background reconciliation task. A
//! run ramps the pool toward its target and then keeps reporting the ready
//! count until it is stopped.
//!
//! # Run Phases
//!
//! 1. **Ramp-up**: open connections with increasing ids, pausing
//!    `join_interval` after each one. The pause is cancellable.
//! 2. **Ramp-down**: evict the highest member id until the pool fits the
//!    target. No pause.
//!
//! Both phases count pending handshakes as members, so a restart issued
//! while a previous run's handshakes are in flight does not overshoot.
//! 3. **Report**: publish `(connected, ready)` every `report_interval`.
//!
//! Stopping a run never closes connections. Starting a run first stops and
//! awaits the previous one.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::IdAllocator;

use super::connection::{Connection, ConnectionContext};
use super::registry::Registry;

// ============================================================================
// Types
// ============================================================================

/// Parameters of one reconciliation run.
#[derive(Debug, Clone)]
pub struct RampPlan {
    /// Desired pool size.
    pub target: usize,
    /// Pause after each open during ramp-up.
    pub join_interval: Duration,
    /// Period of ready-count reports; zero reports once.
    pub report_interval: Duration,
    /// Shared by every connection this run opens.
    pub context: Arc<ConnectionContext>,
}

/// Ready-count report published by a running controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Live connections at report time.
    pub connected: usize,
    /// Ready connections at report time.
    pub ready: usize,
}

/// Handle of the active run.
struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RunHandle {
    /// Cancels the run and waits for its task to finish.
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await
            && e.is_panic()
        {
            warn!(error = %e, "Reconciliation task panicked");
        }
    }
}

// ============================================================================
// PoolController
// ============================================================================

/// Scheduling core of the pool.
pub struct PoolController {
    registry: Arc<Registry>,
    ids: Arc<IdAllocator>,
    run: Mutex<Option<RunHandle>>,
    /// Probe on the active task, readable without awaiting `run`.
    active: parking_lot::Mutex<Option<AbortHandle>>,
    reports: Arc<watch::Sender<PoolReport>>,
}

impl PoolController {
    /// Creates an idle controller over `registry`.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        let (reports, _) = watch::channel(PoolReport::default());
        Self {
            registry,
            ids: Arc::new(IdAllocator::new()),
            run: Mutex::new(None),
            active: parking_lot::Mutex::new(None),
            reports: Arc::new(reports),
        }
    }

    /// Stops any active run, then starts a new one for `plan`.
    pub async fn start(&self, plan: RampPlan) {
        let mut run = self.run.lock().await;
        if let Some(previous) = run.take() {
            debug!("Stopping previous reconciliation run");
            previous.stop().await;
        }

        let cancel = CancellationToken::new();
        let reconciler = Reconciler {
            registry: Arc::clone(&self.registry),
            ids: Arc::clone(&self.ids),
            reports: Arc::clone(&self.reports),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(reconciler.run(plan));

        self.install(&mut run, RunHandle { cancel, task });
    }

    /// Stops the active run, if any. Connections stay open.
    ///
    /// Returns `true` if a run was stopped.
    pub async fn stop(&self) -> bool {
        let mut run = self.run.lock().await;
        let Some(previous) = run.take() else {
            return false;
        };
        *self.active.lock() = None;
        previous.stop().await;
        debug!("Reconciliation stopped");
        true
    }

    /// Returns `true` while a run's task is alive.
    ///
    /// A run whose task has panicked no longer counts.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Subscribes to ready-count reports.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PoolReport> {
        self.reports.subscribe()
    }

    /// Returns the most recent report.
    #[must_use]
    pub fn last_report(&self) -> PoolReport {
        *self.reports.borrow()
    }

    /// Stores `handle` as the active run.
    fn install(&self, slot: &mut Option<RunHandle>, handle: RunHandle) {
        *self.active.lock() = Some(handle.task.abort_handle());
        *slot = Some(handle);
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// State owned by one run's task.
struct Reconciler {
    registry: Arc<Registry>,
    ids: Arc<IdAllocator>,
    reports: Arc<watch::Sender<PoolReport>>,
    cancel: CancellationToken,
}

impl Reconciler {
    async fn run(self, plan: RampPlan) {
        info!(
            target_size = plan.target,
            current = self.registry.size(),
            pending = self.registry.pending(),
            join_ms = plan.join_interval.as_millis() as u64,
            "Adjusting pool"
        );

        let opened = match self.ramp_up(&plan).await {
            Ok(opened) => opened,
            Err(_) => {
                debug!("Ramp-up cancelled");
                return;
            }
        };
        if self.cancel.is_cancelled() {
            return;
        }

        let evicted = self.ramp_down(plan.target);
        info!(target_size = plan.target, opened, evicted, "Pool adjusted");

        self.report(plan.report_interval).await;
    }

    /// Issues opens until `target` connections have been initiated.
    ///
    /// Counts initiated opens rather than live connections: handshakes
    /// complete asynchronously and would otherwise be issued twice.
    async fn ramp_up(&self, plan: &RampPlan) -> Result<usize> {
        let mut initiated = self.registry.members();
        let mut opened = 0;

        while initiated < plan.target {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let id = self.ids.next_id();
            Connection::new(id, Arc::clone(&plan.context)).open();
            debug!(id = %id, "Connection open issued");

            initiated += 1;
            opened += 1;
            self.pause(plan.join_interval).await?;
        }

        Ok(opened)
    }

    /// Evicts the highest member id until the pool fits `target`.
    fn ramp_down(&self, target: usize) -> usize {
        let mut evicted = 0;
        while self.registry.members() > target {
            let Some(connection) = self.registry.evict_max() else {
                break;
            };
            debug!(id = %connection.id(), "Evicting connection");
            connection.close();
            evicted += 1;
        }
        evicted
    }

    /// Publishes reports until cancelled.
    async fn report(&self, period: Duration) {
        if period.is_zero() {
            self.publish();
            self.cancel.cancelled().await;
            return;
        }

        let mut ticker = interval(period);
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.publish(),
            }
        }
    }

    fn publish(&self) {
        let report = PoolReport {
            connected: self.registry.size(),
            ready: self.registry.ready_count(),
        };
        debug!(connected = report.connected, ready = report.ready, "Clients connected");
        self.reports.send_replace(report);
    }

    /// Sleeps for `duration` unless cancelled first.
    async fn pause(&self, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            return if self.cancel.is_cancelled() {
                Err(Error::Cancelled)
            } else {
                Ok(())
            };
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            () = sleep(duration) => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifiers::ConnectionId;
    use crate::testing::{eventually, memory_context};
    use crate::transport::MemoryConnector;

    fn ids(raw: &[u64]) -> Vec<ConnectionId> {
        raw.iter().copied().map(ConnectionId::new).collect()
    }

    fn plan(context: &Arc<ConnectionContext>, target: usize, join_ms: u64) -> RampPlan {
        RampPlan {
            target,
            join_interval: Duration::from_millis(join_ms),
            report_interval: Duration::from_millis(50),
            context: Arc::clone(context),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ramp_up_order_and_spacing() {
        let connector = MemoryConnector::new();
        let context = memory_context(&connector, Duration::from_secs(60));
        let controller = PoolController::new(Arc::clone(&context.registry));

        controller.start(plan(&context, 4, 100)).await;
        eventually(|| context.registry.size() == 4).await;

        assert_eq!(connector.opened(), ids(&[1, 2, 3, 4]));
        let times = connector.open_times();
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
        controller.stop().await;
    }

    #[tokio::test]
    async fn test_ramp_down_evicts_highest_first() {
        let connector = MemoryConnector::new();
        let context = memory_context(&connector, Duration::from_secs(60));
        let controller = PoolController::new(Arc::clone(&context.registry));

        controller.start(plan(&context, 5, 0)).await;
        eventually(|| context.registry.size() == 5).await;

        controller.start(plan(&context, 2, 0)).await;
        eventually(|| connector.closed().len() == 3).await;

        assert_eq!(connector.closed(), ids(&[5, 4, 3]));
        assert_eq!(context.registry.ids(), ids(&[1, 2]));
        controller.stop().await;
    }

    #[tokio::test]
    async fn test_zero_target_empties_pool_and_reports() {
        let connector = MemoryConnector::new();
        let context = memory_context(&connector, Duration::from_secs(60));
        let controller = PoolController::new(Arc::clone(&context.registry));

        controller.start(plan(&context, 2, 0)).await;
        eventually(|| context.registry.size() == 2).await;

        controller.start(plan(&context, 0, 0)).await;
        eventually(|| context.registry.size() == 0).await;
        eventually(|| connector.closed().len() == 2).await;

        let mut reports = controller.subscribe();
        reports.borrow_and_update();
        reports.changed().await.expect("report");
        assert_eq!(*reports.borrow(), PoolReport::default());
        assert!(controller.is_running());
        controller.stop().await;
    }

    #[tokio::test]
    async fn test_stop_interrupts_ramp_wait() {
        let connector = MemoryConnector::new();
        let context = memory_context(&connector, Duration::from_secs(60));
        let controller = PoolController::new(Arc::clone(&context.registry));

        controller.start(plan(&context, 10, 30_000)).await;
        eventually(|| connector.opened().len() == 1).await;

        let stopped = tokio::time::timeout(Duration::from_secs(2), controller.stop()).await;
        assert_eq!(stopped.ok(), Some(true));
        assert!(!controller.is_running());

        // Stop leaves open connections alone
        assert_eq!(context.registry.size(), 1);
        assert_eq!(connector.opened().len(), 1);
    }

    #[tokio::test]
    async fn test_restart_never_reuses_ids() {
        let connector = MemoryConnector::new();
        let context = memory_context(&connector, Duration::from_secs(60));
        let controller = PoolController::new(Arc::clone(&context.registry));

        controller.start(plan(&context, 2, 0)).await;
        eventually(|| context.registry.size() == 2).await;
        while let Some(connection) = context.registry.evict_max() {
            connection.close();
        }

        controller.start(plan(&context, 2, 0)).await;
        eventually(|| context.registry.size() == 2).await;
        assert_eq!(context.registry.ids(), ids(&[3, 4]));
        controller.stop().await;
    }

    #[tokio::test]
    async fn test_ramp_up_counts_existing_members() {
        let connector = MemoryConnector::new();
        let context = memory_context(&connector, Duration::from_secs(60));
        let controller = PoolController::new(Arc::clone(&context.registry));

        controller.start(plan(&context, 2, 0)).await;
        eventually(|| context.registry.size() == 2).await;
        controller.start(plan(&context, 3, 0)).await;
        eventually(|| context.registry.size() == 3).await;

        assert_eq!(connector.opened(), ids(&[1, 2, 3]));
        controller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_track_readiness() {
        let connector = MemoryConnector::new();
        let context = memory_context(&connector, Duration::from_secs(60));
        let controller = PoolController::new(Arc::clone(&context.registry));

        controller.start(plan(&context, 2, 0)).await;
        eventually(|| context.registry.size() == 2).await;
        connector.deliver(ConnectionId::new(2), "FRONT_END_UI_INITIAL_STATE");

        eventually(|| controller.last_report() == PoolReport { connected: 2, ready: 1 }).await;
        controller.stop().await;
    }

    #[tokio::test]
    async fn test_stop_without_run() {
        let registry = Arc::new(Registry::new());
        let controller = PoolController::new(registry);
        assert!(!controller.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_during_handshakes_does_not_overshoot() {
        let connector = MemoryConnector::new();
        connector.set_handshake_delay(Duration::from_millis(50));
        let context = memory_context(&connector, Duration::from_secs(60));
        let controller = PoolController::new(Arc::clone(&context.registry));

        controller.start(plan(&context, 3, 0)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.start(plan(&context, 3, 0)).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(context.registry.size(), 3);
        assert_eq!(connector.opened(), ids(&[1, 2, 3]));
        controller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shrink_during_handshakes_closes_pending() {
        let connector = MemoryConnector::new();
        connector.set_handshake_delay(Duration::from_millis(50));
        let context = memory_context(&connector, Duration::from_secs(60));
        let controller = PoolController::new(Arc::clone(&context.registry));

        controller.start(plan(&context, 3, 0)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.start(plan(&context, 1, 0)).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(context.registry.ids(), ids(&[1]));
        assert_eq!(context.registry.pending(), 0);
        let mut closed = connector.closed();
        closed.sort();
        assert_eq!(closed, ids(&[2, 3]));
        controller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_report_interval_publishes_once() {
        let connector = MemoryConnector::new();
        let context = memory_context(&connector, Duration::from_secs(60));
        let controller = PoolController::new(Arc::clone(&context.registry));
        let mut reports = controller.subscribe();
        reports.borrow_and_update();

        let mut zero = plan(&context, 1, 0);
        zero.report_interval = Duration::ZERO;
        controller.start(zero).await;

        reports.changed().await.expect("first report");
        let again = tokio::time::timeout(Duration::from_secs(5), reports.changed()).await;
        assert!(again.is_err());
        assert!(controller.is_running());
        controller.stop().await;
    }

    #[tokio::test]
    async fn test_panicked_run_is_not_running() {
        let registry = Arc::new(Registry::new());
        let controller = PoolController::new(registry);

        let handle = RunHandle {
            cancel: CancellationToken::new(),
            task: tokio::spawn(async { panic!("reconciler failure") }),
        };
        {
            let mut slot = controller.run.lock().await;
            controller.install(&mut slot, handle);
        }

        eventually(|| !controller.is_running()).await;
        assert!(controller.stop().await);
    }
}
