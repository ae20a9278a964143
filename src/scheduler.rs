//! Periodic sync, backup and health timers.
//!
//! Each timer runs on its own task and spawns its operation on every
//! tick, so a slow run never delays the next tick. Timers are not
//! interlocked with each other; whether a timer may overlap its own
//! previous run is decided by [`OverlapPolicy`]. Manual triggers always
//! run.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::backend::SyncBackend;
use crate::backup::{BackupManager, BackupManifest};
use crate::config::{OverlapPolicy, ScheduleConfig};
use crate::error::{OrchestratorError, Result};
use crate::health::{HealthProbe, HealthReport, HealthVerifier};
use crate::sync::{SyncOrchestrator, SyncReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Sync,
    Backup,
    Health,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Sync, Operation::Backup, Operation::Health];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Sync => "sync",
            Operation::Backup => "backup",
            Operation::Health => "health",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timer periods. A zero period fires once at start and never repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub sync_every: Duration,
    pub backup_every: Duration,
    pub health_every: Duration,
    pub overlap: OverlapPolicy,
}

impl Schedule {
    fn period(&self, op: Operation) -> Duration {
        match op {
            Operation::Sync => self.sync_every,
            Operation::Backup => self.backup_every,
            Operation::Health => self.health_every,
        }
    }
}

impl From<&ScheduleConfig> for Schedule {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            sync_every: config.sync_interval(),
            backup_every: config.backup_interval(),
            health_every: config.health_interval(),
            overlap: config.overlap,
        }
    }
}

/// Counts one in-flight run until dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }

    /// Enter only if nothing else is in flight.
    fn enter_exclusive(counter: &Arc<AtomicUsize>) -> Option<Self> {
        counter
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(Arc::clone(counter)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The operations the timers fire, shared with every spawned run.
struct Operations<B: SyncBackend, P: HealthProbe> {
    sync: Arc<SyncOrchestrator<B>>,
    backups: BackupManager,
    health: HealthVerifier<P>,
    health_url: Option<String>,
    overlap: OverlapPolicy,
    in_flight: [Arc<AtomicUsize>; 3],
}

impl<B, P> Operations<B, P>
where
    B: SyncBackend + 'static,
    P: HealthProbe + 'static,
{
    fn counter(&self, op: Operation) -> &Arc<AtomicUsize> {
        &self.in_flight[op.index()]
    }

    async fn backup(&self) -> Result<BackupManifest> {
        self.backups.create_backup().await
    }

    /// One probe, no retries. `Ok(None)` when no health target is set.
    async fn health(&self) -> Result<Option<HealthReport>> {
        let Some(url) = self.health_url.as_deref() else {
            debug!("no health target configured, skipping probe");
            return Ok(None);
        };
        self.health
            .verify_with(url, 1, Duration::ZERO, self.health.timeout())
            .await
            .map(Some)
    }

    /// Timer tick: spawn the operation unless the overlap policy says skip.
    fn tick(self: &Arc<Self>, op: Operation) {
        let counter = self.counter(op);
        let guard = match self.overlap {
            OverlapPolicy::Allow => InFlight::enter(counter),
            OverlapPolicy::Skip => match InFlight::enter_exclusive(counter) {
                Some(guard) => guard,
                None => {
                    info!(operation = %op, "previous run still in flight, skipping tick");
                    return;
                }
            },
        };

        let ops = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            ops.run_logged(op).await;
        });
    }

    /// Run from a timer. Failures are logged, never escalated.
    async fn run_logged(&self, op: Operation) {
        let outcome = match op {
            Operation::Sync => self.sync.run_full_sync().await.map(|_| ()),
            Operation::Backup => self.backup().await.map(|m| {
                info!(backup = %m.id, files = m.files.len(), "scheduled backup created");
            }),
            Operation::Health => self.health().await.map(|_| ()),
        };

        if let Err(e) = outcome {
            warn!(operation = %op, error = %e, "scheduled operation failed");
        }
    }
}

/// Owns the three timers.
///
/// Lifecycle: [`new`](Self::new) → [`initialize`](Self::initialize) →
/// [`start`](Self::start) → [`stop`](Self::stop).
pub struct Scheduler<B: SyncBackend + 'static, P: HealthProbe + 'static> {
    ops: Arc<Operations<B, P>>,
    schedule: Schedule,
    shutdown_tx: Option<watch::Sender<bool>>,
    timers: Vec<JoinHandle<()>>,
}

impl<B, P> Scheduler<B, P>
where
    B: SyncBackend + 'static,
    P: HealthProbe + 'static,
{
    pub fn new(
        sync: Arc<SyncOrchestrator<B>>,
        backups: BackupManager,
        health: HealthVerifier<P>,
        health_url: Option<String>,
        schedule: Schedule,
    ) -> Self {
        let ops = Operations {
            sync,
            backups,
            health,
            health_url,
            overlap: schedule.overlap,
            in_flight: Default::default(),
        };
        Self {
            ops: Arc::new(ops),
            schedule,
            shutdown_tx: None,
            timers: Vec::new(),
        }
    }

    /// Load persisted sync statistics.
    pub async fn initialize(&self) {
        self.ops.sync.initialize().await;
    }

    pub fn sync(&self) -> &Arc<SyncOrchestrator<B>> {
        &self.ops.sync
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Runs of `op` currently executing.
    pub fn in_flight(&self, op: Operation) -> usize {
        self.ops.counter(op).load(Ordering::SeqCst)
    }

    /// Start all timers. The sync timer also fires immediately.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(OrchestratorError::InvalidState(
                "scheduler already started".into(),
            ));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        for op in Operation::ALL {
            let period = self.schedule.period(op);
            let fire_immediately = op == Operation::Sync;
            self.timers.push(tokio::spawn(timer_loop(
                Arc::clone(&self.ops),
                op,
                period,
                fire_immediately,
                shutdown_rx.clone(),
            )));
        }
        self.shutdown_tx = Some(shutdown_tx);

        info!(
            sync_every_secs = self.schedule.sync_every.as_secs(),
            backup_every_secs = self.schedule.backup_every.as_secs(),
            health_every_secs = self.schedule.health_every.as_secs(),
            "scheduler started"
        );
        Ok(())
    }

    /// Run a sync now, regardless of timers.
    pub fn trigger_sync(&self) -> JoinHandle<Result<SyncReport>> {
        let guard = InFlight::enter(self.ops.counter(Operation::Sync));
        let ops = Arc::clone(&self.ops);
        tokio::spawn(async move {
            let _guard = guard;
            ops.sync.run_full_sync().await
        })
    }

    /// Take a backup now, regardless of timers.
    pub fn trigger_backup(&self) -> JoinHandle<Result<BackupManifest>> {
        let guard = InFlight::enter(self.ops.counter(Operation::Backup));
        let ops = Arc::clone(&self.ops);
        tokio::spawn(async move {
            let _guard = guard;
            ops.backup().await
        })
    }

    /// Probe the health target once, now.
    pub fn trigger_health(&self) -> JoinHandle<Result<Option<HealthReport>>> {
        let guard = InFlight::enter(self.ops.counter(Operation::Health));
        let ops = Arc::clone(&self.ops);
        tokio::spawn(async move {
            let _guard = guard;
            ops.health().await
        })
    }

    /// Cancel all timers and persist sync statistics.
    ///
    /// Runs already in flight are not cancelled.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        for timer in self.timers.drain(..) {
            if let Err(e) = timer.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "timer task ended abnormally");
                }
            }
        }

        self.ops.sync.persist_stats().await;
        info!("scheduler stopped");
    }
}

impl<B, P> Drop for Scheduler<B, P>
where
    B: SyncBackend + 'static,
    P: HealthProbe + 'static,
{
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }
}

async fn timer_loop<B, P>(
    ops: Arc<Operations<B, P>>,
    op: Operation,
    period: Duration,
    fire_immediately: bool,
    mut shutdown: watch::Receiver<bool>,
) where
    B: SyncBackend + 'static,
    P: HealthProbe + 'static,
{
    if period.is_zero() {
        debug!(operation = %op, "zero interval, firing once");
        ops.tick(op);
        return;
    }

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    if fire_immediately {
        ops.tick(op);
    }

    loop {
        tokio::select! {
            _ = ticker.tick() => ops.tick(op),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!(operation = %op, "timer shutdown");
                    break;
                }
            }
        }
    }
}
