//! Batch scheduler implementation.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::lock::{LockError, ProcessLock};
use crate::pipeline::{PipelineConfig, PipelineDeps, PipelineError, RegistrationProcessor};
use crate::registration::{query_source, PersistenceError};

use super::config::SchedulerConfig;
use super::error::SchedulerError;
use super::types::{BatchReport, RunOutcome, SchedulerState};

/// Requests a graceful stop of a running scheduler.
#[derive(Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    /// Stops the loop after the current stage. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Shutdown requested");
            let _ = self.shutdown_tx.send(());
        }
    }

    pub fn is_shutdown(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }
}

/// Drives batches of registrations through the pipeline.
pub struct BatchScheduler {
    config: SchedulerConfig,
    pipeline_config: PipelineConfig,
    lock: Arc<Mutex<ProcessLock>>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    state_tx: watch::Sender<SchedulerState>,
}

impl BatchScheduler {
    pub fn new(config: SchedulerConfig, pipeline_config: PipelineConfig, lock: ProcessLock) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (state_tx, _) = watch::channel(SchedulerState::Idle);
        Self {
            config,
            pipeline_config,
            lock: Arc::new(Mutex::new(lock)),
            running: Arc::new(AtomicBool::new(true)),
            shutdown_tx,
            state_tx,
        }
    }

    /// Handle for stopping the scheduler from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            running: Arc::clone(&self.running),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state_tx.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: SchedulerState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Scheduler state changed");
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProcessLock> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh_lock(&self) {
        refresh_or_stop(&self.lock, &self.shutdown_handle());
    }

    /// Refreshes the lock on a timer, independent of how long a single
    /// registration takes.
    fn spawn_heartbeat(&self) -> JoinHandle<()> {
        let lock = Arc::clone(&self.lock);
        let shutdown = self.shutdown_handle();
        let period = self.lock().config().heartbeat_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if shutdown.is_shutdown() {
                    break;
                }
                refresh_or_stop(&lock, &shutdown);
            }
        })
    }

    /// Runs the scheduler until shutdown.
    ///
    /// The lock is acquired before `init` is called, so a second instance
    /// returns [`RunOutcome::LockHeld`] without touching the database or any
    /// other dependency. While running, a heartbeat task keeps the lock
    /// fresh; if another instance takes the lock over, the loop stops and
    /// returns [`RunOutcome::LockLost`].
    pub async fn run<F, Fut>(&mut self, init: F) -> Result<RunOutcome, SchedulerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PipelineDeps, SchedulerError>>,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.set_state(SchedulerState::Idle);

        let lock_path = self.lock().path().to_path_buf();
        if !self.lock().try_acquire()? {
            info!(
                lock = %lock_path.display(),
                "Another instance holds the lock, exiting"
            );
            return Ok(RunOutcome::LockHeld);
        }
        self.set_state(SchedulerState::LockAcquired);
        info!(lock = %lock_path.display(), "Lock acquired");
        let heartbeat = self.spawn_heartbeat();

        let deps = match init().await {
            Ok(deps) => deps,
            Err(e) => {
                heartbeat.abort();
                self.set_state(SchedulerState::ShuttingDown);
                self.release_lock();
                return Err(e);
            }
        };
        let processor =
            RegistrationProcessor::new(self.pipeline_config.clone(), deps, Arc::clone(&self.running));

        info!(interval_secs = self.config.interval_secs, "Scheduler started");
        while self.running.load(Ordering::SeqCst) {
            self.set_state(SchedulerState::Polling);
            self.refresh_lock();

            if let Err(e) = self.run_batch(&processor).await {
                error!(error = %e, "Batch failed");
            }

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            self.set_state(SchedulerState::Sleeping);
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Woken by shutdown signal");
                }
                _ = tokio::time::sleep(self.config.interval()) => {}
            }
        }

        heartbeat.abort();
        self.set_state(SchedulerState::ShuttingDown);
        processor.deps().source.close();

        let lost = !self.lock().is_held();
        self.release_lock();
        if lost {
            warn!(lock = %lock_path.display(), "Scheduler stopped after losing the lock");
            return Ok(RunOutcome::LockLost);
        }
        info!("Scheduler stopped");
        Ok(RunOutcome::Stopped)
    }

    fn release_lock(&self) {
        if let Err(e) = self.lock().release() {
            error!(error = %e, "Failed to release lock");
        }
    }

    /// Lists eligible registrations and processes them in order.
    ///
    /// A failing registration is logged and the batch moves on.
    pub async fn run_batch(
        &mut self,
        processor: &RegistrationProcessor,
    ) -> Result<BatchReport, SchedulerError> {
        let batch_id = Uuid::new_v4();
        let span = info_span!("batch", batch_id = %batch_id);
        self.process_batch(batch_id, processor).instrument(span).await
    }

    async fn process_batch(
        &mut self,
        batch_id: Uuid,
        processor: &RegistrationProcessor,
    ) -> Result<BatchReport, SchedulerError> {
        let mut report = BatchReport::new(batch_id);

        let keys = query_source(&processor.deps().source, |source| source.list_eligible()).await?;
        report.eligible = keys.len();
        if keys.is_empty() {
            debug!("No eligible registrations");
            return Ok(report);
        }

        self.set_state(SchedulerState::ProcessingBatch);
        info!(count = keys.len(), "Processing batch");

        for key in &keys {
            if !self.running.load(Ordering::SeqCst) {
                info!(remaining = report.unprocessed(), "Shutdown requested, stopping batch");
                break;
            }

            match processor.process(key).await {
                Ok(outcome) => {
                    report.succeeded += 1;
                    if outcome.delivery.is_failed() {
                        report.delivery_failures += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    log_failure(key, &e);
                }
            }

            self.refresh_lock();
        }

        info!(
            eligible = report.eligible,
            succeeded = report.succeeded,
            failed = report.failed,
            delivery_failures = report.delivery_failures,
            "Batch finished"
        );
        Ok(report)
    }
}

/// Refreshes the lock heartbeat. Losing the lock stops the scheduler.
fn refresh_or_stop(lock: &Mutex<ProcessLock>, shutdown: &ShutdownHandle) {
    let result = lock
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .refresh();
    match result {
        Ok(()) => {}
        Err(e @ LockError::Lost { .. }) => {
            error!(error = %e, "Lock taken over by another instance, stopping");
            shutdown.shutdown();
        }
        Err(e) => warn!(error = %e, "Failed to refresh lock heartbeat"),
    }
}

fn log_failure(key: &str, e: &PipelineError) {
    match e {
        PipelineError::Interrupted(stage) => {
            info!(reg_key = %key, stage = %stage, "Registration interrupted by shutdown");
        }
        PipelineError::NothingToGenerate => {
            warn!(reg_key = %key, stage = %e.stage(), "Registration has no reports to generate");
        }
        PipelineError::Persistence(PersistenceError::Timeout { timeout_secs }) => {
            error!(
                reg_key = %key,
                stage = %e.stage(),
                timeout_secs,
                "Flag update timed out and was cancelled; unless it was applied first, \
                 the registration will be delivered again"
            );
        }
        e if e.risks_duplicate_delivery() => {
            error!(
                reg_key = %key,
                stage = %e.stage(),
                error = %e,
                "Registration delivered but not marked processed; it will be delivered again"
            );
        }
        e => {
            warn!(reg_key = %key, stage = %e.stage(), error = %e, "Registration failed");
        }
    }
}
