//! Synchronization engine
//!
//! The [`SyncEngine`] drives one run through its stages:
//!
//! 1. **Collecting**: check the remote connection, list every record
//! 2. **Classifying**: observe both sides of each record and classify it
//! 3. **Resolving**: map classifications to operations, settling conflicts
//! 4. **Executing**: run the operations with bounded concurrency
//!
//! and back to `Idle`, or to `Failed` when the connection check or the record
//! listing fails. Classification is sequential; only execution is
//! concurrent. A second `run` while one is active is rejected with
//! [`SyncError::AlreadyRunning`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use notesync_conflict::{ChangeClassifier, ConflictResolver};
use notesync_core::config::Config;
use notesync_core::domain::{
    ConflictStatus, ConflictSummary, ConflictType, RecordUpdate, RetryCount, SyncOperation,
    SyncPath, SyncRecord, SyncStatus,
};
use notesync_core::ports::{
    IConflictDecider, IContentCodec, ILocalFileSystem, IMetadataStore, IRemoteStore, RunState,
    RunStatistics, StoreError, SyncEvent,
};

use crate::error::{OperationError, SyncError};
use crate::executor::{ExecutionSummary, OperationExecutor};
use crate::retry::RetryPolicy;

/// Buffered events per subscriber before the slowest one starts lagging
const EVENT_CAPACITY: usize = 256;

/// Outcome of one completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub statistics: RunStatistics,
    pub execution: ExecutionSummary,
    /// Records that failed before an operation was built; they count as failed
    pub classification_failures: usize,
    /// Records that needed no work
    pub unchanged: usize,
    pub duration_ms: u64,
}

impl RunReport {
    #[must_use]
    pub fn success(&self) -> bool {
        self.statistics.failed == 0
    }
}

/// Ports the engine drives
pub struct EnginePorts {
    pub store: Arc<dyn IMetadataStore>,
    pub local: Arc<dyn ILocalFileSystem>,
    /// Usually the cached accessor
    pub remote: Arc<dyn IRemoteStore>,
    pub codec: Arc<dyn IContentCodec>,
}

pub struct SyncEngine {
    store: Arc<dyn IMetadataStore>,
    remote: Arc<dyn IRemoteStore>,
    classifier: ChangeClassifier,
    resolver: ConflictResolver,
    executor: OperationExecutor,
    events: broadcast::Sender<SyncEvent>,
    state: watch::Sender<RunState>,
    run_lock: tokio::sync::Mutex<()>,
    cancel: Mutex<CancellationToken>,
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done * 100) / total).min(100) as u8
}

impl SyncEngine {
    pub fn new(ports: EnginePorts, config: &Config) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state, _) = watch::channel(RunState::Idle);

        let progress_events = events.clone();
        let executor = OperationExecutor::new(
            ports.local.clone(),
            ports.remote.clone(),
            ports.store.clone(),
            ports.codec,
        )
        .with_max_concurrent(config.sync.max_concurrent_operations)
        .with_retry_policy(RetryPolicy::from(&config.retry))
        .with_progress(Arc::new(move |done: usize, total: usize, path: &SyncPath| {
            // No subscribers is fine
            let _ = progress_events.send(SyncEvent::SyncProgress {
                percent: percent(done, total),
                message: path.to_string(),
            });
        }));

        Self {
            store: ports.store,
            remote: ports.remote.clone(),
            classifier: ChangeClassifier::new(
                ports.local,
                ports.remote,
                config.sync.change_detection,
            ),
            resolver: ConflictResolver::from_config(&config.conflicts),
            executor,
            events,
            state,
            run_lock: tokio::sync::Mutex::new(()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Route true conflicts through `decider` before the policy applies
    #[must_use]
    pub fn with_decider(mut self, decider: Arc<dyn IConflictDecider>) -> Self {
        self.resolver = self.resolver.with_decider(decider);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Watch the run state as it changes
    pub fn watch_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Stop dispatching operations in the current run
    ///
    /// Operations already in flight finish normally.
    pub fn cancel(&self) {
        let token = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        info!("Cancelling synchronization run");
        token.cancel();
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }

    fn set_state(&self, state: RunState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Run state changed");
            self.emit(SyncEvent::StateChanged { state });
        }
    }

    /// Run one full synchronization pass
    ///
    /// # Errors
    /// - `SyncError::AlreadyRunning` if a run is in progress
    /// - `SyncError::RemoteUnavailable` if the connection check fails
    /// - `SyncError::Store` if records cannot be listed
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<RunReport, SyncError> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            warn!("Synchronization already running, start rejected");
            return Err(SyncError::AlreadyRunning);
        };

        let cancel = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = cancel.clone();

        let started = Instant::now();
        info!("Starting synchronization run");
        self.emit(SyncEvent::SyncStarted);

        match self.run_stages(&cancel, started).await {
            Ok(report) => {
                self.set_state(RunState::Idle);
                info!(
                    total = report.statistics.total,
                    completed = report.statistics.completed,
                    failed = report.statistics.failed,
                    pending = report.statistics.pending,
                    duration_ms = report.duration_ms,
                    "Synchronization run finished"
                );
                self.emit(SyncEvent::SyncFinished {
                    success: report.success(),
                    statistics: report.statistics,
                });
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Synchronization run failed");
                self.set_state(RunState::Failed);
                self.emit(SyncEvent::SyncFinished {
                    success: false,
                    statistics: RunStatistics::default(),
                });
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<RunReport, SyncError> {
        self.set_state(RunState::Collecting);
        self.remote
            .check_connection()
            .await
            .map_err(SyncError::RemoteUnavailable)?;
        let records = self.store.list_all().await?;
        debug!(records = records.len(), "Records collected");

        self.set_state(RunState::Classifying);
        let mut classified = Vec::with_capacity(records.len());
        let mut classification_failures = 0;
        for record in records {
            if cancel.is_cancelled() {
                break;
            }
            match self.classifier.classify(&record).await {
                Ok((classification, observation)) => {
                    classified.push((record, classification, observation));
                }
                Err(e) => {
                    classification_failures += 1;
                    self.record_failure(&record, &OperationError::from(e)).await;
                }
            }
        }

        self.set_state(RunState::Resolving);
        let mut operations: Vec<SyncOperation> = Vec::new();
        let mut unchanged = 0;
        for (record, classification, observation) in classified {
            if classification == ConflictType::BothModified {
                if let Err(e) = self.mark_conflict(&record).await {
                    classification_failures += 1;
                    self.record_failure(&record, &OperationError::from(e)).await;
                    continue;
                }
                self.emit(SyncEvent::ConflictDetected(ConflictSummary::new(
                    &record,
                    &observation,
                )));
            }
            match self
                .resolver
                .resolve(classification, &record, &observation)
                .await
            {
                Some(operation) => operations.push(operation),
                None => unchanged += 1,
            }
        }

        self.set_state(RunState::Executing);
        let execution = self.executor.execute_all(operations, cancel).await;

        let statistics = RunStatistics {
            total: execution.total + classification_failures,
            pending: execution.skipped + execution.cancelled,
            in_progress: 0,
            completed: execution.succeeded,
            failed: execution.failed + classification_failures,
        };

        Ok(RunReport {
            statistics,
            execution,
            classification_failures,
            unchanged,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn mark_conflict(&self, record: &SyncRecord) -> Result<(), StoreError> {
        if record.conflict_status != ConflictStatus::Detected {
            self.store
                .update(
                    &record.local_path,
                    RecordUpdate::new().conflict_status(ConflictStatus::Detected),
                )
                .await?;
        }
        info!(path = %record.local_path, "Conflict detected");
        Ok(())
    }

    async fn record_failure(&self, record: &SyncRecord, err: &OperationError) {
        warn!(path = %record.local_path, error = %err, "Record could not be prepared for sync");
        let update = RecordUpdate::new()
            .sync_status(SyncStatus::Failed)
            .last_error(err.to_string())
            .retry_count(RetryCount::Increment);
        if let Err(e) = self.store.update(&record.local_path, update).await {
            error!(path = %record.local_path, error = %e, "Failed to record preparation failure");
        }
    }

    /// Run repeatedly every `interval` until `shutdown` is cancelled
    ///
    /// A failed run is logged and retried at the next tick.
    pub async fn run_periodically(&self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Periodic synchronization stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run().await {
                        warn!(error = %e, "Periodic synchronization run failed");
                    }
                }
            }
        }
    }
}
