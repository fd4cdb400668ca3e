//! Operation executor
//!
//! Runs a batch of [`SyncOperation`]s with at most `max_concurrent` in
//! flight. A semaphore permit is acquired before each task is spawned, so
//! dispatch itself waits for a free slot and cancellation is checked between
//! dispatches. Operations already running always finish.
//!
//! Per operation the record moves `syncing` → `completed` | `failed`
//! (`pending` for a skipped conflict), and one history row is written.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use notesync_conflict::ConflictNamer;
use notesync_core::domain::{
    Checksum, ConflictResolution, ConflictStatus, OperationType, RecordUpdate, RemoteId,
    RemoteKind, RetryCount, SyncDirection, SyncHistoryEntry, SyncOperation, SyncPath, SyncRecord,
    SyncStatus,
};
use notesync_core::ports::{
    IContentCodec, ILocalFileSystem, IMetadataStore, IRemoteStore, RemoteContent, RemoteError,
};

use crate::error::OperationError;
use crate::retry::{with_retry, RetryPolicy};

/// Default number of operations in flight
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

/// Called after every finished operation with `(completed, total, path)`
pub type ProgressCallback = Arc<dyn Fn(usize, usize, &SyncPath) + Send + Sync>;

/// Counts for one [`OperationExecutor::execute_all`] call
///
/// `succeeded + failed + skipped + cancelled == total`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Conflicts left alone by a `skip` resolution
    pub skipped: usize,
    /// Never dispatched because the run was cancelled
    pub cancelled: usize,
}

/// How one operation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Succeeded,
    Skipped,
    Failed(OperationError),
}

/// Side effects applied, described as the record fields they settle
enum Applied {
    Synced(RecordUpdate),
    Skipped,
}

/// Executes operations against the local filesystem and the remote store
#[derive(Clone)]
pub struct OperationExecutor {
    local: Arc<dyn ILocalFileSystem>,
    remote: Arc<dyn IRemoteStore>,
    store: Arc<dyn IMetadataStore>,
    codec: Arc<dyn IContentCodec>,
    max_concurrent: usize,
    retry: RetryPolicy,
    progress: Option<ProgressCallback>,
}

impl OperationExecutor {
    pub fn new(
        local: Arc<dyn ILocalFileSystem>,
        remote: Arc<dyn IRemoteStore>,
        store: Arc<dyn IMetadataStore>,
        codec: Arc<dyn IContentCodec>,
    ) -> Self {
        Self {
            local,
            remote,
            store,
            codec,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            retry: RetryPolicy::default(),
            progress: None,
        }
    }

    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Execute `operations` concurrently, isolating failures per operation
    #[instrument(skip(self, operations, cancel), fields(total = operations.len()))]
    pub async fn execute_all(
        &self,
        operations: Vec<SyncOperation>,
        cancel: &CancellationToken,
    ) -> ExecutionSummary {
        let total = operations.len();
        let mut summary = ExecutionSummary {
            total,
            ..ExecutionSummary::default()
        };
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let completed = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();

        for operation in operations {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                debug!(path = %operation.local_path, "Not dispatched, run cancelled");
                summary.cancelled += 1;
                continue;
            };

            let executor = self.clone();
            let completed = completed.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let path = operation.local_path.clone();
                let outcome = executor.execute(operation).await;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(progress) = &executor.progress {
                    progress(done, total, &path);
                }
                outcome
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(OperationOutcome::Succeeded) => summary.succeeded += 1,
                Ok(OperationOutcome::Skipped) => summary.skipped += 1,
                Ok(OperationOutcome::Failed(_)) => summary.failed += 1,
                Err(e) => {
                    error!(error = %e, "Operation task panicked");
                    summary.failed += 1;
                }
            }
        }

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "Operations executed"
        );
        summary
    }

    /// Execute one operation and record its outcome
    #[instrument(skip(self, operation), fields(
        path = %operation.local_path,
        op = %operation.operation_type,
        direction = %operation.direction,
    ))]
    pub async fn execute(&self, mut operation: SyncOperation) -> OperationOutcome {
        let started_at = Utc::now();
        operation.mark_in_progress();

        let result = match self
            .store
            .update(
                &operation.local_path,
                RecordUpdate::new().sync_status(SyncStatus::Syncing),
            )
            .await
        {
            Ok(record) => self.apply(&operation, &record).await,
            Err(e) => Err(e.into()),
        };

        let outcome = match result {
            Ok(Applied::Synced(update)) => {
                let update = update
                    .sync_status(SyncStatus::Completed)
                    .clear_error()
                    .retry_count(RetryCount::Reset);
                match self.store.update(&operation.local_path, update).await {
                    Ok(_) => OperationOutcome::Succeeded,
                    Err(e) => OperationOutcome::Failed(e.into()),
                }
            }
            Ok(Applied::Skipped) => {
                let update = RecordUpdate::new()
                    .sync_status(SyncStatus::Pending)
                    .conflict_status(ConflictStatus::Detected);
                match self.store.update(&operation.local_path, update).await {
                    Ok(_) => OperationOutcome::Skipped,
                    Err(e) => OperationOutcome::Failed(e.into()),
                }
            }
            Err(e) => OperationOutcome::Failed(e),
        };

        if let OperationOutcome::Failed(e) = &outcome {
            operation.mark_failed(e.to_string());
            warn!(error = %e, "Operation failed");
            let update = RecordUpdate::new()
                .sync_status(SyncStatus::Failed)
                .last_error(e.to_string())
                .retry_count(RetryCount::Increment);
            if let Err(store_err) = self.store.update(&operation.local_path, update).await {
                error!(error = %store_err, "Failed to record operation failure");
            }
        } else {
            operation.mark_completed();
            debug!(outcome = ?outcome, "Operation finished");
        }

        let entry = SyncHistoryEntry {
            local_path: operation.local_path.clone(),
            operation_type: operation.operation_type,
            direction: operation.direction,
            conflict_type: operation.conflict_type,
            resolution: operation.resolution,
            started_at,
            completed_at: Utc::now(),
            success: !matches!(outcome, OperationOutcome::Failed(_)),
            error_message: operation.error_message.clone(),
        };
        if let Err(e) = self.store.record_history(&entry).await {
            warn!(error = %e, "Failed to write sync history");
        }

        outcome
    }

    async fn apply(
        &self,
        operation: &SyncOperation,
        record: &SyncRecord,
    ) -> Result<Applied, OperationError> {
        if operation.conflict_type.is_true_conflict() {
            let resolution = operation
                .resolution
                .filter(ConflictResolution::is_decided)
                .ok_or_else(|| OperationError::UnresolvedConflict(operation.local_path.clone()))?;
            let resolved = RecordUpdate::new().conflict_status(ConflictStatus::Resolved);
            return match resolution {
                ConflictResolution::LocalWins => {
                    self.push(record, OperationType::Update, resolved).await
                }
                ConflictResolution::RemoteWins => self.pull(record, resolved).await,
                ConflictResolution::CreateBoth => self.create_both(record).await,
                ConflictResolution::Skip => {
                    info!(path = %record.local_path, "Conflict skipped");
                    Ok(Applied::Skipped)
                }
                ConflictResolution::AskUser => {
                    Err(OperationError::UnresolvedConflict(operation.local_path.clone()))
                }
            };
        }

        // A later plain change settles a conflict that an earlier run skipped
        let base = if record.conflict_status == ConflictStatus::Detected {
            RecordUpdate::new().conflict_status(ConflictStatus::Resolved)
        } else {
            RecordUpdate::new()
        };

        match (operation.operation_type, operation.direction) {
            (op @ (OperationType::Create | OperationType::Update), SyncDirection::LocalToRemote) => {
                self.push(record, op, base).await
            }
            (OperationType::Create | OperationType::Update, SyncDirection::RemoteToLocal) => {
                self.pull(record, base).await
            }
            (OperationType::Delete, SyncDirection::LocalToRemote) => {
                self.delete_remote(record, base).await
            }
            (OperationType::Delete, SyncDirection::RemoteToLocal) => {
                self.delete_local(record, base).await
            }
            (_, SyncDirection::Bidirectional) => Err(OperationError::permanent(
                "Bidirectional operation without a conflict to resolve",
            )),
        }
    }

    async fn read_local(&self, path: &SyncPath) -> Result<Vec<u8>, OperationError> {
        with_retry(&self.retry, "read_file", || async move {
            self.local.read_file(path).await.map_err(OperationError::from)
        })
        .await
    }

    async fn fetch_remote(&self, id: &RemoteId) -> Result<RemoteContent, OperationError> {
        with_retry(&self.retry, "fetch_content", || async move {
            self.remote.fetch_content(id).await.map_err(OperationError::from)
        })
        .await
    }

    async fn push_content(
        &self,
        parent: Option<&RemoteId>,
        existing: Option<&RemoteId>,
        content: &RemoteContent,
    ) -> Result<RemoteId, OperationError> {
        with_retry(&self.retry, "create_or_update", || async move {
            self.remote
                .create_or_update(parent, existing, content)
                .await
                .map_err(OperationError::from)
        })
        .await
    }

    /// Local bytes → remote object
    async fn push(
        &self,
        record: &SyncRecord,
        operation_type: OperationType,
        update: RecordUpdate,
    ) -> Result<Applied, OperationError> {
        let path = &record.local_path;
        // Collections have no body of their own and are never created here
        if record.remote_kind == RemoteKind::Collection {
            return Err(OperationError::permanent(format!(
                "Cannot push {path} to collection {}: only items accept local content",
                record.remote_id
            )));
        }
        let bytes = self.read_local(path).await?;
        let content = self.codec.encode(path, &bytes);

        let creating = operation_type == OperationType::Create || record.remote_id.is_pending();
        let (parent, existing) = if creating {
            let parent = record.remote_parent_id.as_ref().ok_or_else(|| {
                OperationError::permanent(format!(
                    "Cannot create remote object for {path}: pairing has no remote parent"
                ))
            })?;
            (Some(parent), None)
        } else {
            (None, Some(&record.remote_id))
        };

        let id = self.push_content(parent, existing, &content).await?;
        info!(path = %path, remote_id = %id, created = creating, "Pushed local content");

        let mut update = update
            .synced_at(Utc::now())
            .local_checksum(Some(Checksum::of_bytes(&bytes)))
            .remote_checksum(Some(content.checksum()));
        if id != record.remote_id {
            update = update.remote_id(id);
        }
        Ok(Applied::Synced(update))
    }

    /// Remote object → local bytes
    async fn pull(
        &self,
        record: &SyncRecord,
        update: RecordUpdate,
    ) -> Result<Applied, OperationError> {
        let path = &record.local_path;
        let content = self.fetch_remote(&record.remote_id).await?;
        let bytes = self.codec.decode(&content);

        let data = bytes.as_slice();
        with_retry(&self.retry, "write_file", || async move {
            self.local
                .write_file(path, data)
                .await
                .map_err(OperationError::from)
        })
        .await?;
        info!(path = %path, remote_id = %record.remote_id, bytes = bytes.len(), "Pulled remote content");

        Ok(Applied::Synced(
            update
                .synced_at(Utc::now())
                .local_checksum(Some(Checksum::of_bytes(&bytes)))
                .remote_checksum(Some(content.checksum())),
        ))
    }

    async fn delete_remote(
        &self,
        record: &SyncRecord,
        update: RecordUpdate,
    ) -> Result<Applied, OperationError> {
        let id = &record.remote_id;
        if !id.is_pending() {
            with_retry(&self.retry, "delete_remote", || async move {
                match self.remote.delete(id).await {
                    Ok(()) | Err(RemoteError::NotFound(_)) => Ok(()),
                    Err(e) => Err(OperationError::from(e)),
                }
            })
            .await?;
        }
        info!(path = %record.local_path, remote_id = %id, "Deleted remote object");
        Ok(Applied::Synced(cleared(update)))
    }

    async fn delete_local(
        &self,
        record: &SyncRecord,
        update: RecordUpdate,
    ) -> Result<Applied, OperationError> {
        let path = &record.local_path;
        with_retry(&self.retry, "delete_file", || async move {
            match self.local.delete_file(path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(OperationError::from(e)),
            }
        })
        .await?;
        info!(path = %path, "Deleted local file");
        Ok(Applied::Synced(cleared(update)))
    }

    /// Keep both versions: the remote content is written next to the local
    /// file under a local-copy name, the local content is created next to
    /// the remote object under a remote-copy title. Neither original changes.
    async fn create_both(&self, record: &SyncRecord) -> Result<Applied, OperationError> {
        let path = &record.local_path;
        let local_bytes = self.read_local(path).await?;
        let remote_content = self.fetch_remote(&record.remote_id).await?;

        // Remote side first: without a parent nothing is written anywhere
        let id = &record.remote_id;
        let metadata = with_retry(&self.retry, "get_metadata", || async move {
            self.remote.get_metadata(id).await.map_err(OperationError::from)
        })
        .await?;
        let parent = metadata
            .and_then(|m| m.parent_id)
            .or_else(|| record.remote_parent_id.clone())
            .ok_or_else(|| {
                OperationError::permanent(format!(
                    "Cannot keep both versions of {path}: remote parent unknown"
                ))
            })?;

        let parent_ref = &parent;
        let siblings = with_retry(&self.retry, "list_children", || async move {
            self.remote
                .list_children(parent_ref)
                .await
                .map_err(OperationError::from)
        })
        .await?;
        let local_content = self.codec.encode(path, &local_bytes);
        let title = ConflictNamer::unique_remote_copy(&local_content.title, |candidate| {
            siblings.iter().any(|s| s.title == candidate)
        });
        let remote_copy = RemoteContent::new(title, local_content.body);
        let copy_id = self.push_content(Some(&parent), None, &remote_copy).await?;

        let file_name = path.file_name().unwrap_or("untitled");
        let mut local_copy = None;
        for name in ConflictNamer::local_candidates(file_name) {
            let candidate = path.with_file_name(&name)?;
            if !self.local.exists(&candidate).await? {
                local_copy = Some(candidate);
                break;
            }
        }
        let local_copy = local_copy.ok_or_else(|| {
            OperationError::permanent(format!("No free duplicate name next to {path}"))
        })?;
        let copy_bytes = self.codec.decode(&remote_content);
        let (target, data) = (&local_copy, copy_bytes.as_slice());
        with_retry(&self.retry, "write_file", || async move {
            self.local
                .write_file(target, data)
                .await
                .map_err(OperationError::from)
        })
        .await?;

        info!(
            path = %path,
            local_copy = %local_copy,
            remote_copy = %copy_id,
            "Kept both versions"
        );

        Ok(Applied::Synced(
            RecordUpdate::new()
                .conflict_status(ConflictStatus::Resolved)
                .synced_at(Utc::now())
                .local_checksum(Some(Checksum::of_bytes(&local_bytes)))
                .remote_checksum(Some(remote_content.checksum())),
        ))
    }
}

/// Both sides are gone after a delete
fn cleared(update: RecordUpdate) -> RecordUpdate {
    update
        .synced_at(Utc::now())
        .local_checksum(None)
        .remote_checksum(None)
}
