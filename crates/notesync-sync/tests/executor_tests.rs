mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{path, rid, Harness};
use notesync_core::domain::{
    ConflictResolution, ConflictStatus, ConflictType, OperationType, SyncDirection, SyncOperation,
    SyncPath, SyncStatus,
};
use notesync_sync::{
    OperationError, OperationExecutor, OperationOutcome, PlainTextCodec, RetryPolicy,
};
use tokio_util::sync::CancellationToken;

fn executor(h: &Harness) -> OperationExecutor {
    OperationExecutor::new(
        h.fs.clone(),
        h.remote.clone(),
        h.store.clone(),
        Arc::new(PlainTextCodec::new()),
    )
    .with_retry_policy(RetryPolicy::none())
}

/// `count` pairings, each with an unsynced local edit, and their push operations
async fn local_edits(h: &Harness, count: usize) -> Vec<SyncOperation> {
    let mut operations = Vec::new();
    for i in 0..count {
        let local = format!("/notes/{i}.txt");
        let record = h.synced_pair(&local, &format!("R{i}"), b"v1").await;
        h.fs.put(&path(&local), b"v2", chrono::Utc::now());
        operations.push(SyncOperation::new(
            OperationType::Update,
            &record,
            SyncDirection::LocalToRemote,
            ConflictType::LocalNewer,
        ));
    }
    operations
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let h = Harness::new().await;
    let operations = local_edits(&h, 10).await;
    h.remote.set_write_delay(Duration::from_millis(20));
    let (ports, store) = h.watched_ports();

    let calls = Arc::new(AtomicUsize::new(0));
    let progress_calls = calls.clone();
    let executor = OperationExecutor::new(ports.local, ports.remote, ports.store, ports.codec)
        .with_retry_policy(RetryPolicy::none())
        .with_max_concurrent(3)
        .with_progress(Arc::new(move |done: usize, total: usize, _: &SyncPath| {
            assert!(done <= total);
            progress_calls.fetch_add(1, Ordering::SeqCst);
        }));

    let summary = executor
        .execute_all(operations, &CancellationToken::new())
        .await;

    assert_eq!(summary.total, 10);
    assert_eq!(summary.succeeded, 10);
    assert_eq!(calls.load(Ordering::SeqCst), 10);

    let syncing = store.max_syncing.load(Ordering::SeqCst);
    assert!((1..=3).contains(&syncing), "{syncing} records were syncing at once");
    let peak = h.remote.max_in_flight.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak in flight was {peak}");

    for i in 0..10 {
        let record = h.record(&format!("/notes/{i}.txt")).await;
        assert_eq!(record.sync_status, SyncStatus::Completed);
    }
}

#[tokio::test]
async fn test_cancelled_run_dispatches_nothing() {
    let h = Harness::new().await;
    let operations = local_edits(&h, 4).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = executor(&h).execute_all(operations, &cancel).await;

    assert_eq!(summary.cancelled, 4);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(h.remote.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_one_failure_does_not_stop_the_others() {
    let h = Harness::new().await;
    let operations = local_edits(&h, 3).await;
    h.remote
        .fail_next_write(notesync_core::ports::RemoteError::Rejected {
            status: 400,
            message: "validation_error".into(),
        });

    let summary = executor(&h)
        .with_max_concurrent(1)
        .execute_all(operations, &CancellationToken::new())
        .await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 2);
}

#[tokio::test]
async fn test_skip_leaves_conflict_pending() {
    let h = Harness::new().await;
    let record = h.synced_pair("/notes/a.txt", "A", b"v1").await;
    let operation = SyncOperation::new(
        OperationType::Update,
        &record,
        SyncDirection::Bidirectional,
        ConflictType::BothModified,
    )
    .with_resolution(ConflictResolution::Skip);

    let outcome = executor(&h).execute(operation).await;

    assert_eq!(outcome, OperationOutcome::Skipped);
    let record = h.record("/notes/a.txt").await;
    assert_eq!(record.sync_status, SyncStatus::Pending);
    assert_eq!(record.conflict_status, ConflictStatus::Detected);
    assert_eq!(h.remote.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_undecided_conflict_is_not_applied() {
    let h = Harness::new().await;
    let record = h.synced_pair("/notes/a.txt", "A", b"v1").await;
    let operation = SyncOperation::new(
        OperationType::Update,
        &record,
        SyncDirection::Bidirectional,
        ConflictType::BothModified,
    )
    .with_resolution(ConflictResolution::AskUser);

    let outcome = executor(&h).execute(operation).await;

    assert_eq!(
        outcome,
        OperationOutcome::Failed(OperationError::UnresolvedConflict(path("/notes/a.txt")))
    );
    assert_eq!(h.record("/notes/a.txt").await.sync_status, SyncStatus::Failed);
}

#[tokio::test]
async fn test_deleting_missing_remote_succeeds() {
    let h = Harness::new().await;
    let record = h.synced_pair("/notes/a.txt", "A", b"v1").await;
    h.fs.remove(&path("/notes/a.txt"));
    let operation = SyncOperation::new(
        OperationType::Delete,
        &record,
        SyncDirection::LocalToRemote,
        ConflictType::LocalDeleted,
    );

    executor(&h).execute(operation.clone()).await;
    assert!(!h.remote.contains(&rid("A")));

    // Already gone
    let outcome = executor(&h).execute(operation).await;
    assert_eq!(outcome, OperationOutcome::Succeeded);

    let record = h.record("/notes/a.txt").await;
    assert_eq!(record.local_checksum, None);
    assert_eq!(record.remote_checksum, None);
}

#[tokio::test]
async fn test_local_content_is_never_pushed_to_a_collection() {
    use notesync_core::domain::{NewSyncRecord, RemoteKind};
    use notesync_core::ports::IMetadataStore;

    let h = Harness::new().await;
    let record = h
        .store
        .create(NewSyncRecord::new(
            path("/notes/tasks.txt"),
            rid("DB1"),
            RemoteKind::Collection,
            SyncDirection::Bidirectional,
        ))
        .await
        .unwrap();
    h.fs.put(&path("/notes/tasks.txt"), b"todo", chrono::Utc::now());
    let operation = SyncOperation::new(
        OperationType::Update,
        &record,
        SyncDirection::LocalToRemote,
        ConflictType::LocalNewer,
    );

    let outcome = executor(&h).execute(operation).await;

    match outcome {
        OperationOutcome::Failed(OperationError::Permanent(message)) => {
            assert!(message.contains("collection DB1"), "{message}");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(h.remote.writes.load(Ordering::SeqCst), 0);
    let record = h.record("/notes/tasks.txt").await;
    assert_eq!(record.sync_status, SyncStatus::Failed);
}
