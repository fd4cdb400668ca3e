//! SyncRecord - the persisted pairing between a local file and a remote object
//!
//! A record carries the last known state of both sides. It is created when a
//! path is first paired with a remote ID and mutated after every execution
//! attempt through [`RecordUpdate`], which the metadata store applies inside
//! a per-record transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{Checksum, RemoteId, SyncPath};

text_enum! {
    /// Shape of the remote object a path is paired with
    pub enum RemoteKind: "remote kind" {
        /// A single page
        Item => "item",
        /// A database/collection of pages
        Collection => "collection",
    }
}

text_enum! {
    /// Which way content flows for a pairing or an operation
    pub enum SyncDirection: "sync direction" {
        LocalToRemote => "local_to_remote",
        RemoteToLocal => "remote_to_local",
        Bidirectional => "bidirectional",
    }
}

impl SyncDirection {
    /// Whether an operation flowing in `direction` is permitted on a pairing
    /// configured with `self`
    #[must_use]
    pub fn permits(&self, direction: SyncDirection) -> bool {
        match self {
            SyncDirection::Bidirectional => true,
            SyncDirection::LocalToRemote => direction == SyncDirection::LocalToRemote,
            SyncDirection::RemoteToLocal => direction == SyncDirection::RemoteToLocal,
        }
    }
}

text_enum! {
    /// Conflict bookkeeping on a record
    pub enum ConflictStatus: "conflict status" {
        None => "none",
        /// Both sides changed and no decision has been applied yet
        Detected => "detected",
        Resolved => "resolved",
    }
}

text_enum! {
    /// Outcome of the latest execution attempt on a record
    pub enum SyncStatus: "sync status" {
        Pending => "pending",
        Syncing => "syncing",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Persisted correspondence between one local path and one remote ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Unique key
    pub local_path: SyncPath,
    pub remote_id: RemoteId,
    pub remote_kind: RemoteKind,
    /// Parent under which the remote object is created when the pairing was
    /// made before the remote side existed
    pub remote_parent_id: Option<RemoteId>,
    pub sync_direction: SyncDirection,
    pub created_at: DateTime<Utc>,
    /// Store bookkeeping, never used for classification
    pub updated_at: DateTime<Utc>,
    /// `None` means never synced
    pub last_sync_time: Option<DateTime<Utc>>,
    pub local_checksum: Option<Checksum>,
    pub remote_checksum: Option<Checksum>,
    pub conflict_status: ConflictStatus,
    pub sync_status: SyncStatus,
    pub last_error: Option<String>,
    pub retry_count: u32,
}

impl SyncRecord {
    /// Build a fresh, never-synced record
    #[must_use]
    pub fn new(new: NewSyncRecord) -> Self {
        let now = Utc::now();
        Self {
            local_path: new.local_path,
            remote_id: new.remote_id,
            remote_kind: new.remote_kind,
            remote_parent_id: new.remote_parent_id,
            sync_direction: new.sync_direction,
            created_at: now,
            updated_at: now,
            last_sync_time: None,
            local_checksum: None,
            remote_checksum: None,
            conflict_status: ConflictStatus::None,
            sync_status: SyncStatus::Pending,
            last_error: None,
            retry_count: 0,
        }
    }

    /// True when the pairing has never completed a synchronization
    #[must_use]
    pub fn is_never_synced(&self) -> bool {
        self.last_sync_time.is_none()
    }

    /// Apply field updates in place and stamp `updated_at`
    ///
    /// A `last_sync_time` older than the current one is ignored, so the
    /// checkpoint never moves backwards.
    pub fn apply(&mut self, update: &RecordUpdate, now: DateTime<Utc>) {
        if let Some(remote_id) = &update.remote_id {
            self.remote_id = remote_id.clone();
        }
        if let Some(t) = update.last_sync_time {
            match self.last_sync_time {
                Some(current) if t < current => {}
                _ => self.last_sync_time = Some(t),
            }
        }
        if let Some(sum) = &update.local_checksum {
            self.local_checksum = sum.clone();
        }
        if let Some(sum) = &update.remote_checksum {
            self.remote_checksum = sum.clone();
        }
        if let Some(status) = update.conflict_status {
            self.conflict_status = status;
        }
        if let Some(status) = update.sync_status {
            self.sync_status = status;
        }
        if let Some(err) = &update.last_error {
            self.last_error = err.clone();
        }
        match update.retry_count {
            Some(RetryCount::Reset) => self.retry_count = 0,
            Some(RetryCount::Increment) => self.retry_count = self.retry_count.saturating_add(1),
            None => {}
        }
        self.updated_at = now;
    }
}

/// Input for creating a pairing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSyncRecord {
    pub local_path: SyncPath,
    pub remote_id: RemoteId,
    pub remote_kind: RemoteKind,
    pub sync_direction: SyncDirection,
    pub remote_parent_id: Option<RemoteId>,
}

impl NewSyncRecord {
    #[must_use]
    pub fn new(
        local_path: SyncPath,
        remote_id: RemoteId,
        remote_kind: RemoteKind,
        sync_direction: SyncDirection,
    ) -> Self {
        Self {
            local_path,
            remote_id,
            remote_kind,
            sync_direction,
            remote_parent_id: None,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: RemoteId) -> Self {
        self.remote_parent_id = Some(parent);
        self
    }
}

/// How an update changes `retry_count`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCount {
    Reset,
    Increment,
}

/// A set of field updates applied atomically to one record
///
/// `None` leaves a field untouched. Nullable fields use a nested `Option`
/// so that they can be cleared explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    pub remote_id: Option<RemoteId>,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub local_checksum: Option<Option<Checksum>>,
    pub remote_checksum: Option<Option<Checksum>>,
    pub conflict_status: Option<ConflictStatus>,
    pub sync_status: Option<SyncStatus>,
    pub last_error: Option<Option<String>>,
    pub retry_count: Option<RetryCount>,
}

impl RecordUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub fn remote_id(mut self, id: RemoteId) -> Self {
        self.remote_id = Some(id);
        self
    }

    #[must_use]
    pub fn synced_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_sync_time = Some(at);
        self
    }

    #[must_use]
    pub fn local_checksum(mut self, sum: Option<Checksum>) -> Self {
        self.local_checksum = Some(sum);
        self
    }

    #[must_use]
    pub fn remote_checksum(mut self, sum: Option<Checksum>) -> Self {
        self.remote_checksum = Some(sum);
        self
    }

    #[must_use]
    pub fn conflict_status(mut self, status: ConflictStatus) -> Self {
        self.conflict_status = Some(status);
        self
    }

    #[must_use]
    pub fn sync_status(mut self, status: SyncStatus) -> Self {
        self.sync_status = Some(status);
        self
    }

    #[must_use]
    pub fn last_error(mut self, error: impl Into<String>) -> Self {
        self.last_error = Some(Some(error.into()));
        self
    }

    #[must_use]
    pub fn clear_error(mut self) -> Self {
        self.last_error = Some(None);
        self
    }

    #[must_use]
    pub fn retry_count(mut self, change: RetryCount) -> Self {
        self.retry_count = Some(change);
        self
    }
}
