//! Metadata store port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Unlike the other ports this one returns a typed error: duplicate paths
//!   and missing records are usage errors the caller must see, distinct from
//!   backend failures.
//! - Every write is applied to exactly one record inside its own
//!   transaction; readers never observe a partially applied update.

use thiserror::Error;

use crate::domain::{
    NewSyncRecord, RecordUpdate, RemoteId, SyncHistoryEntry, SyncPath, SyncRecord,
};

/// Errors raised by the metadata store
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record is paired with this path
    #[error("No sync record for {0}")]
    NotFound(SyncPath),

    /// A record is already paired with this path
    #[error("A sync record already exists for {0}")]
    DuplicatePath(SyncPath),

    /// A stored row could not be decoded into a record
    #[error("Corrupt sync record: {0}")]
    Corrupt(String),

    /// The storage backend failed
    #[error("Metadata store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Integrity errors are caller mistakes rather than storage failures
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::DuplicatePath(_))
    }
}

/// Durable table of sync records plus their execution history
#[async_trait::async_trait]
pub trait IMetadataStore: Send + Sync {
    async fn get(&self, local_path: &SyncPath) -> Result<Option<SyncRecord>, StoreError>;

    async fn get_by_remote_id(&self, remote_id: &RemoteId)
        -> Result<Option<SyncRecord>, StoreError>;

    /// Every record, ordered by local path
    async fn list_all(&self) -> Result<Vec<SyncRecord>, StoreError>;

    /// Pair a path with a remote object
    ///
    /// # Errors
    /// `StoreError::DuplicatePath` if the path is already paired
    async fn create(&self, new: NewSyncRecord) -> Result<SyncRecord, StoreError>;

    /// Apply `update` to the record at `local_path` and return the result
    ///
    /// # Errors
    /// `StoreError::NotFound` if no record exists for the path
    async fn update(
        &self,
        local_path: &SyncPath,
        update: RecordUpdate,
    ) -> Result<SyncRecord, StoreError>;

    /// Remove a pairing together with its history
    ///
    /// # Errors
    /// `StoreError::NotFound` if no record exists for the path
    async fn delete(&self, local_path: &SyncPath) -> Result<(), StoreError>;

    async fn record_history(&self, entry: &SyncHistoryEntry) -> Result<(), StoreError>;

    /// Most recent history rows for a path, newest first
    async fn history(
        &self,
        local_path: &SyncPath,
        limit: u32,
    ) -> Result<Vec<SyncHistoryEntry>, StoreError>;
}
