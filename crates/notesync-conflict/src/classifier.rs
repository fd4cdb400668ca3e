//! Change classification
//!
//! [`classify`] is a pure function of a record, an [`Observation`] of both
//! sides and the change detection mode. [`ChangeClassifier`] gathers the
//! observation through the ports.
//!
//! ## Algorithm
//!
//! 1. Never synced: both sides exist → `BothModified`, only local →
//!    `LocalNewer`, only remote → `RemoteNewer`, neither → `NoConflict`.
//! 2. Synced before: neither exists → `NoConflict`, local missing →
//!    `LocalDeleted`, remote missing → `RemoteDeleted`.
//! 3. Both exist: each side is changed or not per [`ChangeDetection`], and
//!    the pair of flags maps onto `BothModified` / `LocalNewer` /
//!    `RemoteNewer` / `NoConflict`.
//!
//! A modification time equal to the checkpoint is not a change.

use std::io;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use notesync_core::config::ChangeDetection;
use notesync_core::domain::{Checksum, ConflictType, Observation, SideState, SyncRecord};
use notesync_core::ports::{ILocalFileSystem, IRemoteStore, RemoteError};

use crate::error::ConflictError;

fn side_changed(
    side: &SideState,
    stored: Option<&Checksum>,
    last_sync: DateTime<Utc>,
    mode: ChangeDetection,
) -> bool {
    let newer = side.modified.is_some_and(|m| m > last_sync);
    match (mode, stored, side.checksum.as_ref()) {
        (ChangeDetection::Checksum, Some(stored), Some(current)) => current != stored,
        (ChangeDetection::Checksum, _, _) => newer,
        (ChangeDetection::TimestampOrChecksum, Some(stored), Some(current)) => {
            newer || current != stored
        }
        (ChangeDetection::TimestampOrChecksum, _, _) => newer,
    }
}

/// Classify the change state of `record` from `observation`
pub fn classify(
    record: &SyncRecord,
    observation: &Observation,
    mode: ChangeDetection,
) -> ConflictType {
    let local = &observation.local;
    let remote = &observation.remote;

    let Some(last_sync) = record.last_sync_time else {
        return match (local.exists, remote.exists) {
            (true, true) => ConflictType::BothModified,
            (true, false) => ConflictType::LocalNewer,
            (false, true) => ConflictType::RemoteNewer,
            (false, false) => ConflictType::NoConflict,
        };
    };

    match (local.exists, remote.exists) {
        (false, false) => return ConflictType::NoConflict,
        (false, true) => return ConflictType::LocalDeleted,
        (true, false) => return ConflictType::RemoteDeleted,
        (true, true) => {}
    }

    let local_changed = side_changed(local, record.local_checksum.as_ref(), last_sync, mode);
    let remote_changed = side_changed(remote, record.remote_checksum.as_ref(), last_sync, mode);

    match (local_changed, remote_changed) {
        (true, true) => ConflictType::BothModified,
        (true, false) => ConflictType::LocalNewer,
        (false, true) => ConflictType::RemoteNewer,
        (false, false) => ConflictType::NoConflict,
    }
}

/// Gathers observations through the ports and classifies them
pub struct ChangeClassifier {
    local: Arc<dyn ILocalFileSystem>,
    remote: Arc<dyn IRemoteStore>,
    mode: ChangeDetection,
}

impl ChangeClassifier {
    /// `remote` is expected to be the cached accessor; content digests are
    /// computed from fetched bodies.
    pub fn new(
        local: Arc<dyn ILocalFileSystem>,
        remote: Arc<dyn IRemoteStore>,
        mode: ChangeDetection,
    ) -> Self {
        Self {
            local,
            remote,
            mode,
        }
    }

    pub fn mode(&self) -> ChangeDetection {
        self.mode
    }

    async fn observe_local(&self, record: &SyncRecord) -> Result<SideState, ConflictError> {
        let path = &record.local_path;
        if !self.local.exists(path).await? {
            return Ok(SideState::absent());
        }
        let observed = async {
            let modified = self.local.modified_time(path).await?;
            let checksum = self.local.checksum(path).await?;
            Ok::<_, io::Error>(SideState::present(modified, checksum))
        }
        .await;
        match observed {
            Ok(state) => Ok(state),
            // Removed between the existence check and the read
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(SideState::absent()),
            Err(e) => Err(e.into()),
        }
    }

    async fn observe_remote(&self, record: &SyncRecord) -> Result<SideState, ConflictError> {
        let id = &record.remote_id;
        if id.is_pending() {
            return Ok(SideState::absent());
        }
        let Some(metadata) = self.remote.get_metadata(id).await? else {
            return Ok(SideState::absent());
        };
        match self.remote.fetch_content(id).await {
            Ok(content) => Ok(SideState::present(metadata.last_edited, content.checksum())),
            Err(RemoteError::NotFound(_)) => Ok(SideState::absent()),
            Err(e) => Err(e.into()),
        }
    }

    /// Existence, modification time and digest of both sides
    #[instrument(skip(self, record), fields(path = %record.local_path))]
    pub async fn observe(&self, record: &SyncRecord) -> Result<Observation, ConflictError> {
        let local = self.observe_local(record).await?;
        let remote = self.observe_remote(record).await?;
        Ok(Observation::new(local, remote))
    }

    /// Observe both sides and classify the result
    pub async fn classify(
        &self,
        record: &SyncRecord,
    ) -> Result<(ConflictType, Observation), ConflictError> {
        let observation = self.observe(record).await?;
        let classification = classify(record, &observation, self.mode);
        debug!(
            path = %record.local_path,
            classification = %classification,
            "Classified pairing"
        );
        Ok((classification, observation))
    }
}
