//! Observed state of both sides of a pairing at classification time

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{Checksum, RemoteId, SyncPath};
use super::record::SyncRecord;

/// What was seen on one side of a pairing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideState {
    pub exists: bool,
    pub modified: Option<DateTime<Utc>>,
    pub checksum: Option<Checksum>,
}

impl SideState {
    #[must_use]
    pub fn present(modified: DateTime<Utc>, checksum: Checksum) -> Self {
        Self {
            exists: true,
            modified: Some(modified),
            checksum: Some(checksum),
        }
    }

    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }
}

/// Both sides of a pairing, gathered together before classification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub local: SideState,
    pub remote: SideState,
}

impl Observation {
    #[must_use]
    pub fn new(local: SideState, remote: SideState) -> Self {
        Self { local, remote }
    }
}

/// What the decision callback is shown when both sides changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub local_path: SyncPath,
    pub remote_id: RemoteId,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub local_modified: Option<DateTime<Utc>>,
    pub remote_modified: Option<DateTime<Utc>>,
    pub local_checksum: Option<Checksum>,
    pub remote_checksum: Option<Checksum>,
}

impl ConflictSummary {
    #[must_use]
    pub fn new(record: &SyncRecord, observation: &Observation) -> Self {
        Self {
            local_path: record.local_path.clone(),
            remote_id: record.remote_id.clone(),
            last_sync_time: record.last_sync_time,
            local_modified: observation.local.modified,
            remote_modified: observation.remote.modified,
            local_checksum: observation.local.checksum.clone(),
            remote_checksum: observation.remote.checksum.clone(),
        }
    }
}
