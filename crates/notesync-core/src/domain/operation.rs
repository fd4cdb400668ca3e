//! SyncOperation and the classification/resolution vocabulary
//!
//! Operations are built once per classification pass and discarded after the
//! pass; only the record fields and a history row outlive them.

use serde::{Deserialize, Serialize};

use super::newtypes::{RemoteId, SyncPath};
use super::record::{SyncDirection, SyncRecord};

text_enum! {
    /// Outcome of comparing both sides of a pairing against its checkpoint
    pub enum ConflictType: "conflict type" {
        NoConflict => "no_conflict",
        LocalNewer => "local_newer",
        RemoteNewer => "remote_newer",
        BothModified => "both_modified",
        LocalDeleted => "local_deleted",
        RemoteDeleted => "remote_deleted",
    }
}

impl ConflictType {
    /// Whether the classification needs a resolution policy rather than a
    /// mechanical copy
    #[must_use]
    pub fn is_true_conflict(&self) -> bool {
        match self {
            ConflictType::BothModified => true,
            ConflictType::NoConflict
            | ConflictType::LocalNewer
            | ConflictType::RemoteNewer
            | ConflictType::LocalDeleted
            | ConflictType::RemoteDeleted => false,
        }
    }
}

text_enum! {
    /// How a true conflict is settled
    pub enum ConflictResolution: "conflict resolution" {
        /// Waiting on the decision callback
        AskUser => "ask_user",
        LocalWins => "local_wins",
        RemoteWins => "remote_wins",
        /// Keep both versions, preserving the losing side under a duplicate
        CreateBoth => "create_both",
        Skip => "skip",
    }
}

impl ConflictResolution {
    /// True once a concrete policy has been chosen
    #[must_use]
    pub fn is_decided(&self) -> bool {
        !matches!(self, ConflictResolution::AskUser)
    }
}

text_enum! {
    pub enum OperationType: "operation type" {
        Create => "create",
        Update => "update",
        Delete => "delete",
    }
}

text_enum! {
    pub enum OperationStatus: "operation status" {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Failed => "failed",
    }
}

/// One unit of reconciliation work for one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub operation_type: OperationType,
    pub local_path: SyncPath,
    pub remote_id: RemoteId,
    pub direction: SyncDirection,
    pub conflict_type: ConflictType,
    pub resolution: Option<ConflictResolution>,
    pub status: OperationStatus,
    pub error_message: Option<String>,
}

impl SyncOperation {
    /// Build a pending operation for `record`
    #[must_use]
    pub fn new(
        operation_type: OperationType,
        record: &SyncRecord,
        direction: SyncDirection,
        conflict_type: ConflictType,
    ) -> Self {
        Self {
            operation_type,
            local_path: record.local_path.clone(),
            remote_id: record.remote_id.clone(),
            direction,
            conflict_type,
            resolution: None,
            status: OperationStatus::Pending,
            error_message: None,
        }
    }

    #[must_use]
    pub fn with_resolution(mut self, resolution: ConflictResolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// An operation may be handed to the executor once any true conflict it
    /// carries has a decided resolution
    #[must_use]
    pub fn is_dispatchable(&self) -> bool {
        if !self.conflict_type.is_true_conflict() {
            return true;
        }
        self.resolution.is_some_and(|r| r.is_decided())
    }

    pub fn mark_in_progress(&mut self) {
        self.status = OperationStatus::InProgress;
    }

    pub fn mark_completed(&mut self) {
        self.status = OperationStatus::Completed;
        self.error_message = None;
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = OperationStatus::Failed;
        self.error_message = Some(message.into());
    }
}
