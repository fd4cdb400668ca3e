//! History of execution attempts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::SyncPath;
use super::operation::{ConflictResolution, ConflictType, OperationType};
use super::record::SyncDirection;

/// One finished execution attempt for a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncHistoryEntry {
    pub local_path: SyncPath,
    pub operation_type: OperationType,
    pub direction: SyncDirection,
    pub conflict_type: ConflictType,
    pub resolution: Option<ConflictResolution>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<String>,
}
