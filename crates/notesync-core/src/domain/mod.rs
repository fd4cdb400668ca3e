//! Domain entities
//!
//! - Validated newtypes (`SyncPath`, `RemoteId`, `Checksum`)
//! - The persisted pairing (`SyncRecord`) and its field updates
//! - Per-pass reconciliation work (`SyncOperation`) and classification outcomes
//! - Observed side state used by classification
//! - History rows written after each execution attempt

#[macro_use]
mod macros;

pub mod errors;
pub mod history;
pub mod newtypes;
pub mod observation;
pub mod operation;
pub mod record;

pub use errors::DomainError;
pub use history::SyncHistoryEntry;
pub use newtypes::*;
pub use observation::{ConflictSummary, Observation, SideState};
pub use operation::{
    ConflictResolution, ConflictType, OperationStatus, OperationType, SyncOperation,
};
pub use record::{
    ConflictStatus, NewSyncRecord, RecordUpdate, RemoteKind, RetryCount, SyncDirection,
    SyncRecord, SyncStatus,
};
