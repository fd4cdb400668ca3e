//! Events exposed to the surrounding application
//!
//! Presentation layers subscribe to a broadcast channel of [`SyncEvent`]s.

use serde::{Deserialize, Serialize};

use crate::domain::ConflictSummary;

/// Stage of a synchronization run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Collecting,
    Classifying,
    Resolving,
    Executing,
    /// Terminal state of a run that hit an unrecoverable error
    Failed,
}

impl RunState {
    /// Whether a run is currently active
    #[must_use]
    pub fn is_running(&self) -> bool {
        !matches!(self, RunState::Idle | RunState::Failed)
    }
}

/// Aggregate operation counts for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    SyncStarted,
    SyncFinished {
        success: bool,
        statistics: RunStatistics,
    },
    SyncProgress {
        percent: u8,
        message: String,
    },
    ConflictDetected(ConflictSummary),
    StateChanged {
        state: RunState,
    },
}
