//! Errors raised by the engine and by individual operations

use std::io;
use std::time::Duration;

use thiserror::Error;

use notesync_conflict::ConflictError;
use notesync_core::domain::{DomainError, SyncPath};
use notesync_core::ports::{RemoteError, StoreError};

/// Errors that abort or reject a whole run
#[derive(Debug, Error)]
pub enum SyncError {
    /// A run is already in progress; the new one was rejected, not queued
    #[error("A synchronization run is already in progress")]
    AlreadyRunning,

    /// The remote store could not be reached before any work started
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(#[source] RemoteError),

    /// Records could not be listed or updated
    #[error("Metadata store error: {0}")]
    Store(#[from] StoreError),
}

/// Failure of one operation; never aborts siblings or the run
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationError {
    /// Worth retrying later
    #[error("{message}")]
    Transient {
        message: String,
        /// Delay requested by the remote store, if any
        retry_after: Option<Duration>,
    },

    /// Retrying the same request cannot succeed
    #[error("{0}")]
    Permanent(String),

    /// A true conflict reached the executor without a concrete resolution
    #[error("Conflict on {0} has no resolution")]
    UnresolvedConflict(SyncPath),
}

impl OperationError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after, .. } => *retry_after,
            Self::Permanent(_) | Self::UnresolvedConflict(_) => None,
        }
    }
}

/// Local I/O that may succeed when repeated
fn is_transient_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

impl From<io::Error> for OperationError {
    fn from(e: io::Error) -> Self {
        let message = format!("Local I/O failed: {e}");
        if is_transient_io(e.kind()) {
            Self::transient(message)
        } else {
            Self::Permanent(message)
        }
    }
}

impl From<RemoteError> for OperationError {
    fn from(e: RemoteError) -> Self {
        if e.is_transient() {
            Self::Transient {
                message: e.to_string(),
                retry_after: e.retry_after(),
            }
        } else {
            Self::Permanent(e.to_string())
        }
    }
}

impl From<StoreError> for OperationError {
    fn from(e: StoreError) -> Self {
        Self::Permanent(e.to_string())
    }
}

impl From<DomainError> for OperationError {
    fn from(e: DomainError) -> Self {
        Self::Permanent(e.to_string())
    }
}

impl From<ConflictError> for OperationError {
    fn from(e: ConflictError) -> Self {
        match e {
            ConflictError::Local(io) => io.into(),
            ConflictError::Remote(remote) => remote.into(),
            other => Self::Permanent(other.to_string()),
        }
    }
}
