//! Error types for classification and conflict handling

use thiserror::Error;

use notesync_core::ports::RemoteError;

/// Errors that can occur while classifying or resolving a pairing
#[derive(Debug, Error)]
pub enum ConflictError {
    /// Inspecting the local file failed
    #[error("local inspection failed: {0}")]
    Local(#[from] std::io::Error),

    /// Inspecting the remote object failed
    #[error("remote inspection failed: {0}")]
    Remote(#[from] RemoteError),

    /// Invalid glob pattern or resolution in a conflict rule
    #[error("invalid conflict rule {pattern:?}: {reason}")]
    InvalidRule { pattern: String, reason: String },
}

impl ConflictError {
    /// Whether repeating the inspection later may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ConflictError::Local(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            ConflictError::Remote(e) => e.is_transient(),
            ConflictError::InvalidRule { .. } => false,
        }
    }
}
