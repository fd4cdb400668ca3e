//! Remote content store port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Implementations enforce their own request-rate ceiling and request
//!   timeout.
//! - [`RemoteError::is_transient`] is the single place that decides whether
//!   a failure is worth retrying. Rate limiting, timeouts, network and server
//!   errors are; authorization failures and rejected requests are not.
//! - `get_metadata` returns `Ok(None)` for objects that are gone (missing or
//!   archived), so existence checks never need to match on errors.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Checksum, RemoteId, RemoteKind};

/// Errors surfaced by a remote store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// HTTP 429 or equivalent
    #[error("Rate limited by remote store (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Remote request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    /// 5xx responses
    #[error("Remote server error {status}: {message}")]
    Server { status: u16, message: String },

    /// 401/403
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Remote object not found: {0}")]
    NotFound(RemoteId),

    /// Any other 4xx
    #[error("Remote store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response from remote store: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Whether retrying the same request later may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::RateLimited { .. }
            | RemoteError::Timeout
            | RemoteError::Network(_)
            | RemoteError::Server { .. } => true,
            RemoteError::Unauthorized(_)
            | RemoteError::NotFound(_)
            | RemoteError::Rejected { .. }
            | RemoteError::InvalidResponse(_) => false,
        }
    }

    /// Server-requested delay before the next attempt
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RemoteError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Metadata of a remote page or collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMetadata {
    pub id: RemoteId,
    pub kind: RemoteKind,
    pub title: String,
    pub parent_id: Option<RemoteId>,
    pub last_edited: DateTime<Utc>,
}

/// Content of a remote object in the engine's neutral form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteContent {
    pub title: String,
    pub body: Vec<u8>,
}

impl RemoteContent {
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Digest of the body; the title does not take part
    #[must_use]
    pub fn checksum(&self) -> Checksum {
        Checksum::of_bytes(&self.body)
    }
}

/// Remote Content Accessor
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Cheap authenticated request proving the store is reachable
    async fn check_connection(&self) -> Result<(), RemoteError>;

    /// Metadata of `id`, or `None` when the object no longer exists
    async fn get_metadata(&self, id: &RemoteId) -> Result<Option<RemoteMetadata>, RemoteError>;

    async fn exists(&self, id: &RemoteId) -> Result<bool, RemoteError> {
        Ok(self.get_metadata(id).await?.is_some())
    }

    /// Last edit time of `id`
    ///
    /// # Errors
    /// `RemoteError::NotFound` when the object does not exist
    async fn modified_time(&self, id: &RemoteId) -> Result<DateTime<Utc>, RemoteError> {
        self.get_metadata(id)
            .await?
            .map(|m| m.last_edited)
            .ok_or_else(|| RemoteError::NotFound(id.clone()))
    }

    async fn fetch_content(&self, id: &RemoteId) -> Result<RemoteContent, RemoteError>;

    /// Replace the content of `existing`, or create a new object under
    /// `parent` when `existing` is `None`. Returns the object's id.
    async fn create_or_update(
        &self,
        parent: Option<&RemoteId>,
        existing: Option<&RemoteId>,
        content: &RemoteContent,
    ) -> Result<RemoteId, RemoteError>;

    /// Delete (archive) an object
    async fn delete(&self, id: &RemoteId) -> Result<(), RemoteError>;

    /// Child pages and collections of `parent`
    async fn list_children(&self, parent: &RemoteId) -> Result<Vec<RemoteMetadata>, RemoteError>;
}
