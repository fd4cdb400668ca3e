//! Local filesystem port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Uses `std::io::Result` so the executor can tell transient failures
//!   (interrupted, timed out) from permanent ones (not found, permission
//!   denied) by `io::ErrorKind`.
//! - `write_file` must be atomic: readers see either the old or the new
//!   content, never a partial write.

use std::io;

use chrono::{DateTime, Utc};

use crate::domain::newtypes::{Checksum, SyncPath};

/// Local File Inspector
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Whether a regular file exists at `path`
    async fn exists(&self, path: &SyncPath) -> io::Result<bool>;

    /// Last modification time of the file
    async fn modified_time(&self, path: &SyncPath) -> io::Result<DateTime<Utc>>;

    /// SHA-256 digest of the file's bytes
    async fn checksum(&self, path: &SyncPath) -> io::Result<Checksum>;

    async fn read_file(&self, path: &SyncPath) -> io::Result<Vec<u8>>;

    /// Atomically replace (or create) the file, creating parent directories
    async fn write_file(&self, path: &SyncPath, data: &[u8]) -> io::Result<()>;

    async fn delete_file(&self, path: &SyncPath) -> io::Result<()>;
}
