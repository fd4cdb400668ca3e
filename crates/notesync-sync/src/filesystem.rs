//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: write-to-temp in the target directory, then rename,
//!   so readers never observe a partial file.
//! - **Streaming digests**: SHA-256 is computed in fixed-size chunks so large
//!   files are never held in memory just to be hashed.

use std::io::{self, ErrorKind};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, warn};

use notesync_core::domain::{Checksum, SyncPath};
use notesync_core::ports::ILocalFileSystem;

/// Read buffer used while hashing
const HASH_CHUNK: usize = 64 * 1024;

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem.
///
/// Zero-sized: every operation derives its context from the [`SyncPath`]
/// argument.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn temp_path_for(path: &SyncPath) -> PathBuf {
    let mut p = path.as_path().as_os_str().to_owned();
    p.push(".notesync.tmp");
    PathBuf::from(p)
}

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    async fn exists(&self, path: &SyncPath) -> io::Result<bool> {
        match tokio::fs::metadata(path.as_path()).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn modified_time(&self, path: &SyncPath) -> io::Result<DateTime<Utc>> {
        let modified = tokio::fs::metadata(path.as_path()).await?.modified()?;
        Ok(DateTime::<Utc>::from(modified))
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn checksum(&self, path: &SyncPath) -> io::Result<Checksum> {
        let mut file = tokio::fs::File::open(path.as_path()).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; HASH_CHUNK];
        let mut total = 0usize;
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            total += n;
        }
        let checksum = Checksum::from_hasher(hasher);
        debug!(bytes = total, checksum = %checksum, "checksum computed");
        Ok(checksum)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn read_file(&self, path: &SyncPath) -> io::Result<Vec<u8>> {
        let data = tokio::fs::read(path.as_path()).await?;
        debug!(bytes = data.len(), "file read complete");
        Ok(data)
    }

    #[instrument(skip(self, data), fields(path = %path, bytes = data.len()))]
    async fn write_file(&self, path: &SyncPath, data: &[u8]) -> io::Result<()> {
        let target = path.as_path();

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Same directory, so the rename stays on one filesystem
        let tmp_path = temp_path_for(path);
        tokio::fs::write(&tmp_path, data).await?;

        if let Err(e) = tokio::fs::rename(&tmp_path, target).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                warn!(error = %cleanup, tmp = %tmp_path.display(), "Failed to remove temporary file");
            }
            return Err(e);
        }

        debug!("write complete");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn delete_file(&self, path: &SyncPath) -> io::Result<()> {
        tokio::fs::remove_file(path.as_path()).await?;
        debug!("delete complete");
        Ok(())
    }
}
