//! Cache snapshot persistence
//!
//! A snapshot stores every live entry with its wall-clock expiry time. Loading
//! skips entries that expired while the process was down and restores the
//! rest with their remaining TTL.
//!
//! Snapshots are written to a temporary sibling file and renamed into place,
//! so a crash mid-write never leaves a truncated snapshot behind.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ttl::TtlCache;
use crate::CacheError;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot<V> {
    saved_at: DateTime<Utc>,
    entries: Vec<SnapshotEntry<V>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry<V> {
    key: String,
    value: V,
    expires_at: DateTime<Utc>,
    access_count: u64,
}

impl<V> TtlCache<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Write all live entries to `path`; returns how many were written
    pub async fn save_snapshot(&self, path: &Path) -> Result<usize, CacheError> {
        let now = Utc::now();
        let entries: Vec<_> = self
            .live_entries()
            .into_iter()
            .map(|(key, value, remaining, access_count)| SnapshotEntry {
                key,
                value,
                expires_at: now
                    + chrono::Duration::from_std(remaining).unwrap_or(chrono::Duration::zero()),
                access_count,
            })
            .collect();
        let count = entries.len();

        let json = serde_json::to_vec(&Snapshot {
            saved_at: now,
            entries,
        })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cache".to_string());
        let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

        tokio::fs::write(&temp_path, &json).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        info!(path = %path.display(), entries = count, "Saved cache snapshot");
        Ok(count)
    }

    /// Restore entries from `path`; returns how many were restored
    ///
    /// A missing file restores nothing and is not an error.
    pub async fn load_snapshot(&self, path: &Path) -> Result<usize, CacheError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No cache snapshot to load");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot<V> = serde_json::from_slice(&bytes)?;
        let now = Utc::now();
        let mut restored = 0;
        for entry in snapshot.entries {
            let Ok(remaining) = (entry.expires_at - now).to_std() else {
                continue;
            };
            if remaining.is_zero() {
                continue;
            }
            self.set(entry.key, entry.value, remaining);
            restored += 1;
        }

        info!(
            path = %path.display(),
            restored,
            saved_at = %snapshot.saved_at,
            "Loaded cache snapshot"
        );
        Ok(restored)
    }
}
