//! SQLite implementation of the `IMetadataStore` port
//!
//! ## Column mapping
//!
//! | Domain type          | SQL type | Encoding                                  |
//! |----------------------|----------|-------------------------------------------|
//! | SyncPath             | TEXT     | `to_string()` / `SyncPath::from_str()`    |
//! | RemoteId, Checksum   | TEXT     | `.as_str()` / `FromStr`                   |
//! | DateTime<Utc>        | TEXT     | RFC 3339                                  |
//! | status/kind enums    | TEXT     | `.as_str()` / `FromStr` (snake_case)      |
//! | retry_count          | INTEGER  | `i64`                                     |
//!
//! ## Write serialization
//!
//! Every write is one atomic statement, or one transaction whose first
//! statement already writes. No transaction reads before it writes, so a
//! writer never holds a stale WAL snapshot that SQLite refuses to upgrade.
//! Writes to the same record also take a per-path async lock first, so a
//! read-modify-write on one record never interleaves with another on the
//! same record, while writes to other records proceed independently.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tokio::sync::{Mutex, OwnedMutexGuard};

use notesync_core::domain::{
    NewSyncRecord, RecordUpdate, RemoteId, SyncHistoryEntry, SyncPath, SyncRecord,
};
use notesync_core::ports::{IMetadataStore, StoreError};

/// `IMetadataStore` backed by SQLite
pub struct SqliteMetadataStore {
    pool: SqlitePool,
    record_locks: DashMap<SyncPath, Arc<Mutex<()>>>,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            record_locks: DashMap::new(),
        }
    }

    async fn lock_record(&self, path: &SyncPath) -> OwnedMutexGuard<()> {
        let lock = self
            .record_locks
            .entry(path.clone())
            .or_default()
            .value()
            .clone();
        lock.lock_owned().await
    }
}

// ============================================================================
// Conversion helpers
// ============================================================================

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

fn parse<T>(column: &str, value: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("column {column}: {e}")))
}

fn parse_optional<T>(column: &str, value: Option<String>) -> Result<Option<T>, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(ref v) if !v.is_empty() => parse(column, v).map(Some),
        _ => Ok(None),
    }
}

fn parse_datetime(column: &str, s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("column {column}: bad timestamp '{s}': {e}")))
}

fn parse_optional_datetime(
    column: &str,
    s: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    match s {
        Some(ref v) if !v.is_empty() => parse_datetime(column, v).map(Some),
        _ => Ok(None),
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn record_from_row(row: &SqliteRow) -> Result<SyncRecord, StoreError> {
    let local_path: String = row.get("local_path");
    let remote_id: String = row.get("remote_id");
    let remote_kind: String = row.get("remote_kind");
    let remote_parent_id: Option<String> = row.get("remote_parent_id");
    let sync_direction: String = row.get("sync_direction");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    let last_sync_time: Option<String> = row.get("last_sync_time");
    let local_checksum: Option<String> = row.get("local_checksum");
    let remote_checksum: Option<String> = row.get("remote_checksum");
    let conflict_status: String = row.get("conflict_status");
    let sync_status: String = row.get("sync_status");
    let last_error: Option<String> = row.get("last_error");
    let retry_count: i64 = row.get("retry_count");

    Ok(SyncRecord {
        local_path: parse("local_path", &local_path)?,
        remote_id: parse("remote_id", &remote_id)?,
        remote_kind: parse("remote_kind", &remote_kind)?,
        remote_parent_id: parse_optional("remote_parent_id", remote_parent_id)?,
        sync_direction: parse("sync_direction", &sync_direction)?,
        created_at: parse_datetime("created_at", &created_at)?,
        updated_at: parse_datetime("updated_at", &updated_at)?,
        last_sync_time: parse_optional_datetime("last_sync_time", last_sync_time)?,
        local_checksum: parse_optional("local_checksum", local_checksum)?,
        remote_checksum: parse_optional("remote_checksum", remote_checksum)?,
        conflict_status: parse("conflict_status", &conflict_status)?,
        sync_status: parse("sync_status", &sync_status)?,
        last_error,
        retry_count: u32::try_from(retry_count).unwrap_or(0),
    })
}

fn history_from_row(row: &SqliteRow) -> Result<SyncHistoryEntry, StoreError> {
    let local_path: String = row.get("local_path");
    let operation_type: String = row.get("operation_type");
    let direction: String = row.get("direction");
    let conflict_type: String = row.get("conflict_type");
    let resolution: Option<String> = row.get("resolution");
    let started_at: String = row.get("started_at");
    let completed_at: String = row.get("completed_at");
    let success: bool = row.get("success");
    let error_message: Option<String> = row.get("error_message");

    Ok(SyncHistoryEntry {
        local_path: parse("local_path", &local_path)?,
        operation_type: parse("operation_type", &operation_type)?,
        direction: parse("direction", &direction)?,
        conflict_type: parse("conflict_type", &conflict_type)?,
        resolution: parse_optional("resolution", resolution)?,
        started_at: parse_datetime("started_at", &started_at)?,
        completed_at: parse_datetime("completed_at", &completed_at)?,
        success,
        error_message,
    })
}

// ============================================================================
// IMetadataStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IMetadataStore for SqliteMetadataStore {
    async fn get(&self, local_path: &SyncPath) -> Result<Option<SyncRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM sync_records WHERE local_path = ?")
            .bind(local_path.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn get_by_remote_id(
        &self,
        remote_id: &RemoteId,
    ) -> Result<Option<SyncRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM sync_records WHERE remote_id = ? ORDER BY local_path LIMIT 1",
        )
        .bind(remote_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<SyncRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM sync_records ORDER BY local_path")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn create(&self, new: NewSyncRecord) -> Result<SyncRecord, StoreError> {
        let record = SyncRecord::new(new);
        let _guard = self.lock_record(&record.local_path).await;

        let result = sqlx::query(
            "INSERT INTO sync_records \
             (local_path, remote_id, remote_kind, remote_parent_id, sync_direction, \
              created_at, updated_at, last_sync_time, local_checksum, remote_checksum, \
              conflict_status, sync_status, last_error, retry_count) \
             VALUES (?, ?, ?, ?, ?, ?, ?, NULL, NULL, NULL, ?, ?, NULL, 0)",
        )
        .bind(record.local_path.to_string())
        .bind(record.remote_id.as_str())
        .bind(record.remote_kind.as_str())
        .bind(record.remote_parent_id.as_ref().map(RemoteId::as_str))
        .bind(record.sync_direction.as_str())
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .bind(record.conflict_status.as_str())
        .bind(record.sync_status.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::trace!(path = %record.local_path, remote_id = %record.remote_id, "Created sync record");
                Ok(record)
            }
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicatePath(record.local_path)),
            Err(e) => Err(backend(e)),
        }
    }

    async fn update(
        &self,
        local_path: &SyncPath,
        update: RecordUpdate,
    ) -> Result<SyncRecord, StoreError> {
        let _guard = self.lock_record(local_path).await;

        // The record lock keeps other writers of this row out, so the read
        // needs no transaction. The write is then a single statement, which
        // takes the SQLite write lock directly and honours the busy timeout.
        let row = sqlx::query("SELECT * FROM sync_records WHERE local_path = ?")
            .bind(local_path.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        let Some(row) = row else {
            return Err(StoreError::NotFound(local_path.clone()));
        };
        let mut record = record_from_row(&row)?;
        record.apply(&update, Utc::now());

        let result = sqlx::query(
            "UPDATE sync_records SET \
             remote_id = ?, updated_at = ?, last_sync_time = ?, \
             local_checksum = ?, remote_checksum = ?, conflict_status = ?, \
             sync_status = ?, last_error = ?, retry_count = ? \
             WHERE local_path = ?",
        )
        .bind(record.remote_id.as_str())
        .bind(record.updated_at.to_rfc3339())
        .bind(record.last_sync_time.map(|t| t.to_rfc3339()))
        .bind(record.local_checksum.as_ref().map(|c| c.as_str().to_string()))
        .bind(record.remote_checksum.as_ref().map(|c| c.as_str().to_string()))
        .bind(record.conflict_status.as_str())
        .bind(record.sync_status.as_str())
        .bind(record.last_error.as_deref())
        .bind(i64::from(record.retry_count))
        .bind(local_path.to_string())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(local_path.clone()));
        }

        tracing::trace!(
            path = %local_path,
            sync_status = %record.sync_status,
            conflict_status = %record.conflict_status,
            "Updated sync record"
        );
        Ok(record)
    }

    async fn delete(&self, local_path: &SyncPath) -> Result<(), StoreError> {
        let guard = self.lock_record(local_path).await;
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query("DELETE FROM sync_history WHERE local_path = ?")
            .bind(local_path.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let result = sqlx::query("DELETE FROM sync_records WHERE local_path = ?")
            .bind(local_path.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(local_path.clone()));
        }

        tx.commit().await.map_err(backend)?;
        drop(guard);
        self.record_locks.remove(local_path);

        tracing::trace!(path = %local_path, "Deleted sync record");
        Ok(())
    }

    async fn record_history(&self, entry: &SyncHistoryEntry) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO sync_history \
             (local_path, operation_type, direction, conflict_type, resolution, \
              started_at, completed_at, success, error_message) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.local_path.to_string())
        .bind(entry.operation_type.as_str())
        .bind(entry.direction.as_str())
        .bind(entry.conflict_type.as_str())
        .bind(entry.resolution.map(|r| r.as_str()))
        .bind(entry.started_at.to_rfc3339())
        .bind(entry.completed_at.to_rfc3339())
        .bind(entry.success)
        .bind(entry.error_message.as_deref())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::trace!(path = %entry.local_path, success = entry.success, "Recorded sync history");
                Ok(())
            }
            Err(e) if is_foreign_key_violation(&e) => {
                Err(StoreError::NotFound(entry.local_path.clone()))
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn history(
        &self,
        local_path: &SyncPath,
        limit: u32,
    ) -> Result<Vec<SyncHistoryEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM sync_history WHERE local_path = ? \
             ORDER BY started_at DESC, id DESC LIMIT ?",
        )
        .bind(local_path.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(history_from_row).collect()
    }
}
