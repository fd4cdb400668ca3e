//! notesync store - durable sync records
//!
//! SQLite-backed implementation of the `IMetadataStore` port:
//! - Sync records keyed by local path, indexed by remote ID
//! - Execution history per record
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteMetadataStore`] - `IMetadataStore` implementation
//! - [`DatabaseError`] - Errors raised while opening the database
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use notesync_store::{DatabasePool, SqliteMetadataStore};
//!
//! # async fn example() -> Result<(), notesync_store::DatabaseError> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/notesync/notesync.db")).await?;
//! let store = SqliteMetadataStore::new(pool.pool().clone());
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteMetadataStore;

use notesync_core::ports::StoreError;

/// Errors raised while opening or migrating the database
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl From<DatabaseError> for StoreError {
    fn from(e: DatabaseError) -> Self {
        StoreError::Backend(e.to_string())
    }
}
