//! notesync cache - time-boxed cache of remote objects
//!
//! - [`TtlCache`] - bounded in-memory cache with per-entry TTL, LRU eviction
//!   on insert, hit/miss statistics and a background expiry sweep
//! - [`CachedRemoteStore`] - `IRemoteStore` decorator that reads through a
//!   [`TtlCache`] and invalidates affected keys after every mutation
//! - Snapshot persistence so a warm cache survives restarts
//!
//! The cache is always constructed explicitly and shared through `Arc`;
//! there is no process-wide instance.

pub mod remote;
pub mod snapshot;
pub mod ttl;

pub use remote::{CacheTtls, CachedObject, CachedRemoteStore};
pub use ttl::{CacheEntry, CacheStats, TtlCache};

/// Errors raised while persisting or restoring a cache snapshot
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
