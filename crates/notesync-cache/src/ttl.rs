//! Bounded TTL cache
//!
//! Entries expire once their age exceeds their TTL. Expired entries are
//! dropped lazily by [`TtlCache::get`] and eagerly by the background sweep.
//! When a new key is inserted into a full cache the least recently used
//! entry is evicted.
//!
//! Time is read from `tokio::time::Instant`, so tests can pause and advance
//! the clock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// One cached value with its bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub created_at: Instant,
    pub ttl: Duration,
    pub access_count: u64,
    pub last_accessed: Instant,
}

impl<V> CacheEntry<V> {
    fn new(key: String, value: V, ttl: Duration, now: Instant) -> Self {
        Self {
            key,
            value,
            created_at: now,
            ttl,
            access_count: 0,
            last_accessed: now,
        }
    }

    /// True once the entry's age exceeds its TTL
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }

    /// Time left before expiry
    pub fn remaining_ttl(&self, now: Instant) -> Duration {
        self.ttl
            .saturating_sub(now.saturating_duration_since(self.created_at))
    }
}

/// Counters exposed by [`TtlCache::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evictions: u64,
    /// Hits over lookups, 0.0 before the first lookup
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    expired: u64,
    evictions: u64,
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    counters: Counters,
}

/// Time-boxed cache of cloneable values keyed by string
#[derive(Debug)]
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    max_entries: usize,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// `max_entries` is clamped to at least one entry
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                counters: Counters::default(),
            }),
            max_entries: max_entries.max(1),
            default_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up `key`, counting a hit or a miss
    ///
    /// An entry older than its TTL is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;

        let expired = match inner.entries.get_mut(key) {
            None => {
                inner.counters.misses += 1;
                return None;
            }
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => {
                entry.access_count += 1;
                entry.last_accessed = now;
                let value = entry.value.clone();
                inner.counters.hits += 1;
                return Some(value);
            }
        };

        if expired {
            inner.entries.remove(key);
            inner.counters.expired += 1;
            inner.counters.misses += 1;
            trace!(key, "Cache entry expired");
        }
        None
    }

    /// Look up `key` without touching statistics or recency
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let inner = self.lock();
        inner
            .entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value.clone())
    }

    /// Insert or replace `key` with an explicit TTL
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();
        let mut inner = self.lock();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            Self::remove_expired(&mut inner, now);
            if inner.entries.len() >= self.max_entries {
                Self::evict_lru(&mut inner);
            }
        }

        inner
            .entries
            .insert(key.clone(), CacheEntry::new(key, value, ttl, now));
    }

    /// Insert or replace `key` with the default TTL
    pub fn set_default(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Remove `key`; returns whether it was present
    pub fn delete(&self, key: &str) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Remove every key starting with `prefix`; returns how many were removed
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|k, _| !k.starts_with(prefix));
        before - inner.entries.len()
    }

    /// Drop every entry; statistics are kept
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Remove all expired entries; returns how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        Self::remove_expired(&mut inner, now)
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let lookups = inner.counters.hits + inner.counters.misses;
        CacheStats {
            entries: inner.entries.len(),
            max_entries: self.max_entries,
            hits: inner.counters.hits,
            misses: inner.counters.misses,
            expired: inner.counters.expired,
            evictions: inner.counters.evictions,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                inner.counters.hits as f64 / lookups as f64
            },
        }
    }

    /// Snapshot of live entries with their remaining TTL
    pub(crate) fn live_entries(&self) -> Vec<(String, V, Duration, u64)> {
        let now = Instant::now();
        let inner = self.lock();
        inner
            .entries
            .values()
            .filter(|e| !e.is_expired(now))
            .map(|e| {
                (
                    e.key.clone(),
                    e.value.clone(),
                    e.remaining_ttl(now),
                    e.access_count,
                )
            })
            .collect()
    }

    fn remove_expired(inner: &mut Inner<V>, now: Instant) -> usize {
        let before = inner.entries.len();
        inner.entries.retain(|_, e| !e.is_expired(now));
        let removed = before - inner.entries.len();
        inner.counters.expired += removed as u64;
        removed
    }

    fn evict_lru(inner: &mut Inner<V>) {
        let victim = inner
            .entries
            .values()
            .min_by_key(|e| (e.last_accessed, e.access_count))
            .map(|e| e.key.clone());

        if let Some(key) = victim {
            inner.entries.remove(&key);
            inner.counters.evictions += 1;
            trace!(key, "Evicted least recently used cache entry");
        }
    }
}

impl<V: Clone + Send + 'static> TtlCache<V> {
    /// Run [`TtlCache::cleanup_expired`] every `interval` until `shutdown`
    /// is cancelled
    ///
    /// The sweep only holds the cache lock for the in-memory scan.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Cache sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = cache.cleanup_expired();
                        if removed > 0 {
                            debug!(removed, remaining = cache.len(), "Swept expired cache entries");
                        }
                    }
                }
            }
        })
    }
}
