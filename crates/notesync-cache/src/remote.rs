//! Read-through caching decorator for the remote store
//!
//! Key layout:
//!
//! | Key                          | Value                 | TTL      |
//! |------------------------------|-----------------------|----------|
//! | `meta:{id}`                  | `RemoteMetadata`      | metadata |
//! | `content:{id}:{edited_ms}`   | `RemoteContent`       | item     |
//! | `children:{parent}`          | `Vec<RemoteMetadata>` | listing  |
//!
//! Content keys carry the object's last edit time, so an edit made on the
//! remote side misses the cache as soon as fresh metadata is seen, without
//! waiting for the item TTL.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use notesync_core::config::CacheConfig;
use notesync_core::domain::RemoteId;
use notesync_core::ports::{IRemoteStore, RemoteContent, RemoteError, RemoteMetadata};

use crate::ttl::TtlCache;

/// Values stored in the remote content cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CachedObject {
    Metadata(RemoteMetadata),
    Content(RemoteContent),
    Children(Vec<RemoteMetadata>),
}

/// TTL per object kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub metadata: Duration,
    pub content: Duration,
    pub listing: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for CacheTtls {
    fn from(config: &CacheConfig) -> Self {
        Self {
            metadata: Duration::from_secs(config.metadata_ttl_secs),
            content: Duration::from_secs(config.item_ttl_secs),
            listing: Duration::from_secs(config.listing_ttl_secs),
        }
    }
}

fn meta_key(id: &RemoteId) -> String {
    format!("meta:{id}")
}

fn content_prefix(id: &RemoteId) -> String {
    format!("content:{id}:")
}

fn content_key(id: &RemoteId, edited: DateTime<Utc>) -> String {
    format!("content:{id}:{}", edited.timestamp_millis())
}

fn children_key(parent: &RemoteId) -> String {
    format!("children:{parent}")
}

/// `IRemoteStore` that reads through a shared [`TtlCache`]
pub struct CachedRemoteStore {
    inner: Arc<dyn IRemoteStore>,
    cache: Arc<TtlCache<CachedObject>>,
    ttls: CacheTtls,
}

impl CachedRemoteStore {
    pub fn new(
        inner: Arc<dyn IRemoteStore>,
        cache: Arc<TtlCache<CachedObject>>,
        ttls: CacheTtls,
    ) -> Self {
        Self { inner, cache, ttls }
    }

    pub fn cache(&self) -> &Arc<TtlCache<CachedObject>> {
        &self.cache
    }

    /// Drop every cached key describing `id`
    pub fn invalidate(&self, id: &RemoteId) {
        let parent = match self.cache.peek(&meta_key(id)) {
            Some(CachedObject::Metadata(meta)) => meta.parent_id,
            _ => None,
        };
        self.cache.delete(&meta_key(id));
        let removed = self.cache.delete_prefix(&content_prefix(id));
        match parent {
            Some(parent) => {
                self.cache.delete(&children_key(&parent));
            }
            // Parent unknown: any listing may mention the object
            None => {
                self.cache.delete_prefix("children:");
            }
        }
        trace!(id = %id, content_entries = removed, "Invalidated cached remote object");
    }
}

#[async_trait::async_trait]
impl IRemoteStore for CachedRemoteStore {
    async fn check_connection(&self) -> Result<(), RemoteError> {
        self.inner.check_connection().await
    }

    async fn get_metadata(&self, id: &RemoteId) -> Result<Option<RemoteMetadata>, RemoteError> {
        let key = meta_key(id);
        if let Some(CachedObject::Metadata(meta)) = self.cache.get(&key) {
            return Ok(Some(meta));
        }

        let meta = self.inner.get_metadata(id).await?;
        if let Some(meta) = &meta {
            self.cache
                .set(key, CachedObject::Metadata(meta.clone()), self.ttls.metadata);
        }
        Ok(meta)
    }

    async fn fetch_content(&self, id: &RemoteId) -> Result<RemoteContent, RemoteError> {
        let meta = self
            .get_metadata(id)
            .await?
            .ok_or_else(|| RemoteError::NotFound(id.clone()))?;

        let key = content_key(id, meta.last_edited);
        if let Some(CachedObject::Content(content)) = self.cache.get(&key) {
            return Ok(content);
        }

        let content = self.inner.fetch_content(id).await?;
        // Older versions of this object are unreachable from now on
        self.cache.delete_prefix(&content_prefix(id));
        self.cache
            .set(key, CachedObject::Content(content.clone()), self.ttls.content);
        Ok(content)
    }

    async fn create_or_update(
        &self,
        parent: Option<&RemoteId>,
        existing: Option<&RemoteId>,
        content: &RemoteContent,
    ) -> Result<RemoteId, RemoteError> {
        let id = self.inner.create_or_update(parent, existing, content).await?;

        self.invalidate(&id);
        if let Some(parent) = parent {
            self.cache.delete(&children_key(parent));
        }
        debug!(id = %id, "Remote object written, cache invalidated");
        Ok(id)
    }

    async fn delete(&self, id: &RemoteId) -> Result<(), RemoteError> {
        let result = self.inner.delete(id).await;
        if matches!(result, Ok(()) | Err(RemoteError::NotFound(_))) {
            self.invalidate(id);
            debug!(id = %id, "Remote object deleted, cache invalidated");
        }
        result
    }

    async fn list_children(&self, parent: &RemoteId) -> Result<Vec<RemoteMetadata>, RemoteError> {
        let key = children_key(parent);
        if let Some(CachedObject::Children(children)) = self.cache.get(&key) {
            return Ok(children);
        }

        let children = self.inner.list_children(parent).await?;
        self.cache
            .set(key, CachedObject::Children(children.clone()), self.ttls.listing);
        Ok(children)
    }
}
