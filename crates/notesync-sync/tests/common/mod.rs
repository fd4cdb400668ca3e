//! In-memory ports shared by the engine and executor tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use notesync_core::config::Config;
use notesync_core::domain::{
    Checksum, NewSyncRecord, RecordUpdate, RemoteId, RemoteKind, SyncDirection,
    SyncHistoryEntry, SyncPath, SyncRecord, SyncStatus,
};
use notesync_core::ports::{
    ILocalFileSystem, IMetadataStore, IRemoteStore, RemoteContent, RemoteError, RemoteMetadata,
    StoreError,
};
use notesync_store::{DatabasePool, SqliteMetadataStore};
use notesync_sync::{EnginePorts, PlainTextCodec};

pub fn path(p: &str) -> SyncPath {
    p.parse().unwrap()
}

pub fn rid(id: &str) -> RemoteId {
    RemoteId::new(id.to_string()).unwrap()
}

pub fn an_hour_ago() -> DateTime<Utc> {
    Utc::now() - ChronoDuration::hours(1)
}

// ============================================================================
// Local filesystem
// ============================================================================

#[derive(Default)]
pub struct MemoryFs {
    files: Mutex<HashMap<SyncPath, (Vec<u8>, DateTime<Utc>)>>,
}

impl MemoryFs {
    pub fn put(&self, path: &SyncPath, body: &[u8], modified: DateTime<Utc>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.clone(), (body.to_vec(), modified));
    }

    pub fn remove(&self, path: &SyncPath) {
        self.files.lock().unwrap().remove(path);
    }

    pub fn body(&self, path: &SyncPath) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).map(|(b, _)| b.clone())
    }

    /// Paths whose file name starts with `prefix`
    pub fn names_starting_with(&self, prefix: &str) -> Vec<SyncPath> {
        self.files
            .lock()
            .unwrap()
            .keys()
            .filter(|p| p.file_name().is_some_and(|n| n.starts_with(prefix)))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    fn get(&self, path: &SyncPath) -> io::Result<(Vec<u8>, DateTime<Utc>)> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

#[async_trait::async_trait]
impl ILocalFileSystem for MemoryFs {
    async fn exists(&self, path: &SyncPath) -> io::Result<bool> {
        Ok(self.files.lock().unwrap().contains_key(path))
    }

    async fn modified_time(&self, path: &SyncPath) -> io::Result<DateTime<Utc>> {
        Ok(self.get(path)?.1)
    }

    async fn checksum(&self, path: &SyncPath) -> io::Result<Checksum> {
        Ok(Checksum::of_bytes(&self.get(path)?.0))
    }

    async fn read_file(&self, path: &SyncPath) -> io::Result<Vec<u8>> {
        Ok(self.get(path)?.0)
    }

    async fn write_file(&self, path: &SyncPath, data: &[u8]) -> io::Result<()> {
        self.put(path, data, Utc::now());
        Ok(())
    }

    async fn delete_file(&self, path: &SyncPath) -> io::Result<()> {
        self.get(path)?;
        self.remove(path);
        Ok(())
    }
}

// ============================================================================
// Remote store
// ============================================================================

#[derive(Default)]
pub struct MemoryRemote {
    objects: Mutex<HashMap<RemoteId, (RemoteMetadata, RemoteContent)>>,
    next_id: AtomicUsize,
    write_failures: Mutex<VecDeque<RemoteError>>,
    pub unreachable: AtomicBool,
    write_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub writes: AtomicUsize,
}

impl MemoryRemote {
    pub fn put(&self, id: &RemoteId, parent: Option<&RemoteId>, title: &str, body: &[u8]) {
        self.put_at(id, parent, title, body, Utc::now());
    }

    pub fn put_at(
        &self,
        id: &RemoteId,
        parent: Option<&RemoteId>,
        title: &str,
        body: &[u8],
        edited: DateTime<Utc>,
    ) {
        let metadata = RemoteMetadata {
            id: id.clone(),
            kind: RemoteKind::Item,
            title: title.to_string(),
            parent_id: parent.cloned(),
            last_edited: edited,
        };
        self.objects.lock().unwrap().insert(
            id.clone(),
            (metadata, RemoteContent::new(title, body.to_vec())),
        );
    }

    pub fn body(&self, id: &RemoteId) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(id)
            .map(|(_, c)| c.body.clone())
    }

    /// Drop an object as if it was deleted on the remote side
    pub fn forget(&self, id: &RemoteId) {
        self.objects.lock().unwrap().remove(id);
    }

    pub fn contains(&self, id: &RemoteId) -> bool {
        self.objects.lock().unwrap().contains_key(id)
    }

    pub fn children_of(&self, parent: &RemoteId) -> Vec<(RemoteMetadata, RemoteContent)> {
        self.objects
            .lock()
            .unwrap()
            .values()
            .filter(|(m, _)| m.parent_id.as_ref() == Some(parent))
            .cloned()
            .collect()
    }

    /// Queue an error for the next write call
    pub fn fail_next_write(&self, err: RemoteError) {
        self.write_failures.lock().unwrap().push_back(err);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = delay;
    }

    async fn begin_write(&self) -> Result<(), RemoteError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.write_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match self.write_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl IRemoteStore for MemoryRemote {
    async fn check_connection(&self) -> Result<(), RemoteError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RemoteError::Network("connection refused".into()));
        }
        Ok(())
    }

    async fn get_metadata(&self, id: &RemoteId) -> Result<Option<RemoteMetadata>, RemoteError> {
        Ok(self.objects.lock().unwrap().get(id).map(|(m, _)| m.clone()))
    }

    async fn fetch_content(&self, id: &RemoteId) -> Result<RemoteContent, RemoteError> {
        self.objects
            .lock()
            .unwrap()
            .get(id)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| RemoteError::NotFound(id.clone()))
    }

    async fn create_or_update(
        &self,
        parent: Option<&RemoteId>,
        existing: Option<&RemoteId>,
        content: &RemoteContent,
    ) -> Result<RemoteId, RemoteError> {
        self.begin_write().await?;
        match (existing, parent) {
            (Some(id), _) => {
                let mut objects = self.objects.lock().unwrap();
                let (metadata, stored) = objects
                    .get_mut(id)
                    .ok_or_else(|| RemoteError::NotFound(id.clone()))?;
                metadata.title = content.title.clone();
                metadata.last_edited = Utc::now();
                *stored = content.clone();
                Ok(id.clone())
            }
            (None, Some(parent)) => {
                let n = self.next_id.fetch_add(1, Ordering::SeqCst);
                let id = rid(&format!("new-{n}"));
                self.put(&id, Some(parent), &content.title, &content.body);
                Ok(id)
            }
            (None, None) => Err(RemoteError::Rejected {
                status: 400,
                message: "parent required".into(),
            }),
        }
    }

    async fn delete(&self, id: &RemoteId) -> Result<(), RemoteError> {
        self.begin_write().await?;
        self.objects
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(id.clone()))
    }

    async fn list_children(&self, parent: &RemoteId) -> Result<Vec<RemoteMetadata>, RemoteError> {
        Ok(self.children_of(parent).into_iter().map(|(m, _)| m).collect())
    }
}

// ============================================================================
// Metadata store wrapper
// ============================================================================

/// Store that counts records in `syncing` and can fail chosen updates
pub struct WatchedStore {
    inner: Arc<SqliteMetadataStore>,
    syncing: Mutex<HashSet<SyncPath>>,
    pub max_syncing: AtomicUsize,
    failing: Mutex<HashSet<SyncPath>>,
}

impl WatchedStore {
    pub fn new(inner: Arc<SqliteMetadataStore>) -> Self {
        Self {
            inner,
            syncing: Mutex::new(HashSet::new()),
            max_syncing: AtomicUsize::new(0),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Fail the next update of `path` with a backend error
    pub fn fail_next_update(&self, path: &SyncPath) {
        self.failing.lock().unwrap().insert(path.clone());
    }
}

#[async_trait::async_trait]
impl IMetadataStore for WatchedStore {
    async fn get(&self, local_path: &SyncPath) -> Result<Option<SyncRecord>, StoreError> {
        self.inner.get(local_path).await
    }

    async fn get_by_remote_id(
        &self,
        remote_id: &RemoteId,
    ) -> Result<Option<SyncRecord>, StoreError> {
        self.inner.get_by_remote_id(remote_id).await
    }

    async fn list_all(&self) -> Result<Vec<SyncRecord>, StoreError> {
        self.inner.list_all().await
    }

    async fn create(&self, new: NewSyncRecord) -> Result<SyncRecord, StoreError> {
        self.inner.create(new).await
    }

    async fn update(
        &self,
        local_path: &SyncPath,
        update: RecordUpdate,
    ) -> Result<SyncRecord, StoreError> {
        if self.failing.lock().unwrap().remove(local_path) {
            return Err(StoreError::Backend("disk I/O error".into()));
        }
        let record = self.inner.update(local_path, update).await?;
        let mut syncing = self.syncing.lock().unwrap();
        if record.sync_status == SyncStatus::Syncing {
            syncing.insert(local_path.clone());
            self.max_syncing.fetch_max(syncing.len(), Ordering::SeqCst);
        } else {
            syncing.remove(local_path);
        }
        Ok(record)
    }

    async fn delete(&self, local_path: &SyncPath) -> Result<(), StoreError> {
        self.inner.delete(local_path).await
    }

    async fn record_history(&self, entry: &SyncHistoryEntry) -> Result<(), StoreError> {
        self.inner.record_history(entry).await
    }

    async fn history(
        &self,
        local_path: &SyncPath,
        limit: u32,
    ) -> Result<Vec<SyncHistoryEntry>, StoreError> {
        self.inner.history(local_path, limit).await
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub fs: Arc<MemoryFs>,
    pub remote: Arc<MemoryRemote>,
    pub store: Arc<SqliteMetadataStore>,
}

impl Harness {
    pub async fn new() -> Self {
        let pool = DatabasePool::in_memory().await.unwrap();
        Self {
            fs: Arc::new(MemoryFs::default()),
            remote: Arc::new(MemoryRemote::default()),
            store: Arc::new(SqliteMetadataStore::new(pool.pool().clone())),
        }
    }

    pub fn ports(&self) -> EnginePorts {
        EnginePorts {
            store: self.store.clone(),
            local: self.fs.clone(),
            remote: self.remote.clone(),
            codec: Arc::new(PlainTextCodec::new()),
        }
    }

    pub async fn pair(&self, local: &str, remote: &str) -> SyncRecord {
        self.store
            .create(NewSyncRecord::new(
                path(local),
                rid(remote),
                RemoteKind::Item,
                SyncDirection::Bidirectional,
            ))
            .await
            .unwrap()
    }

    /// Pair `local` with `remote`, both holding `body`, synced an hour ago
    pub async fn synced_pair(&self, local: &str, remote: &str, body: &[u8]) -> SyncRecord {
        let t0 = an_hour_ago();
        self.pair(local, remote).await;
        self.fs.put(&path(local), body, t0);
        self.remote
            .put_at(&rid(remote), Some(&rid("ROOT")), "a", body, t0);
        self.store
            .update(
                &path(local),
                RecordUpdate::new()
                    .synced_at(t0)
                    .local_checksum(Some(Checksum::of_bytes(body)))
                    .remote_checksum(Some(Checksum::of_bytes(body))),
            )
            .await
            .unwrap()
    }

    /// Ports whose store is wrapped in a [`WatchedStore`]
    pub fn watched_ports(&self) -> (EnginePorts, Arc<WatchedStore>) {
        let watched = Arc::new(WatchedStore::new(self.store.clone()));
        let mut ports = self.ports();
        ports.store = watched.clone();
        (ports, watched)
    }

    pub async fn record(&self, local: &str) -> SyncRecord {
        self.store.get(&path(local)).await.unwrap().unwrap()
    }
}

/// Default configuration with millisecond retry delays
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 4;
    config
}
