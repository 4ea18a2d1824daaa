//! Proxy Service
//!
//! Composes the local cache, the cluster directory and the backend into the
//! two operations the HTTP layer needs: serve an object and store an object.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{encode_key, ObjectBackend};
use crate::cache::{CacheEntry, CacheStats, InsertOutcome, LocalCache, ObjectKey};
use crate::cluster::protocol::peer_host;
use crate::cluster::CacheDirectory;
use crate::config::Config;
use crate::error::{CacheError, Result};

const TEMP_DIR: &str = ".incoming";

// == Settings ==
#[derive(Debug, Clone)]
pub struct ProxySettings {
    /// Root of the on-disk cache; objects live at `<root>/<bucket>/<encoded key>`
    pub local_path: PathBuf,
    /// Objects strictly smaller than this are also held in memory
    pub max_mem_file_size: u64,
    /// Proxy port of every node, used to build redirects
    pub server_port: u16,
}

impl From<&Config> for ProxySettings {
    fn from(config: &Config) -> Self {
        Self {
            local_path: config.local_path.clone(),
            max_mem_file_size: config.max_mem_file_size,
            server_port: config.server_port,
        }
    }
}

// == Outcomes ==
/// How a GET is answered.
#[derive(Debug)]
pub enum GetOutcome {
    /// Serve from the entry's in-memory copy
    Memory(Arc<CacheEntry>),
    /// Serve from the entry's file, opened while the entry was current
    Disk(Arc<CacheEntry>, tokio::fs::File),
    /// A live peer holds the object
    Redirect(String),
}

impl GetOutcome {
    /// Must run under the cache lock: a later replace or evict swaps the
    /// file at the entry's path, an open handle keeps the old content.
    async fn open(entry: Arc<CacheEntry>) -> Result<Self> {
        if entry.in_memory() {
            return Ok(GetOutcome::Memory(entry));
        }
        match tokio::fs::File::open(&entry.local_path).await {
            Ok(file) => Ok(GetOutcome::Disk(entry, file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(object = %entry.id, path = %entry.local_path.display(), "cached file is missing");
                Err(CacheError::NotFound(entry.id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Acknowledgement of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutAck {
    pub bucket: String,
    pub key: String,
    pub size: u64,
}

// == Proxy Service ==
pub struct ProxyService {
    /// Single exclusive lock; lookups reorder the recency list too
    cache: Mutex<LocalCache>,
    directory: Option<Arc<CacheDirectory>>,
    backend: Arc<dyn ObjectBackend>,
    settings: ProxySettings,
}

impl ProxyService {
    pub fn new(
        cache: LocalCache,
        backend: Arc<dyn ObjectBackend>,
        directory: Option<Arc<CacheDirectory>>,
        settings: ProxySettings,
    ) -> Self {
        Self {
            cache: Mutex::new(cache),
            directory,
            backend,
            settings,
        }
    }

    // == Handle GET ==
    /// Finds the object locally, on a live peer, or in the backend.
    ///
    /// A backend fetch lands in the cache and is announced to peers.
    pub async fn handle_get(&self, bucket: &str, key: &str) -> Result<GetOutcome> {
        validate_object_path(bucket, key)?;

        {
            let mut cache = self.cache.lock().await;
            if let Some(entry) = cache.lookup(bucket, key) {
                debug!(bucket, key, in_memory = entry.in_memory(), "cache hit");
                return GetOutcome::open(entry).await;
            }
        }

        if let Some(directory) = &self.directory {
            if let Some(owner) = directory.live_owner(bucket, key).await {
                let location = self.redirect_url(&owner, bucket, key);
                debug!(bucket, key, owner = %owner, "redirecting to peer");
                return Ok(GetOutcome::Redirect(location));
            }
        }

        let temp = self.temp_path().await?;
        let size = match self.backend.download(bucket, key, &temp).await {
            Ok(size) => size,
            Err(e) => {
                discard(&temp).await;
                return Err(e);
            }
        };
        info!(bucket, key, size, "filled from backend");

        self.commit(bucket, key, &temp, size, false).await
    }

    // == Handle PUT ==
    /// Stores the streamed body as the object, replacing any cached copy,
    /// then writes it through to the backend in the background.
    pub async fn handle_put<S, E>(&self, bucket: &str, key: &str, mut body: S) -> Result<PutAck>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        validate_object_path(bucket, key)?;

        let temp = self.temp_path().await?;
        let size = match write_stream(&temp, &mut body).await {
            Ok(size) => size,
            Err(e) => {
                discard(&temp).await;
                return Err(e);
            }
        };

        self.commit(bucket, key, &temp, size, true).await?;
        info!(bucket, key, size, "stored object");

        let backend = Arc::clone(&self.backend);
        let (bucket_owned, key_owned) = (bucket.to_string(), key.to_string());
        let path = self.object_path(bucket, key);
        tokio::spawn(async move {
            if let Err(e) = backend.upload(&bucket_owned, &key_owned, &path, size).await {
                error!(bucket = %bucket_owned, key = %key_owned, error = %e, "backend upload failed; local copy kept");
            }
        });

        Ok(PutAck {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size,
        })
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }

    /// Entries in the cluster directory, or None without clustering.
    pub async fn directory_entries(&self) -> Option<usize> {
        match &self.directory {
            Some(directory) => Some(directory.len().await),
            None => None,
        }
    }

    /// Final on-disk location of an object.
    ///
    /// Keys are percent-encoded into a single file name, so `a` and `a/b`
    /// never collide as file and directory.
    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.settings
            .local_path
            .join(bucket)
            .join(urlencoding::encode(key).as_ref())
    }

    fn redirect_url(&self, owner: &str, bucket: &str, key: &str) -> String {
        format!(
            "http://{}:{}/{}/{}",
            peer_host(owner),
            self.settings.server_port,
            urlencoding::encode(bucket),
            encode_key(key)
        )
    }

    async fn temp_path(&self) -> Result<PathBuf> {
        let dir = self.settings.local_path.join(TEMP_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir.join(Uuid::new_v4().to_string()))
    }

    /// Moves a fully written temp file into place, caches it and opens it
    /// for serving.
    ///
    /// With `replace`, an existing entry is dropped first; otherwise an entry
    /// that appeared while the temp file was being written wins.
    async fn commit(
        &self,
        bucket: &str,
        key: &str,
        temp: &Path,
        size: u64,
        replace: bool,
    ) -> Result<GetOutcome> {
        let payload = if self.keep_in_memory(size).await {
            match tokio::fs::read(temp).await {
                Ok(bytes) => Some(Bytes::from(bytes)),
                Err(e) => {
                    discard(temp).await;
                    return Err(e.into());
                }
            }
        } else {
            None
        };
        let final_path = self.object_path(bucket, key);
        if let Some(parent) = final_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                discard(temp).await;
                return Err(e.into());
            }
        }

        let (outcome, replaced, served) = {
            let mut cache = self.cache.lock().await;
            let replaced = if replace {
                cache.invalidate(bucket, key)
            } else if let Some(entry) = cache.lookup(bucket, key) {
                let served = GetOutcome::open(entry).await;
                drop(cache);
                discard(temp).await;
                return served;
            } else {
                None
            };

            match insert_at(&mut cache, bucket, key, size, temp, &final_path, payload) {
                Ok(outcome) => {
                    let served = GetOutcome::open(Arc::clone(&outcome.entry)).await;
                    (outcome, replaced, served)
                }
                Err(e) => {
                    drop(cache);
                    discard(temp).await;
                    if let Some(old) = replaced {
                        // The old copy is no longer tracked; drop it everywhere
                        discard(&old.local_path).await;
                        self.announce_removed(&[old.id.clone()]).await;
                    }
                    return Err(e);
                }
            }
        };

        if let Some(old) = &replaced {
            debug!(object = %old.id, old_size = old.size, "replaced cached object");
        }
        self.announce(&outcome).await;
        served
    }

    async fn keep_in_memory(&self, size: u64) -> bool {
        let max_mem = self.cache.lock().await.limits().max_mem_bytes;
        size < self.settings.max_mem_file_size && size <= max_mem
    }

    /// Publishes ownership of a new entry and removal of its victims.
    async fn announce(&self, outcome: &InsertOutcome) {
        let Some(directory) = &self.directory else {
            return;
        };
        if outcome.inserted {
            let id = &outcome.entry.id;
            directory
                .record_ownership(&id.bucket, &id.key, directory.local_name(), true)
                .await;
        }
        self.announce_removed(&outcome.evicted).await;
    }

    async fn announce_removed(&self, ids: &[ObjectKey]) {
        if let Some(directory) = &self.directory {
            for id in ids {
                directory.remove_ownership(&id.bucket, &id.key, true).await;
            }
        }
    }
}

impl std::fmt::Debug for ProxyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyService")
            .field("settings", &self.settings)
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

/// Inserts the entry, then renames the temp file to its final path.
///
/// Runs under the cache lock so no reader sees the entry before its file.
fn insert_at(
    cache: &mut LocalCache,
    bucket: &str,
    key: &str,
    size: u64,
    temp: &Path,
    final_path: &Path,
    payload: Option<Bytes>,
) -> Result<InsertOutcome> {
    let outcome = cache.insert(
        ObjectKey::new(bucket, key),
        size,
        final_path.to_path_buf(),
        payload,
    )?;
    if let Err(e) = std::fs::rename(temp, final_path) {
        cache.invalidate(bucket, key);
        return Err(e.into());
    }
    Ok(outcome)
}

/// Rejects identities that would escape the cache directory.
pub fn validate_object_path(bucket: &str, key: &str) -> Result<()> {
    if bucket.is_empty() || key.is_empty() {
        return Err(CacheError::InvalidRequest(
            "bucket and key must both be present".to_string(),
        ));
    }
    if bucket.contains('/') || bucket == "." || bucket == ".." || bucket.starts_with('.') {
        return Err(CacheError::InvalidRequest(format!("invalid bucket {bucket:?}")));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(CacheError::InvalidRequest(format!("invalid key {key:?}")));
    }
    Ok(())
}

async fn write_stream<S, E>(path: &Path, body: &mut S) -> Result<u64>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk =
            chunk.map_err(|e| CacheError::InvalidRequest(format!("reading request body: {e}")))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove file");
        }
    }
}
