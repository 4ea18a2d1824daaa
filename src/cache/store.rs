//! Local Cache Module
//!
//! Main cache engine: a hash index over an arena-backed recency list,
//! bounded by memory and disk byte budgets.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::lru::{Handle, LruList};
use crate::cache::{CacheEntry, CacheStats, MemoryFile, ObjectKey};
use crate::error::{CacheError, Result};

// == Cache Limits ==
/// Resource ceilings fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    /// File count cap. Tracked and reported, but never an eviction trigger.
    pub max_files: usize,
    /// Byte budget for in-memory objects
    pub max_mem_bytes: u64,
    /// Byte budget for on-disk objects
    pub max_disk_bytes: u64,
}

impl CacheLimits {
    pub fn new(max_files: usize, max_mem_bytes: u64, max_disk_bytes: u64) -> Self {
        Self {
            max_files,
            max_mem_bytes,
            max_disk_bytes,
        }
    }
}

// == Insert Outcome ==
/// Result of [`LocalCache::insert`].
#[derive(Debug)]
pub struct InsertOutcome {
    /// The entry now cached under the requested identity
    pub entry: Arc<CacheEntry>,
    /// Identities evicted to make room, least recently used first
    pub evicted: Vec<ObjectKey>,
    /// Identities that lost their in-memory copy but stay cached on disk
    pub spilled: Vec<ObjectKey>,
    /// False when the identity was already cached and nothing changed
    pub inserted: bool,
}

// == Local Cache ==
/// Bounded LRU cache of object metadata and small in-memory payloads.
///
/// Not internally synchronized: callers wrap it in a single exclusive lock,
/// since even `lookup` reorders the recency list.
#[derive(Debug)]
pub struct LocalCache {
    /// Identity to list slot
    index: HashMap<ObjectKey, Handle>,
    /// Recency order, head = most recently used
    lru: LruList<Arc<CacheEntry>>,
    limits: CacheLimits,
    mem_bytes: u64,
    disk_bytes: u64,
    stats: CacheStats,
}

impl LocalCache {
    // == Constructor ==
    pub fn new(limits: CacheLimits) -> Self {
        Self {
            index: HashMap::new(),
            lru: LruList::new(),
            limits,
            mem_bytes: 0,
            disk_bytes: 0,
            stats: CacheStats::new(),
        }
    }

    // == Lookup ==
    /// Finds an entry and promotes it to most recently used.
    pub fn lookup(&mut self, bucket: &str, key: &str) -> Option<Arc<CacheEntry>> {
        let id = ObjectKey::new(bucket, key);
        match self.index.get(&id).copied() {
            Some(handle) => {
                self.lru.touch(handle);
                self.stats.record_hit();
                self.lru.get(handle).cloned()
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Insert ==
    /// Adds an object as most recently used, making room first.
    ///
    /// The object must already be on disk at `local_path`. When `payload`
    /// is given it is kept in memory as well and counts against the memory
    /// budget. Inserting an identity that is already cached changes nothing
    /// and returns the existing entry.
    ///
    /// - Disk budget: entries are evicted from the tail until the object fits.
    /// - Memory budget: the least recently used in-memory entries drop their
    ///   payload and stay cached on disk. Disk-only entries free no memory
    ///   and are never evicted for it.
    ///
    /// The file count cap is not an eviction trigger.
    pub fn insert(
        &mut self,
        id: ObjectKey,
        size: u64,
        local_path: PathBuf,
        payload: Option<Bytes>,
    ) -> Result<InsertOutcome> {
        if let Some(&handle) = self.index.get(&id) {
            let entry = self.lru.get(handle).cloned().ok_or_else(|| {
                CacheError::Internal(format!("index points at empty slot for {id}"))
            })?;
            return Ok(InsertOutcome {
                entry,
                evicted: Vec::new(),
                spilled: Vec::new(),
                inserted: false,
            });
        }

        if let Some(bytes) = &payload {
            if bytes.len() as u64 != size {
                return Err(CacheError::InvalidRequest(format!(
                    "payload of {} bytes does not match declared size {} for {}",
                    bytes.len(),
                    size,
                    id
                )));
            }
        }
        let in_memory = payload.is_some();
        self.check_fits(size, in_memory)?;

        let mut evicted = Vec::new();
        while self.disk_bytes + size > self.limits.max_disk_bytes {
            match self.evict_tail() {
                Some(victim) => evicted.push(victim),
                None => break,
            }
        }

        let mut spilled = Vec::new();
        while in_memory && self.mem_bytes + size > self.limits.max_mem_bytes {
            match self.spill_oldest() {
                Some(id) => spilled.push(id),
                None => break,
            }
        }

        if self.lru.len() >= self.limits.max_files {
            debug!(
                files = self.lru.len() + 1,
                max_files = self.limits.max_files,
                "file count above cap; byte budgets still hold"
            );
        }

        let entry = Arc::new(CacheEntry::new(
            id.clone(),
            size,
            local_path,
            payload.map(MemoryFile::new),
        ));
        let handle = self.lru.push_front(Arc::clone(&entry));
        self.index.insert(id, handle);
        if in_memory {
            self.mem_bytes += size;
        }
        self.disk_bytes += size;

        Ok(InsertOutcome {
            entry,
            evicted,
            spilled,
            inserted: true,
        })
    }

    // == Invalidate ==
    /// Drops an entry's bookkeeping without touching its file on disk.
    ///
    /// Used when the object is being replaced in place.
    pub fn invalidate(&mut self, bucket: &str, key: &str) -> Option<Arc<CacheEntry>> {
        let handle = self.index.remove(&ObjectKey::new(bucket, key))?;
        let entry = self.lru.remove(handle)?;
        self.release(&entry);
        Some(entry)
    }

    // == Evict Tail ==
    /// Evicts the least recently used entry and unlinks its file.
    ///
    /// A failed unlink is logged and counted; bookkeeping is removed either
    /// way. Returns None on an empty cache.
    pub fn evict_tail(&mut self) -> Option<ObjectKey> {
        let entry = self.lru.evict_oldest()?;
        self.index.remove(&entry.id);
        self.release(&entry);
        self.stats.record_eviction();

        if let Err(e) = std::fs::remove_file(&entry.local_path) {
            self.stats.record_unlink_failure();
            warn!(
                object = %entry.id,
                path = %entry.local_path.display(),
                error = %e,
                "failed to remove evicted file"
            );
        }
        debug!(object = %entry.id, size = entry.size, "evicted");

        Some(entry.id.clone())
    }

    // == Spill ==
    /// Drops the in-memory copy of the least recently used in-memory entry.
    ///
    /// The entry keeps its place in the recency list and is served from disk
    /// from now on. Readers already holding the old entry keep its bytes.
    fn spill_oldest(&mut self) -> Option<ObjectKey> {
        let handle = self.lru.find_oldest(|entry| entry.in_memory())?;
        let slot = self.lru.get_mut(handle)?;

        let mut entry = CacheEntry::clone(&**slot);
        entry.mem_file = None;
        let id = entry.id.clone();
        self.mem_bytes -= entry.size;
        *slot = Arc::new(entry);

        self.stats.record_spill();
        debug!(object = %id, "dropped in-memory copy");
        Some(id)
    }

    // == Accessors ==
    /// Entries from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CacheEntry>> {
        self.lru.iter()
    }

    /// Identities from most to least recently used.
    pub fn keys(&self) -> Vec<ObjectKey> {
        self.iter().map(|entry| entry.id.clone()).collect()
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_totals(self.lru.len(), self.mem_bytes, self.disk_bytes);
        stats
    }

    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    pub fn file_count(&self) -> usize {
        self.lru.len()
    }

    pub fn mem_bytes(&self) -> u64 {
        self.mem_bytes
    }

    pub fn disk_bytes(&self) -> u64 {
        self.disk_bytes
    }

    pub fn len(&self) -> usize {
        self.lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lru.is_empty()
    }

    fn check_fits(&self, size: u64, in_memory: bool) -> Result<()> {
        if size > self.limits.max_disk_bytes {
            return Err(CacheError::Oversized {
                size,
                limit: self.limits.max_disk_bytes,
            });
        }
        if in_memory && size > self.limits.max_mem_bytes {
            return Err(CacheError::Oversized {
                size,
                limit: self.limits.max_mem_bytes,
            });
        }
        Ok(())
    }

    fn release(&mut self, entry: &CacheEntry) {
        if entry.in_memory() {
            self.mem_bytes -= entry.size;
        }
        self.disk_bytes -= entry.size;
    }
}
