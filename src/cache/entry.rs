//! Cache Entry Module
//!
//! Defines object identity and the metadata record kept for each cached object.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::cache::MemoryFile;

// == Object Key ==
/// Identity of a cached object: bucket plus object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub bucket: String,
    pub key: String,
}

impl ObjectKey {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

// == Cache Entry ==
/// Metadata for one cached object.
///
/// The object is always materialized at `local_path`; objects small enough
/// to keep in memory additionally carry a [`MemoryFile`].
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Object identity
    pub id: ObjectKey,
    /// Exact byte length of the object
    pub size: u64,
    /// In-memory copy of the object, if held in memory
    pub mem_file: Option<MemoryFile>,
    /// On-disk location of the object
    pub local_path: PathBuf,
    /// Time the object entered the cache
    pub modified_at: DateTime<Utc>,
    /// Reserved for write-back; always false today
    pub dirty: bool,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a clean entry stamped with the current time.
    pub fn new(
        id: ObjectKey,
        size: u64,
        local_path: PathBuf,
        mem_file: Option<MemoryFile>,
    ) -> Self {
        Self {
            id,
            size,
            mem_file,
            local_path,
            modified_at: Utc::now(),
            dirty: false,
        }
    }

    /// Whether the object is served from memory.
    pub fn in_memory(&self) -> bool {
        self.mem_file.is_some()
    }

    /// `Last-Modified` header value for this entry.
    pub fn http_date(&self) -> String {
        self.modified_at
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string()
    }
}
