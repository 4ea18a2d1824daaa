//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of successful cache lookups
    pub hits: u64,
    /// Number of failed cache lookups
    pub misses: u64,
    /// Number of entries evicted due to LRU policy
    pub evictions: u64,
    /// Entries moved from memory to disk-only to free memory
    pub spills: u64,
    /// Evictions whose on-disk file could not be removed
    pub unlink_failures: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Bytes currently held in memory
    pub mem_bytes: u64,
    /// Bytes currently held on disk
    pub disk_bytes: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Eviction ==
    /// Increments the eviction counter.
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Record Spill ==
    /// Increments the counter of in-memory copies dropped under memory pressure.
    pub fn record_spill(&mut self) {
        self.spills += 1;
    }

    // == Record Unlink Failure ==
    /// Increments the failed-unlink counter.
    pub fn record_unlink_failure(&mut self) {
        self.unlink_failures += 1;
    }

    // == Update Totals ==
    /// Copies the cache's current resource totals into the snapshot.
    pub fn set_totals(&mut self, entries: usize, mem_bytes: u64, disk_bytes: u64) {
        self.total_entries = entries;
        self.mem_bytes = mem_bytes;
        self.disk_bytes = disk_bytes;
    }
}
