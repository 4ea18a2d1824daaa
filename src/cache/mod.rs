//! Cache Module
//!
//! Bounded local object cache: an LRU engine over memory and disk byte
//! budgets, with small objects also served straight from memory.

mod entry;
pub mod lru;
mod memfile;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, ObjectKey};
pub use lru::LruList;
pub use memfile::MemoryFile;
pub use stats::CacheStats;
pub use store::{CacheLimits, InsertOutcome, LocalCache};
