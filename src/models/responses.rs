//! Response DTOs for the proxy API
//!
//! Defines the structure of outgoing JSON response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::proxy::PutAck;

/// Response body for an object PUT/POST
#[derive(Debug, Clone, Serialize)]
pub struct PutResponse {
    /// Success message
    pub message: String,
    pub bucket: String,
    pub key: String,
    /// Stored size in bytes
    pub size: u64,
}

impl From<PutAck> for PutResponse {
    fn from(ack: PutAck) -> Self {
        Self {
            message: format!("Object '{}/{}' stored successfully", ack.bucket, ack.key),
            bucket: ack.bucket,
            key: ack.key,
            size: ack.size,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of evictions
    pub evictions: u64,
    /// In-memory copies dropped to free memory
    pub spills: u64,
    /// Evicted files that could not be unlinked
    pub unlink_failures: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    pub mem_bytes: u64,
    pub disk_bytes: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Cluster directory size; omitted when clustering is off
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_entries: Option<usize>,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache statistics
    pub fn new(stats: &CacheStats, directory_entries: Option<usize>) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            spills: stats.spills,
            unlink_failures: stats.unlink_failures,
            total_entries: stats.total_entries,
            mem_bytes: stats.mem_bytes,
            disk_bytes: stats.disk_bytes,
            hit_rate: stats.hit_rate(),
            directory_entries,
        }
    }
}

/// Response body for the health endpoints (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
