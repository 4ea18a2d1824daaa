//! s3envoy - A clustered local caching proxy for S3-compatible object stores
//!
//! Serves objects from a bounded memory/disk LRU cache, redirects misses to
//! peers that hold the object, and falls back to the backend otherwise.

pub mod api;
pub mod backend;
pub mod cache;
pub mod cluster;
pub mod config;
pub mod error;
pub mod models;
pub mod proxy;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use tasks::spawn_liveness_task;
