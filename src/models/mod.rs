//! Response models for the proxy API
//!
//! This module defines the DTOs (Data Transfer Objects) serialized into
//! JSON response bodies.

pub mod responses;

// Re-export commonly used types
pub use responses::{ErrorResponse, HealthResponse, PutResponse, StatsResponse};
