//! Proxy Module
//!
//! Request-level cache logic, independent of the HTTP framing.

pub mod range;
mod service;

pub use range::{parse_range, ByteRange};
pub use service::{validate_object_path, GetOutcome, ProxyService, ProxySettings, PutAck};
