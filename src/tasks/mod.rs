//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Peer liveness: probes peers and updates the membership table

mod liveness;

pub use liveness::spawn_liveness_task;
