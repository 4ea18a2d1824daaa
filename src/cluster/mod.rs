//! Cluster Module
//!
//! Distributed cache directory: which peer holds which object, kept in sync
//! by best-effort JSON updates pushed to every live peer.

pub mod broadcast;
mod directory;
mod listener;
mod membership;
pub mod protocol;

pub use broadcast::{BroadcastSettings, Broadcaster};
pub use directory::CacheDirectory;
pub use listener::directory_router;
pub use membership::{Membership, PeerMembership};
pub use protocol::{DirectoryUpdate, UpdateKind};
