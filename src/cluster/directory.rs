//! Cache Directory
//!
//! Replicated map from object identity to the node that holds it. Each node
//! keeps its own copy and learns about peers through directory updates.
//! Entries are hints: last writer wins, and a recorded owner is only
//! trusted while membership reports it alive.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::ObjectKey;
use crate::cluster::broadcast::Broadcaster;
use crate::cluster::membership::Membership;
use crate::cluster::protocol::{DirectoryUpdate, UpdateKind};

// == Cache Directory ==
pub struct CacheDirectory {
    local_name: String,
    ownership: RwLock<HashMap<ObjectKey, String>>,
    membership: Arc<dyn Membership>,
    /// Absent when running without peers
    broadcaster: Option<Broadcaster>,
}

impl CacheDirectory {
    pub fn new(
        local_name: impl Into<String>,
        membership: Arc<dyn Membership>,
        broadcaster: Option<Broadcaster>,
    ) -> Self {
        Self {
            local_name: local_name.into(),
            ownership: RwLock::new(HashMap::new()),
            membership,
            broadcaster,
        }
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    // == Record Ownership ==
    /// Maps the object to `peer`, replacing any previous owner.
    ///
    /// With `broadcast`, an add update is queued for the live peers once the
    /// map lock is released.
    pub async fn record_ownership(&self, bucket: &str, key: &str, peer: &str, broadcast: bool) {
        let id = ObjectKey::new(bucket, key);
        {
            let mut ownership = self.ownership.write().await;
            ownership.insert(id.clone(), peer.to_string());
        }
        debug!(object = %id, owner = peer, "ownership recorded");

        if broadcast {
            self.broadcast(DirectoryUpdate::add(self.local_name.as_str(), &id))
                .await;
        }
    }

    // == Remove Ownership ==
    /// Drops the mapping if present. With `broadcast`, a remove update is
    /// queued either way so peers drop stale entries too.
    pub async fn remove_ownership(&self, bucket: &str, key: &str, broadcast: bool) {
        let id = ObjectKey::new(bucket, key);
        let removed = {
            let mut ownership = self.ownership.write().await;
            ownership.remove(&id)
        };
        if let Some(owner) = removed {
            debug!(object = %id, owner = %owner, "ownership removed");
        }

        if broadcast {
            self.broadcast(DirectoryUpdate::remove(self.local_name.as_str(), &id))
                .await;
        }
    }

    // == Lookup ==
    /// Recorded owner, without any liveness check.
    pub async fn lookup_owner(&self, bucket: &str, key: &str) -> Option<String> {
        let ownership = self.ownership.read().await;
        ownership.get(&ObjectKey::new(bucket, key)).cloned()
    }

    /// Owner worth redirecting to: recorded, alive, and not this node.
    ///
    /// A dead owner is treated exactly like an unknown one.
    pub async fn live_owner(&self, bucket: &str, key: &str) -> Option<String> {
        let owner = self.lookup_owner(bucket, key).await?;
        if owner == self.local_name {
            return None;
        }
        if !self.membership.is_alive(&owner) {
            debug!(bucket, key, owner = %owner, "recorded owner is not alive");
            return None;
        }
        Some(owner)
    }

    // == Apply ==
    /// Applies an update received from a peer. Never rebroadcasts.
    pub async fn apply(&self, update: &DirectoryUpdate) {
        match update.update {
            UpdateKind::Add => {
                self.record_ownership(&update.bucket_name, &update.fkey, &update.peer, false)
                    .await
            }
            UpdateKind::Remove => {
                self.remove_ownership(&update.bucket_name, &update.fkey, false)
                    .await
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.ownership.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ownership.read().await.is_empty()
    }

    async fn broadcast(&self, update: DirectoryUpdate) {
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.enqueue(update).await;
        }
    }
}

impl std::fmt::Debug for CacheDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheDirectory")
            .field("local_name", &self.local_name)
            .field("broadcast", &self.broadcaster.is_some())
            .finish_non_exhaustive()
    }
}
