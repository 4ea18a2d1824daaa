//! Cluster Membership
//!
//! Query interface for "is this peer reachable", plus a simple table-backed
//! implementation whose flags are flipped by the liveness probe task.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::info;

/// Membership oracle consumed by the directory.
pub trait Membership: Send + Sync {
    /// Whether the peer is currently considered reachable.
    fn is_alive(&self, peer: &str) -> bool;

    /// All known peers, alive or not.
    fn members(&self) -> Vec<String>;
}

// == Peer Membership ==
/// Table of configured peers with an alive flag each.
///
/// Peers start out alive so updates flow before the first probe completes.
/// Unknown peers are reported dead.
#[derive(Debug, Default)]
pub struct PeerMembership {
    peers: RwLock<HashMap<String, bool>>,
}

impl PeerMembership {
    pub fn new<I, S>(peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let peers = peers.into_iter().map(|p| (p.into(), true)).collect();
        Self {
            peers: RwLock::new(peers),
        }
    }

    /// Sets a peer's flag, adding the peer if it was not known.
    ///
    /// Returns true when the flag changed.
    pub fn set_alive(&self, peer: &str, alive: bool) -> bool {
        let mut peers = self.peers.write();
        let previous = peers.insert(peer.to_string(), alive);
        let changed = previous != Some(alive);
        if changed {
            info!(peer, alive, "peer liveness changed");
        }
        changed
    }
}

impl Membership for PeerMembership {
    fn is_alive(&self, peer: &str) -> bool {
        self.peers.read().get(peer).copied().unwrap_or(false)
    }

    fn members(&self) -> Vec<String> {
        let mut members: Vec<String> = self.peers.read().keys().cloned().collect();
        members.sort();
        members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peers_start_alive() {
        let membership = PeerMembership::new(["a:9081", "b:9081"]);
        assert!(membership.is_alive("a:9081"));
        assert!(membership.is_alive("b:9081"));
        assert_eq!(membership.members(), vec!["a:9081", "b:9081"]);
    }

    #[test]
    fn test_unknown_peer_is_dead() {
        let membership = PeerMembership::new(Vec::<String>::new());
        assert!(!membership.is_alive("ghost:9081"));
    }

    #[test]
    fn test_set_alive_reports_changes() {
        let membership = PeerMembership::new(["a"]);
        assert!(membership.set_alive("a", false));
        assert!(!membership.set_alive("a", false));
        assert!(!membership.is_alive("a"));
        assert!(membership.set_alive("a", true));
        assert!(membership.is_alive("a"));
    }
}
