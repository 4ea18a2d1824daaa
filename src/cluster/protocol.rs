//! Directory Update Protocol
//!
//! JSON envelope pushed between peers to announce that a node gained or
//! dropped an object. The field names and the string-typed `Update` flag
//! are fixed for interop with existing nodes.

use serde::{Deserialize, Serialize};

use crate::cache::ObjectKey;

/// Default port of the directory-update listener.
pub const DEFAULT_HASH_PORT: u16 = 9081;

// == Update Kind ==
/// Whether the announcing peer gained or dropped the object.
///
/// Encoded on the wire as the strings `"true"` (add) and `"false"` (remove).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateKind {
    #[serde(rename = "true")]
    Add,
    #[serde(rename = "false")]
    Remove,
}

// == Directory Update ==
/// One add/remove notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectoryUpdate {
    /// Identifier of the node that sent the update
    pub peer: String,
    pub bucket_name: String,
    pub fkey: String,
    pub update: UpdateKind,
}

impl DirectoryUpdate {
    pub fn add(peer: impl Into<String>, id: &ObjectKey) -> Self {
        Self::new(peer, id, UpdateKind::Add)
    }

    pub fn remove(peer: impl Into<String>, id: &ObjectKey) -> Self {
        Self::new(peer, id, UpdateKind::Remove)
    }

    fn new(peer: impl Into<String>, id: &ObjectKey, update: UpdateKind) -> Self {
        Self {
            peer: peer.into(),
            bucket_name: id.bucket.clone(),
            fkey: id.key.clone(),
            update,
        }
    }

    pub fn object_key(&self) -> ObjectKey {
        ObjectKey::new(self.bucket_name.as_str(), self.fkey.as_str())
    }

    /// Decodes an envelope from a raw request body.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }
}

/// Canonical `host:port` identifier of a node.
///
/// Nodes are named by their directory-update address; entries given without
/// a port use `default_port`. Owners, membership and self-checks all compare
/// this form.
pub fn canonical_peer(peer: &str, default_port: u16) -> String {
    let peer = peer
        .trim()
        .trim_start_matches("http://")
        .trim_end_matches('/');
    if has_port(peer) {
        peer.to_string()
    } else {
        format!("{peer}:{default_port}")
    }
}

/// URL of a peer's directory-update endpoint.
pub fn peer_url(peer: &str, default_port: u16) -> String {
    format!("http://{}/", canonical_peer(peer, default_port))
}

/// Host portion of a `host:port` node identifier.
pub fn peer_host(peer: &str) -> &str {
    let peer = peer.trim_start_matches("http://").trim_end_matches('/');
    if has_port(peer) {
        peer.rsplit_once(':').map(|(host, _)| host).unwrap_or(peer)
    } else {
        peer
    }
}

fn has_port(peer: &str) -> bool {
    // Bracketed IPv6 literals carry a port only after the closing bracket
    let tail = peer.rsplit(']').next().unwrap_or(peer);
    tail.rsplit_once(':')
        .map(|(_, port)| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
