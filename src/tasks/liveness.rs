//! Peer Liveness Task
//!
//! Background task that periodically probes every known peer's directory
//! listener and updates the membership table.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cluster::protocol::peer_url;
use crate::cluster::{Membership, PeerMembership};

/// Spawns a background task that probes each peer's `/health` endpoint.
///
/// A peer is alive when its probe answers with a success status within the
/// client's timeout. Probes for different peers run concurrently.
///
/// # Arguments
/// * `membership` - table whose flags the probe updates
/// * `client` - HTTP client, carrying the per-request timeout
/// * `interval_secs` - Interval in seconds between probe rounds
/// * `default_port` - directory port for peers listed without one
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_liveness_task(
    membership: Arc<PeerMembership>,
    client: reqwest::Client,
    interval_secs: u64,
    default_port: u16,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting peer liveness task with interval of {} seconds",
            interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let peers = membership.members();
            let probes = peers.iter().map(|peer| probe(&client, peer, default_port));
            let results = join_all(probes).await;

            let mut alive = 0;
            for (peer, up) in peers.iter().zip(results) {
                membership.set_alive(peer, up);
                if up {
                    alive += 1;
                }
            }
            debug!("Liveness probe: {} of {} peers alive", alive, peers.len());
        }
    })
}

async fn probe(client: &reqwest::Client, peer: &str, default_port: u16) -> bool {
    let url = format!("{}health", peer_url(peer, default_port));
    match client.get(&url).send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            debug!(peer, error = %e, "liveness probe failed");
            false
        }
    }
}
