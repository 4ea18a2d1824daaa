//! Directory Broadcast
//!
//! Fans directory updates out to live peers. Updates go through a bounded
//! queue drained by a small worker pool, so callers only wait when the
//! queue is full and never on peer networking.
//!
//! Delivery is best effort: a failed POST is logged and not retried. A peer
//! that misses an update stays stale until the next update for that key.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cluster::membership::Membership;
use crate::cluster::protocol::{peer_url, DirectoryUpdate};
use crate::error::{CacheError, Result};

// == Settings ==
/// Broadcast tuning, taken from the proxy configuration.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// This node's identifier; never sent an update
    pub local_name: String,
    /// Port used for peers listed without one
    pub hash_port: u16,
    pub workers: usize,
    pub queue_capacity: usize,
    /// Timeout for one POST to one peer
    pub peer_timeout: Duration,
}

// == Broadcaster ==
/// Handle for queueing directory updates. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: mpsc::Sender<DirectoryUpdate>,
}

impl Broadcaster {
    /// Starts the worker pool and returns the queue handle with the worker
    /// join handles.
    ///
    /// Workers exit once every `Broadcaster` clone has been dropped and the
    /// queue is drained.
    pub fn spawn(
        settings: BroadcastSettings,
        membership: Arc<dyn Membership>,
    ) -> Result<(Self, Vec<JoinHandle<()>>)> {
        let client = reqwest::Client::builder()
            .timeout(settings.peer_timeout)
            .build()
            .map_err(|e| CacheError::Internal(format!("building peer client: {e}")))?;

        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let settings = Arc::new(settings);

        let handles = (0..settings.workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let client = client.clone();
                let membership = Arc::clone(&membership);
                let settings = Arc::clone(&settings);
                tokio::spawn(async move {
                    run_worker(worker, rx, client, membership, settings).await;
                })
            })
            .collect();

        info!(
            workers = settings.workers.max(1),
            queue = settings.queue_capacity.max(1),
            "directory broadcaster started"
        );
        Ok((Self { tx }, handles))
    }

    /// Queues an update for delivery, waiting while the queue is full.
    ///
    /// Returns false if the workers have shut down.
    pub async fn enqueue(&self, update: DirectoryUpdate) -> bool {
        match self.tx.send(update).await {
            Ok(()) => true,
            Err(e) => {
                warn!(object = %e.0.object_key(), "broadcast queue closed; update dropped");
                false
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<DirectoryUpdate>>>,
    client: reqwest::Client,
    membership: Arc<dyn Membership>,
    settings: Arc<BroadcastSettings>,
) {
    loop {
        // Hold the receiver lock only while waiting for the next job
        let update = { rx.lock().await.recv().await };
        let Some(update) = update else {
            debug!(worker, "broadcast worker stopping");
            return;
        };

        let targets: Vec<String> = membership
            .members()
            .into_iter()
            .filter(|peer| peer != &settings.local_name && membership.is_alive(peer))
            .collect();

        let sends = targets.iter().map(|peer| {
            let url = peer_url(peer, settings.hash_port);
            let client = &client;
            let update = &update;
            async move {
                if let Err(e) = deliver(client, &url, update).await {
                    warn!(peer = %peer, object = %update.object_key(), error = %e, "directory update not delivered");
                }
            }
        });
        join_all(sends).await;

        debug!(
            worker,
            object = %update.object_key(),
            kind = ?update.update,
            peers = targets.len(),
            "directory update broadcast"
        );
    }
}

/// POSTs one update to one peer endpoint.
pub async fn deliver(client: &reqwest::Client, url: &str, update: &DirectoryUpdate) -> Result<()> {
    let response = client
        .post(url)
        .json(update)
        .send()
        .await
        .map_err(|e| CacheError::Internal(format!("POST {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(CacheError::Internal(format!(
            "POST {url}: peer answered {}",
            response.status()
        )));
    }
    Ok(())
}
