//! s3envoy - A clustered local caching proxy for S3-compatible object stores
//!
//! Binary entry point: wires configuration, cache, cluster directory and
//! backend together and serves the proxy until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use s3envoy::api::{create_router, AppState};
use s3envoy::backend::{FsBackend, HttpBackend, ObjectBackend};
use s3envoy::cache::{CacheLimits, LocalCache};
use s3envoy::cluster::{
    directory_router, BroadcastSettings, Broadcaster, CacheDirectory, PeerMembership,
};
use s3envoy::proxy::{ProxyService, ProxySettings};
use s3envoy::{spawn_liveness_task, Config};

const BACKEND_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Main entry point for the caching proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from `CONFIG_FILE` or environment variables
/// 3. Build the backend client and the local cache
/// 4. With clustering on, start the directory listener, broadcast workers
///    and peer liveness task
/// 5. Start the proxy HTTP server on the configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "s3envoy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting s3envoy caching proxy");

    let config = match std::env::var("CONFIG_FILE") {
        Ok(path) => Config::from_json_file(&path)?,
        Err(_) => Config::from_env(),
    };
    info!(
        "Configuration loaded: local_path={}, total_files={}, mem_cap={}, disk_cap={}, cluster={}, port={}",
        config.local_path.display(),
        config.total_files,
        config.mem_cap,
        config.disk_cap,
        config.cluster,
        config.server_port
    );

    let backend = build_backend(&config)?;
    tokio::fs::create_dir_all(&config.local_path)
        .await
        .with_context(|| format!("creating cache directory {}", config.local_path.display()))?;
    let cache = LocalCache::new(CacheLimits::new(
        config.total_files,
        config.mem_cap,
        config.disk_cap,
    ));

    let mut background: Vec<JoinHandle<()>> = Vec::new();
    let directory = if config.cluster {
        Some(start_cluster(&config, &mut background).await?)
    } else {
        None
    };

    let proxy = ProxyService::new(cache, backend, directory, ProxySettings::from(&config));
    let app = create_router(AppState::new(proxy));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding proxy port {addr}"))?;
    info!("Proxy listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(background))
        .await
        .context("proxy server failed")?;

    info!("Server shutdown complete");
    Ok(())
}

fn build_backend(config: &Config) -> anyhow::Result<Arc<dyn ObjectBackend>> {
    if let Some(url) = &config.backend_url {
        info!("Using S3-compatible backend at {}", url);
        return Ok(Arc::new(HttpBackend::new(url.as_str(), BACKEND_CONNECT_TIMEOUT)?));
    }
    if let Some(dir) = &config.backend_dir {
        info!("Using filesystem backend at {}", dir.display());
        return Ok(Arc::new(FsBackend::new(dir)));
    }
    bail!("no backend configured: set BACKEND_URL or BACKEND_DIR")
}

/// Starts the directory listener, broadcast workers and liveness probe.
async fn start_cluster(
    config: &Config,
    background: &mut Vec<JoinHandle<()>>,
) -> anyhow::Result<Arc<CacheDirectory>> {
    let node_name = config.node_name();
    let peers = config.cluster_peers();
    let peer_count = peers.len();
    let membership = Arc::new(PeerMembership::new(peers));

    let (broadcaster, workers) = Broadcaster::spawn(
        BroadcastSettings {
            local_name: node_name.clone(),
            hash_port: config.hash_port,
            workers: config.broadcast_workers,
            queue_capacity: config.broadcast_queue,
            peer_timeout: config.peer_timeout(),
        },
        membership.clone(),
    )?;
    background.extend(workers);

    let directory = Arc::new(CacheDirectory::new(
        node_name.as_str(),
        membership.clone(),
        Some(broadcaster),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.hash_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding directory port {addr}"))?;
    info!("Directory listener on http://{}", addr);
    let router = directory_router(Arc::clone(&directory));
    background.push(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            warn!("Directory listener stopped: {}", e);
        }
    }));

    let client = reqwest::Client::builder()
        .timeout(config.peer_timeout())
        .build()
        .context("building liveness probe client")?;
    background.push(spawn_liveness_task(
        membership,
        client,
        config.probe_interval,
        config.hash_port,
    ));

    info!("Cluster enabled as {} with {} peers", node_name, peer_count);
    Ok(directory)
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the background tasks and allows graceful shutdown.
async fn shutdown_signal(background: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Pending broadcasts are abandoned; peers catch up on the next update
    for handle in &background {
        handle.abort();
    }
    warn!("{} background tasks aborted", background.len());
}
