//! Directory Listener
//!
//! HTTP endpoint peers POST directory updates to, served on the hash port.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::cluster::directory::CacheDirectory;
use crate::cluster::protocol::DirectoryUpdate;
use crate::error::{CacheError, Result};
use crate::models::HealthResponse;

/// Router for the directory-update port.
///
/// # Endpoints
/// - `POST /` - apply a peer's update (body decoded regardless of content type)
/// - `GET /health` - liveness probe target
pub fn directory_router(directory: Arc<CacheDirectory>) -> Router {
    Router::new()
        .route("/", post(update_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(directory)
}

/// Handler for POST /
///
/// A malformed body drops that one update with a 400.
async fn update_handler(
    State(directory): State<Arc<CacheDirectory>>,
    body: Bytes,
) -> Result<StatusCode> {
    let update = DirectoryUpdate::from_slice(&body).map_err(|e| {
        warn!(error = %e, "dropping malformed directory update");
        CacheError::InvalidRequest(format!("malformed directory update: {e}"))
    })?;

    directory.apply(&update).await;
    Ok(StatusCode::OK)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
