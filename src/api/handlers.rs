//! API Handlers
//!
//! HTTP request handlers for the proxy endpoints.

use std::io::SeekFrom;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        header::{
            ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LAST_MODIFIED, RANGE,
        },
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Redirect, Response},
    Json,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};
use crate::models::{HealthResponse, PutResponse, StatsResponse};
use crate::proxy::{parse_range, GetOutcome, ProxyService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<ProxyService>,
}

impl AppState {
    /// Creates a new AppState around the given proxy service.
    pub fn new(proxy: ProxyService) -> Self {
        Self {
            proxy: Arc::new(proxy),
        }
    }
}

/// Handler for GET /:bucket/*key
///
/// Serves the object from memory or disk, honoring a single byte range,
/// or redirects to the peer that holds it.
pub async fn get_object_handler(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    let range = headers.get(RANGE).and_then(|v| v.to_str().ok());

    match state.proxy.handle_get(&bucket, &key).await? {
        GetOutcome::Redirect(location) => Ok(Redirect::temporary(&location).into_response()),
        GetOutcome::Memory(entry) => {
            let reader = entry
                .mem_file
                .as_ref()
                .map(|file| file.reader())
                .ok_or_else(|| CacheError::Internal(format!("{} lost its memory copy", entry.id)))?;
            serve(&entry, reader, range).await
        }
        GetOutcome::Disk(entry, file) => serve(&entry, file, range).await,
    }
}

/// Handler for PUT|POST /:bucket/*key
///
/// Streams the request body into the cache and acknowledges once it is
/// stored locally. The backend copy is written in the background.
pub async fn put_object_handler(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    body: Body,
) -> Result<Json<PutResponse>> {
    let ack = state
        .proxy
        .handle_put(&bucket, &key, body.into_data_stream())
        .await?;

    Ok(Json(PutResponse::from(ack)))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.proxy.stats().await;
    let directory_entries = state.proxy.directory_entries().await;

    Json(StatsResponse::new(&stats, directory_entries))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Streams an entry's content, or the requested slice of it.
async fn serve<R>(entry: &CacheEntry, mut reader: R, range: Option<&str>) -> Result<Response>
where
    R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
{
    let size = entry.size;
    let range = match range {
        Some(header) => parse_range(header, size)?,
        None => None,
    };

    let mut builder = Response::builder()
        .header(CONTENT_TYPE, "application/octet-stream")
        .header(ACCEPT_RANGES, "bytes")
        .header(LAST_MODIFIED, entry.http_date());

    let (status, start, len) = match range {
        Some(range) => {
            builder = builder.header(CONTENT_RANGE, range.content_range(size));
            (StatusCode::PARTIAL_CONTENT, range.start, range.len())
        }
        None => (StatusCode::OK, 0, size),
    };

    reader.seek(SeekFrom::Start(start)).await?;
    let body = Body::from_stream(ReaderStream::new(reader.take(len)));

    builder
        .status(status)
        .header(CONTENT_LENGTH, len)
        .body(body)
        .map_err(|e| CacheError::Internal(format!("building response: {e}")))
}
