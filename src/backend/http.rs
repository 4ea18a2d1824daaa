//! S3-compatible HTTP backend using path-style URLs
//! (`<base>/<bucket>/<key>`).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header::CONTENT_LENGTH, Body, Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{encode_key, ObjectBackend};
use crate::error::{CacheError, Result};

#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| CacheError::Internal(format!("building backend client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            encode_key(key)
        )
    }
}

#[async_trait]
impl ObjectBackend for HttpBackend {
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64> {
        let url = self.object_url(bucket, key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CacheError::Backend(format!("GET {url}: {e}")))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(CacheError::NotFound(format!("{bucket}/{key}"))),
            status => return Err(CacheError::Backend(format!("GET {url}: {status}"))),
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| CacheError::Backend(format!("GET {url}: {e}")))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(bucket, key, size = written, "fetched from backend");
        Ok(written)
    }

    async fn upload(&self, bucket: &str, key: &str, path: &Path, size: u64) -> Result<()> {
        let url = self.object_url(bucket, key);
        let file = tokio::fs::File::open(path).await?;

        let response = self
            .client
            .put(&url)
            .header(CONTENT_LENGTH, size)
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|e| CacheError::Backend(format!("PUT {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(CacheError::Backend(format!(
                "PUT {url}: {}",
                response.status()
            )));
        }
        debug!(bucket, key, size, "stored in backend");
        Ok(())
    }
}
