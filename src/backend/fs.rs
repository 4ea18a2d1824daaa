//! Filesystem backend: objects live at `<root>/<bucket>/<key>`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::ObjectBackend;
use crate::error::{CacheError, Result};

#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl ObjectBackend for FsBackend {
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64> {
        let source = self.object_path(bucket, key);
        match tokio::fs::copy(&source, dest).await {
            Ok(size) => {
                debug!(bucket, key, size, "fetched from filesystem backend");
                Ok(size)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(CacheError::NotFound(format!("{bucket}/{key}")))
            }
            Err(e) => Err(CacheError::Backend(format!(
                "reading {}: {e}",
                source.display()
            ))),
        }
    }

    async fn upload(&self, bucket: &str, key: &str, path: &Path, size: u64) -> Result<()> {
        let target = self.object_path(bucket, key);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let copied = tokio::fs::copy(path, &target)
            .await
            .map_err(|e| CacheError::Backend(format!("writing {}: {e}", target.display())))?;
        if copied != size {
            return Err(CacheError::Backend(format!(
                "stored {copied} bytes for {bucket}/{key}, expected {size}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_then_download() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(root.path());

        let src = scratch.path().join("src");
        std::fs::write(&src, b"hello").unwrap();
        backend.upload("b", "dir/k", &src, 5).await.unwrap();
        assert!(backend.object_path("b", "dir/k").exists());

        let dest = scratch.path().join("dest");
        let size = backend.download("b", "dir/k", &dest).await.unwrap();
        assert_eq!(size, 5);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(root.path());
        let dest = root.path().join("out");

        let err = backend.download("b", "missing", &dest).await.unwrap_err();
        assert!(matches!(err, CacheError::NotFound(_)));
    }
}
