//! Backend Module
//!
//! The remote object store behind the cache. The proxy only needs to copy a
//! whole object down into a local file and push a local file back up.

mod fs;
mod http;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

pub use fs::FsBackend;
pub use http::HttpBackend;

/// Remote object store the cache fills from and writes through to.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Writes the object to `dest` and returns its size in bytes.
    ///
    /// Returns `CacheError::NotFound` if the backend has no such object.
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64>;

    /// Stores the `size`-byte file at `path` as the object.
    async fn upload(&self, bucket: &str, key: &str, path: &Path, size: u64) -> Result<()>;
}

/// Percent-encodes each segment of an object key, keeping the separators.
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_key_keeps_separators() {
        assert_eq!(encode_key("dir/sub/file.txt"), "dir/sub/file.txt");
        assert_eq!(encode_key("a b/c?d"), "a%20b/c%3Fd");
    }
}
