//! Configuration Module
//!
//! Handles loading and managing proxy configuration from environment
//! variables or a JSON config file.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::cluster::protocol::{canonical_peer, DEFAULT_HASH_PORT};

/// Proxy configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for locally cached objects
    pub local_path: PathBuf,
    /// Number of files allowed to be held locally (tracked, not an eviction trigger)
    pub total_files: usize,
    /// Byte budget for objects held in memory
    pub mem_cap: u64,
    /// Byte budget for objects held on disk
    pub disk_cap: u64,
    /// Objects strictly smaller than this are also kept in memory
    pub max_mem_file_size: u64,
    /// This node's cluster identifier (`host:hash_port`)
    pub local_name: String,
    /// Whether the distributed directory is enabled
    pub cluster: bool,
    /// Peer node identifiers (`host` or `host:port`)
    pub peers: Vec<String>,
    /// Port the directory-update listener binds to
    pub hash_port: u16,
    /// Proxy HTTP port
    pub server_port: u16,
    /// Base URL of an S3-compatible backend
    pub backend_url: Option<String>,
    /// Directory used as a filesystem backend
    pub backend_dir: Option<PathBuf>,
    /// Number of broadcast worker tasks
    pub broadcast_workers: usize,
    /// Capacity of the broadcast queue
    pub broadcast_queue: usize,
    /// Timeout for a single peer request in milliseconds
    pub peer_timeout_ms: u64,
    /// Peer liveness probe interval in seconds
    pub probe_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `LOCAL_PATH` - Local cache directory (default: /tmp/s3envoy)
    /// - `TOTAL_FILES` - File count cap (default: 10)
    /// - `MEM_CAP` - Memory byte cap (default: 100M)
    /// - `DISK_CAP` - Disk byte cap (default: 500M)
    /// - `MAX_MEM_FILE_SIZE` - In-memory size threshold (default: 10M)
    /// - `LOCAL_NAME` - Node identifier (default: 127.0.0.1:9081)
    /// - `CLUSTER` - Enable clustering (default: false)
    /// - `PEERS` - Comma separated peer identifiers (default: none)
    /// - `HASH_PORT` - Directory update port (default: 9081)
    /// - `SERVER_PORT` - Proxy port (default: 8080)
    /// - `BACKEND_URL` / `BACKEND_DIR` - Backend location
    /// - `BROADCAST_WORKERS` - Broadcast workers (default: 4)
    /// - `BROADCAST_QUEUE` - Broadcast queue capacity (default: 1024)
    /// - `PEER_TIMEOUT_MS` - Peer request timeout (default: 2000)
    /// - `PROBE_INTERVAL` - Liveness probe interval seconds (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            local_path: env::var("LOCAL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_path),
            total_files: parse_env("TOTAL_FILES").unwrap_or(defaults.total_files),
            mem_cap: env_bytes("MEM_CAP").unwrap_or(defaults.mem_cap),
            disk_cap: env_bytes("DISK_CAP").unwrap_or(defaults.disk_cap),
            max_mem_file_size: env_bytes("MAX_MEM_FILE_SIZE")
                .unwrap_or(defaults.max_mem_file_size),
            local_name: env::var("LOCAL_NAME").unwrap_or(defaults.local_name),
            cluster: env::var("CLUSTER")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.cluster),
            peers: env::var("PEERS")
                .map(|v| split_peers(&v))
                .unwrap_or(defaults.peers),
            hash_port: parse_env("HASH_PORT").unwrap_or(defaults.hash_port),
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
            backend_url: env::var("BACKEND_URL").ok(),
            backend_dir: env::var("BACKEND_DIR").ok().map(PathBuf::from),
            broadcast_workers: parse_env("BROADCAST_WORKERS")
                .unwrap_or(defaults.broadcast_workers),
            broadcast_queue: parse_env("BROADCAST_QUEUE").unwrap_or(defaults.broadcast_queue),
            peer_timeout_ms: parse_env("PEER_TIMEOUT_MS").unwrap_or(defaults.peer_timeout_ms),
            probe_interval: parse_env("PROBE_INTERVAL").unwrap_or(defaults.probe_interval),
        }
    }

    /// Loads a JSON config file using the PascalCase keys of the legacy
    /// deployment format. Missing keys fall back to the environment, then
    /// to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Parses the JSON config format from a string.
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let file: ConfigFile = serde_json::from_str(raw)?;
        let mut config = Self::from_env();

        if let Some(path) = file.local_path.filter(|p| !p.is_empty()) {
            config.local_path = PathBuf::from(path);
        }
        if let Some(total) = file.total_files.filter(|v| !v.is_empty()) {
            config.total_files = total
                .parse()
                .with_context(|| format!("invalid TotalFiles {total:?}"))?;
        }
        if let Some(cap) = file.mem_cap.filter(|v| !v.is_empty()) {
            config.mem_cap = parse_byte_size(&cap)
                .with_context(|| format!("invalid MemCap {cap:?}"))?;
        }
        if let Some(cap) = file.disk_cap.filter(|v| !v.is_empty()) {
            config.disk_cap = parse_byte_size(&cap)
                .with_context(|| format!("invalid DiskCap {cap:?}"))?;
        }
        if let Some(size) = file.max_mem_file_size.filter(|v| !v.is_empty()) {
            config.max_mem_file_size = parse_byte_size(&size)
                .with_context(|| format!("invalid MaxMemFileSize {size:?}"))?;
        }
        if let Some(name) = file.local_name.filter(|v| !v.is_empty()) {
            config.local_name = name;
        }
        if let Some(cluster) = file.cluster.filter(|v| !v.is_empty()) {
            config.cluster = parse_flag(&cluster)
                .with_context(|| format!("invalid Cluster {cluster:?}"))?;
        }
        if let Some(port) = file.hash_port.filter(|v| !v.is_empty()) {
            config.hash_port = port
                .parse()
                .with_context(|| format!("invalid HashPort {port:?}"))?;
        }
        if let Some(peers) = file.peers {
            config.peers = peers;
        }

        Ok(config)
    }

    /// Per-request timeout used for peer traffic.
    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    /// This node's identifier as peers know it (`host:hash_port`).
    pub fn node_name(&self) -> String {
        canonical_peer(&self.local_name, self.hash_port)
    }

    /// Configured peers in `host:port` form, without this node or duplicates.
    ///
    /// Entries without a port get `hash_port`.
    pub fn cluster_peers(&self) -> Vec<String> {
        let local = self.node_name();
        let mut peers: Vec<String> = self
            .peers
            .iter()
            .map(|peer| canonical_peer(peer, self.hash_port))
            .filter(|peer| *peer != local)
            .collect();
        peers.sort();
        peers.dedup();
        peers
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_path: PathBuf::from("/tmp/s3envoy"),
            total_files: 10,
            mem_cap: 100 * MEGABYTE,
            disk_cap: 500 * MEGABYTE,
            max_mem_file_size: 10 * MEGABYTE,
            local_name: "127.0.0.1:9081".to_string(),
            cluster: false,
            peers: Vec::new(),
            hash_port: DEFAULT_HASH_PORT,
            server_port: 8080,
            backend_url: None,
            backend_dir: None,
            broadcast_workers: 4,
            broadcast_queue: 1024,
            peer_timeout_ms: 2000,
            probe_interval: 5,
        }
    }
}

/// On-disk JSON layout. Numeric values are strings, as in the legacy
/// deployment files.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConfigFile {
    local_path: Option<String>,
    total_files: Option<String>,
    mem_cap: Option<String>,
    disk_cap: Option<String>,
    max_mem_file_size: Option<String>,
    local_name: Option<String>,
    cluster: Option<String>,
    hash_port: Option<String>,
    peers: Option<Vec<String>>,
}

const KILOBYTE: u64 = 1024;
const MEGABYTE: u64 = 1024 * KILOBYTE;
const GIGABYTE: u64 = 1024 * MEGABYTE;
const TERABYTE: u64 = 1024 * GIGABYTE;

/// Parses a human readable byte size such as `512`, `64K`, `100M`, `1.5GB`.
///
/// Units are binary multiples and case-insensitive.
pub fn parse_byte_size(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let value: f64 = number.parse().ok()?;
    if value < 0.0 {
        return None;
    }

    let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => KILOBYTE,
        "M" | "MB" | "MIB" => MEGABYTE,
        "G" | "GB" | "GIB" => GIGABYTE,
        "T" | "TB" | "TIB" => TERABYTE,
        _ => return None,
    };

    Some((value * multiplier as f64) as u64)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn split_peers(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_bytes(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| parse_byte_size(&v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.total_files, 10);
        assert_eq!(config.mem_cap, 100 * MEGABYTE);
        assert_eq!(config.disk_cap, 500 * MEGABYTE);
        assert_eq!(config.max_mem_file_size, 10 * MEGABYTE);
        assert_eq!(config.local_name, "127.0.0.1:9081");
        assert_eq!(config.hash_port, 9081);
        assert!(!config.cluster);
        assert!(config.peers.is_empty());
    }

    #[test]
    fn test_parse_byte_size_units() {
        assert_eq!(parse_byte_size("512"), Some(512));
        assert_eq!(parse_byte_size("512B"), Some(512));
        assert_eq!(parse_byte_size("64K"), Some(64 * 1024));
        assert_eq!(parse_byte_size("100M"), Some(100 * MEGABYTE));
        assert_eq!(parse_byte_size("100mb"), Some(100 * MEGABYTE));
        assert_eq!(parse_byte_size("1.5G"), Some(GIGABYTE + GIGABYTE / 2));
        assert_eq!(parse_byte_size("2T"), Some(2 * TERABYTE));
    }

    #[test]
    fn test_parse_byte_size_rejects_garbage() {
        assert_eq!(parse_byte_size(""), None);
        assert_eq!(parse_byte_size("M"), None);
        assert_eq!(parse_byte_size("10X"), None);
        assert_eq!(parse_byte_size("ten"), None);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("True"), Some(true));
        assert_eq!(parse_flag("False"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_split_peers() {
        assert_eq!(
            split_peers(" 10.0.0.1:9081, 10.0.0.2 ,,"),
            vec!["10.0.0.1:9081".to_string(), "10.0.0.2".to_string()]
        );
    }

    #[test]
    fn test_config_from_json_str() {
        let raw = r#"{
            "LocalPath": "/var/cache/envoy",
            "TotalFiles": "50",
            "MemCap": "1G",
            "DiskCap": "10G",
            "MaxMemFileSize": "1M",
            "LocalName": "10.0.0.1:9081",
            "Cluster": "True",
            "HashPort": "9090",
            "Peers": ["10.0.0.2:9081", "10.0.0.3:9081"]
        }"#;

        let config = Config::from_json_str(raw).unwrap();
        assert_eq!(config.local_path, PathBuf::from("/var/cache/envoy"));
        assert_eq!(config.total_files, 50);
        assert_eq!(config.mem_cap, GIGABYTE);
        assert_eq!(config.disk_cap, 10 * GIGABYTE);
        assert_eq!(config.max_mem_file_size, MEGABYTE);
        assert_eq!(config.local_name, "10.0.0.1:9081");
        assert!(config.cluster);
        assert_eq!(config.hash_port, 9090);
        assert_eq!(config.peers.len(), 2);
    }

    #[test]
    fn test_cluster_peers_are_canonical() {
        let config = Config {
            local_name: "10.0.0.1".to_string(),
            hash_port: 9090,
            peers: vec![
                "10.0.0.2".to_string(),
                "10.0.0.2:9090".to_string(),
                "10.0.0.1".to_string(),
                "10.0.0.3:7000".to_string(),
            ],
            ..Config::default()
        };

        assert_eq!(config.node_name(), "10.0.0.1:9090");
        assert_eq!(
            config.cluster_peers(),
            vec!["10.0.0.2:9090".to_string(), "10.0.0.3:7000".to_string()]
        );
    }

    #[test]
    fn test_config_from_json_rejects_bad_size() {
        let raw = r#"{ "MemCap": "lots" }"#;
        assert!(Config::from_json_str(raw).is_err());
    }
}
