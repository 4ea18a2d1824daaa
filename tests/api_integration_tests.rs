//! Integration Tests for API Endpoints
//!
//! Tests the full request/response cycle of the proxy router against a
//! filesystem backend in a scratch directory.

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use s3envoy::{
    api::create_router,
    backend::FsBackend,
    cache::{CacheLimits, LocalCache, ObjectKey},
    cluster::{CacheDirectory, DirectoryUpdate, PeerMembership},
    proxy::{ProxyService, ProxySettings},
    AppState, Config,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

// == Helper Functions ==

struct TestApp {
    app: Router,
    root: TempDir,
}

impl TestApp {
    fn backend_path(&self, bucket: &str, key: &str) -> std::path::PathBuf {
        self.root.path().join("backend").join(bucket).join(key)
    }

    fn seed(&self, bucket: &str, key: &str, content: &[u8]) {
        let path = self.backend_path(bucket, key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

fn build_app(root: &Path, limits: CacheLimits, directory: Option<Arc<CacheDirectory>>) -> Router {
    let proxy = ProxyService::new(
        LocalCache::new(limits),
        Arc::new(FsBackend::new(root.join("backend"))),
        directory,
        ProxySettings {
            local_path: root.join("cache"),
            max_mem_file_size: 16,
            server_port: 8080,
        },
    );
    create_router(AppState::new(proxy))
}

fn create_test_app() -> TestApp {
    create_test_app_with(CacheLimits::new(10, 100, 1000))
}

fn create_test_app_with(limits: CacheLimits) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let app = build_app(root.path(), limits, None);
    TestApp { app, root }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn put(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .body(Body::from(body))
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_to_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

// == Object GET ==

#[tokio::test]
async fn test_get_fills_from_backend() {
    let t = create_test_app();
    t.seed("photos", "2024/cat.jpg", b"meow");

    let response = t.app.clone().oneshot(get("/photos/2024/cat.jpg")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "4");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert!(response.headers().contains_key(header::LAST_MODIFIED));
    assert_eq!(body_to_bytes(response.into_body()).await, b"meow");

    // Served from cache even after the backend copy disappears
    std::fs::remove_file(t.backend_path("photos", "2024/cat.jpg")).unwrap();
    let response = t.app.clone().oneshot(get("/photos/2024/cat.jpg")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_bytes(response.into_body()).await, b"meow");
}

#[tokio::test]
async fn test_get_large_object_from_disk() {
    let t = create_test_app();
    let content = b"this object is too large to keep in memory";
    t.seed("b", "large.bin", content);

    let response = t.app.clone().oneshot(get("/b/large.bin")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_bytes(response.into_body()).await, content);

    let stats = body_to_json(t.app.clone().oneshot(get("/stats")).await.unwrap().into_body()).await;
    assert_eq!(stats["mem_bytes"], 0);
    assert_eq!(stats["disk_bytes"], content.len() as u64);
}

#[tokio::test]
async fn test_get_not_found() {
    let t = create_test_app();

    let response = t.app.clone().oneshot(get("/b/missing")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("b/missing"));
}

#[tokio::test]
async fn test_get_range() {
    let t = create_test_app();
    t.seed("b", "digits", b"0123456789");

    for (range, expected, content_range) in [
        ("bytes=0-3", &b"0123"[..], "bytes 0-3/10"),
        ("bytes=7-", &b"789"[..], "bytes 7-9/10"),
        ("bytes=-2", &b"89"[..], "bytes 8-9/10"),
    ] {
        let response = t
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/b/digits")
                    .header(header::RANGE, range)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT, "{range}");
        assert_eq!(response.headers()[header::CONTENT_RANGE], content_range);
        assert_eq!(body_to_bytes(response.into_body()).await, expected);
    }
}

#[tokio::test]
async fn test_get_range_not_satisfiable() {
    let t = create_test_app();
    t.seed("b", "digits", b"0123456789");

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/b/digits")
                .header(header::RANGE, "bytes=50-")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn test_get_oversized_object() {
    let t = create_test_app_with(CacheLimits::new(10, 100, 20));
    t.seed("b", "huge", &[7u8; 64]);

    let response = t.app.clone().oneshot(get("/b/huge")).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_get_redirects_to_peer() {
    let root = tempfile::tempdir().unwrap();
    let membership = Arc::new(PeerMembership::new(["10.1.1.2:9081"]));
    let directory = Arc::new(CacheDirectory::new("10.1.1.1:9081", membership, None));
    directory
        .record_ownership("b", "dir/k", "10.1.1.2:9081", false)
        .await;
    let app = build_app(root.path(), CacheLimits::new(10, 100, 1000), Some(directory));

    let response = app.oneshot(get("/b/dir/k")).await.unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()[header::LOCATION],
        "http://10.1.1.2:8080/b/dir/k"
    );
}

#[tokio::test]
async fn test_get_redirects_to_peer_listed_without_port() {
    let config = Config {
        local_name: "10.1.1.1".to_string(),
        peers: vec!["10.1.1.1".to_string(), "10.1.1.2".to_string()],
        hash_port: 9081,
        ..Config::default()
    };
    let membership = Arc::new(PeerMembership::new(config.cluster_peers()));
    let directory = Arc::new(CacheDirectory::new(config.node_name(), membership, None));

    // The owning node names itself host:hash_port on the wire
    directory
        .apply(&DirectoryUpdate::add("10.1.1.2:9081", &ObjectKey::new("b", "k")))
        .await;

    let root = tempfile::tempdir().unwrap();
    let app = build_app(root.path(), CacheLimits::new(10, 100, 1000), Some(directory));
    let response = app.oneshot(get("/b/k")).await.unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "http://10.1.1.2:8080/b/k");
}

// == Object PUT ==

#[tokio::test]
async fn test_put_then_get() {
    let t = create_test_app();

    let response = t.app.clone().oneshot(put("/b/notes/today.txt", "remember")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["size"], 8);
    assert_eq!(json["key"], "notes/today.txt");

    let response = t.app.clone().oneshot(get("/b/notes/today.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_bytes(response.into_body()).await, b"remember");
}

#[tokio::test]
async fn test_post_overwrites_object() {
    let t = create_test_app();

    t.app.clone().oneshot(put("/b/k", "old")).await.unwrap();
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/b/k")
                .body(Body::from("new value"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = t.app.clone().oneshot(get("/b/k")).await.unwrap();
    assert_eq!(body_to_bytes(response.into_body()).await, b"new value");

    let stats = body_to_json(t.app.clone().oneshot(get("/stats")).await.unwrap().into_body()).await;
    assert_eq!(stats["total_entries"], 1);
}

#[tokio::test]
async fn test_put_rejects_traversal() {
    let t = create_test_app();

    let response = t.app.clone().oneshot(put("/b/%2E%2E/escape", "x")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// == STATS / HEALTH ==

#[tokio::test]
async fn test_stats_track_hits_and_evictions() {
    let t = create_test_app_with(CacheLimits::new(10, 100, 12));
    t.seed("b", "one", b"aaaaaaaa");
    t.seed("b", "two", b"bbbbbbbb");

    t.app.clone().oneshot(get("/b/one")).await.unwrap();
    t.app.clone().oneshot(get("/b/one")).await.unwrap();
    t.app.clone().oneshot(get("/b/two")).await.unwrap();

    let stats = body_to_json(t.app.clone().oneshot(get("/stats")).await.unwrap().into_body()).await;
    assert_eq!(stats["hits"], 1);
    assert_eq!(stats["evictions"], 1);
    assert_eq!(stats["total_entries"], 1);
    assert_eq!(stats["disk_bytes"], 8);
    assert!(stats.get("directory_entries").is_none());
}

#[tokio::test]
async fn test_health_endpoint() {
    let t = create_test_app();

    let response = t.app.clone().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}
