//! Tests for session expiry and reclamation.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use common::TestServer;
use common::fixtures::{seeded_bytes, split_into_chunks};
use depot_core::{CHUNK_SIZE, UploadId};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;

async fn request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Body>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        // The JSON control-plane endpoints (POST /v1/uploads) are extracted
        // with axum's `Json`, which requires an application/json content type;
        // binary chunk bodies (PUT) are read raw and are content-type agnostic.
        let content_type = if method == "POST" {
            "application/json"
        } else {
            "application/octet-stream"
        };
        builder = builder.header("Content-Type", content_type);
    }
    let response = router
        .clone()
        .oneshot(builder.body(body.unwrap_or_else(Body::empty)).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn start_session(server: &TestServer, temp_identifier: &str, size: u64) -> String {
    let (status, body) = request(
        &server.router,
        "POST",
        "/v1/uploads",
        Some(Body::from(
            serde_json::to_vec(&json!({
                "filename": "data.bin",
                "size": size,
                "temp_identifier": temp_identifier,
            }))
            .unwrap(),
        )),
    )
    .await;
    assert!(status.is_success(), "init failed: {body}");
    body["upload_id"].as_str().unwrap().to_string()
}

async fn send_chunk(server: &TestServer, upload_id: &str, index: u32, data: Bytes) {
    let (status, body) = request(
        &server.router,
        "PUT",
        &format!("/v1/uploads/{upload_id}/chunks/{index}"),
        Some(Body::from(data)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "chunk failed: {body}");
}

/// One-second TTL: sessions idle out after a short sleep, while the requests
/// driving the flow stay comfortably inside the window.
fn short_ttl(config: &mut depot_core::config::AppConfig) {
    config.sweep.session_ttl_secs = 1;
}

async fn outlive_ttl() {
    tokio::time::sleep(Duration::from_millis(1200)).await;
}

#[tokio::test]
async fn sweep_reclaims_idle_pending_session() {
    let server = TestServer::with_config(short_ttl).await;
    let source = seeded_bytes(1, 700_000);
    let chunks = split_into_chunks(&source, CHUNK_SIZE as usize);

    let upload_id = start_session(&server, "t-idle", 700_000).await;
    send_chunk(&server, &upload_id, 0, chunks[0].clone()).await;

    outlive_ttl().await;
    let swept = depot_server::sweep::run_sweep(&server.state).await;
    assert_eq!(swept, 1);

    assert!(server.state.sessions.is_empty());
    assert!(
        server
            .state
            .storage
            .list("uploads/")
            .await
            .unwrap()
            .is_empty(),
        "chunk blobs must be purged with the session"
    );
}

#[tokio::test]
async fn sweep_keeps_active_sessions() {
    // Default TTL is 24h, so nothing here is idle
    let server = TestServer::new().await;
    let upload_id = start_session(&server, "t-active", 700_000).await;

    let swept = depot_server::sweep::run_sweep(&server.state).await;
    assert_eq!(swept, 0);

    let (status, _) = request(
        &server.router,
        "GET",
        &format!("/v1/uploads/{upload_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn sweep_drops_stale_completed_records_but_keeps_artifact() {
    let server = TestServer::with_config(short_ttl).await;
    let source = seeded_bytes(2, 700_000);
    let chunks = split_into_chunks(&source, CHUNK_SIZE as usize);

    let upload_id = start_session(&server, "t-done", 700_000).await;
    send_chunk(&server, &upload_id, 0, chunks[0].clone()).await;
    send_chunk(&server, &upload_id, 1, chunks[1].clone()).await;

    let (status, artifact) = request(
        &server.router,
        "POST",
        &format!("/v1/uploads/{upload_id}/complete"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let artifact_path = artifact["path"].as_str().unwrap().to_string();

    outlive_ttl().await;
    let swept = depot_server::sweep::run_sweep(&server.state).await;
    assert_eq!(swept, 1);
    assert!(server.state.sessions.is_empty());

    // The assembled artifact outlives the session record
    assert!(server.state.storage.exists(&artifact_path).await.unwrap());
}

#[tokio::test]
async fn idle_session_expires_lazily_on_access() {
    let server = TestServer::with_config(short_ttl).await;
    let upload_id = start_session(&server, "t-lazy", 700_000).await;

    outlive_ttl().await;

    // No sweep has run, but the session is already gone from the client's
    // point of view; the access also reclaims it.
    let (status, body) = request(
        &server.router,
        "GET",
        &format!("/v1/uploads/{upload_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "unknown_session");
    assert!(server.state.sessions.is_empty());
}

#[tokio::test]
async fn sweep_skips_session_mid_completion() {
    let server = TestServer::with_config(short_ttl).await;
    let upload_id = start_session(&server, "t-locked", 700_000).await;

    let handle = server
        .state
        .sessions
        .get(&UploadId::parse(&upload_id).unwrap())
        .unwrap();
    let guard = handle.completion().lock().await;

    outlive_ttl().await;
    let swept = depot_server::sweep::run_sweep(&server.state).await;
    assert_eq!(swept, 0, "a session mid-completion must not be reclaimed");
    assert_eq!(server.state.sessions.len(), 1);

    drop(guard);
    let swept = depot_server::sweep::run_sweep(&server.state).await;
    assert_eq!(swept, 1);
}
