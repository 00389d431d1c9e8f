//! HTTP API tests driven through the router without binding a socket.
//!
//! Run with: `cargo test --test api_routes`

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use relieftiles::coord::lon_lat_to_tile;
use relieftiles::fetch::{FetchClient, FetchConfig};
use relieftiles::jobs::JobManager;
use relieftiles::orchestrator::DownloadOrchestrator;
use relieftiles::provider::{AsyncHttpClient, HttpResponse, LayerSet, ProviderError};
use relieftiles::server::router;
use relieftiles::store::{StoreConfig, TileStore};
use relieftiles::tile::TileKey;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

// ============================================================================
// Helper Functions
// ============================================================================

/// Answers every request with the same 200 response.
struct FixedClient {
    len: usize,
}

impl AsyncHttpClient for FixedClient {
    async fn get(&self, _url: &str) -> Result<HttpResponse, ProviderError> {
        Ok(HttpResponse::new(200, vec![3u8; self.len]))
    }
}

struct TestApi {
    router: Router,
    store: TileStore,
    _dir: TempDir,
}

fn api(fetch: FetchConfig) -> TestApi {
    let dir = TempDir::new().unwrap();
    let store = TileStore::new(StoreConfig::new(dir.path()));
    let orchestrator = DownloadOrchestrator::new(
        FetchClient::new(FixedClient { len: 20_000 }, fetch),
        store.clone(),
        LayerSet::builtin(),
    );
    let manager = Arc::new(JobManager::new(orchestrator, 4096));
    TestApi {
        router: router(manager),
        store,
        _dir: dir,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(router, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(router: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

const SMALL_AREA_REQUEST: &str = r#"{
    "area": {"type": "bounding_box", "north": 51.71, "south": 51.63, "east": -1.22, "west": -1.35},
    "zoomLevels": [12],
    "layers": ["osm"]
}"#;

// ============================================================================
// Jobs
// ============================================================================

#[tokio::test]
async fn test_submit_then_poll_until_complete() {
    let api = api(FetchConfig::default().without_delay());

    let (status, body) = post_json(&api.router, "/tiles/download", SMALL_AREA_REQUEST).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = body["jobId"].as_str().unwrap().to_string();

    let job = loop {
        let (status, job) = get_json(&api.router, &format!("/tiles/jobs/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        if job["state"] != "pending" && job["state"] != "running" {
            break job;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    assert_eq!(job["state"], "completed");
    assert_eq!(job["completed"], job["total"]);
    assert_eq!(job["stats"]["success"], job["total"]);
    for key in ["skipped_good", "skipped_blocked", "blocked", "failed", "timeout", "error"] {
        assert_eq!(job["stats"][key], 0, "{}", key);
    }

    let (status, jobs) = get_json(&api.router, "/tiles/jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(jobs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_submissions_are_rejected() {
    let api = api(FetchConfig::default().without_delay());

    let (status, body) = post_json(&api.router, "/tiles/download", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let unknown_layer = SMALL_AREA_REQUEST.replace(r#"["osm"]"#, r#"["terrain"]"#);
    let (status, body) = post_json(&api.router, "/tiles/download", &unknown_layer).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("terrain"));

    let no_zoom = SMALL_AREA_REQUEST.replace("[12]", "[]");
    let (status, _) = post_json(&api.router, "/tiles/download", &no_zoom).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bad_lat = SMALL_AREA_REQUEST.replace("51.71", "91.0");
    let (status, _) = post_json(&api.router, "/tiles/download", &bad_lat).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_jobs_are_not_found() {
    let api = api(FetchConfig::default());

    let (status, _) = get(&api.router, "/tiles/jobs/not-a-job").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let missing = format!("/tiles/jobs/{}", uuid::Uuid::new_v4());
    let (status, body) = get_json(&api.router, &missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let request = Request::delete(missing.as_str()).body(Body::empty()).unwrap();
    let (status, _) = send(&api.router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_running_job() {
    // Default pacing keeps the job on its first delay long enough to cancel
    let api = api(FetchConfig::default());

    let (status, body) = post_json(&api.router, "/tiles/download", SMALL_AREA_REQUEST).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let uri = format!("/tiles/jobs/{}", body["jobId"].as_str().unwrap());

    let request = Request::delete(uri.as_str()).body(Body::empty()).unwrap();
    let (status, _) = send(&api.router, request).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_stream_download_sends_events_then_complete() {
    let api = api(FetchConfig::default().without_delay());

    let (status, body) = get(
        &api.router,
        "/tiles/download?lat=51.67&lon=-1.28&radiusMiles=3&minZoom=12&maxZoom=13&layers=osm",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(body).unwrap();
    let events: Vec<Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        .collect();

    let (last, progress) = events.split_last().unwrap();
    assert_eq!(last["type"], "complete");
    assert_eq!(last["state"], "completed");
    assert_eq!(last["total"].as_u64().unwrap(), progress.len() as u64);
    assert!(!progress.is_empty());
    for (i, event) in progress.iter().enumerate() {
        assert_eq!(event["type"], "progress");
        assert_eq!(event["outcome"], "success");
        assert_eq!(event["completed"].as_u64().unwrap(), i as u64 + 1);
    }
}

#[tokio::test]
async fn test_stream_download_rejects_bad_query() {
    let api = api(FetchConfig::default().without_delay());

    let (status, _) = get(&api.router, "/tiles/download?lat=51.67").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(
        &api.router,
        "/tiles/download?lat=51.67&lon=-1.28&radiusMiles=3&minZoom=12&maxZoom=12&layers=terrain",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Stored tiles
// ============================================================================

fn stored_key(zoom: u8) -> TileKey {
    TileKey::from_coord("osm", lon_lat_to_tile(51.67, -1.28, zoom))
}

#[tokio::test]
async fn test_serve_stored_tile() {
    let api = api(FetchConfig::default());
    let key = stored_key(14);
    api.store.write(&key, vec![0x89u8; 5000]).await.unwrap();

    let uri = format!("/tiles/osm/{}/{}/{}.png", key.zoom(), key.x(), key.y());
    let response = api
        .router
        .clone()
        .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.len(), 5000);

    let missing = format!("/tiles/osm/{}/{}/{}.png", key.zoom(), key.x(), key.y() + 1);
    let (status, _) = get(&api.router, &missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&api.router, "/tiles/osm/14/abc/1.png").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&api.router, "/tiles/osm/14/1/1.jpg").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_and_blocked_audit() {
    let api = api(FetchConfig::default());
    let good = stored_key(14);
    let blocked = stored_key(15);
    api.store.write(&good, vec![1u8; 9000]).await.unwrap();
    api.store.write(&blocked, vec![1u8; 7412]).await.unwrap();

    let (status, body) = get_json(&api.router, "/tiles/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blockedTileSize"], 7412);
    let layers = body["layers"].as_array().unwrap();
    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0]["layer"], "osm");
    assert_eq!(layers[0]["good"], 1);
    assert_eq!(layers[0]["blocked"], 1);
    assert_eq!(layers[0]["bytes"], 9000 + 7412);

    let (status, body) = get_json(&api.router, "/tiles/blocked").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["tiles"][0]["zoom"], 15);
    assert_eq!(body["tiles"][0]["x"], blocked.x());
    assert_eq!(body["tiles"][0]["y"], blocked.y());

    let (status, body) = get_json(&api.router, "/tiles/blocked?layer=satellite").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let (status, _) = get(&api.router, "/tiles/blocked?layer=../etc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
