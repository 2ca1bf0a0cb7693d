//! API Regression Tests
//!
//! Drives the router with `tower::ServiceExt::oneshot` against state filled
//! by a real pipeline run, so handler output stays in sync with storage.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use cradlewatch::acquisition::{synthetic_frame, ReplaySource};
use cradlewatch::api::{create_app, ApiState};
use cradlewatch::config::MonitorConfig;
use cradlewatch::inference::ScriptedBackend;
use cradlewatch::types::{BabyState, RawInput};
use cradlewatch::{AppState, HistoryStorage, PipelineCoordinator, ProcessingLoop};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const FACE_DOWN: &str =
    r#"{"baby_present": true, "face_down": true, "sleeping": true, "severity": 8, "hazards": []}"#;
const CALM: &str =
    r#"{"baby_present": true, "face_down": false, "sleeping": true, "severity": 1, "hazards": []}"#;

/// Run three windows (one face-down) and build an app over the results.
async fn populated_app(dir: &tempfile::TempDir) -> (Router, HistoryStorage) {
    let mut cfg = MonitorConfig::default();
    cfg.inference.backoff_base_ms = 0;
    cfg.inference.api_key = Some("secret-token".to_string());

    let storage = HistoryStorage::open(dir.path().join("db")).unwrap();
    let app_state = Arc::new(RwLock::new(AppState::new("nursery")));
    let backend = Arc::new(ScriptedBackend::new([CALM, FACE_DOWN, CALM]));
    let coordinator = PipelineCoordinator::new(&cfg, backend);
    let processing_loop = ProcessingLoop::new(coordinator, Arc::clone(&app_state), CancellationToken::new())
        .with_storage(storage.clone());

    let inputs = (0..3)
        .map(|i| RawInput::frame(format!("w{i}"), "test", synthetic_frame(BabyState::Asleep, 64, 64)))
        .collect();
    processing_loop
        .run(&mut ReplaySource::new(inputs, 0))
        .await
        .unwrap();

    let state = ApiState::new(app_state, Arc::new(cfg)).with_storage(storage.clone());
    (create_app(state), storage)
}

#[tokio::test]
async fn scenes_without_storage_come_from_memory() {
    let mut cfg = MonitorConfig::default();
    cfg.inference.backoff_base_ms = 0;

    let app_state = Arc::new(RwLock::new(AppState::new("nursery")));
    let backend = Arc::new(ScriptedBackend::new(Vec::<String>::new()).with_fallback(CALM));
    let coordinator = PipelineCoordinator::new(&cfg, backend);
    let inputs = (0..5)
        .map(|i| RawInput::frame(format!("w{i}"), "test", synthetic_frame(BabyState::Asleep, 64, 64)))
        .collect();
    ProcessingLoop::new(coordinator, Arc::clone(&app_state), CancellationToken::new())
        .run(&mut ReplaySource::new(inputs, 0))
        .await
        .unwrap();
    let app = create_app(ApiState::new(app_state, Arc::new(cfg)));

    let (status, body) = call(&app, "GET", "/api/v1/scenes?limit=3", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["window_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["w4", "w3", "w2"]);
}

async fn call(app: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().method(method).uri(uri).body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn status_reflects_processed_windows() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = populated_app(&dir).await;

    let (status, body) = call(&app, "GET", "/api/v1/status", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["monitor"], "nursery");
    assert_eq!(body["data"]["windows_processed"], 3);
    assert_eq!(body["data"]["source"], "replay");
}

#[tokio::test]
async fn scenes_are_newest_first_and_limited() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = populated_app(&dir).await;

    let (status, body) = call(&app, "GET", "/api/v1/scenes?limit=2", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let scenes = body["data"].as_array().unwrap();
    assert_eq!(scenes.len(), 2);
    assert_eq!(scenes[0]["window_id"], "w2");
    assert_eq!(scenes[1]["window_id"], "w1");

    let (_, latest) = call(&app, "GET", "/api/v1/scene/latest", Body::empty()).await;
    assert_eq!(latest["data"]["window_id"], "w2");

    // frames were captured just now, so every scene is after 2000
    let uri = "/api/v1/scenes?since=2000-01-01T00:00:00Z&limit=10";
    let (status, body) = call(&app, "GET", uri, Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"][0]["window_id"], "w2");

    let uri = "/api/v1/scenes?until=2000-01-01T00:00:00Z";
    let (_, body) = call(&app, "GET", uri, Body::empty()).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn alerts_can_be_acknowledged() {
    let dir = tempfile::tempdir().unwrap();
    let (app, storage) = populated_app(&dir).await;

    let (_, body) = call(&app, "GET", "/api/v1/alerts", Body::empty()).await;
    let alerts = body["data"].as_array().unwrap();
    let face_down = alerts
        .iter()
        .find(|a| a["rule"] == "face_down")
        .expect("face_down alert stored");
    assert_eq!(face_down["severity"], "critical");
    assert_eq!(face_down["acknowledged"], false);
    let id = face_down["id"].as_u64().unwrap();

    let uri = format!("/api/v1/alerts/{id}/acknowledge");
    let (status, body) = call(&app, "POST", &uri, Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["acknowledged"], true);
    assert!(storage.get_alert(id).unwrap().unwrap().acknowledged);

    let (status, body) = call(&app, "GET", &format!("/api/v1/alerts/{id}"), Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["acknowledged"], true);

    let (status, body) = call(&app, "POST", "/api/v1/alerts/9999/acknowledge", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    let (status, _) = call(&app, "GET", "/api/v1/alerts/9999", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn config_is_redacted() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = populated_app(&dir).await;

    let (status, body) = call(&app, "GET", "/api/v1/config", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["inference"]["api_key"], "***");
    assert!(!body.to_string().contains("secret-token"));
}

#[tokio::test]
async fn config_validation_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = populated_app(&dir).await;

    let valid = "[alerting]\nseverity_threshold = 8\nsevrity = 1\n";
    let (status, body) = call(&app, "POST", "/api/v1/config/validate", Body::from(valid)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["warnings"].as_array().unwrap().len(), 1);

    let invalid = "[aggregation]\nsmoothing_window = 0\n";
    let (status, body) = call(&app, "POST", "/api/v1/config/validate", Body::from(invalid)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], false);

    let (status, body) = call(&app, "POST", "/api/v1/config/validate", Body::from("[[[")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn stats_include_storage() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = populated_app(&dir).await;

    let (status, body) = call(&app, "GET", "/api/v1/stats", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["windows_processed"], 3);
    assert_eq!(body["data"]["storage"]["scene_count"], 3);

    let (status, body) = call(&app, "GET", "/health", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
}
