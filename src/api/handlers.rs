//! API route handlers
//!
//! Handlers answer with [`ApiResponse::ok`]; the fallible ones return
//! [`ApiError`] for the error envelope. Storage is optional; without it the
//! handlers fall back to the in-memory [`AppState`].

use axum::extract::{Path, Query, State};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::envelope::{ApiError, ApiResponse};
use crate::config::defaults::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::config::{ConfigError, MonitorConfig};
use crate::pipeline::AppState;
use crate::storage::{HistoryStorage, StorageStats};
use crate::types::{Alert, BabyState, SceneSummary};

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Application state from the pipeline
    pub app_state: Arc<RwLock<AppState>>,
    /// Scene and alert history
    pub storage: Option<HistoryStorage>,
    /// Active configuration (served redacted)
    pub config: Arc<MonitorConfig>,
}

impl ApiState {
    pub fn new(app_state: Arc<RwLock<AppState>>, config: Arc<MonitorConfig>) -> Self {
        Self {
            app_state,
            storage: None,
            config,
        }
    }

    pub fn with_storage(mut self, storage: HistoryStorage) -> Self {
        self.storage = Some(storage);
        self
    }
}

/// `?limit=` for list endpoints; `since`/`until` (RFC 3339) bound scenes by
/// window time, inclusive
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ListQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
    }

    fn is_ranged(&self) -> bool {
        self.since.is_some() || self.until.is_some()
    }

    fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.since.map_or(true, |s| ts >= s) && self.until.map_or(true, |u| ts <= u)
    }
}

// ============================================================================
// Health & Status
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

/// GET /health
pub async fn health_check(State(state): State<ApiState>) -> Response {
    let app_state = state.app_state.read().await;
    ApiResponse::ok(HealthResponse {
        status: app_state.status.to_string(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: app_state.uptime_secs(),
    })
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub monitor: String,
    pub status: String,
    pub source: String,
    pub backend: String,
    pub uptime_seconds: u64,
    pub windows_received: u64,
    pub windows_processed: u64,
    pub windows_skipped: u64,
    pub alerts_raised: u64,
    pub critical_alerts: u64,
    pub last_window_time: Option<DateTime<Utc>>,
    /// Smoothed state of the latest window
    pub stable_state: Option<BabyState>,
    pub summary: Option<String>,
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<ApiState>) -> Response {
    let app = state.app_state.read().await;
    ApiResponse::ok(StatusResponse {
        monitor: app.monitor_name.clone(),
        status: app.status.to_string(),
        source: app.source_name.clone(),
        backend: app.backend_name.clone(),
        uptime_seconds: app.uptime_secs(),
        windows_received: app.windows_received,
        windows_processed: app.windows_processed,
        windows_skipped: app.windows_skipped,
        alerts_raised: app.alerts_raised,
        critical_alerts: app.critical_alerts,
        last_window_time: app.last_window_time,
        stable_state: app.latest_scene.as_ref().map(|s| s.stable_state),
        summary: app.latest_scene.as_ref().map(|s| s.summary.clone()),
    })
}

// ============================================================================
// Scenes
// ============================================================================

/// GET /api/v1/scene/latest. `data` is null before the first window.
pub async fn get_latest_scene(State(state): State<ApiState>) -> Response {
    let in_memory = state.app_state.read().await.latest_scene.clone();
    let scene = in_memory.or_else(|| state.storage.as_ref().and_then(HistoryStorage::latest_scene));
    ApiResponse::ok(scene)
}

/// GET /api/v1/scenes?limit=N, newest first
pub async fn get_scenes(State(state): State<ApiState>, Query(query): Query<ListQuery>) -> Response {
    let limit = query.limit();
    let scenes: Vec<SceneSummary> = match &state.storage {
        Some(storage) if query.is_ranged() => {
            let since = query.since.unwrap_or(DateTime::<Utc>::MIN_UTC);
            let until = query.until.unwrap_or_else(Utc::now);
            storage
                .scenes_between(since, until)
                .into_iter()
                .rev()
                .take(limit)
                .collect()
        }
        Some(storage) => storage.recent_scenes(limit),
        None => state
            .app_state
            .read()
            .await
            .recent_scenes
            .iter()
            .rev()
            .filter(|s| query.contains(s.timestamp))
            .take(limit)
            .cloned()
            .collect(),
    };
    ApiResponse::ok(scenes)
}

// ============================================================================
// Alerts
// ============================================================================

/// GET /api/v1/alerts?limit=N, newest first
pub async fn get_alerts(State(state): State<ApiState>, Query(query): Query<ListQuery>) -> Response {
    let limit = query.limit();
    let alerts: Vec<Alert> = match &state.storage {
        Some(storage) => storage.recent_alerts(limit),
        None => state
            .app_state
            .read()
            .await
            .recent_alerts
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect(),
    };
    ApiResponse::ok(alerts)
}

/// GET /api/v1/alerts/:id
pub async fn get_alert(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
) -> Result<Response, ApiError> {
    let stored = match &state.storage {
        Some(storage) => storage.get_alert(id)?,
        None => None,
    };
    let alert = match stored {
        Some(alert) => Some(alert),
        None => state
            .app_state
            .read()
            .await
            .recent_alerts
            .iter()
            .find(|a| a.id == id)
            .cloned(),
    };
    alert
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::NotFound(format!("Alert {id} not found")))
}

/// POST /api/v1/alerts/:id/acknowledge
pub async fn acknowledge_alert(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
) -> Result<Response, ApiError> {
    let stored = match &state.storage {
        Some(storage) => storage.acknowledge_alert(id)?,
        None => None,
    };

    // Keep the in-memory copy consistent with storage
    let mut app = state.app_state.write().await;
    let cached = app.recent_alerts.iter_mut().find(|a| a.id == id);
    let result = match (stored, cached) {
        (Some(alert), Some(cached)) => {
            cached.clone_from(&alert);
            Some(alert)
        }
        (Some(alert), None) => Some(alert),
        (None, Some(cached)) => {
            if !cached.acknowledged {
                cached.acknowledged = true;
                cached.acknowledged_at = Some(Utc::now());
            }
            Some(cached.clone())
        }
        (None, None) => None,
    };

    let alert = result.ok_or_else(|| ApiError::NotFound(format!("Alert {id} not found")))?;
    info!(alert_id = id, rule = %alert.rule, "Alert acknowledged");
    Ok(ApiResponse::ok(alert))
}

// ============================================================================
// Config
// ============================================================================

/// GET /api/v1/config with secrets redacted
pub async fn get_config(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.config.redacted())
}

/// POST /api/v1/config/validate with a TOML document as the body
pub async fn validate_config(body: String) -> Result<Response, ApiError> {
    let verdict = match MonitorConfig::from_toml_str(&body) {
        Ok((_, warnings)) => serde_json::json!({ "valid": true, "warnings": warnings }),
        Err(ConfigError::Validation(errors)) => {
            serde_json::json!({ "valid": false, "errors": errors })
        }
        Err(e) => return Err(ApiError::BadRequest(format!("Invalid TOML: {e}"))),
    };
    Ok(ApiResponse::ok(verdict))
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub windows_received: u64,
    pub windows_processed: u64,
    pub windows_skipped: u64,
    pub visual_failures: u64,
    pub alerts_raised: u64,
    pub critical_alerts: u64,
    pub storage_errors: u64,
    pub notification_errors: u64,
    pub storage: Option<StorageStats>,
}

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<ApiState>) -> Response {
    let app = state.app_state.read().await;
    ApiResponse::ok(StatsResponse {
        windows_received: app.windows_received,
        windows_processed: app.windows_processed,
        windows_skipped: app.windows_skipped,
        visual_failures: app.visual_failures,
        alerts_raised: app.alerts_raised,
        critical_alerts: app.critical_alerts,
        storage_errors: app.storage_errors,
        notification_errors: app.notification_errors,
        storage: state.storage.as_ref().map(HistoryStorage::stats),
    })
}
