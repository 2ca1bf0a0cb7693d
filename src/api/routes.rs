//! Route table for the v1 API
//!
//! - /api/v1/status - Pipeline status and latest stable state
//! - /api/v1/scene/latest, /api/v1/scenes - Scene summaries
//! - /api/v1/alerts, /api/v1/alerts/:id, /api/v1/alerts/:id/acknowledge - Alert history
//! - /api/v1/config, /api/v1/config/validate - Configuration
//! - /api/v1/stats - Counters and storage size

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, ApiState};

pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/scene/latest", get(handlers::get_latest_scene))
        .route("/scenes", get(handlers::get_scenes))
        .route("/alerts", get(handlers::get_alerts))
        .route("/alerts/:id", get(handlers::get_alert))
        .route("/alerts/:id/acknowledge", post(handlers::acknowledge_alert))
        .route("/config", get(handlers::get_config))
        .route("/config/validate", post(handlers::validate_config))
        .route("/stats", get(handlers::get_stats))
        .with_state(state)
}

/// Unversioned routes for probes
pub fn root_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
