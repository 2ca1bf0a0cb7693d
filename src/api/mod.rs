//! HTTP API served with axum
//!
//! Read-mostly HTTP surface over the running monitor: status, latest scene,
//! scene and alert history, alert acknowledgement, and config inspection.

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::ApiState;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::defaults::API_VERSION;

/// Comma-separated list of allowed cross-origin callers
pub const CORS_ORIGINS_ENV_VAR: &str = "CRADLEWATCH_CORS_ORIGINS";

/// Same-origin only unless `CRADLEWATCH_CORS_ORIGINS` lists origins.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    match std::env::var(CORS_ORIGINS_ENV_VAR) {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the application router.
pub fn create_app(state: ApiState) -> Router {
    Router::new()
        .nest(&format!("/api/{API_VERSION}"), routes::api_routes(state.clone()))
        .merge(routes::root_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
