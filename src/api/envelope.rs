//! JSON envelope for API responses.
//!
//! Handlers return `Result<Response, ApiError>`. A success body looks like
//! `{"data": ..., "meta": {...}}` and a failure like
//! `{"error": {"code", "message"}, "meta": {...}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::config::defaults::API_VERSION;
use crate::storage::StorageError;

fn meta() -> serde_json::Value {
    json!({
        "timestamp": Utc::now().to_rfc3339(),
        "version": API_VERSION,
    })
}

/// Successful payload wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: serde_json::Value,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        Json(Self { data, meta: meta() }).into_response()
    }
}

/// Failures a handler can turn into an error envelope
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("storage unavailable: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Storage(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Storage(ref e) = self {
            tracing::warn!(error = %e, "API request hit a storage error");
        }
        let body = json!({
            "error": { "code": self.code(), "message": self.to_string() },
            "meta": meta(),
        });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_carries_data_and_meta() {
        let resp = ApiResponse::ok(vec![1, 2, 3]);
        assert_eq!(resp.status(), StatusCode::OK);
        let v = body_of(resp).await;
        assert_eq!(v["data"][2], 3);
        assert_eq!(v["meta"]["version"], API_VERSION);
    }

    #[tokio::test]
    async fn test_storage_failure_maps_to_500() {
        let err = ApiError::from(StorageError::Corrupt("alert 7".into()));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v = body_of(resp).await;
        assert_eq!(v["error"]["code"], "INTERNAL_ERROR");
        assert!(v["error"]["message"].as_str().unwrap().contains("alert 7"));
    }
}
