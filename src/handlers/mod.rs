pub mod api;
pub mod panel;
pub mod views;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::ProfilerError;

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Storage(String),
    Internal(String),
}

impl From<ProfilerError> for AppError {
    fn from(e: ProfilerError) -> Self {
        match e {
            ProfilerError::Storage(msg) => Self::Storage(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Storage(msg) => {
                tracing::error!(error = %msg, "Collection store failed");
                (StatusCode::SERVICE_UNAVAILABLE, format!("storage: {msg}"))
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Panel request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({
            "error":  message,
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
