use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rate limited by upstream after {attempts} attempts")]
    RateLimited { attempts: usize },
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed upstream response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Handler-level error. Every failure surfaces to the browser as a 500 with
/// an `{"error": message}` body; the distinction between causes lives in the
/// logs, not in the status code.
pub struct ApiError(UpstreamError);

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!("request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}
