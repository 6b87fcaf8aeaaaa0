//! Error types for versealign

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Synchronous API error type, surfaced in the request/response cycle.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request parameter (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Session already running (400 per the request contract)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            // The start contract pins already-in-progress to 400, not 409.
            ApiError::Conflict(msg) => (StatusCode::BAD_REQUEST, "ALREADY_IN_PROGRESS", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Database(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                err.to_string(),
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Asynchronous pipeline error taxonomy.
///
/// These never reach an HTTP response directly: the Display string is
/// persisted to the session record's `error` field alongside
/// `status=FAILED`, and observers read it from there.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Download failed for {path}: {message}")]
    Download { path: String, message: String },

    #[error("Transcode failed for {file}: {message}")]
    Transcode { file: String, message: String },

    #[error("Text normalization failed: {0}")]
    Normalize(String),

    #[error("Romanization failed: {0}")]
    Romanize(String),

    #[error("Alignment failed for {file}: {message}")]
    Align { file: String, message: String },

    #[error("Language identification failed: {0}")]
    Identify(String),

    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },

    #[error("Failed to read text file {file}: {message}")]
    TextRead { file: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
