//! Alignment job API handlers
//!
//! Validation and conflict errors surface synchronously here; everything
//! after acceptance is asynchronous and observable only through the
//! session record.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::db;
use crate::error::{ApiError, ApiResult, PipelineError};
use crate::models::{RawFile, SessionRecord, SessionStatus};
use crate::services::match_files;
use crate::AppState;

/// POST /align query parameters
#[derive(Debug, Deserialize)]
pub struct StartAlignmentQuery {
    #[serde(rename = "session-id")]
    pub session_id: Option<String>,
    pub separator: Option<String>,
    pub lang: Option<String>,
}

/// POST /align response
#[derive(Debug, Serialize)]
pub struct StartAlignmentResponse {
    pub session_id: String,
    pub status: SessionStatus,
    /// Complete audio/text pairs queued for this run
    pub matched_pairs: usize,
    pub message: String,
}

/// GET /identify query parameters
#[derive(Debug, Deserialize)]
pub struct IdentifyQuery {
    #[serde(rename = "session-id")]
    pub session_id: Option<String>,
    #[serde(rename = "file-name")]
    pub file_name: Option<String>,
}

/// GET /identify response
#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    pub language: String,
}

fn require(value: Option<String>, name: &str) -> ApiResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(format!(
            "Missing required parameter: {}",
            name
        ))),
    }
}

/// POST /align
///
/// Accept an alignment job for a session. The pipeline body runs on the
/// worker pool; the response only confirms acceptance.
pub async fn start_alignment(
    State(state): State<AppState>,
    Query(query): Query<StartAlignmentQuery>,
) -> ApiResult<Json<StartAlignmentResponse>> {
    let session_id = require(query.session_id, "session-id")?;
    let separator = require(query.separator, "separator")?;
    let language = require(query.lang, "lang")?;

    // Read-first check for a clear message; the claim below is the
    // authoritative single-flight guard.
    if let Some(record) = db::sessions::load_session(&state.db, &session_id).await? {
        if record.status == SessionStatus::InProgress {
            return Err(ApiError::Conflict(format!(
                "Session {} is already in progress",
                session_id
            )));
        }
    }

    let prefix = format!("sessions/{}", session_id);
    let files = state
        .pipeline
        .storage()
        .list(&prefix)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to list session files: {}", e)))?;

    if files.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No files found for session {}",
            session_id
        )));
    }

    let pairs = match_files(&files);
    let matched_pairs = pairs.len();

    if !db::sessions::claim_session(&state.db, &session_id, Utc::now()).await? {
        return Err(ApiError::Conflict(format!(
            "Session {} is already in progress",
            session_id
        )));
    }

    info!(
        session_id = %session_id,
        files = files.len(),
        matched_pairs,
        "Alignment job accepted"
    );

    let pipeline = state.pipeline.clone();
    let pool = state.db.clone();
    let job_session_id = session_id.clone();
    state.worker_pool.submit(async move {
        if let Err(e) = pipeline
            .run(&job_session_id, &language, &separator, pairs)
            .await
        {
            // run() only errors on record-store failures; try to leave the
            // session observable as FAILED rather than stuck IN_PROGRESS.
            error!(session_id = %job_session_id, error = %e, "Alignment run aborted");
            if let Err(write_err) =
                db::sessions::mark_failed(&pool, &job_session_id, &e.to_string()).await
            {
                error!(
                    session_id = %job_session_id,
                    error = %write_err,
                    "Failed to persist FAILED status"
                );
            }
        }
    });

    Ok(Json(StartAlignmentResponse {
        session_id,
        status: SessionStatus::InProgress,
        matched_pairs,
        message: "Alignment started".to_string(),
    }))
}

/// GET /identify
///
/// Identify the language of one uploaded audio file. Synchronous: the
/// response carries the language code.
pub async fn identify_language(
    State(state): State<AppState>,
    Query(query): Query<IdentifyQuery>,
) -> ApiResult<Json<IdentifyResponse>> {
    let session_id = require(query.session_id, "session-id")?;
    let file_name = require(query.file_name, "file-name")?;

    let file = RawFile {
        name: file_name.clone(),
        url: String::new(),
        path: format!("sessions/{}/{}", session_id, file_name),
    };

    let language = state
        .pipeline
        .identify_language(&session_id, &file)
        .await
        .map_err(|e| match e {
            // A failed download means the named file is not there.
            PipelineError::Download { .. } => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        })?;

    Ok(Json(IdentifyResponse { language }))
}

/// GET /sessions/{session_id}
///
/// Queryable progress: returns the persisted session record.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionRecord>> {
    let record = db::sessions::load_session(&state.db, &session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", session_id)))?;

    Ok(Json(record))
}

/// Build alignment routes
pub fn align_routes() -> Router<AppState> {
    Router::new()
        .route("/align", post(start_alignment))
        .route("/identify", get(identify_language))
        .route("/sessions/:session_id", get(get_session))
}
