//! versealign library interface
//!
//! Exposes the service internals for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::{AlignmentPipeline, WorkerPool};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Session record store
    pub db: SqlitePool,
    /// Shared pipeline orchestrator (holds every collaborator handle)
    pub pipeline: Arc<AlignmentPipeline>,
    /// Bounded executor for pipeline runs
    pub worker_pool: WorkerPool,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, pipeline: Arc<AlignmentPipeline>, worker_pool: WorkerPool) -> Self {
        Self {
            db,
            pipeline,
            worker_pool,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::align_routes())
        .merge(api::health_routes())
        .with_state(state)
}
