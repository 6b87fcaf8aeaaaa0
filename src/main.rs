//! versealign - forced-alignment timestamping service
//!
//! Accepts alignment jobs over HTTP, pairs a session's uploaded audio/text
//! files, and timestamps each text unit against its audio via the external
//! alignment model, persisting progress and results to SQLite.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use versealign::config::Config;
use versealign::services::{
    AlignmentPipeline, FfmpegTranscoder, HttpBlobStore, HttpNormalizer, HttpRomanizer, MmsAligner,
    PipelineTimeouts, SubprocessIdentifier, WorkerPool,
};
use versealign::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("versealign=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting versealign");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("Work dir: {}", config.work_dir.display());

    std::fs::create_dir_all(&config.work_dir)?;

    let db_pool = versealign::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    // External collaborator handles, shared by every worker.
    let storage = Arc::new(HttpBlobStore::new(
        config.storage.base_url.clone(),
        Duration::from_secs(config.storage.timeout_secs),
    )?);
    let transcoder = Arc::new(FfmpegTranscoder::new(
        config.transcoder.ffmpeg_path.clone(),
        config.transcoder.ffprobe_path.clone(),
    ));
    let normalizer = Arc::new(HttpNormalizer::new(
        config.text.normalizer_url.clone(),
        Duration::from_secs(config.text.timeout_secs),
    )?);
    let romanizer = Arc::new(HttpRomanizer::new(
        config.text.romanizer_url.clone(),
        Duration::from_secs(config.text.timeout_secs),
    )?);

    // Model vocabulary is loaded once here; every run shares the handle.
    let aligner = Arc::new(MmsAligner::load(&config.aligner, &config.work_dir)?);
    let identifier = Arc::new(SubprocessIdentifier::new(&config.identifier));

    let pipeline = Arc::new(AlignmentPipeline::new(
        db_pool.clone(),
        storage,
        transcoder,
        normalizer,
        romanizer,
        aligner,
        identifier,
        config.work_dir.clone(),
        config.identifier.max_probe_secs,
        PipelineTimeouts::from(&config),
    ));

    let worker_pool = WorkerPool::new(config.worker_capacity);
    info!("Worker pool capacity: {}", worker_pool.capacity());

    let state = AppState::new(db_pool, pipeline, worker_pool);
    let app = versealign::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Listening on http://{}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
