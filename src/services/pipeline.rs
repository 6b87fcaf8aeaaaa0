//! Alignment pipeline orchestration
//!
//! Drives one session's run end-to-end: for each matched pair, download →
//! transcode → segment → normalize → romanize → align → assemble sections,
//! persisting progress to the session record as it goes. Pairs are
//! processed strictly in order; the first failure persists FAILED with its
//! message and aborts the remaining pairs. Per-pair temporary files are
//! removed on success and failure alike.
//!
//! Every external call is bounded by a configured timeout; expiry surfaces
//! as a timeout-kind failure on the session record rather than a worker
//! stuck forever.

use chrono::Utc;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db;
use crate::error::PipelineError;
use crate::models::{FilePair, FileTimestamps, RawFile, Section};
use crate::models::session::format_hms;
use crate::services::aligner::{token_spans, AlignmentModel, SENTINEL};
use crate::services::lang_id::LanguageIdentifier;
use crate::services::storage_client::BlobStore;
use crate::services::text_segmenter::{segment, TextFormat};
use crate::services::text_service::{Normalizer, Romanizer};
use crate::services::transcoder::Transcoder;

/// Per-stage limits on external calls.
#[derive(Debug, Clone)]
pub struct PipelineTimeouts {
    pub download: Duration,
    pub transcode: Duration,
    pub text: Duration,
    pub align: Duration,
    pub identify: Duration,
}

impl From<&Config> for PipelineTimeouts {
    fn from(config: &Config) -> Self {
        Self {
            download: Duration::from_secs(config.storage.timeout_secs),
            transcode: Duration::from_secs(config.transcoder.timeout_secs),
            text: Duration::from_secs(config.text.timeout_secs),
            align: Duration::from_secs(config.aligner.timeout_secs),
            identify: Duration::from_secs(config.identifier.timeout_secs),
        }
    }
}

/// Session pipeline orchestrator.
///
/// Holds shared handles to every external collaborator; one instance
/// serves all sessions.
pub struct AlignmentPipeline {
    db: SqlitePool,
    storage: Arc<dyn BlobStore>,
    transcoder: Arc<dyn Transcoder>,
    normalizer: Arc<dyn Normalizer>,
    romanizer: Arc<dyn Romanizer>,
    aligner: Arc<dyn AlignmentModel>,
    identifier: Arc<dyn LanguageIdentifier>,
    work_dir: PathBuf,
    identify_probe_secs: f64,
    timeouts: PipelineTimeouts,
}

/// Local files for one pair in flight.
struct PairWorkspace {
    audio_path: PathBuf,
    wav_path: PathBuf,
    text_path: PathBuf,
}

impl PairWorkspace {
    fn new(session_dir: &Path, pair: &FilePair) -> Self {
        let stem = pair
            .audio
            .split_name()
            .map(|(base, _)| base)
            .unwrap_or(pair.audio.name.as_str());
        Self {
            audio_path: session_dir.join(&pair.audio.name),
            wav_path: session_dir.join(format!("{}_output.wav", stem)),
            text_path: session_dir.join(&pair.text.name),
        }
    }

    /// Best-effort removal of every file this pair created. Runs on the
    /// success path and on every failure path.
    async fn cleanup(&self) {
        for path in [&self.audio_path, &self.wav_path, &self.text_path] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove temp file");
                }
            }
        }
    }
}

/// Bound an external call with a stage timeout, mapping both the call's
/// own error and expiry into the pipeline taxonomy.
async fn bounded<T, E, F>(
    stage: &'static str,
    limit: Duration,
    fut: F,
    map_err: impl FnOnce(E) -> PipelineError,
) -> Result<T, PipelineError>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(map_err(e)),
        Err(_) => Err(PipelineError::Timeout {
            stage,
            seconds: limit.as_secs(),
        }),
    }
}

impl AlignmentPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: SqlitePool,
        storage: Arc<dyn BlobStore>,
        transcoder: Arc<dyn Transcoder>,
        normalizer: Arc<dyn Normalizer>,
        romanizer: Arc<dyn Romanizer>,
        aligner: Arc<dyn AlignmentModel>,
        identifier: Arc<dyn LanguageIdentifier>,
        work_dir: PathBuf,
        identify_probe_secs: f64,
        timeouts: PipelineTimeouts,
    ) -> Self {
        Self {
            db,
            storage,
            transcoder,
            normalizer,
            romanizer,
            aligner,
            identifier,
            work_dir,
            identify_probe_secs,
            timeouts,
        }
    }

    pub fn storage(&self) -> &Arc<dyn BlobStore> {
        &self.storage
    }

    /// Execute one session run over the matched pairs.
    ///
    /// The session must already be claimed (status IN_PROGRESS). Pair
    /// failures are persisted as FAILED and end the run; the returned
    /// error is reserved for record-store failures.
    pub async fn run(
        &self,
        session_id: &str,
        language: &str,
        separator: &str,
        pairs: Vec<FilePair>,
    ) -> Result<(), PipelineError> {
        info!(session_id, pairs = pairs.len(), "Alignment run starting");

        db::sessions::set_total(&self.db, session_id, pairs.len()).await?;

        let session_dir = self.work_dir.join("sessions").join(session_id);
        tokio::fs::create_dir_all(&session_dir).await?;

        let mut timestamps: Vec<FileTimestamps> = Vec::with_capacity(pairs.len());
        let mut total_length = 0.0f64;
        let mut progress = 0usize;

        for pair in &pairs {
            db::sessions::set_current(&self.db, session_id, &pair.audio.name).await?;

            let workspace = PairWorkspace::new(&session_dir, pair);
            let result = self
                .process_pair(&workspace, language, separator, pair)
                .await;
            workspace.cleanup().await;

            match result {
                Ok((file_timestamps, duration)) => {
                    timestamps.push(file_timestamps);
                    total_length += duration;
                    progress += 1;
                    db::sessions::set_progress(&self.db, session_id, progress).await?;
                    info!(
                        session_id,
                        audio = %pair.audio.name,
                        progress,
                        total = pairs.len(),
                        "Pair aligned"
                    );
                }
                Err(e) => {
                    // Fail fast: remaining pairs are never attempted.
                    error!(session_id, audio = %pair.audio.name, error = %e, "Pair failed");
                    db::sessions::mark_failed(&self.db, session_id, &e.to_string()).await?;
                    return Ok(());
                }
            }
        }

        db::sessions::mark_done(&self.db, session_id, Utc::now(), total_length, &timestamps)
            .await?;
        info!(session_id, total_length, "Alignment run complete");
        Ok(())
    }

    async fn process_pair(
        &self,
        workspace: &PairWorkspace,
        language: &str,
        separator: &str,
        pair: &FilePair,
    ) -> Result<(FileTimestamps, f64), PipelineError> {
        // Download both blobs into the session workspace.
        bounded(
            "download",
            self.timeouts.download,
            self.storage.fetch(&pair.audio.path, &workspace.audio_path),
            |e| PipelineError::Download {
                path: pair.audio.path.clone(),
                message: e.to_string(),
            },
        )
        .await?;

        bounded(
            "download",
            self.timeouts.download,
            self.storage.fetch(&pair.text.path, &workspace.text_path),
            |e| PipelineError::Download {
                path: pair.text.path.clone(),
                message: e.to_string(),
            },
        )
        .await?;

        // Source duration feeds the session's aggregate accounting.
        let duration = bounded(
            "probe",
            self.timeouts.transcode,
            self.transcoder.probe_duration(&workspace.audio_path),
            |e| PipelineError::Transcode {
                file: pair.audio.name.clone(),
                message: e.to_string(),
            },
        )
        .await?;

        bounded(
            "transcode",
            self.timeouts.transcode,
            self.transcoder
                .transcode(&workspace.audio_path, &workspace.wav_path, None),
            |e| PipelineError::Transcode {
                file: pair.audio.name.clone(),
                message: e.to_string(),
            },
        )
        .await?;

        // Segment the text per its format.
        let content = tokio::fs::read_to_string(&workspace.text_path)
            .await
            .map_err(|e| PipelineError::TextRead {
                file: pair.text.name.clone(),
                message: e.to_string(),
            })?;

        let format = TextFormat::from_extension(pair.text_extension()).ok_or_else(|| {
            PipelineError::TextRead {
                file: pair.text.name.clone(),
                message: format!("Unsupported text format: {}", pair.text_extension()),
            }
        })?;

        let lines = segment(&content, format, separator);

        // Normalize, then romanize into per-line token strings.
        let mut normalized = Vec::with_capacity(lines.len());
        for line in &lines {
            let norm = bounded(
                "normalize",
                self.timeouts.text,
                self.normalizer.normalize(line, language),
                |e| PipelineError::Normalize(e.to_string()),
            )
            .await?;
            normalized.push(norm);
        }

        let tokens = bounded(
            "romanize",
            self.timeouts.text,
            self.romanizer.romanize(&normalized, language),
            |e| PipelineError::Romanize(e.to_string()),
        )
        .await?;

        // The sentinel leads both sequences; it absorbs audio before the
        // first real line and emits no section.
        let mut line_units = Vec::with_capacity(lines.len() + 1);
        line_units.push(SENTINEL.to_string());
        line_units.extend(lines);

        let mut token_units = Vec::with_capacity(tokens.len() + 1);
        token_units.push(SENTINEL.to_string());
        token_units.extend(tokens);

        let output = bounded(
            "align",
            self.timeouts.align,
            self.aligner.align(&workspace.wav_path, &token_units),
            |e| PipelineError::Align {
                file: pair.audio.name.clone(),
                message: e.to_string(),
            },
        )
        .await?;

        let spans = token_spans(&token_units, &output.segments).map_err(|e| {
            PipelineError::Align {
                file: pair.audio.name.clone(),
                message: e.to_string(),
            }
        })?;

        let stride_secs = output.stride_ms / 1000.0;
        let sections: Vec<Section> = line_units
            .iter()
            .zip(token_units.iter())
            .zip(spans.iter())
            .skip(1) // sentinel emits no section
            .map(|((text, tokens), span)| {
                let begin = span.start as f64 * stride_secs;
                let end = span.end as f64 * stride_secs;
                Section {
                    begin,
                    end,
                    begin_str: format_hms(begin),
                    end_str: format_hms(end),
                    text: text.clone(),
                    uroman_tokens: tokens.clone(),
                }
            })
            .collect();

        Ok((
            FileTimestamps {
                audio_file: pair.audio.name.clone(),
                text_file: pair.text.name.clone(),
                sections,
            },
            duration,
        ))
    }

    /// Identify the language of one uploaded audio file.
    ///
    /// Downloads the blob, transcodes a duration-capped excerpt to
    /// canonical PCM, and runs the LID model. Temp files are removed on
    /// both paths.
    pub async fn identify_language(
        &self,
        session_id: &str,
        file: &RawFile,
    ) -> Result<String, PipelineError> {
        let session_dir = self.work_dir.join("sessions").join(session_id);
        tokio::fs::create_dir_all(&session_dir).await?;

        let stem = file
            .split_name()
            .map(|(base, _)| base)
            .unwrap_or(file.name.as_str());
        let audio_path = session_dir.join(&file.name);
        let probe_path = session_dir.join(format!("{}_identify.wav", stem));

        let result = self
            .identify_inner(file, &audio_path, &probe_path)
            .await;

        for path in [&audio_path, &probe_path] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove temp file");
                }
            }
        }

        result
    }

    async fn identify_inner(
        &self,
        file: &RawFile,
        audio_path: &Path,
        probe_path: &Path,
    ) -> Result<String, PipelineError> {
        bounded(
            "download",
            self.timeouts.download,
            self.storage.fetch(&file.path, audio_path),
            |e| PipelineError::Download {
                path: file.path.clone(),
                message: e.to_string(),
            },
        )
        .await?;

        bounded(
            "transcode",
            self.timeouts.transcode,
            self.transcoder
                .transcode(audio_path, probe_path, Some(self.identify_probe_secs)),
            |e| PipelineError::Transcode {
                file: file.name.clone(),
                message: e.to_string(),
            },
        )
        .await?;

        bounded(
            "identify",
            self.timeouts.identify,
            self.identifier.identify(probe_path),
            |e| PipelineError::Identify(e.to_string()),
        )
        .await
    }
}
