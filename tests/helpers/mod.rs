//! Shared test fixtures: mock collaborators and state construction
#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use versealign::models::RawFile;
use versealign::services::aligner::{AlignError, AlignmentModel, AlignmentOutput, FrameSegment};
use versealign::services::lang_id::{IdentifyError, LanguageIdentifier};
use versealign::services::pipeline::{AlignmentPipeline, PipelineTimeouts};
use versealign::services::storage_client::{BlobStore, StorageError};
use versealign::services::text_service::{Normalizer, Romanizer, TextServiceError};
use versealign::services::transcoder::{TranscodeError, Transcoder};
use versealign::services::WorkerPool;
use versealign::AppState;

pub fn raw_file(session_id: &str, name: &str) -> RawFile {
    RawFile {
        name: name.to_string(),
        url: format!("https://storage.test/{}", name),
        path: format!("sessions/{}/{}", session_id, name),
    }
}

/// In-memory blob store. `contents` maps storage paths to file bytes;
/// `fail_paths` force a download error; every fetch is recorded so tests
/// can assert which downloads were (never) attempted.
#[derive(Default)]
pub struct MockStorage {
    pub files: Vec<RawFile>,
    pub contents: HashMap<String, String>,
    pub fail_paths: Vec<String>,
    pub fetched: Mutex<Vec<String>>,
}

impl MockStorage {
    pub fn with_files(files: Vec<RawFile>) -> Self {
        Self {
            files,
            ..Default::default()
        }
    }

    pub fn set_content(&mut self, path: &str, content: &str) {
        self.contents.insert(path.to_string(), content.to_string());
    }

    pub async fn fetched_paths(&self) -> Vec<String> {
        self.fetched.lock().await.clone()
    }
}

#[async_trait]
impl BlobStore for MockStorage {
    async fn list(&self, prefix: &str) -> Result<Vec<RawFile>, StorageError> {
        Ok(self
            .files
            .iter()
            .filter(|f| f.path.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn fetch(&self, path: &str, dest: &Path) -> Result<(), StorageError> {
        self.fetched.lock().await.push(path.to_string());

        if self.fail_paths.iter().any(|p| path.contains(p.as_str())) {
            return Err(StorageError::Api(403, format!("denied: {}", path)));
        }

        let content = self.contents.get(path).cloned().unwrap_or_default();
        tokio::fs::write(dest, content.as_bytes())
            .await
            .map_err(|e| StorageError::Write(dest.display().to_string(), e.to_string()))?;
        Ok(())
    }
}

/// Transcoder that fabricates output files and reports configured source
/// durations (default 1.0s per file).
#[derive(Default)]
pub struct MockTranscoder {
    pub durations: HashMap<String, f64>,
    pub fail_files: Vec<String>,
}

impl MockTranscoder {
    pub fn with_duration(mut self, file_name: &str, duration: f64) -> Self {
        self.durations.insert(file_name.to_string(), duration);
        self
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    async fn probe_duration(&self, input: &Path) -> Result<f64, TranscodeError> {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_files.contains(&name) {
            return Err(TranscodeError::BadDuration("N/A".to_string()));
        }
        Ok(self.durations.get(&name).copied().unwrap_or(1.0))
    }

    async fn transcode(
        &self,
        _input: &Path,
        output: &Path,
        _max_duration: Option<f64>,
    ) -> Result<(), TranscodeError> {
        tokio::fs::write(output, b"RIFF")
            .await
            .map_err(|e| TranscodeError::Spawn {
                command: "mock-ffmpeg".to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

/// Identity normalizer.
pub struct MockNormalizer;

#[async_trait]
impl Normalizer for MockNormalizer {
    async fn normalize(&self, line: &str, _language: &str) -> Result<String, TextServiceError> {
        Ok(line.trim().to_string())
    }
}

/// Romanizer that passes lines through as their own token strings.
pub struct MockRomanizer;

#[async_trait]
impl Romanizer for MockRomanizer {
    async fn romanize(
        &self,
        lines: &[String],
        _language: &str,
    ) -> Result<Vec<String>, TextServiceError> {
        Ok(lines.to_vec())
    }
}

/// Aligner that emits one 10-frame segment per token, in order, at a
/// 100 ms stride. Deterministic: section times follow directly from token
/// counts.
#[derive(Default)]
pub struct MockAligner {
    pub fail: bool,
    pub calls: Mutex<usize>,
}

#[async_trait]
impl AlignmentModel for MockAligner {
    async fn align(
        &self,
        _wav_path: &Path,
        token_lines: &[String],
    ) -> Result<AlignmentOutput, AlignError> {
        *self.calls.lock().await += 1;

        if self.fail {
            return Err(AlignError::Failed {
                stderr: "injected alignment failure".to_string(),
            });
        }

        let mut segments = Vec::new();
        let mut cursor = 0u64;
        for line in token_lines {
            for token in line.split_whitespace() {
                segments.push(FrameSegment {
                    label: token.to_string(),
                    start: cursor,
                    end: cursor + 10,
                });
                cursor += 10;
            }
        }

        Ok(AlignmentOutput {
            segments,
            stride_ms: 100.0,
        })
    }
}

pub struct MockIdentifier {
    pub language: String,
}

impl Default for MockIdentifier {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
        }
    }
}

#[async_trait]
impl LanguageIdentifier for MockIdentifier {
    async fn identify(&self, _wav_path: &Path) -> Result<String, IdentifyError> {
        Ok(self.language.clone())
    }
}

pub fn test_timeouts() -> PipelineTimeouts {
    PipelineTimeouts {
        download: Duration::from_secs(5),
        transcode: Duration::from_secs(5),
        text: Duration::from_secs(5),
        align: Duration::from_secs(5),
        identify: Duration::from_secs(5),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn build_pipeline(
    pool: SqlitePool,
    storage: Arc<MockStorage>,
    transcoder: Arc<MockTranscoder>,
    aligner: Arc<MockAligner>,
    work_dir: PathBuf,
) -> Arc<AlignmentPipeline> {
    Arc::new(AlignmentPipeline::new(
        pool,
        storage,
        transcoder,
        Arc::new(MockNormalizer),
        Arc::new(MockRomanizer),
        aligner,
        Arc::new(MockIdentifier::default()),
        work_dir,
        30.0,
        test_timeouts(),
    ))
}

pub fn build_state(pool: SqlitePool, pipeline: Arc<AlignmentPipeline>) -> AppState {
    AppState::new(pool, pipeline, WorkerPool::new(4))
}

/// Poll the session record until it leaves IN_PROGRESS (or the deadline
/// passes). Background runs finish quickly against mocks.
pub async fn wait_for_terminal(
    pool: &SqlitePool,
    session_id: &str,
) -> versealign::models::SessionRecord {
    use versealign::models::SessionStatus;

    for _ in 0..200 {
        if let Some(record) = versealign::db::sessions::load_session(pool, session_id)
            .await
            .unwrap()
        {
            if record.status != SessionStatus::InProgress {
                return record;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Session {} never reached a terminal state", session_id);
}
