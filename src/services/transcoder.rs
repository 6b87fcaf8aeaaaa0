//! Audio transcoding via ffmpeg
//!
//! Every audio file is converted to the canonical form the alignment model
//! consumes: PCM signed 16-bit, mono, 16 kHz WAV. Source duration is probed
//! separately with ffprobe for the session's aggregate accounting.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Transcoder errors
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to launch {command}: {message}")]
    Spawn { command: String, message: String },

    #[error("{command} failed: {stderr}")]
    Failed { command: String, stderr: String },

    #[error("Could not parse duration from ffprobe output: {0}")]
    BadDuration(String),
}

/// Audio transcoding and duration probing.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Source duration in seconds.
    async fn probe_duration(&self, input: &Path) -> Result<f64, TranscodeError>;

    /// Convert `input` to canonical PCM WAV at `output`. When
    /// `max_duration` is set only that many leading seconds are kept
    /// (quick-identification use cases).
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        max_duration: Option<f64>,
    ) -> Result<(), TranscodeError>;
}

/// ffmpeg/ffprobe subprocess transcoder.
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: String, ffprobe_path: String) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
        }
    }

    async fn run(command: &mut Command, name: &str) -> Result<Vec<u8>, TranscodeError> {
        let output = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TranscodeError::Spawn {
                command: name.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(TranscodeError::Failed {
                command: name.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn probe_duration(&self, input: &Path) -> Result<f64, TranscodeError> {
        let mut command = Command::new(&self.ffprobe_path);
        command
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(input);

        let stdout = Self::run(&mut command, &self.ffprobe_path).await?;
        let text = String::from_utf8_lossy(&stdout);
        let duration = text
            .trim()
            .parse::<f64>()
            .map_err(|_| TranscodeError::BadDuration(text.trim().to_string()))?;

        debug!(input = %input.display(), duration, "Probed source duration");
        Ok(duration)
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        max_duration: Option<f64>,
    ) -> Result<(), TranscodeError> {
        let mut command = Command::new(&self.ffmpeg_path);
        command
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-i")
            .arg(input);

        if let Some(limit) = max_duration {
            command.arg("-t").arg(format!("{}", limit));
        }

        command
            .arg("-acodec")
            .arg("pcm_s16le")
            .arg("-ar")
            .arg("16000")
            .arg("-ac")
            .arg("1")
            .arg(output);

        Self::run(&mut command, &self.ffmpeg_path).await?;

        debug!(
            input = %input.display(),
            output = %output.display(),
            "Transcoded to pcm_s16le/16kHz/mono"
        );
        Ok(())
    }
}
