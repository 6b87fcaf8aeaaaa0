//! Language identification
//!
//! Wraps the external LID model runner. Identification only ever sees a
//! short, duration-capped excerpt of canonical PCM audio; the caller is
//! responsible for preparing it.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::IdentifierConfig;

/// Language identification errors
#[derive(Debug, Error)]
pub enum IdentifyError {
    #[error("Failed to launch {command}: {message}")]
    Spawn { command: String, message: String },

    #[error("Language identifier failed: {stderr}")]
    Failed { stderr: String },

    #[error("Could not parse identifier output: {0}")]
    Parse(String),
}

/// Identify the language spoken in a canonical PCM WAV file.
#[async_trait]
pub trait LanguageIdentifier: Send + Sync {
    async fn identify(&self, wav_path: &Path) -> Result<String, IdentifyError>;
}

#[derive(Debug, Deserialize)]
struct IdentifierOutput {
    language: String,
}

/// Subprocess runner for the LID model.
pub struct SubprocessIdentifier {
    command: String,
    model_path: PathBuf,
}

impl SubprocessIdentifier {
    pub fn new(config: &IdentifierConfig) -> Self {
        Self {
            command: config.command.clone(),
            model_path: config.model_path.clone(),
        }
    }
}

#[async_trait]
impl LanguageIdentifier for SubprocessIdentifier {
    async fn identify(&self, wav_path: &Path) -> Result<String, IdentifyError> {
        let output = Command::new(&self.command)
            .arg("--model")
            .arg(&self.model_path)
            .arg("--audio")
            .arg(wav_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| IdentifyError::Spawn {
                command: self.command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(IdentifyError::Failed {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let parsed: IdentifierOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| IdentifyError::Parse(e.to_string()))?;

        debug!(wav = %wav_path.display(), language = %parsed.language, "Language identified");
        Ok(parsed.language)
    }
}
