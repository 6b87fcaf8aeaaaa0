//! Configuration loading for versealign
//!
//! Resolution order follows the usual priority chain: environment variable
//! overrides → TOML config file → compiled defaults. The config file path
//! itself comes from `VERSEALIGN_CONFIG` (default `versealign.toml` in the
//! working directory); a missing file falls back to defaults so the service
//! can start with nothing but environment variables.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP listener binds to
    pub bind_address: String,
    /// SQLite database file holding session records
    pub database_path: PathBuf,
    /// Root directory for per-session temporary files
    pub work_dir: PathBuf,
    /// Maximum pipeline runs executing concurrently
    pub worker_capacity: usize,
    pub storage: StorageConfig,
    pub transcoder: TranscoderConfig,
    pub text: TextServiceConfig,
    pub aligner: AlignerConfig,
    pub identifier: IdentifierConfig,
}

/// Blob store access.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base URL of the storage service REST surface
    pub base_url: String,
    /// Seconds allowed per list/fetch call
    pub timeout_secs: u64,
}

/// ffmpeg/ffprobe invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Seconds allowed per probe/transcode call
    pub timeout_secs: u64,
}

/// Normalization/romanization services.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TextServiceConfig {
    pub normalizer_url: String,
    pub romanizer_url: String,
    /// Seconds allowed per normalize/romanize call
    pub timeout_secs: u64,
}

/// Forced-alignment model runner.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    /// Inference runner command
    pub command: String,
    /// Model checkpoint path passed to the runner
    pub model_path: PathBuf,
    /// Token dictionary file; the `<star>` sentinel is appended at load
    pub dictionary_path: PathBuf,
    /// Concurrent inference invocations permitted (the runner is not
    /// assumed reentrant)
    pub instances: usize,
    /// Seconds allowed per alignment call
    pub timeout_secs: u64,
}

/// Language identification model runner.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentifierConfig {
    pub command: String,
    pub model_path: PathBuf,
    /// Identification only listens to this many seconds of audio
    pub max_probe_secs: f64,
    /// Seconds allowed per identify call
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5850".to_string(),
            database_path: PathBuf::from("versealign.db"),
            work_dir: std::env::temp_dir().join("versealign"),
            worker_capacity: 10,
            storage: StorageConfig::default(),
            transcoder: TranscoderConfig::default(),
            text: TextServiceConfig::default(),
            aligner: AlignerConfig::default(),
            identifier: IdentifierConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9199".to_string(),
            timeout_secs: 120,
        }
    }
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for TextServiceConfig {
    fn default() -> Self {
        Self {
            normalizer_url: "http://127.0.0.1:8601".to_string(),
            romanizer_url: "http://127.0.0.1:8602".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            command: "mms-align".to_string(),
            model_path: PathBuf::from("models/ctc_alignment.pt"),
            dictionary_path: PathBuf::from("models/dictionary.txt"),
            instances: 1,
            timeout_secs: 600,
        }
    }
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            command: "mms-lid".to_string(),
            model_path: PathBuf::from("models/lid.pt"),
            max_probe_secs: 30.0,
            timeout_secs: 120,
        }
    }
}

impl Config {
    /// Load configuration from the resolved TOML path plus environment
    /// overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("VERSEALIGN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("versealign.toml"));

        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML config file; a missing file yields defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            info!("Configuration loaded from {}", path.display());
            Ok(config)
        } else {
            warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
            Ok(Config::default())
        }
    }

    /// Environment variables override file values for the common knobs.
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("VERSEALIGN_BIND") {
            self.bind_address = addr;
        }
        if let Ok(path) = std::env::var("VERSEALIGN_DB") {
            self.database_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("VERSEALIGN_WORK_DIR") {
            self.work_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("VERSEALIGN_STORAGE_URL") {
            self.storage.base_url = url;
        }
        if let Ok(capacity) = std::env::var("VERSEALIGN_WORKERS") {
            match capacity.parse() {
                Ok(n) if n > 0 => self.worker_capacity = n,
                _ => warn!("Ignoring invalid VERSEALIGN_WORKERS value: {}", capacity),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.worker_capacity, 10);
        assert_eq!(config.aligner.instances, 1);
        assert!(config.identifier.max_probe_secs > 0.0);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            bind_address = "0.0.0.0:6000"

            [aligner]
            instances = 2
            "#,
        )
        .unwrap();
        assert_eq!(parsed.bind_address, "0.0.0.0:6000");
        assert_eq!(parsed.aligner.instances, 2);
        // Untouched sections keep their defaults
        assert_eq!(parsed.transcoder.ffmpeg_path, "ffmpeg");
        assert_eq!(parsed.worker_capacity, 10);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::from_file(Path::new("/nonexistent/versealign.toml")).unwrap();
        assert_eq!(config.bind_address, Config::default().bind_address);
    }
}
