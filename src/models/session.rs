//! Session records and alignment results
//!
//! One session groups the file pairs a client uploaded under a common id.
//! The session row in SQLite is the only durable state the service keeps;
//! observers poll it for progress instead of any console narration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session run status.
///
/// A session with no persisted row is implicitly queued. Within one run the
/// status moves IN_PROGRESS → DONE or IN_PROGRESS → FAILED; a fresh start
/// request on the same id resets the transient fields and begins a new run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Done,
    Failed,
}

impl SessionStatus {
    /// Column representation (matches the serde form).
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Done => "DONE",
            SessionStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN_PROGRESS" => Some(SessionStatus::InProgress),
            "DONE" => Some(SessionStatus::Done),
            "FAILED" => Some(SessionStatus::Failed),
            _ => None,
        }
    }
}

/// Time bounds for one original text unit within its audio file.
///
/// The injected `<star>` sentinel absorbs leading audio but emits no
/// section; sections appear in original text order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Start of the unit, seconds from the beginning of the audio
    pub begin: f64,
    /// End of the unit, seconds
    pub end: f64,
    /// `begin` formatted HH:MM:SS
    pub begin_str: String,
    /// `end` formatted HH:MM:SS
    pub end_str: String,
    /// The original (unnormalized) text unit
    pub text: String,
    /// Romanized token string the model aligned for this unit
    pub uroman_tokens: String,
}

/// Alignment result for one audio/text pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTimestamps {
    pub audio_file: String,
    pub text_file: String,
    pub sections: Vec<Section>,
}

/// Durable session record, one row per session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub status: SessionStatus,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Number of matched pairs in the current run
    pub total: Option<i64>,
    /// Pairs completed so far in the current run
    pub progress: Option<i64>,
    /// Audio file name of the pair currently being processed
    pub current: Option<String>,
    /// Failure message when status is FAILED
    pub error: Option<String>,
    /// One entry per successfully processed pair, in processing order
    pub timestamps: Vec<FileTimestamps>,
    /// Sum of source audio durations across the run, seconds
    pub total_length: Option<f64>,
}

/// Format whole seconds as HH:MM:SS. Hours do not wrap at 24.
pub fn format_hms(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
