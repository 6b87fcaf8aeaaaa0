//! Forced-alignment model handle
//!
//! The model handle is loaded once at startup and shared read-only by every
//! worker. Loading reads the token dictionary and appends the `<star>`
//! sentinel exactly once; inference invocations go through a fixed pool of
//! semaphore permits because the underlying runner is not assumed safe for
//! concurrent invocation.
//!
//! The runner emits frame-level segments: one segment per aligned token
//! occurrence, interleaved with `<blank>` silence segments. Span mapping
//! turns those back into per-line frame bounds, absorbing adjacent silence
//! the way the upstream alignment tooling does (whole silence at the run's
//! edges, half of it between neighboring lines).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::config::AlignerConfig;

/// Sentinel unit absorbing leading silence/unmatched audio before the
/// first real text unit. Reserved in the vocabulary at load time.
pub const SENTINEL: &str = "<star>";

/// Label the model emits for silence frames.
pub const BLANK: &str = "<blank>";

/// Alignment errors
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("Failed to launch {command}: {message}")]
    Spawn { command: String, message: String },

    #[error("Alignment runner failed: {stderr}")]
    Failed { stderr: String },

    #[error("Could not parse runner output: {0}")]
    Parse(String),

    #[error("Token not in model vocabulary: {0}")]
    UnknownToken(String),

    #[error("Runner emitted no segment for token {token:?} (line {line})")]
    SegmentsExhausted { token: String, line: usize },

    #[error("Segment {index} labeled {found:?}, expected token {expected:?}")]
    SegmentMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("Runner reported non-positive stride: {0}")]
    BadStride(f64),

    #[error("Aligner is shutting down")]
    Closed,
}

/// A contiguous run of output frames the model attributed to one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSegment {
    pub label: String,
    pub start: u64,
    pub end: u64,
}

/// Frame bounds for one whole text unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpan {
    pub start: u64,
    pub end: u64,
}

/// Raw model output for one audio file.
#[derive(Debug, Clone, Deserialize)]
pub struct AlignmentOutput {
    pub segments: Vec<FrameSegment>,
    /// Milliseconds of audio represented by one output frame
    pub stride_ms: f64,
}

/// Forced alignment of romanized token lines against one audio file.
#[async_trait]
pub trait AlignmentModel: Send + Sync {
    async fn align(
        &self,
        wav_path: &Path,
        token_lines: &[String],
    ) -> Result<AlignmentOutput, AlignError>;
}

#[derive(Debug, Serialize)]
struct RunnerRequest<'a> {
    token_lines: &'a [String],
}

/// Production handle around the external inference runner.
pub struct MmsAligner {
    command: String,
    model_path: PathBuf,
    /// Dictionary with the sentinel appended, written once at load
    augmented_dictionary: PathBuf,
    vocabulary: HashSet<String>,
    permits: Semaphore,
}

impl MmsAligner {
    /// Load the vocabulary and prepare the shared handle.
    ///
    /// The sentinel is appended to the dictionary here, once, and the
    /// augmented copy is what every inference call receives.
    pub fn load(config: &AlignerConfig, work_dir: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(&config.dictionary_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read dictionary {}: {}",
                config.dictionary_path.display(),
                e
            )
        })?;

        // One token per line; a trailing frequency column is tolerated.
        let mut tokens: Vec<String> = raw
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect();

        if !tokens.iter().any(|t| t == SENTINEL) {
            tokens.push(SENTINEL.to_string());
        }

        std::fs::create_dir_all(work_dir)?;
        let augmented_dictionary = work_dir.join("dictionary.with_star.txt");
        std::fs::write(&augmented_dictionary, tokens.join("\n"))?;

        info!(
            tokens = tokens.len(),
            dictionary = %augmented_dictionary.display(),
            "Alignment vocabulary loaded"
        );

        Ok(Self {
            command: config.command.clone(),
            model_path: config.model_path.clone(),
            augmented_dictionary,
            vocabulary: tokens.into_iter().collect(),
            permits: Semaphore::new(config.instances.max(1)),
        })
    }

    fn check_vocabulary(&self, token_lines: &[String]) -> Result<(), AlignError> {
        for line in token_lines {
            for token in line.split_whitespace() {
                if !self.vocabulary.contains(token) {
                    return Err(AlignError::UnknownToken(token.to_string()));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AlignmentModel for MmsAligner {
    async fn align(
        &self,
        wav_path: &Path,
        token_lines: &[String],
    ) -> Result<AlignmentOutput, AlignError> {
        self.check_vocabulary(token_lines)?;

        // Serialize access to the runner; it is not reentrant.
        let _permit = self.permits.acquire().await.map_err(|_| AlignError::Closed)?;

        let mut child = Command::new(&self.command)
            .arg("--model")
            .arg(&self.model_path)
            .arg("--dictionary")
            .arg(&self.augmented_dictionary)
            .arg("--audio")
            .arg(wav_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AlignError::Spawn {
                command: self.command.clone(),
                message: e.to_string(),
            })?;

        let request = serde_json::to_vec(&RunnerRequest { token_lines })
            .map_err(|e| AlignError::Parse(e.to_string()))?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(&request)
                .await
                .map_err(|e| AlignError::Spawn {
                    command: self.command.clone(),
                    message: format!("Failed to write runner stdin: {}", e),
                })?;
        }
        drop(child.stdin.take());

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AlignError::Spawn {
                command: self.command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(AlignError::Failed {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let parsed: AlignmentOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| AlignError::Parse(e.to_string()))?;

        if parsed.stride_ms <= 0.0 {
            return Err(AlignError::BadStride(parsed.stride_ms));
        }

        debug!(
            wav = %wav_path.display(),
            segments = parsed.segments.len(),
            stride_ms = parsed.stride_ms,
            "Alignment complete"
        );
        Ok(parsed)
    }
}

enum LineInterval {
    /// Segment index range covering the line's tokens
    Segments(usize, usize),
    /// Line had no tokens; pinned to a zero-width frame boundary
    Empty(u64),
}

/// Map each token line to the frame bounds of its aligned segments.
///
/// Lines are matched against the segment stream in order; `<blank>`
/// segments between tokens are skipped. Silence adjacent to a line is
/// absorbed into its bounds: fully at the outer edges of the run, split
/// halfway between neighboring lines.
pub fn token_spans(
    token_lines: &[String],
    segments: &[FrameSegment],
) -> Result<Vec<FrameSpan>, AlignError> {
    let mut intervals: Vec<LineInterval> = Vec::with_capacity(token_lines.len());
    let mut seg_idx = 0usize;

    for (line_idx, line) in token_lines.iter().enumerate() {
        let mut first: Option<usize> = None;
        let mut last = 0usize;

        for token in line.split_whitespace() {
            while seg_idx < segments.len() && segments[seg_idx].label == BLANK {
                seg_idx += 1;
            }
            let segment = segments.get(seg_idx).ok_or_else(|| {
                AlignError::SegmentsExhausted {
                    token: token.to_string(),
                    line: line_idx,
                }
            })?;
            if segment.label != token {
                return Err(AlignError::SegmentMismatch {
                    index: seg_idx,
                    expected: token.to_string(),
                    found: segment.label.clone(),
                });
            }
            if first.is_none() {
                first = Some(seg_idx);
            }
            last = seg_idx;
            seg_idx += 1;
        }

        match first {
            Some(first) => intervals.push(LineInterval::Segments(first, last)),
            None => {
                let boundary = if seg_idx > 0 {
                    segments[seg_idx - 1].end
                } else {
                    0
                };
                intervals.push(LineInterval::Empty(boundary));
            }
        }
    }

    let last_line = intervals.len().saturating_sub(1);
    let spans = intervals
        .iter()
        .enumerate()
        .map(|(i, interval)| match *interval {
            LineInterval::Empty(frame) => FrameSpan {
                start: frame,
                end: frame,
            },
            LineInterval::Segments(first, last) => {
                let mut start = segments[first].start;
                let mut end = segments[last].end;

                if first > 0 && segments[first - 1].label == BLANK {
                    let prev = &segments[first - 1];
                    start = if i == 0 {
                        prev.start
                    } else {
                        (prev.start + prev.end) / 2
                    };
                }
                if last + 1 < segments.len() && segments[last + 1].label == BLANK {
                    let next = &segments[last + 1];
                    end = if i == last_line {
                        next.end
                    } else {
                        (next.start + next.end) / 2
                    };
                }

                FrameSpan { start, end }
            }
        })
        .collect();

    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(label: &str, start: u64, end: u64) -> FrameSegment {
        FrameSegment {
            label: label.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn spans_map_lines_to_their_token_frames() {
        let lines = vec!["a b".to_string(), "c".to_string()];
        let segments = vec![
            seg("a", 0, 10),
            seg("b", 10, 20),
            seg("c", 20, 30),
        ];
        let spans = token_spans(&lines, &segments).unwrap();
        assert_eq!(spans[0], FrameSpan { start: 0, end: 20 });
        assert_eq!(spans[1], FrameSpan { start: 20, end: 30 });
    }

    #[test]
    fn blanks_between_lines_are_split_halfway() {
        let lines = vec!["a".to_string(), "b".to_string()];
        let segments = vec![
            seg("a", 0, 10),
            seg(BLANK, 10, 20),
            seg("b", 20, 30),
        ];
        let spans = token_spans(&lines, &segments).unwrap();
        // Line 0 extends forward into half the silence, line 1 back into
        // the other half.
        assert_eq!(spans[0], FrameSpan { start: 0, end: 15 });
        assert_eq!(spans[1], FrameSpan { start: 15, end: 30 });
    }

    #[test]
    fn edge_blanks_are_absorbed_entirely() {
        let lines = vec!["a".to_string()];
        let segments = vec![
            seg(BLANK, 0, 5),
            seg("a", 5, 10),
            seg(BLANK, 10, 18),
        ];
        let spans = token_spans(&lines, &segments).unwrap();
        assert_eq!(spans[0], FrameSpan { start: 0, end: 18 });
    }

    #[test]
    fn sentinel_line_consumes_its_own_segment() {
        let lines = vec![
            SENTINEL.to_string(),
            "h i".to_string(),
        ];
        let segments = vec![
            seg(SENTINEL, 0, 40),
            seg(BLANK, 40, 50),
            seg("h", 50, 55),
            seg("i", 55, 60),
        ];
        let spans = token_spans(&lines, &segments).unwrap();
        assert_eq!(spans[0], FrameSpan { start: 0, end: 45 });
        assert_eq!(spans[1], FrameSpan { start: 45, end: 60 });
    }

    #[test]
    fn empty_line_gets_zero_width_span() {
        let lines = vec!["a".to_string(), String::new(), "b".to_string()];
        let segments = vec![seg("a", 0, 10), seg("b", 10, 20)];
        let spans = token_spans(&lines, &segments).unwrap();
        assert_eq!(spans[1], FrameSpan { start: 10, end: 10 });
        assert_eq!(spans[2], FrameSpan { start: 10, end: 20 });
    }

    #[test]
    fn mismatched_segment_label_is_an_error() {
        let lines = vec!["a".to_string()];
        let segments = vec![seg("x", 0, 10)];
        let err = token_spans(&lines, &segments).unwrap_err();
        assert!(matches!(err, AlignError::SegmentMismatch { .. }));
    }

    #[test]
    fn exhausted_segments_is_an_error() {
        let lines = vec!["a b".to_string()];
        let segments = vec![seg("a", 0, 10)];
        let err = token_spans(&lines, &segments).unwrap_err();
        assert!(matches!(err, AlignError::SegmentsExhausted { .. }));
    }
}
