//! Raw file listings and audio/text pairs
//!
//! Files arrive from the blob store as flat listings under a session
//! prefix. Named structs replace the positional tuples the storage API
//! exposes, so that audio/text sides can never be swapped silently.

use serde::{Deserialize, Serialize};

/// One entry from a session's blob-store listing.
///
/// Ephemeral: produced by `BlobStore::list`, consumed by the matcher, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFile {
    /// File name including extension (e.g. `chapter1.wav`)
    pub name: String,
    /// Public download URL
    pub url: String,
    /// Storage path relative to the bucket root
    pub path: String,
}

impl RawFile {
    /// Split the name into (base, extension). `None` when there is no dot.
    pub fn split_name(&self) -> Option<(&str, &str)> {
        self.name.rsplit_once('.')
    }
}

/// Classification of a raw file by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Audio,
    Text,
}

impl FileKind {
    /// Classify a file extension. Unrecognized extensions return `None`
    /// and are ignored by the matcher.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "wav" | "mp3" => Some(FileKind::Audio),
            "txt" | "usfm" => Some(FileKind::Text),
            _ => None,
        }
    }
}

/// One matched audio/text pair sharing a base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    pub audio: RawFile,
    pub text: RawFile,
}

impl FilePair {
    /// Extension of the text side (drives segmentation format selection).
    pub fn text_extension(&self) -> &str {
        self.text
            .split_name()
            .map(|(_, ext)| ext)
            .unwrap_or_default()
    }
}
