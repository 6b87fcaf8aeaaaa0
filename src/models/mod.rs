//! Data model types for versealign

pub mod raw_file;
pub mod session;

pub use raw_file::{FileKind, FilePair, RawFile};
pub use session::{FileTimestamps, Section, SessionRecord, SessionStatus};
