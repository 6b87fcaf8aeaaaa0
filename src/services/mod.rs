//! Service modules for the alignment workflow

pub mod aligner;
pub mod file_matcher;
pub mod lang_id;
pub mod pipeline;
pub mod storage_client;
pub mod text_segmenter;
pub mod text_service;
pub mod transcoder;
pub mod worker_pool;

pub use aligner::{AlignError, AlignmentModel, AlignmentOutput, FrameSegment, MmsAligner};
pub use file_matcher::match_files;
pub use lang_id::{IdentifyError, LanguageIdentifier, SubprocessIdentifier};
pub use pipeline::{AlignmentPipeline, PipelineTimeouts};
pub use storage_client::{BlobStore, HttpBlobStore, StorageError};
pub use text_segmenter::{resolve_separator, segment, TextFormat};
pub use text_service::{HttpNormalizer, HttpRomanizer, Normalizer, Romanizer, TextServiceError};
pub use transcoder::{FfmpegTranscoder, TranscodeError, Transcoder};
pub use worker_pool::WorkerPool;
