use std::path::PathBuf;
use thiserror::Error;

use crate::admission::MemoryLevel;

#[derive(Error, Debug)]
pub enum ScriptforgeError {
    #[error("Admission denied: {0}")]
    Admission(#[from] AdmissionError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Transcription error: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Synchronous denials from the resource admission controller.
#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("Memory pressure {level:?}: {used_bytes} of {total_bytes} bytes in use")]
    Denied {
        level: MemoryLevel,
        used_bytes: u64,
        total_bytes: u64,
    },

    #[error("Payload of {payload_bytes} bytes needs {required_bytes} bytes of headroom, only {available_bytes} available")]
    SizeDenied {
        payload_bytes: u64,
        required_bytes: u64,
        available_bytes: u64,
    },
}

/// Failures while turning an uploaded source into a plain-text brief.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported document type: {0}")]
    UnsupportedType(String),

    #[error("Failed to read source '{path}': {source}")]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to extract PDF text: {0}")]
    PdfExtraction(String),

    #[error("Failed to extract Word text: {0}")]
    DocxExtraction(String),

    #[error("Extraction produced no text from '{0}'")]
    EmptyText(PathBuf),

    #[error("Source media missing or unreadable: '{0}'")]
    MissingMedia(PathBuf),
}

/// Typed failure categories from the external speech-to-text service,
/// decided at the call site rather than inferred from message text.
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Media exceeds the service size limit: {0}")]
    SizeExceeded(String),

    #[error("Media format rejected by the service: {0}")]
    InvalidFormat(String),

    #[error("Transcription request timed out: {0}")]
    Timeout(String),

    #[error("Transcription service error: {0}")]
    Service(String),
}

impl SpeechError {
    /// Transient errors are worth another attempt; permanent ones are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, SpeechError::Timeout(_) | SpeechError::Service(_))
    }
}

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Transcription failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: SpeechError,
    },
}

/// Typed failure categories from the external completion service.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Completion request timed out: {0}")]
    Timeout(String),

    #[error("Completion service rate limited the request: {0}")]
    RateLimited(String),

    #[error("Completion service error: {0}")]
    Service(String),
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Completion call failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: CompletionError,
    },

    #[error("Job has no brief to generate from")]
    MissingBrief,
}

/// Request-shape errors caught synchronously at submission time.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Brief text is empty after trimming")]
    EmptyBrief,

    #[error("Brief text too short: {len} chars (minimum {min})")]
    BriefTooShort { len: usize, min: usize },

    #[error("Brief text too long: {len} chars (maximum {max})")]
    BriefTooLong { len: usize, max: usize },

    #[error("Custom duration of {0}s is outside the accepted 5-3600s range")]
    InvalidDuration(u32),

    #[error("Input kind '{kind}' requires a {expected} source")]
    MissingSource {
        kind: &'static str,
        expected: &'static str,
    },

    #[error("Job is not in a regenerable state: {0}")]
    NotRegenerable(String),
}

#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Monthly job quota exhausted: {used} of {limit} used")]
    QuotaExceeded { used: u64, limit: u64 },

    #[error("Feature '{0}' is not enabled on this subscription tier")]
    FeatureNotAvailable(&'static str),

    #[error("{kind} of {size_bytes} bytes exceeds the tier limit of {limit_bytes} bytes")]
    PayloadTooLarge {
        kind: &'static str,
        size_bytes: u64,
        limit_bytes: u64,
    },
}

pub type Result<T> = std::result::Result<T, ScriptforgeError>;
