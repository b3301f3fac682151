use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Migration v{version} failed: {reason}")]
    Migration { version: u32, reason: String },

    #[error("Failed to encode/decode job column: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt value in column '{column}': {reason}")]
    Corrupt { column: &'static str, reason: String },

    #[error("Job not found: {0}")]
    JobNotFound(String),
}
