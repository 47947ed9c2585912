use std::path::PathBuf;
use thiserror::Error;

/// Errors from the on-disk trade journal.
#[derive(Error, Debug)]
pub enum JournalError {
    /// IO error reading/writing a journal file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Another writer holds the journal directory.
    #[error("journal directory is locked by another writer: {path}")]
    Locked { path: PathBuf },
}

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
}
