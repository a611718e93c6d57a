//! Error types shared by the tally crates

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The table lacks columns the current stage needs.
    #[error("Missing columns: {missing:?}. Found: {found:?}")]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },

    /// A data-quality problem in one row, located by its 1-based line in the file.
    #[error("Line {line}: {reason}")]
    InvalidRow { line: usize, reason: String },

    #[error("Cache file {path} is unreadable: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    /// Transport, auth or HTTP-status failure talking to the classification service.
    #[error("Classification service error: {0}")]
    Service(String),

    /// The service answered but the reply was not one valid category.
    #[error("Invalid classification response: {0}")]
    InvalidResponse(String),

    #[error("Chart rendering error: {0}")]
    Chart(String),
}

impl Error {
    /// Errors the classifier may retry once before applying its failure policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Service(_) | Error::InvalidResponse(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
