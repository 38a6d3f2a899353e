use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A single document could not be loaded or parsed; the batch continues.
    #[error("Failed to parse '{filename}': {reason}")]
    Parse { filename: String, reason: String },

    #[error("Question is empty")]
    EmptyQuestion,

    #[error("No index has been built yet")]
    IndexUnavailable,

    /// Cached chunk total disagrees with the stored vector count.
    #[error("Cache holds {cached} chunks but the vector table holds {vectors}")]
    CacheInconsistency { cached: usize, vectors: usize },

    /// The stored index was embedded by a different model than the one configured.
    #[error("Index was built with '{built_with}' but the configured embedder is '{current}'; rerun indexing")]
    EmbedderMismatch { built_with: String, current: String },

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn parse(filename: impl Into<String>, reason: impl ToString) -> Self {
        Error::Parse { filename: filename.into(), reason: reason.to_string() }
    }

    /// True for failures the caller caused, as opposed to system faults.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::EmptyQuestion)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
