use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatrixError {
    #[error("Unrecognized job name: {0}")]
    UnrecognizedJobName(String),
    #[error("Invalid timestamp for {job_url}: {reason}")]
    InvalidTimestamp { job_url: String, reason: String },
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Malformed dataset: {0}")]
    MalformedDataset(String),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl MatrixError {
    /// Per-record errors drop one run from a batch; everything else is fatal.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            MatrixError::UnrecognizedJobName(_)
                | MatrixError::InvalidTimestamp { .. }
                | MatrixError::InvalidRecord(_)
        )
    }
}
