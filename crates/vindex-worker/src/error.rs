//! Worker error types.
//!
//! Low-level errors arrive tagged by their crate of origin; `is_retryable`
//! is the single classification the controller consults to decide between
//! re-queueing and failing a job.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] vindex_db::StoreError),

    #[error("media error: {0}")]
    Media(#[from] vindex_media::MediaError),

    #[error("AI error: {0}")]
    Ai(#[from] vindex_ai::AiError),

    /// Invariant violation inside the pipeline (non-monotonic scenes,
    /// mismatched batch sizes). Always fatal for the job.
    #[error("pipeline invariant violated: {0}")]
    Invariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// Whether the job may be returned to the queue for another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Store(e) => e.is_transient(),
            WorkerError::Media(e) => e.is_retryable(),
            WorkerError::Ai(e) => e.is_retryable(),
            WorkerError::Io(_) => true,
            WorkerError::Config(_) | WorkerError::Invariant(_) => false,
        }
    }
}
