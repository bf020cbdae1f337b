//! AI client error types.

use thiserror::Error;

pub type AiResult<T> = Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("response violates the expected schema: {0}")]
    SchemaViolation(String),

    #[error("empty response from provider")]
    EmptyResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AiError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn schema_violation(msg: impl Into<String>) -> Self {
        Self::SchemaViolation(msg.into())
    }

    /// Whether the caller may retry the call.
    ///
    /// Network failures, timeouts, rate limits and server errors are
    /// retryable. Schema violations get their own bounded retry at the call
    /// site; misconfiguration never recovers.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Http(_) | AiError::Io(_) | AiError::EmptyResponse => true,
            AiError::Api { status, .. } => *status == 429 || *status >= 500,
            AiError::Config(_) | AiError::SchemaViolation(_) => false,
        }
    }
}
