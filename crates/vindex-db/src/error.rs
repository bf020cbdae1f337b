//! Store error types and transient/permanent classification.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Whether the caller may retry the operation.
    ///
    /// Connection-level failures, pool exhaustion, deadlocks and
    /// serialization failures are transient; everything else (constraint
    /// violations, schema mismatches, missing rows) is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::NotFound(_) => false,
            StoreError::Database(e) => is_transient_sqlx(e),
        }
    }
}

fn is_transient_sqlx(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            // serialization_failure, deadlock_detected, admin_shutdown,
            // connection_exception, connection_failure
            Some("40001") | Some("40P01") | Some("57P01") | Some("08000") | Some("08006")
        ),
        _ => false,
    }
}
