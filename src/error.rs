//! Error taxonomy for the ingestion and reconciliation core.
//!
//! Per-row validation and duplicate failures are returned as data
//! (`ImportSummary` rejection lines), never as errors. Only store-level
//! and parse-level failures propagate out of an operation.

use thiserror::Error;

/// Failure of a persistent-store call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique index rejected the write. The pre-insert existence check
    /// is only a fast path; concurrent imports can still collide here.
    #[error("{field} already exists in this room")]
    Duplicate { field: &'static str },

    #[error("not found: {0}")]
    NotFound(&'static str),
}

/// Failure of a single-participant add. One reason is reported back.
#[derive(Debug, Error)]
pub enum AddError {
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Duplicate(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AddError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { .. } => Self::Duplicate(err.to_string()),
            other => Self::Store(other),
        }
    }
}

/// Fatal failure of a bulk import. Parse errors abort before any row is
/// processed; store errors abort the remaining unpersisted batches.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid CSV: {0}")]
    Parse(#[from] csv::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
