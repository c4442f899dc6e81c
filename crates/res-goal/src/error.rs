// error.rs - Error types for goal lifecycle and state persistence.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during goal lifecycle and persistence operations.
#[derive(Debug, Error)]
pub enum GoalError {
    /// Bad input to a lifecycle operation. Caller-fixable.
    #[error("validation error: {0}")]
    Validation(String),

    /// The persisted state document could not be parsed or failed validation.
    /// The file is left untouched so the caller can offer recovery.
    #[error("corrupt state document at {path}: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    /// The atomic write failed. The previous document is still intact.
    #[error("failed to write state document to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A file I/O operation failed (reads, event log appends).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize goal data.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The requested goal was not found.
    #[error("goal not found: {0}")]
    NotFound(Uuid),

    /// Invalid status transition. Nothing was mutated.
    #[error("invalid transition from {from} to {to} for goal {goal_id}")]
    InvalidTransition {
        goal_id: Uuid,
        from: String,
        to: String,
    },
}

impl GoalError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        GoalError::Validation(msg.into())
    }
}
