// error.rs - Error types for the matching engine.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::submission::SubmissionState;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A goal lifecycle or persistence operation failed.
    #[error("goal error: {0}")]
    Goal(#[from] res_goal::GoalError),

    /// The requested pending entry is not in the queue.
    #[error("pending entry not found: {0}")]
    PendingNotFound(Uuid),

    /// A submission was driven through an illegal state change.
    #[error("invalid submission transition from {from} to {to}")]
    InvalidSubmissionTransition {
        from: SubmissionState,
        to: SubmissionState,
    },

    /// The config file could not be read or parsed.
    #[error("config error at {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    /// The classifier section of the config is unusable.
    #[error("classifier config error: {0}")]
    Classifier(#[from] res_classifier::ClassifierConfigError),
}
