//! # res-engine
//!
//! Turns free-text progress updates into persisted goal progress.
//!
//! [`MatchingEngine`] owns the goal document, the pending queue and the
//! store for one process. `log_text` asks the classifier which goal an
//! update belongs to; confident matches are written straight away, the rest
//! wait in the pending queue until the caller confirms a goal with
//! `resolve_pending`.
//!
//! Configuration lives in `~/.resolutions/config.toml`, see [`EngineConfig`].

pub mod config;
pub mod engine;
pub mod error;
pub mod submission;

pub use config::{EngineConfig, MatchingConfig, ProgressConfig};
pub use engine::{GoalView, LogOutcome, MatchingEngine, Recorded};
pub use error::EngineError;
pub use submission::{LogOptions, PendingEntry, PendingReason, SubmissionState, TieBreak};
