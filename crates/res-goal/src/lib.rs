//! # res-goal
//!
//! Goal lifecycle, progress calculation, and durable state for Resolutions.
//!
//! A [`Goal`] is a personal resolution with an optional numeric target.
//! Progress is recorded as append-only [`LogEntry`] records, and everything
//! lives in one versioned [`StateDocument`] that [`StateStore`] writes
//! atomically.
//!
//! ## Key components
//!
//! - [`Goal`] / [`GoalStatus`]: the status state machine
//!   (Active → Completed → Archived, or Active → Archived)
//! - [`lifecycle`]: create, edit, complete, archive with validation
//! - [`progress`]: pure percentage / streak / sparkline functions
//! - [`StateStore`]: temp-file + rename persistence with strict loading
//! - [`GoalEvent`] / [`EventBus`]: notifications after each write

pub mod error;
pub mod events;
pub mod goal;
pub mod lifecycle;
pub mod log_entry;
pub mod progress;
pub mod state;
pub mod store;

pub use error::GoalError;
pub use events::{EventBus, EventSink, GoalEvent, JournalSink};
pub use goal::{Goal, GoalStatus};
pub use lifecycle::{GoalEdit, NewGoal, StatusChange};
pub use log_entry::{Delta, LogEntry, LogSource, NewEntry, Sentiment};
pub use progress::{ProgressSnapshot, SentimentTally, SparklineSettings, Summary};
pub use state::StateDocument;
pub use store::StateStore;
