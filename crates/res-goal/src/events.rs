// events.rs - Event model and notification dispatch.
//
// The engine emits an event after every persisted mutation. Sinks decide
// what to do with them; the journal sink appends JSONL next to the state
// file, a readable history of which goals changed and which entries the
// classifier matched.
//
// Publishing is synchronous and happens only after the state write
// succeeded. Sink failures are logged and never undo a mutation.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GoalError;
use crate::goal::{Goal, GoalStatus};
use crate::log_entry::{LogEntry, LogSource};

/// Events emitted at key lifecycle points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GoalEvent {
    /// A new goal was created.
    GoalCreated {
        goal_id: Uuid,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// A goal changed status.
    GoalStatusChanged {
        goal_id: Uuid,
        from_status: GoalStatus,
        to_status: GoalStatus,
        timestamp: DateTime<Utc>,
    },

    /// A goal's attributes were edited.
    GoalEdited {
        goal_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A log entry was persisted.
    EntryLogged {
        goal_id: Uuid,
        seq: u64,
        source: LogSource,
        percentage: f64,
        timestamp: DateTime<Utc>,
    },

    /// A submission is waiting for the caller to pick a goal.
    EntryPending {
        pending_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl GoalEvent {
    /// Get the event type name as a string.
    pub fn event_type(&self) -> &str {
        match self {
            GoalEvent::GoalCreated { .. } => "goal_created",
            GoalEvent::GoalStatusChanged { .. } => "goal_status_changed",
            GoalEvent::GoalEdited { .. } => "goal_edited",
            GoalEvent::EntryLogged { .. } => "entry_logged",
            GoalEvent::EntryPending { .. } => "entry_pending",
        }
    }

    pub fn goal_created(goal: &Goal) -> Self {
        GoalEvent::GoalCreated {
            goal_id: goal.id,
            title: goal.title.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn status_changed(goal_id: Uuid, from: GoalStatus, to: GoalStatus) -> Self {
        GoalEvent::GoalStatusChanged {
            goal_id,
            from_status: from,
            to_status: to,
            timestamp: Utc::now(),
        }
    }

    pub fn goal_edited(goal_id: Uuid) -> Self {
        GoalEvent::GoalEdited {
            goal_id,
            timestamp: Utc::now(),
        }
    }

    /// Returns `None` for entries without a goal (never persisted by the engine).
    pub fn entry_logged(entry: &LogEntry, percentage: f64) -> Option<Self> {
        Some(GoalEvent::EntryLogged {
            goal_id: entry.goal_id?,
            seq: entry.seq,
            source: entry.source,
            percentage,
            timestamp: Utc::now(),
        })
    }

    pub fn entry_pending(pending_id: Uuid, reason: impl Into<String>) -> Self {
        GoalEvent::EntryPending {
            pending_id,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A destination for events.
pub trait EventSink: Send + Sync {
    /// Short name used when a delivery fails.
    fn label(&self) -> &str;

    fn record(&self, event: &GoalEvent) -> Result<(), GoalError>;
}

/// Activity journal: one JSON object per line, appended.
pub struct JournalSink {
    path: PathBuf,
}

impl JournalSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JournalSink {
    fn label(&self) -> &str {
        "journal"
    }

    fn record(&self, event: &GoalEvent) -> Result<(), GoalError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let append = || -> std::io::Result<()> {
            if let Some(dir) = self.path.parent().filter(|d| !d.exists()) {
                fs::create_dir_all(dir)?;
            }
            // One write per record so lines never interleave.
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?
                .write_all(line.as_bytes())
        };
        append().map_err(|source| GoalError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Fans each event out to every registered sink.
///
/// A sink that fails is reported through tracing and skipped; the rest
/// still see the event.
#[derive(Default)]
pub struct EventBus {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Deliver `event`. Returns how many sinks recorded it.
    pub fn publish(&self, event: &GoalEvent) -> usize {
        self.sinks
            .iter()
            .filter(|sink| match sink.record(event) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(
                        sink = sink.label(),
                        event = event.event_type(),
                        error = %e,
                        "event not recorded"
                    );
                    false
                }
            })
            .count()
    }
}
