// log_entry.rs - LogEntry: one recorded progress event for a goal.
//
// Entries are append-only. Once written they are never mutated or removed,
// even when their goal is archived.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GoalError;
use crate::goal::Goal;

/// The structured progress carried by a log entry.
///
/// Serializes as `{"kind": "quantity", "amount": 3.0, "unit": "miles"}` or
/// `{"kind": "done"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delta {
    /// An increment toward a quantity target.
    Quantity {
        amount: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },

    /// The goal (or today's instance of it) was done.
    Done,
}

impl Delta {
    /// Build a quantity delta, rejecting non-positive or non-finite amounts.
    pub fn quantity(amount: f64, unit: Option<&str>) -> Result<Self, GoalError> {
        let delta = Delta::Quantity {
            amount,
            unit: unit.map(str::to_string),
        };
        delta.validate()?;
        Ok(delta)
    }

    /// The delta applied when nothing was extracted from the text:
    /// one unit for quantity goals, `done` otherwise.
    pub fn default_for(goal: &Goal) -> Self {
        if goal.is_quantity() {
            Delta::Quantity {
                amount: 1.0,
                unit: goal.unit.clone(),
            }
        } else {
            Delta::Done
        }
    }

    /// Quantity contributed toward a target (0 for `done`).
    pub fn amount(&self) -> f64 {
        match self {
            Delta::Quantity { amount, .. } => *amount,
            Delta::Done => 0.0,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Delta::Done)
    }

    pub fn validate(&self) -> Result<(), GoalError> {
        if let Delta::Quantity { amount, .. } = self {
            if !amount.is_finite() || *amount <= 0.0 {
                return Err(GoalError::validation(format!(
                    "quantity must be a positive number, got {}",
                    amount
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delta::Quantity {
                amount,
                unit: Some(unit),
            } => write!(f, "+{} {}", amount, unit),
            Delta::Quantity { amount, unit: None } => write!(f, "+{}", amount),
            Delta::Done => write!(f, "done"),
        }
    }
}

/// Tone of an update as judged by the classifier.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Struggling,
}

impl Sentiment {
    /// Parse a classifier label. Unknown labels fall back to neutral.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "struggling" | "negative" => Sentiment::Struggling,
            _ => Sentiment::Neutral,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Struggling => write!(f, "struggling"),
        }
    }
}

/// How an entry got attached to its goal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    /// The user picked the goal (explicitly or via manual fallback).
    Manual,
    /// The classifier picked the goal (directly or confirmed by the user).
    AiMatched,
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSource::Manual => write!(f, "manual"),
            LogSource::AiMatched => write!(f, "ai_matched"),
        }
    }
}

/// A progress update for a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogEntry {
    /// Monotonically increasing sequence number, unique per state document.
    pub seq: u64,

    /// Owning goal. Always set on persisted entries written by the engine.
    pub goal_id: Option<Uuid>,

    /// Original user text.
    pub raw_text: String,

    /// Classifier-cleaned summary of what was accomplished.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parsed_update: String,

    pub delta: Delta,

    #[serde(default)]
    pub sentiment: Sentiment,

    pub timestamp: DateTime<Utc>,

    pub source: LogSource,
}

impl LogEntry {
    /// Calendar day (UTC) the entry counts toward.
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn belongs_to(&self, goal_id: Uuid) -> bool {
        self.goal_id == Some(goal_id)
    }

    /// Text to show for this entry: the parsed summary if present.
    pub fn display_text(&self) -> &str {
        if self.parsed_update.is_empty() {
            &self.raw_text
        } else {
            &self.parsed_update
        }
    }
}

/// Input for appending a resolved entry to the state document.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub goal_id: Uuid,
    pub raw_text: String,
    pub parsed_update: String,
    /// `None` applies [`Delta::default_for`] the resolved goal.
    pub delta: Option<Delta>,
    pub sentiment: Sentiment,
    pub timestamp: DateTime<Utc>,
    pub source: LogSource,
}
