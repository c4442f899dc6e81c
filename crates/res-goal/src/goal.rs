// goal.rs - Goal: a tracked resolution with an optional numeric target.
//
// Status state machine:
//   Active → Completed → Archived
//   Active → Archived
// There is no way back. Archived goals keep their history but stop
// accepting new log entries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GoalError;

/// Category assigned when the caller doesn't provide one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Priority assigned when the caller doesn't provide one (1 = highest).
pub const DEFAULT_PRIORITY: u8 = 3;

/// The lifecycle status of a Goal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// Accepting log entries.
    Active,

    /// Marked done by the user. Still visible, no longer matched.
    Completed,

    /// Hidden from matching and listings. Terminal.
    Archived,
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalStatus::Active => write!(f, "active"),
            GoalStatus::Completed => write!(f, "completed"),
            GoalStatus::Archived => write!(f, "archived"),
        }
    }
}

impl GoalStatus {
    /// Check whether transitioning from this status to `next` is valid.
    pub fn can_transition_to(&self, next: GoalStatus) -> bool {
        matches!(
            (self, next),
            (GoalStatus::Active, GoalStatus::Completed)
                | (GoalStatus::Active, GoalStatus::Archived)
                | (GoalStatus::Completed, GoalStatus::Archived)
        )
    }

    /// Sort key for listings: active first, then completed, then archived.
    pub fn rank(&self) -> u8 {
        match self {
            GoalStatus::Active => 0,
            GoalStatus::Completed => 1,
            GoalStatus::Archived => 2,
        }
    }
}

/// A personal goal ("mission").
///
/// Quantity goals carry a `target` (e.g. 24 books); done-style goals leave it
/// unset and reach 100% with the first `done` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Goal {
    /// Stable identifier. Never reused, even after archival.
    pub id: Uuid,

    /// Human-readable title (e.g., "Read 24 books").
    pub title: String,

    /// Lower-cased category label (fitness, reading, ...).
    pub category: String,

    /// Optional ISO week label (e.g., "2026-W42") the goal is scheduled for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<String>,

    /// Target quantity. `None` means a done-style goal.
    #[serde(default)]
    pub target: Option<f64>,

    /// Unit for the target (e.g., "books", "miles").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// 1 (highest) to 10 (lowest).
    pub priority: u8,

    /// Current lifecycle status.
    pub status: GoalStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl Goal {
    /// Create a new active, done-style goal in the default category.
    ///
    /// No validation happens here; the lifecycle manager validates input
    /// before constructing goals it persists.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            category: DEFAULT_CATEGORY.to_string(),
            week: None,
            target: None,
            unit: None,
            priority: DEFAULT_PRIORITY,
            status: GoalStatus::Active,
            created_at: now,
            updated_at: now,
            completed_at: None,
            archived_at: None,
        }
    }

    /// Builder-style setter for a quantity target.
    pub fn with_target(mut self, target: f64, unit: Option<&str>) -> Self {
        self.target = Some(target);
        self.unit = unit.map(str::to_string);
        self
    }

    /// Builder-style setter for the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// True when progress is measured against a numeric target.
    pub fn is_quantity(&self) -> bool {
        self.target.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.status == GoalStatus::Active
    }

    /// True when the goal may receive new log entries. Completed goals still
    /// accumulate; only archived ones are closed.
    pub fn accepts_entries(&self) -> bool {
        self.status != GoalStatus::Archived
    }

    /// Key used for title uniqueness (trimmed, case-insensitive).
    pub fn title_key(&self) -> String {
        normalize_title(&self.title)
    }

    /// Transition to a new status. Returns an error if the transition is invalid.
    pub fn transition(&mut self, next: GoalStatus) -> Result<(), GoalError> {
        if !self.status.can_transition_to(next) {
            return Err(GoalError::InvalidTransition {
                goal_id: self.id,
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        let now = Utc::now();
        match next {
            GoalStatus::Completed => self.completed_at = Some(now),
            GoalStatus::Archived => self.archived_at = Some(now),
            GoalStatus::Active => {}
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

pub(crate) fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_goal_is_active_done_style() {
        let goal = Goal::new("Meditate");
        assert_eq!(goal.status, GoalStatus::Active);
        assert_eq!(goal.category, "general");
        assert_eq!(goal.priority, 3);
        assert!(!goal.is_quantity());
    }

    #[test]
    fn valid_forward_transitions() {
        let mut goal = Goal::new("Run a marathon");
        goal.transition(GoalStatus::Completed).unwrap();
        assert!(goal.completed_at.is_some());
        goal.transition(GoalStatus::Archived).unwrap();
        assert!(goal.archived_at.is_some());
        assert_eq!(goal.status, GoalStatus::Archived);
    }

    #[test]
    fn active_can_be_archived_directly() {
        let mut goal = Goal::new("Learn Rust");
        goal.transition(GoalStatus::Archived).unwrap();
        assert_eq!(goal.status, GoalStatus::Archived);
        assert!(goal.completed_at.is_none());
    }

    #[test]
    fn no_resurrection() {
        let mut goal = Goal::new("Learn Rust");
        goal.transition(GoalStatus::Archived).unwrap();
        let result = goal.transition(GoalStatus::Active);
        assert!(matches!(result, Err(GoalError::InvalidTransition { .. })));

        let mut done = Goal::new("Paint");
        done.transition(GoalStatus::Completed).unwrap();
        assert!(done.transition(GoalStatus::Active).is_err());
        assert!(done.transition(GoalStatus::Completed).is_err());
    }

    #[test]
    fn failed_transition_leaves_goal_untouched() {
        let mut goal = Goal::new("Learn Rust");
        goal.transition(GoalStatus::Archived).unwrap();
        let before = goal.clone();
        let _ = goal.transition(GoalStatus::Completed);
        assert_eq!(goal, before);
    }

    #[test]
    fn status_display_format() {
        assert_eq!(GoalStatus::Active.to_string(), "active");
        assert_eq!(GoalStatus::Completed.to_string(), "completed");
        assert_eq!(GoalStatus::Archived.to_string(), "archived");
    }

    #[test]
    fn optional_fields_omitted_from_json() {
        let goal = Goal::new("Stretch");
        let json = serde_json::to_string_pretty(&goal).unwrap();
        assert!(!json.contains("week"));
        assert!(!json.contains("archived_at"));
        let restored: Goal = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, goal);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let goal = Goal::new("Stretch");
        let mut value = serde_json::to_value(&goal).unwrap();
        value["emoji"] = serde_json::json!("x");
        assert!(serde_json::from_value::<Goal>(value).is_err());
    }

    #[test]
    fn title_key_ignores_case_and_padding() {
        let goal = Goal::new("  Read 24 Books ");
        assert_eq!(goal.title_key(), "read 24 books");
    }
}
