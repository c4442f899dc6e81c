// lifecycle.rs - Goal lifecycle manager: create, edit, complete, archive.
//
// All operations work on a StateDocument in memory. Each one either fully
// applies or returns an error without touching the document, so callers
// can mutate a copy and persist it afterwards.

use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use crate::error::GoalError;
use crate::goal::{normalize_title, Goal, GoalStatus, DEFAULT_CATEGORY, DEFAULT_PRIORITY};
use crate::state::StateDocument;

/// Input for creating a goal.
#[derive(Debug, Clone, Default)]
pub struct NewGoal {
    pub title: String,
    pub category: Option<String>,
    pub week: Option<String>,
    pub target: Option<f64>,
    pub unit: Option<String>,
    pub priority: Option<u8>,
}

impl NewGoal {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: f64, unit: Option<&str>) -> Self {
        self.target = Some(target);
        self.unit = unit.map(str::to_string);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Partial update for an existing goal. `None` fields are left as they are.
#[derive(Debug, Clone, Default)]
pub struct GoalEdit {
    pub title: Option<String>,
    pub category: Option<String>,
    pub week: Option<String>,
    pub target: Option<f64>,
    pub unit: Option<String>,
    pub priority: Option<u8>,
}

impl GoalEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category.is_none()
            && self.week.is_none()
            && self.target.is_none()
            && self.unit.is_none()
            && self.priority.is_none()
    }
}

/// Result of a status operation: the goal afterwards and its previous status.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub goal: Goal,
    pub previous: GoalStatus,
}

impl StatusChange {
    /// False for idempotent no-ops (archiving an archived goal).
    pub fn changed(&self) -> bool {
        self.previous != self.goal.status
    }
}

impl StateDocument {
    /// Create and store a new active goal.
    pub fn create_goal(&mut self, new: NewGoal) -> Result<Goal, GoalError> {
        let title = validate_title(&new.title)?;
        self.ensure_title_free(&title, None)?;
        let target = new.target.map(validate_target).transpose()?;
        let priority = validate_priority(new.priority.unwrap_or(DEFAULT_PRIORITY))?;
        let week = new.week.as_deref().map(validate_week).transpose()?;

        let mut goal = Goal::new(title);
        // UUID v4 collisions are practically impossible, but an ID must
        // never be handed out twice, archived goals included.
        while self.goal(goal.id).is_some() {
            goal.id = Uuid::new_v4();
        }
        goal.category = normalize_category(new.category.as_deref());
        goal.week = week;
        goal.target = target;
        goal.unit = clean_optional(new.unit);
        goal.priority = priority;

        tracing::info!(goal_id = %goal.id, title = %goal.title, "goal created");
        self.goals.push(goal.clone());
        Ok(goal)
    }

    /// Apply a partial edit. Archived goals are frozen.
    pub fn edit_goal(&mut self, goal_id: Uuid, edit: GoalEdit) -> Result<Goal, GoalError> {
        let current = self.goal(goal_id).ok_or(GoalError::NotFound(goal_id))?;
        if current.status == GoalStatus::Archived {
            return Err(GoalError::InvalidTransition {
                goal_id,
                from: current.status.to_string(),
                to: "edited".to_string(),
            });
        }

        // Validate everything before touching the goal.
        let title = edit.title.as_deref().map(validate_title).transpose()?;
        if let Some(title) = &title {
            self.ensure_title_free(title, Some(goal_id))?;
        }
        let target = edit.target.map(validate_target).transpose()?;
        let priority = edit.priority.map(validate_priority).transpose()?;
        let week = edit.week.as_deref().map(validate_week).transpose()?;

        let goal = self.goal_mut(goal_id)?;
        if let Some(title) = title {
            goal.title = title;
        }
        if edit.category.is_some() {
            goal.category = normalize_category(edit.category.as_deref());
        }
        if let Some(week) = week {
            goal.week = Some(week);
        }
        if let Some(target) = target {
            goal.target = Some(target);
        }
        if edit.unit.is_some() {
            goal.unit = clean_optional(edit.unit);
        }
        if let Some(priority) = priority {
            goal.priority = priority;
        }
        goal.updated_at = Utc::now();

        tracing::info!(goal_id = %goal_id, "goal edited");
        Ok(goal.clone())
    }

    /// Mark an active goal completed.
    pub fn complete_goal(&mut self, goal_id: Uuid) -> Result<StatusChange, GoalError> {
        let goal = self.goal_mut(goal_id)?;
        let previous = goal.status;
        goal.transition(GoalStatus::Completed)?;
        tracing::info!(goal_id = %goal_id, "goal completed");
        Ok(StatusChange {
            goal: goal.clone(),
            previous,
        })
    }

    /// Archive a goal. Archiving an archived goal is a no-op, not an error.
    pub fn archive_goal(&mut self, goal_id: Uuid) -> Result<StatusChange, GoalError> {
        let goal = self.goal_mut(goal_id)?;
        let previous = goal.status;
        if previous != GoalStatus::Archived {
            goal.transition(GoalStatus::Archived)?;
            tracing::info!(goal_id = %goal_id, "goal archived");
        }
        Ok(StatusChange {
            goal: goal.clone(),
            previous,
        })
    }

    fn ensure_title_free(&self, title: &str, except: Option<Uuid>) -> Result<(), GoalError> {
        let key = normalize_title(title);
        let taken = self.goals.iter().any(|g| {
            Some(g.id) != except && g.status != GoalStatus::Archived && g.title_key() == key
        });
        if taken {
            return Err(GoalError::validation(format!(
                "a goal titled '{}' already exists",
                title
            )));
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<String, GoalError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(GoalError::validation("title must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn validate_target(target: f64) -> Result<f64, GoalError> {
    if !target.is_finite() || target <= 0.0 {
        return Err(GoalError::validation(format!(
            "target must be a positive number, got {}",
            target
        )));
    }
    Ok(target)
}

fn validate_priority(priority: u8) -> Result<u8, GoalError> {
    if !(1..=10).contains(&priority) {
        return Err(GoalError::validation(format!(
            "priority must be between 1 and 10, got {}",
            priority
        )));
    }
    Ok(priority)
}

fn validate_week(week: &str) -> Result<String, GoalError> {
    let re = Regex::new(r"^\d{4}-W(0[1-9]|[1-4]\d|5[0-3])$")
        .map_err(|e| GoalError::validation(e.to_string()))?;
    let week = week.trim().to_ascii_uppercase();
    if !re.is_match(&week) {
        return Err(GoalError::validation(format!(
            "week must look like 2026-W07, got '{}'",
            week
        )));
    }
    Ok(week)
}

fn normalize_category(category: Option<&str>) -> String {
    match category.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_lowercase(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_applies_defaults() {
        let mut doc = StateDocument::default();
        let goal = doc.create_goal(NewGoal::titled("  Meditate daily ")).unwrap();
        assert_eq!(goal.title, "Meditate daily");
        assert_eq!(goal.category, "general");
        assert_eq!(goal.priority, 3);
        assert_eq!(goal.status, GoalStatus::Active);
        assert_eq!(doc.goals.len(), 1);
    }

    #[test]
    fn create_rejects_empty_title() {
        let mut doc = StateDocument::default();
        let result = doc.create_goal(NewGoal::titled("   "));
        assert!(matches!(result, Err(GoalError::Validation(_))));
        assert!(doc.goals.is_empty());
    }

    #[test]
    fn create_rejects_non_positive_target() {
        let mut doc = StateDocument::default();
        for bad in [0.0, -3.0, f64::NAN] {
            let result = doc.create_goal(NewGoal::titled("Read").with_target(bad, Some("books")));
            assert!(matches!(result, Err(GoalError::Validation(_))));
        }
        assert!(doc.goals.is_empty());
    }

    #[test]
    fn create_rejects_duplicate_open_title() {
        let mut doc = StateDocument::default();
        doc.create_goal(NewGoal::titled("Read 24 books")).unwrap();
        let result = doc.create_goal(NewGoal::titled("read 24 BOOKS"));
        assert!(matches!(result, Err(GoalError::Validation(_))));
    }

    #[test]
    fn archived_title_can_be_reused_with_fresh_id() {
        let mut doc = StateDocument::default();
        let old = doc.create_goal(NewGoal::titled("Read 24 books")).unwrap();
        doc.archive_goal(old.id).unwrap();
        let new = doc.create_goal(NewGoal::titled("Read 24 books")).unwrap();
        assert_ne!(old.id, new.id);
        assert_eq!(doc.goals.len(), 2);
    }

    #[test]
    fn create_normalizes_category_and_week() {
        let mut doc = StateDocument::default();
        let goal = doc
            .create_goal(NewGoal {
                title: "Run".to_string(),
                category: Some(" Fitness ".to_string()),
                week: Some("2026-w42".to_string()),
                ..NewGoal::default()
            })
            .unwrap();
        assert_eq!(goal.category, "fitness");
        assert_eq!(goal.week.as_deref(), Some("2026-W42"));
    }

    #[test]
    fn create_rejects_bad_week_and_priority() {
        let mut doc = StateDocument::default();
        let bad_week = NewGoal {
            week: Some("week 42".to_string()),
            ..NewGoal::titled("Run")
        };
        assert!(doc.create_goal(bad_week).is_err());
        let bad_priority = NewGoal {
            priority: Some(11),
            ..NewGoal::titled("Run")
        };
        assert!(doc.create_goal(bad_priority).is_err());
    }

    #[test]
    fn archive_is_idempotent() {
        let mut doc = StateDocument::default();
        let goal = doc.create_goal(NewGoal::titled("Floss")).unwrap();

        let first = doc.archive_goal(goal.id).unwrap();
        assert!(first.changed());
        let once = doc.clone();

        let second = doc.archive_goal(goal.id).unwrap();
        assert!(!second.changed());
        assert_eq!(doc, once);
    }

    #[test]
    fn complete_only_from_active() {
        let mut doc = StateDocument::default();
        let goal = doc.create_goal(NewGoal::titled("Floss")).unwrap();
        let change = doc.complete_goal(goal.id).unwrap();
        assert_eq!(change.previous, GoalStatus::Active);
        assert_eq!(change.goal.status, GoalStatus::Completed);

        let again = doc.complete_goal(goal.id);
        assert!(matches!(again, Err(GoalError::InvalidTransition { .. })));

        doc.archive_goal(goal.id).unwrap();
        assert!(doc.complete_goal(goal.id).is_err());
    }

    #[test]
    fn unknown_goal_is_not_found() {
        let mut doc = StateDocument::default();
        assert!(matches!(
            doc.archive_goal(Uuid::new_v4()),
            Err(GoalError::NotFound(_))
        ));
    }

    #[test]
    fn edit_updates_fields_atomically() {
        let mut doc = StateDocument::default();
        let goal = doc.create_goal(NewGoal::titled("Read")).unwrap();
        let edited = doc
            .edit_goal(
                goal.id,
                GoalEdit {
                    title: Some("Read 12 books".to_string()),
                    target: Some(12.0),
                    unit: Some("books".to_string()),
                    ..GoalEdit::default()
                },
            )
            .unwrap();
        assert_eq!(edited.title, "Read 12 books");
        assert_eq!(edited.target, Some(12.0));

        let before = doc.clone();
        let bad = doc.edit_goal(
            goal.id,
            GoalEdit {
                title: Some("Read 6 books".to_string()),
                target: Some(-1.0),
                ..GoalEdit::default()
            },
        );
        assert!(bad.is_err());
        assert_eq!(doc, before);
    }

    #[test]
    fn archived_goal_cannot_be_edited() {
        let mut doc = StateDocument::default();
        let goal = doc.create_goal(NewGoal::titled("Read")).unwrap();
        doc.archive_goal(goal.id).unwrap();
        let result = doc.edit_goal(
            goal.id,
            GoalEdit {
                priority: Some(1),
                ..GoalEdit::default()
            },
        );
        assert!(matches!(result, Err(GoalError::InvalidTransition { .. })));
    }
}
