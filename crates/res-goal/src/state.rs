// state.rs - StateDocument: the whole persisted state of the tracker.
//
// One document holds every goal and every log entry. It is loaded once,
// mutated in memory on a copy, and written back atomically by StateStore.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GoalError;
use crate::goal::{Goal, GoalStatus};
use crate::log_entry::{Delta, LogEntry, NewEntry};

/// Schema version written by this build.
pub const CURRENT_SCHEMA: u32 = 1;

/// Oldest schema version this build can read.
pub const MIN_SUPPORTED_SCHEMA: u32 = 1;

/// Root data structure for the JSON state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateDocument {
    pub schema_version: u32,
    pub goals: Vec<Goal>,
    pub log_entries: Vec<LogEntry>,
    /// Next sequence number to hand out. Always greater than any stored seq.
    pub next_log_seq: u64,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA,
            goals: Vec::new(),
            log_entries: Vec::new(),
            next_log_seq: 1,
        }
    }
}

impl StateDocument {
    /// Look up a goal by ID.
    pub fn goal(&self, goal_id: Uuid) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == goal_id)
    }

    pub(crate) fn goal_mut(&mut self, goal_id: Uuid) -> Result<&mut Goal, GoalError> {
        self.goals
            .iter_mut()
            .find(|g| g.id == goal_id)
            .ok_or(GoalError::NotFound(goal_id))
    }

    /// Non-archived goals: the ones that may receive entries and the only
    /// ones offered for matching.
    pub fn open_goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals.iter().filter(|g| g.accepts_entries())
    }

    /// All entries attached to a goal, in append order.
    pub fn entries_for(&self, goal_id: Uuid) -> Vec<&LogEntry> {
        self.log_entries
            .iter()
            .filter(|e| e.belongs_to(goal_id))
            .collect()
    }

    /// Timestamp and seq of the newest entry for a goal, if any.
    pub fn last_activity(&self, goal_id: Uuid) -> Option<(DateTime<Utc>, u64)> {
        self.log_entries
            .iter()
            .filter(|e| e.belongs_to(goal_id))
            .map(|e| (e.timestamp, e.seq))
            .max()
    }

    /// Append a resolved entry. The goal must exist and not be archived.
    ///
    /// Returns the stored entry with its allocated sequence number.
    pub fn append_entry(&mut self, new: NewEntry) -> Result<LogEntry, GoalError> {
        let goal = self.goal(new.goal_id).ok_or(GoalError::NotFound(new.goal_id))?;
        if !goal.accepts_entries() {
            return Err(GoalError::validation(format!(
                "goal {} is {} and cannot receive entries",
                goal.id, goal.status
            )));
        }
        if new.raw_text.trim().is_empty() {
            return Err(GoalError::validation("log text must not be empty"));
        }
        let delta = match new.delta {
            Some(delta) => {
                delta.validate()?;
                delta
            }
            None => Delta::default_for(goal),
        };

        let entry = LogEntry {
            seq: self.next_log_seq,
            goal_id: Some(new.goal_id),
            raw_text: new.raw_text,
            parsed_update: new.parsed_update,
            delta,
            sentiment: new.sentiment,
            timestamp: new.timestamp,
            source: new.source,
        };
        self.next_log_seq += 1;
        self.log_entries.push(entry.clone());
        Ok(entry)
    }

    /// Check the semantic invariants that serde can't express.
    ///
    /// Returns a human-readable reason on the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_SUPPORTED_SCHEMA..=CURRENT_SCHEMA).contains(&self.schema_version) {
            return Err(format!(
                "unsupported schema_version {} (supported {}..={})",
                self.schema_version, MIN_SUPPORTED_SCHEMA, CURRENT_SCHEMA
            ));
        }

        let mut ids = HashSet::new();
        let mut open_titles = HashSet::new();
        for goal in &self.goals {
            if !ids.insert(goal.id) {
                return Err(format!("duplicate goal id {}", goal.id));
            }
            if goal.title.trim().is_empty() {
                return Err(format!("goal {} has an empty title", goal.id));
            }
            if let Some(target) = goal.target {
                if !target.is_finite() || target <= 0.0 {
                    return Err(format!("goal {} has non-positive target {}", goal.id, target));
                }
            }
            if !(1..=10).contains(&goal.priority) {
                return Err(format!("goal {} has priority {} outside 1..=10", goal.id, goal.priority));
            }
            if goal.status != GoalStatus::Archived && !open_titles.insert(goal.title_key()) {
                return Err(format!("duplicate open goal title '{}'", goal.title));
            }
        }

        let mut seqs = HashSet::new();
        for entry in &self.log_entries {
            if !seqs.insert(entry.seq) {
                return Err(format!("duplicate log entry seq {}", entry.seq));
            }
            if entry.seq >= self.next_log_seq {
                return Err(format!(
                    "log entry seq {} is not below next_log_seq {}",
                    entry.seq, self.next_log_seq
                ));
            }
            if let Some(goal_id) = entry.goal_id {
                if !ids.contains(&goal_id) {
                    return Err(format!(
                        "log entry {} references unknown goal {}",
                        entry.seq, goal_id
                    ));
                }
            }
            if let Err(e) = entry.delta.validate() {
                return Err(format!("log entry {}: {}", entry.seq, e));
            }
        }
        Ok(())
    }
}
