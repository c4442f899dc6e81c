// submission.rs - Per-submission state machine and the pending queue entry.
//
//   Submitted → Classified → Resolved → Persisted
//   Submitted → Classified → AwaitingConfirmation → Resolved → Persisted
//   Submitted → ClassificationFailed → ManualFallback → Resolved → Persisted
//
// A submission that never reaches Resolved stays in the pending queue with
// no goal attached.

use std::fmt;

use chrono::{DateTime, Utc};
use res_classifier::{Extraction, ScoredGoal};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Submitted,
    Classified,
    ClassificationFailed,
    AwaitingConfirmation,
    ManualFallback,
    Resolved,
    Persisted,
}

impl SubmissionState {
    pub fn can_transition_to(&self, next: SubmissionState) -> bool {
        use SubmissionState::*;
        matches!(
            (self, next),
            (Submitted, Classified)
                | (Submitted, ClassificationFailed)
                | (Classified, Resolved)
                | (Classified, AwaitingConfirmation)
                | (ClassificationFailed, ManualFallback)
                | (AwaitingConfirmation, Resolved)
                | (ManualFallback, Resolved)
                | (Resolved, Persisted)
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            SubmissionState::AwaitingConfirmation | SubmissionState::ManualFallback
        )
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SubmissionState::Submitted => "submitted",
            SubmissionState::Classified => "classified",
            SubmissionState::ClassificationFailed => "classification_failed",
            SubmissionState::AwaitingConfirmation => "awaiting_confirmation",
            SubmissionState::ManualFallback => "manual_fallback",
            SubmissionState::Resolved => "resolved",
            SubmissionState::Persisted => "persisted",
        };
        write!(f, "{}", label)
    }
}

/// Tracks one submission through the state machine.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Submission {
    id: Uuid,
    state: SubmissionState,
}

impl Submission {
    pub(crate) fn new() -> Self {
        Self::resume(Uuid::new_v4(), SubmissionState::Submitted)
    }

    pub(crate) fn resume(id: Uuid, state: SubmissionState) -> Self {
        Self { id, state }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn state(&self) -> SubmissionState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: SubmissionState) -> Result<(), EngineError> {
        if !self.state.can_transition_to(next) {
            return Err(EngineError::InvalidSubmissionTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(submission = %self.id, from = %self.state, to = %next, "submission transition");
        self.state = next;
        Ok(())
    }
}

/// Why a submission is waiting on the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingReason {
    /// Best match did not clear the acceptance threshold.
    LowConfidence,
    /// Classifier found no fitting goal.
    NoMatch,
    /// Classifier could not be reached; the caller picks a goal.
    ClassifierUnavailable,
}

impl fmt::Display for PendingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PendingReason::LowConfidence => "low_confidence",
            PendingReason::NoMatch => "no_match",
            PendingReason::ClassifierUnavailable => "classifier_unavailable",
        };
        write!(f, "{}", label)
    }
}

/// A submission held in memory until the caller confirms a goal.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub pending_id: Uuid,
    pub raw_text: String,
    pub submitted_at: DateTime<Utc>,
    pub extracted: Extraction,
    /// The classifier's best guess, if any.
    pub suggestion: Option<ScoredGoal>,
    /// Title proposed for a new goal on `NoMatch`.
    pub suggested_title: Option<String>,
    pub reason: PendingReason,
    /// `AwaitingConfirmation` or `ManualFallback`.
    pub state: SubmissionState,
    /// Classifier's explanation when it was unavailable.
    pub detail: Option<String>,
}

impl PendingEntry {
    /// Goal the caller would accept by confirming without choosing.
    pub fn suggested_goal(&self) -> Option<Uuid> {
        self.suggestion.map(|s| s.goal_id)
    }
}

/// How to choose among candidates with equal top confidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Goal whose newest entry is most recent (timestamp, then seq).
    #[default]
    MostRecentActivity,
    /// First candidate in the classifier's own order.
    ClassifierOrder,
}

/// Per-call overrides for `log_text` and `log_manual`.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Overrides the configured tie-break policy.
    pub tie_break: Option<TieBreak>,
    /// Entry timestamp; defaults to now.
    pub timestamp: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubmissionState::*;

    #[test]
    fn happy_paths_are_legal() {
        let paths: [&[SubmissionState]; 3] = [
            &[Submitted, Classified, Resolved, Persisted],
            &[Submitted, Classified, AwaitingConfirmation, Resolved, Persisted],
            &[Submitted, ClassificationFailed, ManualFallback, Resolved, Persisted],
        ];
        for path in paths {
            let mut submission = Submission::new();
            for next in &path[1..] {
                submission.advance(*next).unwrap();
            }
            assert_eq!(submission.state(), Persisted);
        }
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut submission = Submission::new();
        let err = submission.advance(Persisted).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidSubmissionTransition {
                from: Submitted,
                to: Persisted
            }
        ));
        assert_eq!(submission.state(), Submitted);

        assert!(!ManualFallback.can_transition_to(AwaitingConfirmation));
        assert!(!Persisted.can_transition_to(Resolved));
        assert!(!ClassificationFailed.can_transition_to(Resolved));
    }

    #[test]
    fn tie_break_parses_from_snake_case() {
        let parsed: TieBreak = serde_json::from_str("\"classifier_order\"").unwrap();
        assert_eq!(parsed, TieBreak::ClassifierOrder);
        assert_eq!(TieBreak::default(), TieBreak::MostRecentActivity);
    }
}
