// gateway.rs - The ClassifierGateway seam and its closed result type.
//
// A gateway is one request/response round trip to something that can read
// free text and pick a goal. Whatever goes wrong on the way (no network,
// timeout, garbage reply) comes back as `Unavailable`, never as an error:
// the engine treats it as a normal outcome and falls back to manual
// selection.

use async_trait::async_trait;
use res_goal::{Delta, Goal, NewGoal, Sentiment};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One goal offered to the classifier. Archived goals are never offered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalCandidate {
    pub goal_id: Uuid,
    pub title: String,
    pub category: String,
}

impl From<&Goal> for GoalCandidate {
    fn from(goal: &Goal) -> Self {
        Self {
            goal_id: goal.id,
            title: goal.title.clone(),
            category: goal.category.clone(),
        }
    }
}

/// What the classifier is asked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub text: String,
    pub goals: Vec<GoalCandidate>,
}

impl ClassificationRequest {
    pub fn new<'a>(text: impl Into<String>, goals: impl IntoIterator<Item = &'a Goal>) -> Self {
        Self {
            text: text.into(),
            goals: goals.into_iter().map(GoalCandidate::from).collect(),
        }
    }
}

/// Structured data pulled out of the text, independent of which goal matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub delta: Option<Delta>,
    /// Cleaned-up summary of what was accomplished.
    pub parsed_update: Option<String>,
    pub sentiment: Sentiment,
}

/// A goal with the classifier's score for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredGoal {
    pub goal_id: Uuid,
    /// Opaque ordering score. Only comparable within one response.
    pub confidence: f64,
}

/// The closed set of classifier outcomes.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationResult {
    /// The text maps onto a known goal.
    Matched {
        goal_id: Uuid,
        confidence: f64,
        extracted: Extraction,
        /// Other scored candidates, used to break ties.
        alternatives: Vec<ScoredGoal>,
    },

    /// No goal fits. The classifier may propose a title for a new one.
    NoMatch {
        extracted: Extraction,
        suggested_title: Option<String>,
    },

    /// The classifier could not be reached or answered nonsense.
    Unavailable { reason: String },
}

impl ClassificationResult {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        ClassificationResult::Unavailable {
            reason: reason.into(),
        }
    }

    /// Short label for logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            ClassificationResult::Matched { .. } => "matched",
            ClassificationResult::NoMatch { .. } => "no_match",
            ClassificationResult::Unavailable { .. } => "unavailable",
        }
    }

    /// All scored goals in classifier order, primary match first.
    pub fn scored_goals(&self) -> Vec<ScoredGoal> {
        match self {
            ClassificationResult::Matched {
                goal_id,
                confidence,
                alternatives,
                ..
            } => std::iter::once(ScoredGoal {
                goal_id: *goal_id,
                confidence: *confidence,
            })
            .chain(alternatives.iter().copied())
            .collect(),
            _ => Vec::new(),
        }
    }
}

/// Fields a classifier inferred from the title of a goal being added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalAnalysis {
    pub category: Option<String>,
    pub target: Option<f64>,
    pub unit: Option<String>,
    pub priority: Option<u8>,
    /// One-line explanation for the user.
    pub reasoning: Option<String>,
}

impl GoalAnalysis {
    /// Fill in whatever `new` leaves unset. Explicit input always wins, and
    /// suggestions that would fail validation are dropped.
    pub fn apply_to(&self, mut new: NewGoal) -> NewGoal {
        if new.category.is_none() {
            new.category = self
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_lowercase);
        }
        if new.target.is_none() && new.unit.is_none() {
            if let Some(target) = self.target.filter(|t| t.is_finite() && *t > 0.0) {
                new.target = Some(target);
                new.unit = self.unit.clone().filter(|u| !u.trim().is_empty());
            }
        }
        if new.priority.is_none() {
            new.priority = self.priority.filter(|p| (1..=10).contains(p));
        }
        new
    }
}

/// A text-classification collaborator.
///
/// Implementations must not touch engine state and must always resolve:
/// failures map to [`ClassificationResult::Unavailable`].
#[async_trait]
pub trait ClassifierGateway: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult;

    /// Suggest category, target and priority for a new goal.
    ///
    /// `None` when the backend can't or won't say. Backends that only
    /// classify updates keep this default.
    async fn analyze_goal(&self, _title: &str) -> Option<GoalAnalysis> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_to_boundary_shape() {
        let goal = Goal::new("Read 24 books").with_category("reading");
        let request = ClassificationRequest::new("finished book 3", [&goal]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["text"], "finished book 3");
        assert_eq!(json["goals"][0]["goal_id"], goal.id.to_string());
        assert_eq!(json["goals"][0]["title"], "Read 24 books");
        assert_eq!(json["goals"][0]["category"], "reading");
    }

    #[test]
    fn scored_goals_lists_primary_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let result = ClassificationResult::Matched {
            goal_id: a,
            confidence: 0.8,
            extracted: Extraction::default(),
            alternatives: vec![ScoredGoal {
                goal_id: b,
                confidence: 0.8,
            }],
        };
        let scored = result.scored_goals();
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].goal_id, a);
        assert_eq!(scored[1].goal_id, b);
        assert!(ClassificationResult::unavailable("down").scored_goals().is_empty());
    }

    #[test]
    fn analysis_fills_only_unset_fields() {
        let analysis = GoalAnalysis {
            category: Some(" Fitness ".to_string()),
            target: Some(100.0),
            unit: Some("miles".to_string()),
            priority: Some(2),
            reasoning: None,
        };

        let filled = analysis.apply_to(NewGoal::titled("Run 100 miles"));
        assert_eq!(filled.category.as_deref(), Some("fitness"));
        assert_eq!(filled.target, Some(100.0));
        assert_eq!(filled.unit.as_deref(), Some("miles"));
        assert_eq!(filled.priority, Some(2));

        let explicit = NewGoal {
            priority: Some(7),
            ..NewGoal::titled("Run").with_category("health")
        };
        let kept = analysis.apply_to(explicit);
        assert_eq!(kept.category.as_deref(), Some("health"));
        assert_eq!(kept.priority, Some(7));
        assert_eq!(kept.target, Some(100.0));
    }

    #[test]
    fn analysis_drops_invalid_suggestions() {
        let analysis = GoalAnalysis {
            category: Some("  ".to_string()),
            target: Some(-3.0),
            unit: Some("books".to_string()),
            priority: Some(11),
            reasoning: Some("unsure".to_string()),
        };
        let filled = analysis.apply_to(NewGoal::titled("Read more"));
        assert_eq!(filled.category, None);
        assert_eq!(filled.target, None);
        assert_eq!(filled.unit, None);
        assert_eq!(filled.priority, None);
    }
}
