// engine.rs - MatchingEngine: the single owner of goals, entries and the
// pending queue for one process.
//
// Every write follows the same cycle under the state lock: clone the
// document, mutate the clone, save it atomically, then swap it in. A failed
// save leaves the in-memory state exactly as it was. The classifier call is
// the only await point outside the lock.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use res_classifier::{
    build_gateway, ClassificationRequest, ClassificationResult, ClassifierGateway, Extraction,
    GoalAnalysis, ScoredGoal,
};
use res_goal::progress::{self, ProgressSnapshot, Summary};
use res_goal::{
    Delta, EventBus, Goal, GoalEdit, GoalError, GoalEvent, JournalSink, LogEntry, LogSource,
    NewEntry, NewGoal, StateDocument, StateStore, StatusChange,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::submission::{
    LogOptions, PendingEntry, PendingReason, Submission, SubmissionState, TieBreak,
};

struct EngineState {
    doc: StateDocument,
    pending: Vec<PendingEntry>,
}

/// A goal together with its freshly computed progress.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalView {
    pub goal: Goal,
    pub snapshot: ProgressSnapshot,
}

/// A persisted entry and the state of its goal afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub entry: LogEntry,
    pub goal: Goal,
    pub snapshot: ProgressSnapshot,
}

/// What happened to a free-text submission.
#[derive(Debug, Clone, PartialEq)]
pub enum LogOutcome {
    /// Matched confidently and written.
    Persisted(Recorded),
    /// Low confidence or no match. Waiting for the caller to pick a goal.
    NeedsConfirmation(PendingEntry),
    /// Classifier unavailable. The caller must pick a goal.
    ManualFallback(PendingEntry),
}

impl LogOutcome {
    pub fn pending(&self) -> Option<&PendingEntry> {
        match self {
            LogOutcome::Persisted(_) => None,
            LogOutcome::NeedsConfirmation(p) | LogOutcome::ManualFallback(p) => Some(p),
        }
    }
}

pub struct MatchingEngine {
    state: Mutex<EngineState>,
    store: StateStore,
    classifier: Arc<dyn ClassifierGateway>,
    config: EngineConfig,
    events: EventBus,
}

impl MatchingEngine {
    /// Load state from the configured data file and use `classifier`.
    ///
    /// Lifecycle events are appended to the config's events log.
    pub fn new(
        config: EngineConfig,
        classifier: Arc<dyn ClassifierGateway>,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(|reason| EngineError::Config {
            path: config.home.clone(),
            reason,
        })?;
        let store = StateStore::new(config.data_file());
        let doc = store.load()?;
        tracing::info!(
            path = %store.path().display(),
            goals = doc.goals.len(),
            entries = doc.log_entries.len(),
            "state loaded"
        );

        let events = EventBus::new().with_sink(JournalSink::new(config.events_log()));

        Ok(Self {
            state: Mutex::new(EngineState {
                doc,
                pending: Vec::new(),
            }),
            store,
            classifier,
            config,
            events,
        })
    }

    /// Build the classifier described by the config, then load state.
    pub fn open(config: EngineConfig) -> Result<Self, EngineError> {
        let classifier = build_gateway(&config.classifier)?;
        Self::new(config, classifier)
    }

    // ── Goals ────────────────────────────────────────────────────

    /// Ask the classifier to suggest fields for a goal about to be added.
    ///
    /// `None` when it has nothing to offer or does not answer in time.
    pub async fn analyze_goal(&self, title: &str) -> Option<GoalAnalysis> {
        let timeout = self.config.classifier.timeout();
        match tokio::time::timeout(timeout, self.classifier.analyze_goal(title.trim())).await {
            Ok(analysis) => analysis,
            Err(_) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "goal analysis timed out");
                None
            }
        }
    }

    pub async fn add_goal(&self, new: NewGoal) -> Result<Goal, EngineError> {
        let mut state = self.state.lock().await;
        let mut next = state.doc.clone();
        let goal = next.create_goal(new)?;
        self.commit(&mut state, next)?;
        self.events.publish(&GoalEvent::goal_created(&goal));
        Ok(goal)
    }

    pub async fn edit_goal(&self, goal_id: Uuid, edit: GoalEdit) -> Result<Goal, EngineError> {
        let mut state = self.state.lock().await;
        let mut next = state.doc.clone();
        let goal = next.edit_goal(goal_id, edit)?;
        self.commit(&mut state, next)?;
        self.events.publish(&GoalEvent::goal_edited(goal.id));
        Ok(goal)
    }

    pub async fn complete_goal(&self, goal_id: Uuid) -> Result<Goal, EngineError> {
        self.change_status(goal_id, |doc| doc.complete_goal(goal_id))
            .await
    }

    /// Archiving an archived goal is a no-op that still succeeds.
    pub async fn archive_goal(&self, goal_id: Uuid) -> Result<Goal, EngineError> {
        self.change_status(goal_id, |doc| doc.archive_goal(goal_id))
            .await
    }

    async fn change_status<F>(&self, goal_id: Uuid, apply: F) -> Result<Goal, EngineError>
    where
        F: FnOnce(&mut StateDocument) -> Result<StatusChange, GoalError>,
    {
        let mut state = self.state.lock().await;
        let mut next = state.doc.clone();
        let change = apply(&mut next)?;
        if !change.changed() {
            tracing::debug!(goal_id = %goal_id, status = %change.goal.status, "status unchanged");
            return Ok(change.goal);
        }
        self.commit(&mut state, next)?;
        self.events.publish(&GoalEvent::status_changed(
            goal_id,
            change.previous,
            change.goal.status,
        ));
        Ok(change.goal)
    }

    /// All goals with progress, active first, then by priority and age.
    pub async fn list_goals(&self) -> Vec<GoalView> {
        let state = self.state.lock().await;
        let today = Utc::now().date_naive();
        let settings = self.config.progress.sparkline();

        let mut goals: Vec<&Goal> = state.doc.goals.iter().collect();
        goals.sort_by(|a, b| {
            a.status
                .rank()
                .cmp(&b.status.rank())
                .then(a.priority.cmp(&b.priority))
                .then(a.created_at.cmp(&b.created_at))
        });
        goals
            .into_iter()
            .map(|goal| GoalView {
                goal: goal.clone(),
                snapshot: progress::snapshot(
                    goal,
                    &state.doc.entries_for(goal.id),
                    today,
                    settings,
                ),
            })
            .collect()
    }

    pub async fn goal(&self, goal_id: Uuid) -> Option<GoalView> {
        let state = self.state.lock().await;
        let goal = state.doc.goal(goal_id)?;
        Some(GoalView {
            goal: goal.clone(),
            snapshot: self.snapshot_for(&state.doc, goal),
        })
    }

    // ── Logging ──────────────────────────────────────────────────

    /// Classify free text and record it against the matching goal, or queue
    /// it for confirmation.
    pub async fn log_text(
        &self,
        text: &str,
        options: &LogOptions,
    ) -> Result<LogOutcome, EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GoalError::Validation("log text must not be empty".to_string()).into());
        }
        let submitted_at = options.timestamp.unwrap_or_else(Utc::now);
        let mut submission = Submission::new();

        let request = {
            let state = self.state.lock().await;
            let open: Vec<&Goal> = state.doc.open_goals().collect();
            if open.is_empty() {
                return Err(GoalError::Validation(
                    "there are no open goals to log against".to_string(),
                )
                .into());
            }
            ClassificationRequest::new(text, open)
        };

        let result = self.classify(&request).await;
        tracing::debug!(submission = %submission.id(), kind = result.kind(), "classified");
        let scored = result.scored_goals();

        match result {
            ClassificationResult::Unavailable { reason } => {
                tracing::warn!(%reason, "classifier unavailable, falling back to manual selection");
                submission.advance(SubmissionState::ClassificationFailed)?;
                submission.advance(SubmissionState::ManualFallback)?;
                let mut state = self.state.lock().await;
                let pending = self.enqueue(
                    &mut state,
                    &submission,
                    text,
                    submitted_at,
                    Extraction::default(),
                    None,
                    None,
                    PendingReason::ClassifierUnavailable,
                    Some(reason),
                );
                Ok(LogOutcome::ManualFallback(pending))
            }
            ClassificationResult::NoMatch {
                extracted,
                suggested_title,
            } => {
                submission.advance(SubmissionState::Classified)?;
                submission.advance(SubmissionState::AwaitingConfirmation)?;
                let mut state = self.state.lock().await;
                let pending = self.enqueue(
                    &mut state,
                    &submission,
                    text,
                    submitted_at,
                    extracted,
                    None,
                    suggested_title,
                    PendingReason::NoMatch,
                    None,
                );
                Ok(LogOutcome::NeedsConfirmation(pending))
            }
            ClassificationResult::Matched { extracted, .. } => {
                submission.advance(SubmissionState::Classified)?;
                let policy = options.tie_break.unwrap_or(self.config.matching.tie_break);

                // Goal set may have changed while the classifier was running,
                // so candidates are checked against the current document.
                let mut state = self.state.lock().await;
                let winner = pick_candidate(&state.doc, &scored, policy);
                let accepted = winner
                    .filter(|w| w.confidence > self.config.matching.acceptance_threshold);

                match accepted {
                    Some(winner) => {
                        submission.advance(SubmissionState::Resolved)?;
                        let goal = state
                            .doc
                            .goal(winner.goal_id)
                            .ok_or(GoalError::NotFound(winner.goal_id))?;
                        let new = NewEntry {
                            goal_id: winner.goal_id,
                            raw_text: text.to_string(),
                            parsed_update: extracted.parsed_update.clone().unwrap_or_default(),
                            delta: fit_delta(goal, extracted.delta.clone()),
                            sentiment: extracted.sentiment,
                            timestamp: submitted_at,
                            source: LogSource::AiMatched,
                        };
                        let recorded = self.persist_entry(&mut state, new, None)?;
                        submission.advance(SubmissionState::Persisted)?;
                        tracing::info!(
                            goal_id = %winner.goal_id,
                            confidence = winner.confidence,
                            seq = recorded.entry.seq,
                            "update matched and recorded"
                        );
                        Ok(LogOutcome::Persisted(recorded))
                    }
                    None => {
                        submission.advance(SubmissionState::AwaitingConfirmation)?;
                        let reason = if winner.is_some() {
                            PendingReason::LowConfidence
                        } else {
                            PendingReason::NoMatch
                        };
                        let pending = self.enqueue(
                            &mut state,
                            &submission,
                            text,
                            submitted_at,
                            extracted,
                            winner,
                            None,
                            reason,
                            None,
                        );
                        Ok(LogOutcome::NeedsConfirmation(pending))
                    }
                }
            }
        }
    }

    /// Record an entry against a goal the caller chose. No classification.
    ///
    /// `delta = None` applies the goal's default (+1 unit, or done). A delta
    /// of the wrong kind for the goal is fitted the same way classified
    /// deltas are.
    pub async fn log_manual(
        &self,
        goal_id: Uuid,
        text: &str,
        delta: Option<Delta>,
        options: &LogOptions,
    ) -> Result<Recorded, EngineError> {
        let mut state = self.state.lock().await;
        let goal = state.doc.goal(goal_id).ok_or(GoalError::NotFound(goal_id))?;
        let new = NewEntry {
            goal_id,
            raw_text: text.trim().to_string(),
            parsed_update: String::new(),
            delta: fit_delta(goal, delta),
            sentiment: Default::default(),
            timestamp: options.timestamp.unwrap_or_else(Utc::now),
            source: LogSource::Manual,
        };
        let recorded = self.persist_entry(&mut state, new, None)?;
        tracing::info!(goal_id = %goal_id, seq = recorded.entry.seq, "manual entry recorded");
        Ok(recorded)
    }

    /// Attach a pending entry to `goal_id` and persist it.
    ///
    /// Confirming the classifier's own suggestion keeps `ai_matched`;
    /// anything else is `manual`. The pending entry is dropped from the
    /// queue only once the write succeeds.
    pub async fn resolve_pending(
        &self,
        pending_id: Uuid,
        goal_id: Uuid,
    ) -> Result<Recorded, EngineError> {
        let mut state = self.state.lock().await;
        let pending = state
            .pending
            .iter()
            .find(|p| p.pending_id == pending_id)
            .cloned()
            .ok_or(EngineError::PendingNotFound(pending_id))?;

        let mut submission = Submission::resume(pending.pending_id, pending.state);
        submission.advance(SubmissionState::Resolved)?;

        let goal = state.doc.goal(goal_id).ok_or(GoalError::NotFound(goal_id))?;
        let source = if pending.state == SubmissionState::AwaitingConfirmation
            && pending.suggested_goal() == Some(goal_id)
        {
            LogSource::AiMatched
        } else {
            LogSource::Manual
        };
        let new = NewEntry {
            goal_id,
            raw_text: pending.raw_text.clone(),
            parsed_update: pending.extracted.parsed_update.clone().unwrap_or_default(),
            delta: fit_delta(goal, pending.extracted.delta.clone()),
            sentiment: pending.extracted.sentiment,
            timestamp: pending.submitted_at,
            source,
        };
        let recorded = self.persist_entry(&mut state, new, Some(pending_id))?;
        submission.advance(SubmissionState::Persisted)?;
        tracing::info!(
            pending_id = %pending_id,
            goal_id = %goal_id,
            source = %source,
            "pending entry resolved"
        );
        Ok(recorded)
    }

    /// Drop a pending entry without recording it.
    pub async fn discard_pending(&self, pending_id: Uuid) -> Result<PendingEntry, EngineError> {
        let mut state = self.state.lock().await;
        let index = state
            .pending
            .iter()
            .position(|p| p.pending_id == pending_id)
            .ok_or(EngineError::PendingNotFound(pending_id))?;
        tracing::debug!(pending_id = %pending_id, "pending entry discarded");
        Ok(state.pending.remove(index))
    }

    /// Pending entries, oldest first.
    pub async fn pending(&self) -> Vec<PendingEntry> {
        self.state.lock().await.pending.clone()
    }

    /// Newest entries first, optionally for one goal.
    pub async fn recent_logs(&self, goal_id: Option<Uuid>, limit: usize) -> Vec<LogEntry> {
        let state = self.state.lock().await;
        let mut entries: Vec<&LogEntry> = state
            .doc
            .log_entries
            .iter()
            .filter(|e| goal_id.map_or(true, |id| e.belongs_to(id)))
            .collect();
        entries.sort_by(|a, b| (b.timestamp, b.seq).cmp(&(a.timestamp, a.seq)));
        entries.into_iter().take(limit).cloned().collect()
    }

    pub async fn summary(&self) -> Summary {
        let state = self.state.lock().await;
        progress::summarize(&state.doc.goals, &state.doc.log_entries, Utc::now())
    }

    // ── Internals ────────────────────────────────────────────────

    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult {
        let timeout = self.config.classifier.timeout();
        match tokio::time::timeout(timeout, self.classifier.classify(request)).await {
            Ok(result) => result,
            Err(_) => ClassificationResult::unavailable(format!(
                "classifier did not answer within {} ms",
                timeout.as_millis()
            )),
        }
    }

    /// Save `next` and make it current. On failure nothing changes.
    fn commit(&self, state: &mut EngineState, next: StateDocument) -> Result<(), EngineError> {
        self.store.save(&next)?;
        state.doc = next;
        Ok(())
    }

    fn persist_entry(
        &self,
        state: &mut EngineState,
        new: NewEntry,
        resolves: Option<Uuid>,
    ) -> Result<Recorded, EngineError> {
        let goal_id = new.goal_id;
        let mut next = state.doc.clone();
        let entry = next.append_entry(new)?;
        self.commit(state, next)?;
        if let Some(pending_id) = resolves {
            state.pending.retain(|p| p.pending_id != pending_id);
        }

        let goal = state
            .doc
            .goal(goal_id)
            .cloned()
            .ok_or(GoalError::NotFound(goal_id))?;
        let snapshot = self.snapshot_for(&state.doc, &goal);
        if let Some(event) = GoalEvent::entry_logged(&entry, snapshot.percentage) {
            self.events.publish(&event);
        }
        Ok(Recorded {
            entry,
            goal,
            snapshot,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn enqueue(
        &self,
        state: &mut EngineState,
        submission: &Submission,
        text: &str,
        submitted_at: DateTime<Utc>,
        extracted: Extraction,
        suggestion: Option<ScoredGoal>,
        suggested_title: Option<String>,
        reason: PendingReason,
        detail: Option<String>,
    ) -> PendingEntry {
        let pending = PendingEntry {
            pending_id: submission.id(),
            raw_text: text.to_string(),
            submitted_at,
            extracted,
            suggestion,
            suggested_title,
            reason,
            state: submission.state(),
            detail,
        };
        let cap = self.config.matching.max_pending;
        if state.pending.len() >= cap {
            let overflow = state.pending.len() + 1 - cap;
            for dropped in state.pending.drain(..overflow) {
                tracing::warn!(pending_id = %dropped.pending_id, "pending queue full, dropping oldest entry");
            }
        }
        state.pending.push(pending.clone());
        tracing::debug!(pending_id = %pending.pending_id, %reason, "submission queued for confirmation");
        self.events
            .publish(&GoalEvent::entry_pending(pending.pending_id, reason.to_string()));
        pending
    }

    fn snapshot_for(&self, doc: &StateDocument, goal: &Goal) -> ProgressSnapshot {
        progress::snapshot(
            goal,
            &doc.entries_for(goal.id),
            Utc::now().date_naive(),
            self.config.progress.sparkline(),
        )
    }
}

/// Highest-confidence candidate that can still receive entries.
///
/// Ties go to the tie-break policy. `None` when no candidate survives.
fn pick_candidate(
    doc: &StateDocument,
    scored: &[ScoredGoal],
    policy: TieBreak,
) -> Option<ScoredGoal> {
    let live: Vec<ScoredGoal> = scored
        .iter()
        .copied()
        .filter(|s| s.confidence.is_finite())
        .filter(|s| doc.goal(s.goal_id).is_some_and(Goal::accepts_entries))
        .collect();

    let best = live
        .iter()
        .map(|s| s.confidence)
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))?;
    let mut tied = live.into_iter().filter(|s| s.confidence == best);

    match policy {
        TieBreak::ClassifierOrder => tied.next(),
        TieBreak::MostRecentActivity => {
            // max_by keeps the last of equals, so reverse to favour classifier order.
            let tied: Vec<ScoredGoal> = tied.collect();
            tied.into_iter()
                .rev()
                .max_by_key(|s| doc.last_activity(s.goal_id))
        }
    }
}

/// Make an extracted delta fit the goal it lands on.
///
/// A quantity on a done-style goal counts as done; a bare `done` on a
/// quantity goal falls back to the goal's default increment.
fn fit_delta(goal: &Goal, delta: Option<Delta>) -> Option<Delta> {
    match delta {
        Some(Delta::Quantity { .. }) if !goal.is_quantity() => Some(Delta::Done),
        Some(Delta::Done) if goal.is_quantity() => None,
        other => other,
    }
}
