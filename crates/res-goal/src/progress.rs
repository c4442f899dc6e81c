// progress.rs - Progress calculator: percentage, streak, sparkline.
//
// Everything here is a pure function of (goal, entries, today). Nothing is
// cached and nothing can fail: malformed inputs (a non-positive target, a
// zero bucket size) degrade to zero rather than erroring.
//
// Days are UTC calendar days of the entry timestamps.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::goal::Goal;
use crate::log_entry::{LogEntry, Sentiment};

/// Shape of the sparkline series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparklineSettings {
    /// Number of buckets in the series.
    pub buckets: usize,
    /// Days covered by each bucket. Zero is treated as one.
    pub bucket_size_days: u32,
}

impl Default for SparklineSettings {
    fn default() -> Self {
        Self {
            buckets: 7,
            bucket_size_days: 1,
        }
    }
}

/// Derived, never-persisted view of a goal's progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Completion in percent, clamped to 0..=100.
    pub percentage: f64,
    /// Consecutive active days ending today (or yesterday).
    pub streak: u32,
    /// Activity counts per bucket, oldest first.
    pub sparkline: Vec<u32>,
    pub entry_count: usize,
    /// Sum of quantity deltas.
    pub total_quantity: f64,
    pub last_entry_at: Option<DateTime<Utc>>,
    pub sentiment: SentimentTally,
}

/// How the entries of one goal felt, by count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentTally {
    pub positive: usize,
    pub neutral: usize,
    pub struggling: usize,
}

impl SentimentTally {
    pub fn count<'a>(entries: impl IntoIterator<Item = &'a LogEntry>) -> Self {
        entries
            .into_iter()
            .fold(Self::default(), |mut tally, entry| {
                match entry.sentiment {
                    Sentiment::Positive => tally.positive += 1,
                    Sentiment::Neutral => tally.neutral += 1,
                    Sentiment::Struggling => tally.struggling += 1,
                }
                tally
            })
    }
}

/// Completion percentage for a goal.
///
/// Quantity goals: `clamp(sum / target * 100, 0, 100)`.
/// Done-style goals: 100 once any `done` entry exists.
pub fn percentage<'a>(goal: &Goal, entries: impl IntoIterator<Item = &'a LogEntry>) -> f64 {
    let mut owned = entries.into_iter().filter(|e| e.belongs_to(goal.id));
    match goal.target {
        Some(target) if target > 0.0 && target.is_finite() => {
            let total: f64 = owned.map(|e| e.delta.amount()).sum();
            (total / target * 100.0).clamp(0.0, 100.0)
        }
        Some(_) => 0.0,
        None => {
            if owned.any(|e| e.delta.is_done()) {
                100.0
            } else {
                0.0
            }
        }
    }
}

/// Consecutive days with at least one entry for `goal`.
///
/// Counting starts at `today`, or at yesterday when nothing has been logged
/// yet today, so a streak isn't broken before the day is over. Entries dated
/// after `today` are ignored.
pub fn streak<'a>(
    goal: &Goal,
    entries: impl IntoIterator<Item = &'a LogEntry>,
    today: NaiveDate,
) -> u32 {
    let days: BTreeSet<NaiveDate> = entries
        .into_iter()
        .filter(|e| e.belongs_to(goal.id))
        .map(LogEntry::day)
        .collect();
    streak_over_days(&days, today)
}

fn streak_over_days(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut cursor = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) => yesterday,
            None => return 0,
        }
    };

    let mut count = 0;
    while days.contains(&cursor) {
        count += 1;
        cursor = match cursor.pred_opt() {
            Some(prev) => prev,
            None => break,
        };
    }
    count
}

/// Activity counts in `bucket_count` trailing buckets of `bucket_size_days`
/// days each, the newest bucket ending at `today`. Oldest first, zero-filled.
pub fn sparkline<'a>(
    entries: impl IntoIterator<Item = &'a LogEntry>,
    today: NaiveDate,
    bucket_count: usize,
    bucket_size_days: u32,
) -> Vec<u32> {
    let mut buckets = vec![0u32; bucket_count];
    if bucket_count == 0 {
        return buckets;
    }
    let size = i64::from(bucket_size_days.max(1));

    for entry in entries {
        let age = (today - entry.day()).num_days();
        if age < 0 {
            continue;
        }
        let from_newest = (age / size) as usize;
        if from_newest < bucket_count {
            buckets[bucket_count - 1 - from_newest] += 1;
        }
    }
    buckets
}

/// Recompute the full snapshot for one goal.
pub fn snapshot(
    goal: &Goal,
    entries: &[&LogEntry],
    today: NaiveDate,
    settings: SparklineSettings,
) -> ProgressSnapshot {
    let owned: Vec<&LogEntry> = entries
        .iter()
        .copied()
        .filter(|e| e.belongs_to(goal.id))
        .collect();

    ProgressSnapshot {
        percentage: percentage(goal, owned.iter().copied()),
        streak: streak(goal, owned.iter().copied(), today),
        sparkline: sparkline(
            owned.iter().copied(),
            today,
            settings.buckets,
            settings.bucket_size_days,
        ),
        entry_count: owned.len(),
        total_quantity: owned.iter().map(|e| e.delta.amount()).sum(),
        last_entry_at: owned.iter().map(|e| e.timestamp).max(),
        sentiment: SentimentTally::count(owned.iter().copied()),
    }
}

/// Dashboard-level numbers across all goals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Entries logged in the trailing 7 days.
    pub logs_this_week: usize,
    /// Active goals with an entry in the trailing 3 days.
    pub on_track: usize,
    pub active_goals: usize,
    /// Streak over all entries, regardless of goal.
    pub streak: u32,
    pub total_entries: usize,
}

/// Summarize activity across every goal as of `now`.
pub fn summarize(goals: &[Goal], entries: &[LogEntry], now: DateTime<Utc>) -> Summary {
    let week_ago = now - Duration::days(7);
    let three_days_ago = now - Duration::days(3);

    let active: Vec<&Goal> = goals.iter().filter(|g| g.is_active()).collect();
    let on_track = active
        .iter()
        .filter(|g| {
            entries
                .iter()
                .any(|e| e.belongs_to(g.id) && e.timestamp > three_days_ago)
        })
        .count();

    let days: BTreeSet<NaiveDate> = entries.iter().map(LogEntry::day).collect();

    Summary {
        logs_this_week: entries.iter().filter(|e| e.timestamp > week_ago).count(),
        on_track,
        active_goals: active.len(),
        streak: streak_over_days(&days, now.date_naive()),
        total_entries: entries.len(),
    }
}
