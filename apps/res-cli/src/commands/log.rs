// log.rs - `res log` and `res logs`.
//
// Pending entries only live as long as the engine, so a `log` that ends up
// waiting for confirmation is resolved here, in the same process.

use std::io::{IsTerminal, Write};

use anyhow::bail;
use clap::Args;
use res_engine::{
    GoalView, LogOptions, LogOutcome, MatchingEngine, PendingEntry, PendingReason, Recorded,
};
use res_goal::{Delta, GoalStatus, Sentiment};
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use super::{describe_snapshot, resolve_goal_ref, short_id, truncate};

#[derive(Args)]
pub struct LogArgs {
    /// What you did, in your own words.
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
    /// Record against this goal instead of asking the classifier.
    #[arg(long, short)]
    pub goal: Option<String>,
    /// Amount to add (with --goal).
    #[arg(long, requires = "goal", conflicts_with = "done")]
    pub amount: Option<f64>,
    /// Mark the goal done (with --goal).
    #[arg(long, requires = "goal")]
    pub done: bool,
    /// Accept the classifier's suggestion without asking.
    #[arg(long, short)]
    pub yes: bool,
}

/// What the user typed at the confirmation prompt.
#[derive(Debug, PartialEq)]
enum Choice {
    Accept,
    Goal(usize),
    Skip,
}

pub async fn execute(engine: &MatchingEngine, args: LogArgs) -> anyhow::Result<()> {
    let text = args.text.join(" ");
    let goals = engine.list_goals().await;

    if let Some(reference) = args.goal.as_deref() {
        let goal_id = resolve_goal_ref(&goals, reference)?;
        let unit = goals
            .iter()
            .find(|v| v.goal.id == goal_id)
            .and_then(|v| v.goal.unit.clone());
        let delta = match (args.amount, args.done) {
            (Some(amount), _) => Some(Delta::quantity(amount, unit.as_deref())?),
            (None, true) => Some(Delta::Done),
            (None, false) => None,
        };
        let recorded = engine
            .log_manual(goal_id, &text, delta, &LogOptions::default())
            .await?;
        print_recorded(&recorded);
        return Ok(());
    }

    match engine.log_text(&text, &LogOptions::default()).await? {
        LogOutcome::Persisted(recorded) => {
            print_recorded(&recorded);
            Ok(())
        }
        LogOutcome::NeedsConfirmation(pending) | LogOutcome::ManualFallback(pending) => {
            confirm(engine, &goals, &pending, args.yes).await
        }
    }
}

async fn confirm(
    engine: &MatchingEngine,
    goals: &[GoalView],
    pending: &PendingEntry,
    yes: bool,
) -> anyhow::Result<()> {
    let open: Vec<&GoalView> = goals
        .iter()
        .filter(|v| v.goal.status != GoalStatus::Archived)
        .collect();
    let suggestion = pending.suggested_goal();

    match pending.reason {
        PendingReason::LowConfidence => println!("Not sure which goal this belongs to."),
        PendingReason::NoMatch => println!("This doesn't look like any of your goals."),
        PendingReason::ClassifierUnavailable => println!(
            "Couldn't classify this update ({}).",
            pending.detail.as_deref().unwrap_or("classifier unavailable")
        ),
    }
    if let Some(title) = pending.suggested_title.as_deref() {
        println!("  Maybe a new goal: \"{}\"  (res add \"{}\")", title, title);
    }

    if yes {
        if let Some(goal_id) = suggestion {
            return resolve(engine, pending, goal_id).await;
        }
    }
    if !std::io::stdin().is_terminal() {
        engine.discard_pending(pending.pending_id).await?;
        bail!("update not recorded; rerun with --goal to choose one");
    }

    for (i, view) in open.iter().enumerate() {
        let marker = if Some(view.goal.id) == suggestion { "*" } else { " " };
        let status = if view.goal.status == GoalStatus::Completed {
            "  (completed)"
        } else {
            ""
        };
        println!("{} {:>2}. {}{}", marker, i + 1, view.goal.title, status);
    }
    if suggestion.is_some() {
        print!("Goal number, Enter for *, or s to skip: ");
    } else {
        print!("Goal number, or s to skip: ");
    }
    std::io::stdout().flush()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let input = lines.next_line().await?.unwrap_or_default();
    let choice = match parse_choice(&input, open.len(), suggestion.is_some()) {
        Ok(choice) => choice,
        Err(reason) => {
            engine.discard_pending(pending.pending_id).await?;
            bail!("{}; update not recorded", reason);
        }
    };

    let goal_id = match choice {
        Choice::Skip => {
            engine.discard_pending(pending.pending_id).await?;
            println!("Skipped.");
            return Ok(());
        }
        Choice::Accept => match suggestion {
            Some(id) => id,
            None => bail!("no suggested goal to accept"),
        },
        Choice::Goal(n) => open[n - 1].goal.id,
    };
    resolve(engine, pending, goal_id).await
}

async fn resolve(
    engine: &MatchingEngine,
    pending: &PendingEntry,
    goal_id: Uuid,
) -> anyhow::Result<()> {
    let recorded = engine.resolve_pending(pending.pending_id, goal_id).await?;
    print_recorded(&recorded);
    Ok(())
}

fn parse_choice(input: &str, goal_count: usize, has_suggestion: bool) -> Result<Choice, String> {
    let input = input.trim();
    if input.is_empty() {
        return if has_suggestion {
            Ok(Choice::Accept)
        } else {
            Err("no goal chosen".to_string())
        };
    }
    if input.eq_ignore_ascii_case("s") || input.eq_ignore_ascii_case("skip") {
        return Ok(Choice::Skip);
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=goal_count).contains(&n) => Ok(Choice::Goal(n)),
        _ => Err(format!("'{}' is not a goal number", input)),
    }
}

fn print_recorded(recorded: &Recorded) {
    println!("Logged to: {} ({})", recorded.goal.title, short_id(recorded.goal.id));
    println!(
        "  {} {}  [{}]",
        recorded.entry.display_text(),
        sentiment_mark(recorded.entry.sentiment),
        recorded.entry.delta
    );
    println!("  {}", describe_snapshot(&recorded.snapshot));
}

fn sentiment_mark(sentiment: Sentiment) -> &'static str {
    match sentiment {
        Sentiment::Positive => "(+)",
        Sentiment::Neutral => "",
        Sentiment::Struggling => "(-)",
    }
}

pub async fn recent(
    engine: &MatchingEngine,
    goal: Option<&str>,
    limit: usize,
) -> anyhow::Result<()> {
    let goals = engine.list_goals().await;
    let goal_id = goal.map(|r| resolve_goal_ref(&goals, r)).transpose()?;
    let entries = engine.recent_logs(goal_id, limit).await;

    if entries.is_empty() {
        println!("No entries yet. Add one with: res log \"what you did\"");
        return Ok(());
    }

    println!("{:<12} {:<22} {:<10} UPDATE", "DATE", "GOAL", "DELTA");
    println!("{}", "-".repeat(76));
    for entry in &entries {
        let title = entry
            .goal_id
            .and_then(|id| goals.iter().find(|v| v.goal.id == id))
            .map(|v| v.goal.title.as_str())
            .unwrap_or("?");
        println!(
            "{:<12} {:<22} {:<10} {} {}",
            entry.timestamp.format("%m/%d %H:%M"),
            truncate(title, 22),
            entry.delta.to_string(),
            truncate(entry.display_text(), 40),
            sentiment_mark(entry.sentiment),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_accepts_only_with_a_suggestion() {
        assert_eq!(parse_choice("", 3, true), Ok(Choice::Accept));
        assert!(parse_choice("  ", 3, false).is_err());
    }

    #[test]
    fn numbers_must_be_in_range() {
        assert_eq!(parse_choice("2", 3, false), Ok(Choice::Goal(2)));
        assert!(parse_choice("0", 3, true).is_err());
        assert!(parse_choice("4", 3, true).is_err());
        assert!(parse_choice("two", 3, true).is_err());
    }

    #[test]
    fn skip_is_case_insensitive() {
        assert_eq!(parse_choice("S", 3, true), Ok(Choice::Skip));
        assert_eq!(parse_choice("skip", 3, false), Ok(Choice::Skip));
    }
}
