// stats.rs - `res stats`: activity across all goals, then per-goal progress.

use res_engine::MatchingEngine;
use res_goal::GoalStatus;

use super::{describe_snapshot, truncate};

pub async fn execute(engine: &MatchingEngine) -> anyhow::Result<()> {
    let summary = engine.summary().await;
    println!("Active goals:     {}", summary.active_goals);
    println!("On track (3d):    {}/{}", summary.on_track, summary.active_goals);
    println!("Logs this week:   {}", summary.logs_this_week);
    println!("Day streak:       {}", summary.streak);
    println!("Total entries:    {}", summary.total_entries);

    let views = engine.list_goals().await;
    let active: Vec<_> = views
        .iter()
        .filter(|v| v.goal.status == GoalStatus::Active)
        .collect();
    if !active.is_empty() {
        println!();
        for view in active {
            println!("{}", truncate(&view.goal.title, 40));
            println!("  {}", describe_snapshot(&view.snapshot));
            let mood = view.snapshot.sentiment;
            if view.snapshot.entry_count > 0 {
                println!(
                    "  mood: {} positive, {} neutral, {} struggling",
                    mood.positive, mood.neutral, mood.struggling
                );
            }
        }
    }
    Ok(())
}
