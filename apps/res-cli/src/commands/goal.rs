// goal.rs - Goal subcommands: add, list, edit, complete, archive.

use clap::Args;
use res_engine::MatchingEngine;
use res_goal::{GoalEdit, GoalStatus, NewGoal};

use super::{describe_snapshot, resolve_goal_ref, short_id, truncate};

#[derive(Args)]
pub struct AddArgs {
    /// What you want to achieve (e.g., "Read 24 books").
    pub title: String,
    /// Numeric target; leave out for goals that are simply done or not.
    #[arg(long)]
    pub target: Option<f64>,
    /// Unit for the target (e.g., "books", "miles").
    #[arg(long)]
    pub unit: Option<String>,
    #[arg(long, short)]
    pub category: Option<String>,
    /// ISO week label (e.g., "2026-W03").
    #[arg(long)]
    pub week: Option<String>,
    /// 1 (highest) to 10.
    #[arg(long, short)]
    pub priority: Option<u8>,
    /// Don't ask the classifier to fill in category, target and priority.
    #[arg(long)]
    pub no_ai: bool,
}

#[derive(Args)]
pub struct EditArgs {
    /// Goal ID or unique ID prefix.
    pub goal: String,
    #[arg(long, short)]
    pub title: Option<String>,
    #[arg(long)]
    pub target: Option<f64>,
    #[arg(long)]
    pub unit: Option<String>,
    #[arg(long, short)]
    pub category: Option<String>,
    #[arg(long)]
    pub week: Option<String>,
    #[arg(long, short)]
    pub priority: Option<u8>,
}

pub async fn add(engine: &MatchingEngine, args: AddArgs) -> anyhow::Result<()> {
    let mut new = NewGoal {
        title: args.title,
        category: args.category,
        week: args.week,
        target: args.target,
        unit: args.unit,
        priority: args.priority,
    };
    let analysis = if args.no_ai {
        None
    } else {
        engine.analyze_goal(&new.title).await
    };
    if let Some(analysis) = &analysis {
        new = analysis.apply_to(new);
    }
    let goal = engine.add_goal(new).await?;

    println!("Added: {} ({})", goal.title, short_id(goal.id));
    let target = match (goal.target, goal.unit.as_deref()) {
        (Some(t), Some(u)) => format!("{} {}", t, u),
        (Some(t), None) => t.to_string(),
        (None, _) => "done / not done".to_string(),
    };
    println!(
        "  Category: {} | Target: {} | Priority: {}",
        goal.category, target, goal.priority
    );
    if let Some(reasoning) = analysis.and_then(|a| a.reasoning) {
        println!("  {}", reasoning);
    }
    Ok(())
}

pub async fn list(engine: &MatchingEngine, all: bool) -> anyhow::Result<()> {
    let views: Vec<_> = engine
        .list_goals()
        .await
        .into_iter()
        .filter(|v| all || v.goal.status == GoalStatus::Active)
        .collect();

    if views.is_empty() {
        println!("No goals yet. Add one with: res add \"Your goal here\"");
        return Ok(());
    }

    for view in &views {
        let goal = &view.goal;
        let status = if goal.status == GoalStatus::Active {
            String::new()
        } else {
            format!(" [{}]", goal.status)
        };
        println!(
            "{}  {:<32} {:<12} p{}{}",
            short_id(goal.id),
            truncate(&goal.title, 32),
            truncate(&goal.category, 12),
            goal.priority,
            status
        );
        println!("          {}", describe_snapshot(&view.snapshot));
    }
    println!("\n{} goal(s).", views.len());
    Ok(())
}

pub async fn edit(engine: &MatchingEngine, args: EditArgs) -> anyhow::Result<()> {
    let goal_id = resolve_goal_ref(&engine.list_goals().await, &args.goal)?;
    let edit = GoalEdit {
        title: args.title,
        category: args.category,
        week: args.week,
        target: args.target,
        unit: args.unit,
        priority: args.priority,
    };
    if edit.is_empty() {
        println!("No changes given. Use --title, --target, --unit, --category, --week or --priority.");
        return Ok(());
    }
    let goal = engine.edit_goal(goal_id, edit).await?;
    println!("Updated: {} ({})", goal.title, short_id(goal.id));
    Ok(())
}

pub async fn complete(engine: &MatchingEngine, reference: &str) -> anyhow::Result<()> {
    let goal_id = resolve_goal_ref(&engine.list_goals().await, reference)?;
    let goal = engine.complete_goal(goal_id).await?;
    println!("Completed: {}", goal.title);
    Ok(())
}

pub async fn archive(engine: &MatchingEngine, reference: &str) -> anyhow::Result<()> {
    let goal_id = resolve_goal_ref(&engine.list_goals().await, reference)?;
    let goal = engine.archive_goal(goal_id).await?;
    println!("Archived: {}", goal.title);
    Ok(())
}
