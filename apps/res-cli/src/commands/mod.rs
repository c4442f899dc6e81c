// mod.rs - Subcommands plus the text rendering they share.

pub mod goal;
pub mod log;
pub mod stats;

use anyhow::bail;
use res_engine::GoalView;
use res_goal::ProgressSnapshot;
use uuid::Uuid;

const SPARK_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Resolve a goal given as a full UUID or a unique prefix of one.
pub fn resolve_goal_ref(goals: &[GoalView], reference: &str) -> anyhow::Result<Uuid> {
    let reference = reference.trim().to_lowercase();
    if let Ok(id) = Uuid::parse_str(&reference) {
        return Ok(id);
    }
    if reference.len() < 4 {
        bail!("goal reference '{}' is too short; use at least 4 characters", reference);
    }

    let matches: Vec<&GoalView> = goals
        .iter()
        .filter(|v| v.goal.id.to_string().starts_with(&reference))
        .collect();
    match matches.as_slice() {
        [only] => Ok(only.goal.id),
        [] => bail!("no goal with ID starting '{}'", reference),
        many => bail!(
            "'{}' matches {} goals; give more of the ID",
            reference,
            many.len()
        ),
    }
}

/// First 8 characters of an ID, enough to refer back to it.
pub fn short_id(id: Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

/// `[#####-----]  50%`
pub fn progress_bar(percentage: f64, width: usize) -> String {
    let filled = ((percentage / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!(
        "[{}{}] {:>3.0}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        percentage
    )
}

/// Scale bucket counts onto block glyphs. Empty buckets render lowest.
pub fn sparkline(buckets: &[u32]) -> String {
    let max = buckets.iter().copied().max().unwrap_or(0);
    buckets
        .iter()
        .map(|&count| {
            if max == 0 {
                SPARK_GLYPHS[0]
            } else {
                let index = (count as usize * (SPARK_GLYPHS.len() - 1)) / max as usize;
                SPARK_GLYPHS[index]
            }
        })
        .collect()
}

pub fn describe_snapshot(snapshot: &ProgressSnapshot) -> String {
    let mut line = format!(
        "{}  {}  streak {}",
        progress_bar(snapshot.percentage, 20),
        sparkline(&snapshot.sparkline),
        snapshot.streak
    );
    if snapshot.entry_count > 0 {
        line.push_str(&format!("  ({} entries)", snapshot.entry_count));
    }
    line
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
