//! The `get_progress` tool: per-goal detail or a whole-set summary with
//! on-track/behind buckets and an overall completion rate.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::traits::GoalStore;
use crate::types::{Goal, ToolInvocation};

/// Progress at or above this percentage counts as on track.
const ON_TRACK_THRESHOLD: f64 = 80.0;
/// Progress below this percentage counts as behind.
const BEHIND_THRESHOLD: f64 = 50.0;

#[derive(Debug, Deserialize)]
struct ProgressArgs {
    #[serde(default)]
    time_period: Option<String>,
    #[serde(default)]
    goal_id: Option<String>,
    #[serde(default)]
    goal_reference: Option<String>,
}

pub(crate) async fn run(
    goals: &Arc<dyn GoalStore>,
    invocation: &ToolInvocation,
) -> anyhow::Result<Value> {
    let args: ProgressArgs = serde_json::from_value(Value::Object(invocation.params.clone()))?;
    let time_period = args.time_period.as_deref().unwrap_or("week").to_string();
    let active = goals.list_active_goals(&invocation.user_id).await?;

    // Single-goal detail when the caller pointed at one.
    if args.goal_id.is_some() || args.goal_reference.is_some() {
        let goal = find_goal(&active, args.goal_id.as_deref(), args.goal_reference.as_deref())?;
        let percentage = goal.progress_percentage();
        let days = goal.days_active();
        return Ok(json!({
            "goal": goal,
            "progress_percentage": percentage,
            "days_active": days,
            "time_period": time_period,
        }));
    }

    Ok(summary(&active, &time_period))
}

fn find_goal(
    active: &[Goal],
    goal_id: Option<&str>,
    reference: Option<&str>,
) -> anyhow::Result<Goal> {
    if let Some(id) = goal_id {
        return active
            .iter()
            .find(|g| g.id == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Goal not found: {}", id));
    }
    let reference = reference.unwrap_or("").trim().to_lowercase();
    active
        .iter()
        .find(|g| g.title.to_lowercase().contains(&reference))
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("No goal matching \"{}\"", reference))
}

fn summary(active: &[Goal], time_period: &str) -> Value {
    if active.is_empty() {
        return json!({
            "total_goals": 0,
            "goals_on_track": 0,
            "goals_behind": 0,
            "overall_completion_rate": 0.0,
            "goals": [],
            "time_period": time_period,
            "message": "No active goals to report progress on",
        });
    }

    let percentages: Vec<f64> = active.iter().map(Goal::progress_percentage).collect();
    let on_track = percentages.iter().filter(|p| **p >= ON_TRACK_THRESHOLD).count();
    let behind = percentages.iter().filter(|p| **p < BEHIND_THRESHOLD).count();
    let overall = percentages.iter().sum::<f64>() / percentages.len() as f64;

    json!({
        "total_goals": active.len(),
        "goals_on_track": on_track,
        "goals_behind": behind,
        "overall_completion_rate": overall,
        "goals": active,
        "time_period": time_period,
    })
}
