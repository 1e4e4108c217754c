//! The `manage_goal` tool: goal CRUD plus the whole-set conflict and
//! amendment actions. Free-text goal references are resolved against active
//! goal titles; a create opportunistically checks the new goal against the
//! rest of the set and attaches a conversational note when it clashes.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::conflicts::amendments::AmendmentSuggester;
use crate::conflicts::{ConflictAnalyzer, ConflictFinding};
use crate::traits::{GoalStore, SemanticClient};
use crate::types::{Goal, GoalType, ToolInvocation};

/// Leading quantity in a goal title, e.g. the "10000 steps" in
/// "Walk 10000 steps daily".
static TITLE_QUANTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,\.]*\s*[A-Za-z]+").expect("title quantity regex"));

#[derive(Debug, Deserialize)]
struct ManageGoalArgs {
    action: String,
    #[serde(default)]
    goal_id: Option<String>,
    #[serde(default)]
    goal_reference: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    goal_type: Option<String>,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    target_value: Option<f64>,
    #[serde(default)]
    current_value: Option<f64>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    retitle_hint: Option<String>,
    #[serde(default)]
    changes: Option<String>,
    #[serde(default)]
    check_conflicts: Option<bool>,
}

pub(crate) async fn run(
    goals: &Arc<dyn GoalStore>,
    semantic: &Arc<dyn SemanticClient>,
    invocation: &ToolInvocation,
) -> anyhow::Result<Value> {
    let args: ManageGoalArgs =
        serde_json::from_value(Value::Object(invocation.params.clone()))?;
    let user_id = &invocation.user_id;

    match args.action.as_str() {
        "create" => create(goals, semantic, user_id, &args).await,
        "update" => update(goals, user_id, &args).await,
        "list" => list(goals, user_id).await,
        "get" => get(goals, user_id, &args).await,
        "delete" => delete(goals, user_id, &args).await,
        "complete" => complete(goals, user_id, &args).await,
        "analyze_conflicts" => analyze_conflicts(goals, semantic, user_id).await,
        "suggest_amendments" => suggest_amendments(goals, semantic, user_id, &args).await,
        // unreachable behind schema validation, but never panic on it
        other => anyhow::bail!("Unknown goal action: {}", other),
    }
}

async fn create(
    goals: &Arc<dyn GoalStore>,
    semantic: &Arc<dyn SemanticClient>,
    user_id: &str,
    args: &ManageGoalArgs,
) -> anyhow::Result<Value> {
    let title = args
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("New Goal");

    let mut goal = Goal::new(user_id, title);
    goal.description = args.description.clone();
    if let Some(goal_type) = args.goal_type.as_deref() {
        goal.goal_type = GoalType::parse(goal_type);
    }
    if let Some(frequency) = args.frequency.clone() {
        goal.frequency = Some(frequency);
    }
    goal.target_value = args.target_value;
    if let Some(start_date) = args.start_date.clone() {
        goal.start_date = start_date;
    }
    goal.end_date = args.end_date.clone();

    goals.insert_goal(&goal).await?;
    info!(user_id, goal_id = %goal.id, title = %goal.title, "Goal created");

    let message = format!("Goal \"{}\" created", goal.title);
    let mut data = json!({
        "goal_created": true,
        "goal": &goal,
        "message": message,
    });

    // Best-effort conflict note against the existing set; a failure here
    // never fails the create.
    if args.check_conflicts.unwrap_or(true) {
        match creation_conflicts(goals, semantic, user_id, &goal).await {
            Ok(findings) if !findings.is_empty() => {
                data["has_potential_conflicts"] = json!(true);
                data["conversational_message"] = json!(findings[0].conversational.clone());
            }
            Ok(_) => {}
            Err(e) => warn!(user_id, "Create-time conflict check failed: {}", e),
        }
    }

    Ok(data)
}

async fn creation_conflicts(
    goals: &Arc<dyn GoalStore>,
    semantic: &Arc<dyn SemanticClient>,
    user_id: &str,
    new_goal: &Goal,
) -> anyhow::Result<Vec<ConflictFinding>> {
    let existing = goals.list_active_goals(user_id).await?;
    let analyzer = ConflictAnalyzer::new(semantic.clone());

    let mut findings = Vec::new();
    for other in existing.iter().filter(|g| g.id != new_goal.id) {
        findings.extend(analyzer.analyze_pair(new_goal, other).await);
    }
    Ok(findings)
}

async fn update(
    goals: &Arc<dyn GoalStore>,
    user_id: &str,
    args: &ManageGoalArgs,
) -> anyhow::Result<Value> {
    let active = goals.list_active_goals(user_id).await?;
    let mut goal = resolve_goal(
        &active,
        args.goal_id.as_deref(),
        args.goal_reference.as_deref(),
    )?;

    if let Some(title) = args.title.as_deref().filter(|t| !t.trim().is_empty()) {
        goal.title = title.to_string();
    } else if let (Some(_), Some(hint)) = (args.target_value, args.retitle_hint.as_deref()) {
        goal.title = retitle(&goal.title, hint);
    }
    if let Some(description) = args.description.clone() {
        goal.description = Some(description);
    }
    if let Some(frequency) = args.frequency.clone() {
        goal.frequency = Some(frequency);
    }
    if let Some(target) = args.target_value {
        goal.target_value = Some(target);
    }
    if let Some(current) = args.current_value {
        goal.current_value = current;
    }
    if let Some(end_date) = args.end_date.clone() {
        goal.end_date = Some(end_date);
    }
    goal.updated_at = chrono::Utc::now().to_rfc3339();

    goals.update_goal(&goal).await?;
    info!(user_id, goal_id = %goal.id, "Goal updated");

    let message = format!("Goal \"{}\" updated", goal.title);
    Ok(json!({
        "goal_updated": true,
        "goal": &goal,
        "changes": args.changes.clone().unwrap_or_else(|| "General update".to_string()),
        "message": message,
    }))
}

async fn list(goals: &Arc<dyn GoalStore>, user_id: &str) -> anyhow::Result<Value> {
    let active = goals.list_active_goals(user_id).await?;
    let count = active.len();
    let message = if active.is_empty() {
        "No active goals yet. Tell me what you want to work toward and I'll track it."
            .to_string()
    } else {
        format!("{} active goals", count)
    };
    Ok(json!({
        "goals": active,
        "count": count,
        "message": message,
    }))
}

async fn get(
    goals: &Arc<dyn GoalStore>,
    user_id: &str,
    args: &ManageGoalArgs,
) -> anyhow::Result<Value> {
    let active = goals.list_active_goals(user_id).await?;
    let goal = resolve_goal(
        &active,
        args.goal_id.as_deref(),
        args.goal_reference.as_deref(),
    )?;
    Ok(json!({ "goal": goal }))
}

async fn delete(
    goals: &Arc<dyn GoalStore>,
    user_id: &str,
    args: &ManageGoalArgs,
) -> anyhow::Result<Value> {
    let active = goals.list_active_goals(user_id).await?;
    let goal = resolve_goal(
        &active,
        args.goal_id.as_deref(),
        args.goal_reference.as_deref(),
    )?;

    if !goals.delete_goal(user_id, &goal.id).await? {
        anyhow::bail!("Goal not found: {}", goal.id);
    }
    info!(user_id, goal_id = %goal.id, "Goal deleted");
    let message = format!("Goal \"{}\" deleted", goal.title);
    Ok(json!({
        "goal_deleted": true,
        "goal_id": goal.id,
        "message": message,
    }))
}

async fn complete(
    goals: &Arc<dyn GoalStore>,
    user_id: &str,
    args: &ManageGoalArgs,
) -> anyhow::Result<Value> {
    let active = goals.list_active_goals(user_id).await?;
    let goal = resolve_goal(
        &active,
        args.goal_id.as_deref(),
        args.goal_reference.as_deref(),
    )?;

    if !goals.complete_goal(user_id, &goal.id).await? {
        anyhow::bail!("Goal not found: {}", goal.id);
    }
    info!(user_id, goal_id = %goal.id, "Goal completed");
    let message = format!("Goal \"{}\" completed", goal.title);
    Ok(json!({
        "goal_completed": true,
        "goal_id": goal.id,
        "message": message,
    }))
}

async fn analyze_conflicts(
    goals: &Arc<dyn GoalStore>,
    semantic: &Arc<dyn SemanticClient>,
    user_id: &str,
) -> anyhow::Result<Value> {
    let active = goals.list_active_goals(user_id).await?;
    let analyzer = ConflictAnalyzer::new(semantic.clone());
    let report = analyzer.analyze(&active).await;

    let mut data = serde_json::to_value(&report)?;
    data["message"] = json!(format!(
        "Found {} goal conflicts requiring attention",
        report.conflict_pairs
    ));
    Ok(data)
}

async fn suggest_amendments(
    goals: &Arc<dyn GoalStore>,
    semantic: &Arc<dyn SemanticClient>,
    user_id: &str,
    args: &ManageGoalArgs,
) -> anyhow::Result<Value> {
    let active = goals.list_active_goals(user_id).await?;

    // Optional targeting of one goal by id or reference.
    let target_id = match (args.goal_id.as_deref(), args.goal_reference.as_deref()) {
        (None, None) => None,
        (goal_id, reference) => Some(resolve_goal(&active, goal_id, reference)?.id),
    };

    let suggester = AmendmentSuggester::new(ConflictAnalyzer::new(semantic.clone()));
    let report = suggester.suggest(&active, target_id.as_deref()).await;

    let mut data = serde_json::to_value(&report)?;
    data["message"] = json!(format!(
        "Generated amendments for {} conflicting goals",
        report.goals_with_conflicts
    ));
    Ok(data)
}

/// Resolve a goal by id, or by case-insensitive containment between the
/// free-text reference and active goal titles. The match must be unique.
fn resolve_goal(
    active: &[Goal],
    goal_id: Option<&str>,
    reference: Option<&str>,
) -> anyhow::Result<Goal> {
    if let Some(id) = goal_id.filter(|s| !s.trim().is_empty()) {
        return active
            .iter()
            .find(|g| g.id == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Goal not found: {}", id));
    }

    let Some(reference) = reference
        .map(|r| r.trim().to_lowercase())
        .filter(|r| !r.is_empty())
    else {
        anyhow::bail!("A goal id or goal reference is required");
    };

    let matches: Vec<&Goal> = active
        .iter()
        .filter(|g| {
            let title = g.title.to_lowercase();
            title.contains(&reference) || reference.contains(&title)
        })
        .collect();

    match matches.as_slice() {
        [only] => Ok((*only).clone()),
        [] => {
            let titles: Vec<&str> = active.iter().map(|g| g.title.as_str()).collect();
            anyhow::bail!(
                "No goal matching \"{}\". Active goals: {}",
                reference,
                if titles.is_empty() {
                    "(none)".to_string()
                } else {
                    titles.join(", ")
                }
            )
        }
        several => {
            let titles: Vec<&str> = several.iter().map(|g| g.title.as_str()).collect();
            anyhow::bail!(
                "\"{}\" matches several goals: {}. Be more specific.",
                reference,
                titles.join(", ")
            )
        }
    }
}

/// Rewrite the leading quantity in a title to match a new target, e.g.
/// "Walk 10000 steps daily" + "15000 steps" → "Walk 15000 steps daily".
fn retitle(title: &str, hint: &str) -> String {
    match TITLE_QUANTITY.find(title) {
        Some(m) => format!("{}{}{}", &title[..m.start()], hint, &title[m.end()..]),
        None => format!("{} ({})", title, hint),
    }
}
