//! The `enhanced_coaching` tool: one expert-coaching semantic call shaped by
//! the full intent descriptor and the user's active goals. A failed call
//! degrades to a static line — the tool itself still succeeds.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::traits::{GoalStore, SemanticClient};
use crate::types::ToolInvocation;

const DEGRADED_LINE: &str =
    "Coaching guidance is briefly unavailable. Stick to your current plan and check back in.";

#[derive(Debug, Deserialize)]
struct CoachingArgs {
    message: String,
    domain: String,
    depth_level: String,
    coaching_type: String,
    follow_up_context: String,
    specificity_needed: String,
    conversation_progression: String,
    #[serde(default)]
    unresolved_needs: Option<Vec<String>>,
}

pub(crate) async fn run(
    goals: &Arc<dyn GoalStore>,
    semantic: &Arc<dyn SemanticClient>,
    invocation: &ToolInvocation,
) -> anyhow::Result<Value> {
    let args: CoachingArgs = serde_json::from_value(Value::Object(invocation.params.clone()))?;

    // Goal titles enrich the prompt; their absence never blocks coaching.
    let goal_titles = match goals.list_active_goals(&invocation.user_id).await {
        Ok(active) => active.iter().map(|g| g.title.clone()).collect::<Vec<_>>(),
        Err(e) => {
            warn!(user_id = %invocation.user_id, "Goal lookup for coaching failed: {}", e);
            Vec::new()
        }
    };

    let prompt = build_coaching_prompt(&args, &goal_titles);

    match semantic.complete(&prompt, 120).await {
        Ok(reply) if !reply.trim().is_empty() => Ok(json!({
            "coaching_response": reply.trim(),
            "domain": args.domain,
            "depth_level": args.depth_level,
        })),
        Ok(_) => Ok(degraded(&args)),
        Err(e) => {
            warn!("Expert coaching call failed: {}", e);
            Ok(degraded(&args))
        }
    }
}

fn degraded(args: &CoachingArgs) -> Value {
    json!({
        "coaching_response": DEGRADED_LINE,
        "domain": args.domain,
        "depth_level": args.depth_level,
        "degraded": true,
    })
}

fn build_coaching_prompt(args: &CoachingArgs, goal_titles: &[String]) -> String {
    let goals_line = if goal_titles.is_empty() {
        "none tracked yet".to_string()
    } else {
        goal_titles.join(", ")
    };
    let needs = args
        .unresolved_needs
        .as_deref()
        .filter(|n| !n.is_empty())
        .map(|n| n.join(", "))
        .unwrap_or_else(|| "none".to_string());

    format!(
        "You are an expert {domain} coach responding to:\n\
         \"{message}\"\n\n\
         Response requirements:\n\
         - Depth: {depth}\n\
         - Coaching style: {style}\n\
         - Conversation stage: {stage} ({follow_up})\n\
         - Specificity: {specificity}\n\
         - Unresolved needs to address: {needs}\n\
         - User's active goals: {goals}\n\n\
         Reply with one short, actionable coaching message of at most 25 words. \
         No preamble, no lists.",
        domain = args.domain,
        message = args.message,
        depth = args.depth_level,
        style = args.coaching_type,
        stage = args.conversation_progression,
        follow_up = args.follow_up_context,
        specificity = args.specificity_needed,
        needs = needs,
        goals = goals_line,
    )
}
