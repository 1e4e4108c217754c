//! Parameter extraction: pull structured goal fields out of free text for a
//! given action. Every field gets an explicit value — extracted, defaulted,
//! or an explicit null — so downstream code never guesses about absence.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::intent::{GoalAction, IntentDescriptor};
use crate::parsing::parse_payload;
use crate::traits::SemanticClient;

/// Unit word following a number in the message, e.g. "15000 steps".
/// Mechanical like the frequency multiplier — target units are a closed,
/// literal vocabulary, unlike activity semantics.
static TARGET_WITH_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b\d[\d,\.]*\s*(steps|miles|km|kilometers|minutes|min|hours|pages|words|reps|sessions|pounds|lbs|kg|dollars|books|glasses|push-?ups)\b",
    )
    .expect("target unit regex")
});

#[derive(Debug, Deserialize, Default)]
struct RawCreateParams {
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
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawUpdateParams {
    #[serde(default)]
    goal_reference: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    target_value: Option<f64>,
    #[serde(default)]
    current_value: Option<f64>,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    changes: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawReferenceParams {
    #[serde(default)]
    goal_reference: Option<String>,
}

pub struct ParameterExtractor {
    semantic: Arc<dyn SemanticClient>,
}

impl ParameterExtractor {
    pub fn new(semantic: Arc<dyn SemanticClient>) -> Self {
        Self { semantic }
    }

    /// Extract the field map for one goal action. Infallible: a failed call
    /// or unparseable reply yields the action's default map.
    pub async fn extract(
        &self,
        message: &str,
        action: GoalAction,
        descriptor: &IntentDescriptor,
    ) -> Map<String, Value> {
        let prompt = build_extraction_prompt(message, action, descriptor);

        let reply = match self.semantic.complete(&prompt, 400).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(action = action.as_str(), "Parameter extraction call failed: {}", e);
                return default_params(action);
            }
        };

        match action {
            GoalAction::Create => match parse_payload::<RawCreateParams>(&reply) {
                Ok(raw) => create_params(raw),
                Err(e) => {
                    warn!("Create-extraction reply unparseable: {}", e);
                    default_params(action)
                }
            },
            GoalAction::Update => match parse_payload::<RawUpdateParams>(&reply) {
                Ok(raw) => update_params(raw, message),
                Err(e) => {
                    warn!("Update-extraction reply unparseable: {}", e);
                    default_params(action)
                }
            },
            _ => match parse_payload::<RawReferenceParams>(&reply) {
                Ok(raw) => reference_params(raw),
                Err(e) => {
                    warn!("Reference-extraction reply unparseable: {}", e);
                    default_params(action)
                }
            },
        }
    }
}

fn create_params(raw: RawCreateParams) -> Map<String, Value> {
    let mut params = Map::new();
    // Title stays null when the model found none — the coordinator downgrades
    // a titleless create to a list rather than minting an empty goal.
    params.insert("title".into(), opt_string(raw.title));
    params.insert("description".into(), opt_string(raw.description));
    params.insert(
        "goal_type".into(),
        json!(raw.goal_type.as_deref().map(crate::types::GoalType::parse).unwrap_or_default().as_str()),
    );
    params.insert(
        "frequency".into(),
        json!(raw.frequency.unwrap_or_else(|| "daily".to_string())),
    );
    params.insert(
        "target_value".into(),
        raw.target_value.map(|v| json!(v)).unwrap_or(Value::Null),
    );
    params.insert(
        "start_date".into(),
        json!(raw
            .start_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive().to_string())),
    );
    params.insert("end_date".into(), opt_string(raw.end_date));
    params
}

fn update_params(raw: RawUpdateParams, message: &str) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("goal_reference".into(), opt_string(raw.goal_reference));
    params.insert("title".into(), opt_string(raw.title.clone()));
    params.insert(
        "target_value".into(),
        raw.target_value.map(|v| json!(v)).unwrap_or(Value::Null),
    );
    params.insert(
        "current_value".into(),
        raw.current_value.map(|v| json!(v)).unwrap_or(Value::Null),
    );
    params.insert("frequency".into(), opt_string(raw.frequency));
    params.insert("end_date".into(), opt_string(raw.end_date));
    params.insert(
        "changes".into(),
        json!(raw.changes.unwrap_or_else(|| "General update".to_string())),
    );

    // Retitle hint: a new numeric target plus a literal unit in the message
    // lets the executor rewrite the display title to match, but only when no
    // explicit new title was given.
    if raw.title.is_none() {
        if let (Some(target), Some(unit)) = (raw.target_value, detect_unit(message)) {
            params.insert(
                "retitle_hint".into(),
                json!(format!("{} {}", format_target(target), unit)),
            );
        }
    }
    params
}

fn reference_params(raw: RawReferenceParams) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("goal_reference".into(), opt_string(raw.goal_reference));
    params
}

/// Defaults used when extraction itself failed.
fn default_params(action: GoalAction) -> Map<String, Value> {
    match action {
        GoalAction::Create => create_params(RawCreateParams::default()),
        GoalAction::Update => {
            let mut params = Map::new();
            params.insert("goal_reference".into(), Value::Null);
            params.insert("changes".into(), json!("Update goal"));
            params
        }
        _ => Map::new(),
    }
}

fn opt_string(value: Option<String>) -> Value {
    match value.filter(|s| !s.trim().is_empty()) {
        Some(s) => json!(s),
        None => Value::Null,
    }
}

/// Lowercased unit word when the message contains "<number> <unit>".
fn detect_unit(message: &str) -> Option<String> {
    TARGET_WITH_UNIT
        .captures(message)
        .map(|caps| caps[1].to_lowercase())
}

/// "15000" rather than "15000.0" for whole-number targets.
fn format_target(target: f64) -> String {
    if target.fract() == 0.0 {
        format!("{}", target as i64)
    } else {
        format!("{}", target)
    }
}

fn build_extraction_prompt(
    message: &str,
    action: GoalAction,
    descriptor: &IntentDescriptor,
) -> String {
    let base = format!(
        "Extract goal parameters from this message:\n\
         Message: \"{message}\"\n\
         Action: {action}\n\
         Domain: {domain}\n\
         Depth Level: {depth}\n\n\
         Respond in JSON format with these fields:",
        action = action.as_str(),
        domain = descriptor.domain.as_str(),
        depth = descriptor.depth_level.as_str(),
    );

    match action {
        GoalAction::Create => format!(
            "{base}\n\
             {{\n\
             \x20 \"title\": \"clear, actionable goal title, or null if none stated\",\n\
             \x20 \"description\": \"brief description or null\",\n\
             \x20 \"goal_type\": \"habit|project|calendar\",\n\
             \x20 \"frequency\": \"daily|weekly|monthly|custom text\",\n\
             \x20 \"target_value\": number_or_null,\n\
             \x20 \"start_date\": \"YYYY-MM-DD\",\n\
             \x20 \"end_date\": \"YYYY-MM-DD or null\"\n\
             }}\n\n\
             Extract meaningful numeric targets and realistic timeframes."
        ),
        GoalAction::Update => format!(
            "{base}\n\
             {{\n\
             \x20 \"goal_reference\": \"how the user refers to the goal\",\n\
             \x20 \"title\": \"new title if mentioned, else null\",\n\
             \x20 \"target_value\": new_target_number_or_null,\n\
             \x20 \"current_value\": logged_progress_number_or_null,\n\
             \x20 \"frequency\": \"new frequency or null\",\n\
             \x20 \"end_date\": \"new deadline or null\",\n\
             \x20 \"changes\": \"summary of what to change\"\n\
             }}\n\n\
             Focus on what specifically needs to be updated."
        ),
        _ => format!(
            "{base}\n\
             {{\n\
             \x20 \"goal_reference\": \"how the user refers to the goal, or null\"\n\
             }}"
        ),
    }
}
