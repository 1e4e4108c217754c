//! The `update_preferences` tool: partial update of coaching preferences.
//! Takes effect immediately — never cached.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::traits::PreferenceStore;
use crate::types::{AccountabilityLevel, Persona, PreferencePatch, ToolInvocation};

#[derive(Debug, Deserialize)]
struct PreferenceArgs {
    #[serde(default)]
    default_persona: Option<String>,
    #[serde(default)]
    accountability_level: Option<String>,
    #[serde(default)]
    proactive_check_ins: Option<bool>,
    #[serde(default)]
    quiet_hours_start: Option<String>,
    #[serde(default)]
    quiet_hours_end: Option<String>,
}

pub(crate) async fn run(
    prefs: &Arc<dyn PreferenceStore>,
    invocation: &ToolInvocation,
) -> anyhow::Result<Value> {
    let args: PreferenceArgs = serde_json::from_value(Value::Object(invocation.params.clone()))?;

    let patch = PreferencePatch {
        // enum membership was schema-checked; parse() here cannot miss
        default_persona: args.default_persona.as_deref().and_then(Persona::parse),
        accountability_level: args
            .accountability_level
            .as_deref()
            .map(AccountabilityLevel::parse),
        proactive_check_ins: args.proactive_check_ins,
        quiet_hours_start: args.quiet_hours_start,
        quiet_hours_end: args.quiet_hours_end,
    };

    if patch.is_empty() {
        anyhow::bail!("No preference fields to update");
    }

    let updated_fields = patch.field_names();
    let preferences = prefs
        .update_preferences(&invocation.user_id, &patch)
        .await?;
    info!(user_id = %invocation.user_id, ?updated_fields, "Preferences updated");

    let mut data = json!({
        "preferences": preferences,
        "updated_fields": updated_fields,
        "message": "Preferences updated",
    });
    // Surfaced separately so the formatter can announce the voice change.
    if let Some(persona) = patch.default_persona {
        data["default_persona"] = json!(persona.as_str());
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{setup_test_pipeline, MockSemanticClient};
    use crate::types::{ChannelKind, ToolName};

    fn invocation(params: Value) -> ToolInvocation {
        ToolInvocation {
            tool: ToolName::UpdatePreferences,
            params: params.as_object().cloned().unwrap_or_default(),
            user_id: "u1".to_string(),
            channel: ChannelKind::Whatsapp,
        }
    }

    #[tokio::test]
    async fn test_persona_update_round_trips() {
        let harness = setup_test_pipeline(MockSemanticClient::new()).await.unwrap();
        let prefs = harness.prefs();

        let data = run(
            &prefs,
            &invocation(json!({"default_persona": "encouraging"})),
        )
        .await
        .unwrap();

        assert_eq!(data["default_persona"], json!("encouraging"));
        assert_eq!(data["updated_fields"], json!(["default_persona"]));

        let stored = prefs.get_preferences("u1").await.unwrap();
        assert_eq!(stored.default_persona, Persona::Encouraging);
    }

    #[tokio::test]
    async fn test_empty_patch_is_an_error() {
        let harness = setup_test_pipeline(MockSemanticClient::new()).await.unwrap();
        let prefs = harness.prefs();
        let err = run(&prefs, &invocation(json!({}))).await.unwrap_err();
        assert!(err.to_string().contains("No preference fields"));
    }

    #[tokio::test]
    async fn test_partial_patch_leaves_other_fields() {
        let harness = setup_test_pipeline(MockSemanticClient::new()).await.unwrap();
        let prefs = harness.prefs();

        run(
            &prefs,
            &invocation(json!({"accountability_level": "intensive"})),
        )
        .await
        .unwrap();
        run(&prefs, &invocation(json!({"proactive_check_ins": false})))
            .await
            .unwrap();

        let stored = prefs.get_preferences("u1").await.unwrap();
        assert_eq!(stored.accountability_level, AccountabilityLevel::Intensive);
        assert!(!stored.proactive_check_ins);
    }
}
