//! Tool Coordinator: maps an intent descriptor into an ordered list of tool
//! invocations. Pure routing — no execution, no store access.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::extractor::ParameterExtractor;
use crate::intent::preference::detect_persona_switch;
use crate::intent::{CoachingType, DepthLevel, GoalAction, IntentDescriptor};
use crate::traits::SemanticClient;
use crate::types::{ChannelKind, ToolInvocation, ToolName};

pub struct ToolCoordinator {
    semantic: Arc<dyn SemanticClient>,
    extractor: ParameterExtractor,
}

impl ToolCoordinator {
    pub fn new(semantic: Arc<dyn SemanticClient>) -> Self {
        let extractor = ParameterExtractor::new(semantic.clone());
        Self { semantic, extractor }
    }

    /// Plan the invocations for one message, in priority order. A purely
    /// conversational descriptor plans nothing.
    pub async fn plan(
        &self,
        message: &str,
        user_id: &str,
        channel: ChannelKind,
        descriptor: &IntentDescriptor,
    ) -> Vec<ToolInvocation> {
        let mut tools = Vec::new();

        // 1. Concrete goal management ("none" means exactly that)
        if descriptor.requires_goal_management {
            if let Some(action) = descriptor.goal_action {
                tools.push(
                    self.plan_goal_management(message, user_id, channel, action, descriptor)
                        .await,
                );
            }
        }

        // 2. Whole-set conflict analysis
        if descriptor.requires_conflict_analysis {
            tools.push(manage_goal_action(user_id, channel, "analyze_conflicts"));
        }

        // 3. Amendment suggestions
        if descriptor.requires_amendment_suggestion {
            tools.push(manage_goal_action(user_id, channel, "suggest_amendments"));
        }

        // 4. Progress inquiry
        if descriptor.requires_progress_inquiry {
            let mut params = Map::new();
            params.insert("time_period".into(), json!("week"));
            tools.push(invocation(ToolName::GetProgress, params, user_id, channel));
        }

        // 5. Preference change, gated by the confidence-scored sub-classifier
        if descriptor.requires_preference_change {
            if let Some(switch) = detect_persona_switch(self.semantic.as_ref(), message).await {
                let mut params = Map::new();
                params.insert("default_persona".into(), json!(switch.target.as_str()));
                tools.push(invocation(
                    ToolName::UpdatePreferences,
                    params,
                    user_id,
                    channel,
                ));
            }
        }

        // 6. Enhanced coaching for anything beyond a surface informational ask
        if needs_enhanced_coaching(descriptor) {
            tools.push(coaching_invocation(message, user_id, channel, descriptor));
        }

        debug!(count = tools.len(), user_id, "Planned tool invocations");
        tools
    }

    async fn plan_goal_management(
        &self,
        message: &str,
        user_id: &str,
        channel: ChannelKind,
        mut action: GoalAction,
        descriptor: &IntentDescriptor,
    ) -> ToolInvocation {
        let mut params = self.extractor.extract(message, action, descriptor).await;

        // A create/update with neither a title nor a way to find the goal
        // can only mint junk — downgrade to a list instead.
        if matches!(action, GoalAction::Create | GoalAction::Update)
            && !has_string(&params, "title")
            && !has_string(&params, "goal_reference")
        {
            debug!(
                from = action.as_str(),
                "Extraction found no title or reference; downgrading to list"
            );
            action = GoalAction::List;
            params = Map::new();
        }

        params.insert("action".into(), json!(action.as_str()));
        invocation(ToolName::ManageGoal, params, user_id, channel)
    }
}

fn needs_enhanced_coaching(descriptor: &IntentDescriptor) -> bool {
    descriptor.depth_level > DepthLevel::Surface
        || descriptor.coaching_type != CoachingType::Informational
        || !descriptor.unresolved_needs.is_empty()
}

fn has_string(params: &Map<String, Value>, key: &str) -> bool {
    params
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn invocation(
    tool: ToolName,
    params: Map<String, Value>,
    user_id: &str,
    channel: ChannelKind,
) -> ToolInvocation {
    ToolInvocation {
        tool,
        params,
        user_id: user_id.to_string(),
        channel,
    }
}

fn manage_goal_action(user_id: &str, channel: ChannelKind, action: &str) -> ToolInvocation {
    let mut params = Map::new();
    params.insert("action".into(), json!(action));
    invocation(ToolName::ManageGoal, params, user_id, channel)
}

fn coaching_invocation(
    message: &str,
    user_id: &str,
    channel: ChannelKind,
    descriptor: &IntentDescriptor,
) -> ToolInvocation {
    let mut params = Map::new();
    params.insert("message".into(), json!(message));
    params.insert("domain".into(), json!(descriptor.domain.as_str()));
    params.insert("depth_level".into(), json!(descriptor.depth_level.as_str()));
    params.insert(
        "coaching_type".into(),
        json!(descriptor.coaching_type.as_str()),
    );
    params.insert(
        "follow_up_context".into(),
        json!(descriptor.follow_up_context.as_str()),
    );
    params.insert(
        "specificity_needed".into(),
        json!(descriptor.specificity_needed.as_str()),
    );
    params.insert(
        "conversation_progression".into(),
        json!(descriptor.conversation_progression.as_str()),
    );
    params.insert(
        "unresolved_needs".into(),
        json!(descriptor.unresolved_needs),
    );
    invocation(ToolName::EnhancedCoaching, params, user_id, channel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSemanticClient;

    fn coordinator_with(mock: MockSemanticClient) -> ToolCoordinator {
        ToolCoordinator::new(Arc::new(mock))
    }

    #[tokio::test]
    async fn test_conversational_descriptor_plans_nothing() {
        let coordinator = coordinator_with(MockSemanticClient::new());
        let tools = coordinator
            .plan(
                "I feel like giving up",
                "u1",
                ChannelKind::Whatsapp,
                &IntentDescriptor::default(),
            )
            .await;
        assert!(tools.is_empty());
    }

    #[tokio::test]
    async fn test_create_with_title_plans_manage_goal() {
        let coordinator = coordinator_with(MockSemanticClient::with_responses(vec![
            r#"{"title": "Run a 5k", "frequency": "daily"}"#.to_string(),
        ]));
        let descriptor = IntentDescriptor {
            requires_goal_management: true,
            goal_action: Some(GoalAction::Create),
            ..Default::default()
        };
        let tools = coordinator
            .plan("I want to run a 5k daily", "u1", ChannelKind::Whatsapp, &descriptor)
            .await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].tool, ToolName::ManageGoal);
        assert_eq!(tools[0].params["action"], json!("create"));
        assert_eq!(tools[0].params["title"], json!("Run a 5k"));
    }

    #[tokio::test]
    async fn test_titleless_create_downgrades_to_list() {
        // Extractor reply has neither title nor reference.
        let coordinator =
            coordinator_with(MockSemanticClient::with_responses(vec!["{}".to_string()]));
        let descriptor = IntentDescriptor {
            requires_goal_management: true,
            goal_action: Some(GoalAction::Create),
            ..Default::default()
        };
        let tools = coordinator
            .plan("new goal please", "u1", ChannelKind::Whatsapp, &descriptor)
            .await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].params["action"], json!("list"));
        assert!(tools[0].params.get("title").is_none());
    }

    #[tokio::test]
    async fn test_referenceless_update_downgrades_to_list() {
        let coordinator =
            coordinator_with(MockSemanticClient::with_responses(vec!["{}".to_string()]));
        let descriptor = IntentDescriptor {
            requires_goal_management: true,
            goal_action: Some(GoalAction::Update),
            ..Default::default()
        };
        let tools = coordinator
            .plan("change it", "u1", ChannelKind::Telegram, &descriptor)
            .await;
        assert_eq!(tools[0].params["action"], json!("list"));
    }

    #[tokio::test]
    async fn test_explicit_none_action_emits_no_goal_tool() {
        let coordinator = coordinator_with(MockSemanticClient::new());
        let descriptor = IntentDescriptor {
            requires_goal_management: true,
            goal_action: None,
            ..Default::default()
        };
        let tools = coordinator
            .plan("musing about goals in general", "u1", ChannelKind::Whatsapp, &descriptor)
            .await;
        assert!(tools.is_empty());
    }

    #[tokio::test]
    async fn test_conflict_and_amendment_requests() {
        let coordinator = coordinator_with(MockSemanticClient::new());
        let descriptor = IntentDescriptor {
            requires_conflict_analysis: true,
            requires_amendment_suggestion: true,
            ..Default::default()
        };
        let tools = coordinator
            .plan("do my goals clash?", "u1", ChannelKind::Api, &descriptor)
            .await;
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].params["action"], json!("analyze_conflicts"));
        assert_eq!(tools[1].params["action"], json!("suggest_amendments"));
    }

    #[tokio::test]
    async fn test_progress_inquiry_defaults_to_week() {
        let coordinator = coordinator_with(MockSemanticClient::new());
        let descriptor = IntentDescriptor {
            requires_progress_inquiry: true,
            ..Default::default()
        };
        let tools = coordinator
            .plan("how am I doing?", "u1", ChannelKind::Whatsapp, &descriptor)
            .await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].tool, ToolName::GetProgress);
        assert_eq!(tools[0].params["time_period"], json!("week"));
    }

    #[tokio::test]
    async fn test_low_confidence_preference_change_is_dropped() {
        let coordinator = coordinator_with(MockSemanticClient::with_responses(vec![
            r#"{"wants_switch": true, "target_persona": "encouraging", "confidence": 30}"#
                .to_string(),
        ]));
        let descriptor = IntentDescriptor {
            requires_preference_change: true,
            ..Default::default()
        };
        let tools = coordinator
            .plan("maybe be nicer?", "u1", ChannelKind::Whatsapp, &descriptor)
            .await;
        assert!(tools.is_empty());
    }

    #[tokio::test]
    async fn test_confident_preference_change_plans_update() {
        let coordinator = coordinator_with(MockSemanticClient::with_responses(vec![
            r#"{"wants_switch": true, "target_persona": "encouraging", "confidence": 90}"#
                .to_string(),
        ]));
        let descriptor = IntentDescriptor {
            requires_preference_change: true,
            ..Default::default()
        };
        let tools = coordinator
            .plan("switch to the supportive voice", "u1", ChannelKind::Whatsapp, &descriptor)
            .await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].tool, ToolName::UpdatePreferences);
        assert_eq!(tools[0].params["default_persona"], json!("encouraging"));
    }

    #[tokio::test]
    async fn test_deep_descriptor_plans_coaching() {
        let coordinator = coordinator_with(MockSemanticClient::new());
        let descriptor = IntentDescriptor {
            depth_level: DepthLevel::Implementation,
            coaching_type: CoachingType::Tactical,
            unresolved_needs: vec!["pace plan".to_string()],
            ..Default::default()
        };
        let tools = coordinator
            .plan("how exactly do I structure the week?", "u1", ChannelKind::Api, &descriptor)
            .await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].tool, ToolName::EnhancedCoaching);
        assert_eq!(tools[0].params["depth_level"], json!("implementation"));
        assert_eq!(tools[0].params["unresolved_needs"], json!(["pace plan"]));
    }
}
