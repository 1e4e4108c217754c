//! The conversational pipeline: classify → plan → execute → format.
//!
//! Dependencies are explicitly constructed and injected — no module-level
//! singletons — so every component is independently testable and there is no
//! hidden init-order coupling.

use std::sync::Arc;

use tracing::{info, warn};

use crate::coordinator::ToolCoordinator;
use crate::formatter::{self, FormattedReply};
use crate::intent::IntentClassifier;
use crate::parsing::tail_chars;
use crate::tools::ToolExecutor;
use crate::traits::{GoalStore, PreferenceStore, SemanticClient};
use crate::types::{ChannelKind, Persona, ToolInvocation, ToolResult};

/// The planned tool work for one message.
#[derive(Debug, Clone)]
pub struct ToolPlan {
    pub requires_tools: bool,
    pub tools: Vec<ToolInvocation>,
}

pub struct Pipeline {
    semantic: Arc<dyn SemanticClient>,
    prefs: Arc<dyn PreferenceStore>,
    classifier: IntentClassifier,
    coordinator: ToolCoordinator,
    executor: ToolExecutor,
}

impl Pipeline {
    pub fn new(
        semantic: Arc<dyn SemanticClient>,
        goals: Arc<dyn GoalStore>,
        prefs: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(semantic.clone()),
            coordinator: ToolCoordinator::new(semantic.clone()),
            executor: ToolExecutor::new(goals, prefs.clone(), semantic.clone()),
            semantic,
            prefs,
        }
    }

    /// Classify the message and plan its tool invocations. Degrades to an
    /// empty plan — classification failure never propagates.
    pub async fn analyze_message_for_tools(
        &self,
        message: &str,
        user_id: &str,
        channel: ChannelKind,
        context: Option<&str>,
    ) -> ToolPlan {
        let descriptor = self.classifier.analyze(message, context).await;
        let tools = self
            .coordinator
            .plan(message, user_id, channel, &descriptor)
            .await;
        ToolPlan {
            requires_tools: !tools.is_empty(),
            tools,
        }
    }

    /// Run one invocation through validation, cache, and dispatch.
    pub async fn execute_tool(&self, invocation: &ToolInvocation) -> ToolResult {
        self.executor.execute(invocation).await
    }

    /// Run a message's invocations concurrently; waits for all of them.
    pub async fn execute_tools(&self, invocations: &[ToolInvocation]) -> Vec<ToolResult> {
        self.executor.execute_all(invocations).await
    }

    /// Render results + candidate into the bounded outbound reply.
    pub fn format_response(
        &self,
        results: &[ToolResult],
        candidate: &str,
        persona: Persona,
        channel: ChannelKind,
    ) -> FormattedReply {
        formatter::format_response(results, candidate, persona, channel)
    }

    /// Full message turn: fast path for trivial messages, otherwise
    /// classify → execute → persona reply → format.
    pub async fn handle_message(
        &self,
        message: &str,
        user_id: &str,
        channel: ChannelKind,
        context: Option<&str>,
    ) -> FormattedReply {
        let persona = self.persona_for(user_id).await;

        if formatter::is_simple_message(message) {
            let candidate = self
                .generate_candidate(message, context, "", persona)
                .await;
            return self.format_response(&[], &candidate, persona, channel);
        }

        let plan = self
            .analyze_message_for_tools(message, user_id, channel, context)
            .await;
        let results = self.execute_tools(&plan.tools).await;
        info!(
            user_id,
            tools = results.len(),
            succeeded = results.iter().filter(|r| r.success).count(),
            "Executed tool plan"
        );

        let tool_context = build_tool_context(&results);
        let candidate = self
            .generate_candidate(message, context, &tool_context, persona)
            .await;
        self.format_response(&results, &candidate, persona, channel)
    }

    /// The user's stored persona; defaults apply for unknown users and on
    /// store errors.
    async fn persona_for(&self, user_id: &str) -> Persona {
        match self.prefs.get_preferences(user_id).await {
            Ok(prefs) => prefs.default_persona,
            Err(e) => {
                warn!(user_id, "Preference lookup failed, using default persona: {}", e);
                Persona::default()
            }
        }
    }

    /// Persona-voiced free-text candidate. Over-long and failed generations
    /// both land on the persona fallback line.
    async fn generate_candidate(
        &self,
        message: &str,
        context: Option<&str>,
        tool_context: &str,
        persona: Persona,
    ) -> String {
        let mut prompt = String::from(persona.system_prompt());
        prompt.push_str("\n\n");
        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            prompt.push_str(&format!(
                "Recent conversation:\n{}\n\n",
                tail_chars(context, 800)
            ));
        }
        if !tool_context.is_empty() {
            prompt.push_str(&format!("{}\n\n", tool_context));
        }
        prompt.push_str(&format!("User message: \"{}\"", message));

        match self.semantic.complete(&prompt, 100).await {
            Ok(reply) => {
                let reply = reply.trim().to_string();
                // an off-the-rails generation is worse than the canned line
                if reply.is_empty() || reply.split_whitespace().count() > persona.word_cap() + 3 {
                    formatter::fallback_line(persona).to_string()
                } else {
                    reply
                }
            }
            Err(e) => {
                warn!("Candidate reply generation failed: {}", e);
                formatter::fallback_line(persona).to_string()
            }
        }
    }
}

/// Short factual summaries of this turn's tool results, for the candidate
/// reply prompt.
fn build_tool_context(results: &[ToolResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = results
        .iter()
        .map(|result| {
            if !result.success {
                return format!(
                    "Tool {} failed: {}",
                    result.tool.as_str(),
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            let data = result.data.as_ref();
            if let Some(goals) = data.and_then(|d| d["goals"].as_array()) {
                if goals.is_empty() {
                    return "User has no active goals yet".to_string();
                }
                let titles: Vec<&str> =
                    goals.iter().filter_map(|g| g["title"].as_str()).collect();
                return format!("User has {} active goals: {}", goals.len(), titles.join(", "));
            }
            if let Some(message) = data.and_then(|d| d["message"].as_str()) {
                return message.to_string();
            }
            if let Some(rate) = data.and_then(|d| d["overall_completion_rate"].as_f64()) {
                return format!("Overall progress: {:.0}%", rate);
            }
            format!("Tool {} executed successfully", result.tool.as_str())
        })
        .collect();

    format!("Context from tools: {}.", parts.join(". "))
}
