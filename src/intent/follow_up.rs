//! Follow-up sub-classifier: does this message continue a prior topic, and
//! does it warrant a deeper treatment than its surface reading suggests?

use serde::Deserialize;
use tracing::warn;

use crate::parsing::{parse_payload, tail_chars};
use crate::traits::SemanticClient;

/// Context shorter than this can't meaningfully be "followed up" on.
const MIN_CONTEXT_CHARS: usize = 20;
/// How much trailing context goes into the follow-up prompt.
const CONTEXT_SLICE_CHARS: usize = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowUpType {
    #[default]
    None,
    Clarification,
    DeeperDetail,
    Implementation,
    ProblemSolving,
}

impl FollowUpType {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "clarification" => FollowUpType::Clarification,
            "deeper_detail" => FollowUpType::DeeperDetail,
            "implementation" => FollowUpType::Implementation,
            "problem_solving" => FollowUpType::ProblemSolving,
            _ => FollowUpType::None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FollowUpAnalysis {
    pub is_follow_up: bool,
    pub follow_up_type: FollowUpType,
    pub needs_deep_dive: bool,
    pub previous_topic: Option<String>,
    pub reasoning: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawFollowUpPayload {
    #[serde(default, rename = "isFollowUp")]
    is_follow_up: bool,
    #[serde(default, rename = "followUpType")]
    follow_up_type: Option<String>,
    #[serde(default, rename = "needsDeepDive")]
    needs_deep_dive: bool,
    #[serde(default, rename = "previousTopic")]
    previous_topic: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Compare the current message against recent context. Infallible: a failed
/// call or unparseable reply is treated as "not a follow-up".
pub async fn analyze(
    semantic: &dyn SemanticClient,
    message: &str,
    context: Option<&str>,
) -> FollowUpAnalysis {
    let context = match context {
        Some(c) if c.trim().len() >= MIN_CONTEXT_CHARS => c,
        _ => {
            return FollowUpAnalysis {
                reasoning: "No conversation context available".to_string(),
                ..Default::default()
            }
        }
    };

    let prompt = build_follow_up_prompt(message, context);

    let reply = match semantic.complete(&prompt, 200).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Follow-up analysis call failed: {}", e);
            return FollowUpAnalysis {
                reasoning: "Analysis failed, treating as new conversation".to_string(),
                ..Default::default()
            };
        }
    };

    match parse_payload::<RawFollowUpPayload>(&reply) {
        Ok(raw) => FollowUpAnalysis {
            is_follow_up: raw.is_follow_up,
            follow_up_type: FollowUpType::parse(raw.follow_up_type.as_deref().unwrap_or("")),
            needs_deep_dive: raw.needs_deep_dive,
            previous_topic: raw.previous_topic.filter(|t| !t.is_empty()),
            reasoning: raw
                .reasoning
                .unwrap_or_else(|| "Follow-up analysis completed".to_string()),
        },
        Err(e) => {
            warn!("Follow-up reply unparseable: {}", e);
            FollowUpAnalysis {
                reasoning: "Parse error, treating as new conversation".to_string(),
                ..Default::default()
            }
        }
    }
}

fn build_follow_up_prompt(message: &str, context: &str) -> String {
    format!(
        "Analyze if this message is a follow-up to previous conversation:\n\n\
         Current Message: \"{message}\"\n\
         Recent Context: {context}\n\n\
         Determine:\n\
         1. Is this clearly a follow-up to something discussed before?\n\
         2. What type of follow-up is it?\n\
         3. Does it need deeper discussion?\n\
         4. What was the previous topic?\n\n\
         Respond in JSON format:\n\
         {{\n\
         \x20 \"isFollowUp\": boolean,\n\
         \x20 \"followUpType\": \"clarification|deeper_detail|implementation|problem_solving|none\",\n\
         \x20 \"needsDeepDive\": boolean,\n\
         \x20 \"previousTopic\": \"string or null\",\n\
         \x20 \"reasoning\": \"brief explanation\"\n\
         }}\n\n\
         Look for continuity patterns, pronouns referring to previous discussion, \
         and progressive depth.",
        context = tail_chars(context, CONTEXT_SLICE_CHARS),
    )
}
