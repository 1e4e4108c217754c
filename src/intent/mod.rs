//! Intent classification: one message in, a multi-dimensional descriptor out.
//!
//! The classifier delegates to the semantic service with a fixed prompt and
//! parses the reply defensively: unrecognized enum values coerce to safe
//! defaults, and a failed or unparseable call yields the all-false
//! surface/informational descriptor. Nothing here ever returns an error.

pub mod follow_up;
pub mod preference;

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::parsing::{parse_payload, tail_chars};
use crate::traits::SemanticClient;

use follow_up::{FollowUpAnalysis, FollowUpType};

/// How many trailing characters of conversation context go into the prompt.
const CONTEXT_SLICE_CHARS: usize = 500;

/// Subject area of the coaching request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Domain {
    Fitness,
    Learning,
    Productivity,
    Financial,
    Creative,
    Health,
    #[default]
    General,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Fitness => "fitness",
            Domain::Learning => "learning",
            Domain::Productivity => "productivity",
            Domain::Financial => "financial",
            Domain::Creative => "creative",
            Domain::Health => "health",
            Domain::General => "general",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "fitness" => Domain::Fitness,
            "learning" => Domain::Learning,
            "productivity" => Domain::Productivity,
            "financial" => Domain::Financial,
            "creative" => Domain::Creative,
            "health" => Domain::Health,
            _ => Domain::General,
        }
    }
}

/// How deep the response needs to go. Ordered: later variants are deeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DepthLevel {
    #[default]
    Surface,
    Detailed,
    Implementation,
    Strategic,
    Expert,
}

impl DepthLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepthLevel::Surface => "surface",
            DepthLevel::Detailed => "detailed",
            DepthLevel::Implementation => "implementation",
            DepthLevel::Strategic => "strategic",
            DepthLevel::Expert => "expert",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "detailed" => DepthLevel::Detailed,
            "implementation" => DepthLevel::Implementation,
            "strategic" => DepthLevel::Strategic,
            "expert" => DepthLevel::Expert,
            _ => DepthLevel::Surface,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoachingType {
    #[default]
    Informational,
    Motivational,
    Tactical,
    Strategic,
    Troubleshooting,
}

impl CoachingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoachingType::Informational => "informational",
            CoachingType::Motivational => "motivational",
            CoachingType::Tactical => "tactical",
            CoachingType::Strategic => "strategic",
            CoachingType::Troubleshooting => "troubleshooting",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "motivational" => CoachingType::Motivational,
            "tactical" => CoachingType::Tactical,
            "strategic" => CoachingType::Strategic,
            "troubleshooting" => CoachingType::Troubleshooting,
            _ => CoachingType::Informational,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowUpContext {
    #[default]
    Initial,
    Clarification,
    DeeperDetail,
    Implementation,
    ProblemSolving,
}

impl FollowUpContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowUpContext::Initial => "initial",
            FollowUpContext::Clarification => "clarification",
            FollowUpContext::DeeperDetail => "deeper_detail",
            FollowUpContext::Implementation => "implementation",
            FollowUpContext::ProblemSolving => "problem_solving",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "clarification" => FollowUpContext::Clarification,
            "deeper_detail" => FollowUpContext::DeeperDetail,
            "implementation" => FollowUpContext::Implementation,
            "problem_solving" => FollowUpContext::ProblemSolving,
            _ => FollowUpContext::Initial,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpecificityNeeded {
    High,
    #[default]
    Medium,
    Low,
}

impl SpecificityNeeded {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecificityNeeded::High => "high",
            SpecificityNeeded::Medium => "medium",
            SpecificityNeeded::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "high" => SpecificityNeeded::High,
            "low" => SpecificityNeeded::Low,
            _ => SpecificityNeeded::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationProgression {
    #[default]
    Start,
    Continue,
    DeepDive,
    SwitchingTopics,
    WrappingUp,
}

impl ConversationProgression {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationProgression::Start => "start",
            ConversationProgression::Continue => "continue",
            ConversationProgression::DeepDive => "deep_dive",
            ConversationProgression::SwitchingTopics => "switching_topics",
            ConversationProgression::WrappingUp => "wrapping_up",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "continue" => ConversationProgression::Continue,
            "deep_dive" => ConversationProgression::DeepDive,
            "switching_topics" => ConversationProgression::SwitchingTopics,
            "wrapping_up" => ConversationProgression::WrappingUp,
            _ => ConversationProgression::Start,
        }
    }
}

/// Concrete goal operation the user asked for, when there is one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalAction {
    Create,
    Update,
    List,
    Get,
    Delete,
    Complete,
}

impl GoalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalAction::Create => "create",
            GoalAction::Update => "update",
            GoalAction::List => "list",
            GoalAction::Get => "get",
            GoalAction::Delete => "delete",
            GoalAction::Complete => "complete",
        }
    }

    /// "none" and unknown values parse to `None` — no goal tool is emitted.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "create" => Some(GoalAction::Create),
            "update" => Some(GoalAction::Update),
            "list" => Some(GoalAction::List),
            "get" => Some(GoalAction::Get),
            "delete" => Some(GoalAction::Delete),
            "complete" => Some(GoalAction::Complete),
            _ => None,
        }
    }
}

/// Multi-dimensional classification of one message.
///
/// `Default` is the purely conversational descriptor: all requirement flags
/// false, surface depth, informational coaching — the Tool Coordinator plans
/// zero invocations for it.
#[derive(Debug, Clone, Default)]
pub struct IntentDescriptor {
    pub requires_goal_management: bool,
    pub requires_conflict_analysis: bool,
    pub requires_amendment_suggestion: bool,
    pub requires_progress_inquiry: bool,
    pub requires_preference_change: bool,
    pub domain: Domain,
    pub depth_level: DepthLevel,
    pub coaching_type: CoachingType,
    pub follow_up_context: FollowUpContext,
    pub specificity_needed: SpecificityNeeded,
    pub conversation_progression: ConversationProgression,
    pub unresolved_needs: Vec<String>,
    pub goal_action: Option<GoalAction>,
    pub reasoning: String,
}

impl IntentDescriptor {
    /// True when nothing about the message calls for a tool.
    pub fn is_purely_conversational(&self) -> bool {
        !self.requires_goal_management
            && !self.requires_conflict_analysis
            && !self.requires_amendment_suggestion
            && !self.requires_progress_inquiry
            && !self.requires_preference_change
            && self.depth_level == DepthLevel::Surface
            && self.coaching_type == CoachingType::Informational
            && self.unresolved_needs.is_empty()
    }
}

/// Wire shape of the classifier reply. Every field is optional so a sparse
/// or sloppy reply still deserializes; coercion happens afterwards.
#[derive(Debug, Deserialize, Default)]
struct RawIntentPayload {
    #[serde(default, rename = "requiresGoalManagement")]
    requires_goal_management: bool,
    #[serde(default, rename = "requiresConflictAnalysis")]
    requires_conflict_analysis: bool,
    #[serde(default, rename = "requiresAmendmentSuggestion")]
    requires_amendment_suggestion: bool,
    #[serde(default, rename = "requiresProgressInquiry")]
    requires_progress_inquiry: bool,
    #[serde(default, rename = "requiresPreferenceChange")]
    requires_preference_change: bool,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    depth_level: Option<String>,
    #[serde(default)]
    coaching_type: Option<String>,
    #[serde(default)]
    follow_up_context: Option<String>,
    #[serde(default)]
    specificity_needed: Option<String>,
    #[serde(default)]
    conversation_progression: Option<String>,
    #[serde(default)]
    unresolved_needs: Option<Vec<String>>,
    #[serde(default, rename = "goalAction")]
    goal_action: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

impl RawIntentPayload {
    fn coerce(self) -> IntentDescriptor {
        IntentDescriptor {
            requires_goal_management: self.requires_goal_management,
            requires_conflict_analysis: self.requires_conflict_analysis,
            requires_amendment_suggestion: self.requires_amendment_suggestion,
            requires_progress_inquiry: self.requires_progress_inquiry,
            requires_preference_change: self.requires_preference_change,
            domain: Domain::parse(self.domain.as_deref().unwrap_or("")),
            depth_level: DepthLevel::parse(self.depth_level.as_deref().unwrap_or("")),
            coaching_type: CoachingType::parse(self.coaching_type.as_deref().unwrap_or("")),
            follow_up_context: FollowUpContext::parse(
                self.follow_up_context.as_deref().unwrap_or(""),
            ),
            specificity_needed: SpecificityNeeded::parse(
                self.specificity_needed.as_deref().unwrap_or(""),
            ),
            conversation_progression: ConversationProgression::parse(
                self.conversation_progression.as_deref().unwrap_or(""),
            ),
            unresolved_needs: self.unresolved_needs.unwrap_or_default(),
            // absent defaults to a list; an explicit "none" (or junk) means
            // the classifier ruled out a concrete goal operation
            goal_action: match self.goal_action.as_deref() {
                None => Some(GoalAction::List),
                Some(s) => GoalAction::parse(s),
            },
            reasoning: self
                .reasoning
                .unwrap_or_else(|| "Intent analysis completed".to_string()),
        }
    }
}

/// Primary intent classifier plus follow-up escalation.
pub struct IntentClassifier {
    semantic: Arc<dyn SemanticClient>,
}

impl IntentClassifier {
    pub fn new(semantic: Arc<dyn SemanticClient>) -> Self {
        Self { semantic }
    }

    /// Classify a message, then escalate depth/coaching dimensions when the
    /// follow-up sub-classifier flags a deep dive on prior context.
    /// Infallible: every failure path degrades to the default descriptor.
    pub async fn analyze(&self, message: &str, context: Option<&str>) -> IntentDescriptor {
        let (mut descriptor, follow_up) = tokio::join!(
            self.classify(message, context),
            follow_up::analyze(self.semantic.as_ref(), message, context),
        );
        apply_follow_up(&mut descriptor, &follow_up);
        descriptor
    }

    /// One classifier call, defensively parsed.
    pub async fn classify(&self, message: &str, context: Option<&str>) -> IntentDescriptor {
        let prompt = build_intent_prompt(message, context);

        let reply = match self.semantic.complete(&prompt, 300).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Intent classification call failed: {}", e);
                return IntentDescriptor::default();
            }
        };

        match parse_payload::<RawIntentPayload>(&reply) {
            Ok(raw) => {
                let descriptor = raw.coerce();
                debug!(
                    goal_management = descriptor.requires_goal_management,
                    domain = descriptor.domain.as_str(),
                    depth = descriptor.depth_level.as_str(),
                    "Classified intent"
                );
                descriptor
            }
            Err(e) => {
                warn!("Intent reply unparseable, using default descriptor: {}", e);
                IntentDescriptor::default()
            }
        }
    }
}

/// A positive deep-dive result pushes the primary descriptor toward
/// implementation-depth tactical coaching.
fn apply_follow_up(descriptor: &mut IntentDescriptor, follow_up: &FollowUpAnalysis) {
    if !follow_up.needs_deep_dive {
        return;
    }
    if descriptor.depth_level < DepthLevel::Implementation {
        descriptor.depth_level = DepthLevel::Implementation;
    }
    descriptor.coaching_type = CoachingType::Tactical;
    descriptor.follow_up_context = match follow_up.follow_up_type {
        FollowUpType::Clarification => FollowUpContext::Clarification,
        FollowUpType::DeeperDetail => FollowUpContext::DeeperDetail,
        FollowUpType::Implementation => FollowUpContext::Implementation,
        FollowUpType::ProblemSolving => FollowUpContext::ProblemSolving,
        FollowUpType::None => descriptor.follow_up_context,
    };
}

fn build_intent_prompt(message: &str, context: Option<&str>) -> String {
    let context_line = context
        .filter(|c| !c.trim().is_empty())
        .map(|c| format!("Context: {}\n", tail_chars(c, CONTEXT_SLICE_CHARS)))
        .unwrap_or_default();

    format!(
        "Analyze this user message for coaching intent and requirements:\n\n\
         Message: \"{message}\"\n\
         {context_line}\n\
         Determine the following dimensions and respond in JSON format:\n\n\
         {{\n\
         \x20 \"requiresGoalManagement\": boolean,\n\
         \x20 \"requiresConflictAnalysis\": boolean,\n\
         \x20 \"requiresAmendmentSuggestion\": boolean,\n\
         \x20 \"requiresProgressInquiry\": boolean,\n\
         \x20 \"requiresPreferenceChange\": boolean,\n\
         \x20 \"domain\": \"fitness|learning|productivity|financial|creative|health|general\",\n\
         \x20 \"depth_level\": \"surface|detailed|implementation|strategic|expert\",\n\
         \x20 \"coaching_type\": \"informational|motivational|tactical|strategic|troubleshooting\",\n\
         \x20 \"follow_up_context\": \"initial|clarification|deeper_detail|implementation|problem_solving\",\n\
         \x20 \"specificity_needed\": \"high|medium|low\",\n\
         \x20 \"conversation_progression\": \"start|continue|deep_dive|switching_topics|wrapping_up\",\n\
         \x20 \"unresolved_needs\": [\"string array of identified needs\"],\n\
         \x20 \"goalAction\": \"create|update|list|get|delete|complete|none\",\n\
         \x20 \"reasoning\": \"brief explanation\"\n\
         }}\n\n\
         Focus on semantic understanding of intent, not keyword matching."
    )
}
