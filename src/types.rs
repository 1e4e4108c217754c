use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Messaging surface a conversation arrives on.
///
/// The channel determines the outbound word budget: WhatsApp replies are
/// single-breath coaching lines, email can carry a short paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Whatsapp,
    Imessage,
    Telegram,
    Email,
    Api,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Whatsapp => "whatsapp",
            ChannelKind::Imessage => "imessage",
            ChannelKind::Telegram => "telegram",
            ChannelKind::Email => "email",
            ChannelKind::Api => "api",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "whatsapp" => Some(ChannelKind::Whatsapp),
            "imessage" => Some(ChannelKind::Imessage),
            "telegram" => Some(ChannelKind::Telegram),
            "email" => Some(ChannelKind::Email),
            "api" => Some(ChannelKind::Api),
            _ => None,
        }
    }

    /// Maximum outbound reply length, in words.
    pub fn word_budget(&self) -> usize {
        match self {
            ChannelKind::Whatsapp => 12,
            ChannelKind::Imessage => 24,
            ChannelKind::Telegram => 40,
            ChannelKind::Api => 60,
            ChannelKind::Email => 80,
        }
    }
}

/// Fixed voice profile applied to all outbound text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Direct, demanding accountability voice.
    #[default]
    Strict,
    /// Warm, celebratory support voice.
    Encouraging,
}

impl Persona {
    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Strict => "strict",
            Persona::Encouraging => "encouraging",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Some(Persona::Strict),
            "encouraging" => Some(Persona::Encouraging),
            _ => None,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Persona::Strict => "💪",
            Persona::Encouraging => "✨",
        }
    }

    /// Hard cap on persona reply length, independent of channel.
    pub fn word_cap(&self) -> usize {
        12
    }

    /// System prompt establishing the persona voice for candidate replies.
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Persona::Strict => {
                "You are a direct, no-excuses accountability coach. \
                 Respond in at most 12 words. Be action-oriented and specific. \
                 Use at most one emoji. Have a normal human conversation; only \
                 bring up goals when the user does."
            }
            Persona::Encouraging => {
                "You are a warm, celebratory support coach. \
                 Respond in at most 12 words. Be positive and specific. \
                 Use at most one emoji. Have a normal human conversation; only \
                 bring up goals when the user does."
            }
        }
    }
}

/// Kind of goal being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    #[default]
    Habit,
    Project,
    Calendar,
}

impl GoalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::Habit => "habit",
            GoalType::Project => "project",
            GoalType::Calendar => "calendar",
        }
    }

    /// Parse with coercion: unrecognized values fall back to `Habit`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "project" => GoalType::Project,
            "calendar" => GoalType::Calendar,
            _ => GoalType::Habit,
        }
    }
}

/// Lifecycle status of a goal. Transitions happen only through explicit tool
/// calls — never inferred from progress or dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Paused => "paused",
            GoalStatus::Completed => "completed",
            GoalStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "paused" => GoalStatus::Paused,
            "completed" => GoalStatus::Completed,
            "cancelled" => GoalStatus::Cancelled,
            _ => GoalStatus::Active,
        }
    }
}

/// A tracked goal, owned exclusively by its user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub goal_type: GoalType,
    /// Literal frequency text, e.g. "daily", "3x weekly".
    pub frequency: Option<String>,
    pub target_value: Option<f64>,
    pub current_value: f64,
    pub status: GoalStatus,
    /// YYYY-MM-DD
    pub start_date: String,
    /// YYYY-MM-DD, if the goal has a deadline
    pub end_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Goal {
    /// Create a new active habit goal starting today.
    pub fn new(user_id: &str, title: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let today = chrono::Utc::now().date_naive().to_string();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            description: None,
            goal_type: GoalType::Habit,
            frequency: Some("daily".to_string()),
            target_value: None,
            current_value: 0.0,
            status: GoalStatus::Active,
            start_date: today,
            end_date: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Percentage toward `target_value`, capped at 100. Zero when the goal
    /// has no numeric target.
    pub fn progress_percentage(&self) -> f64 {
        match self.target_value {
            Some(target) if target > 0.0 => ((self.current_value / target) * 100.0).min(100.0),
            _ => 0.0,
        }
    }

    /// Whole days since `start_date`. Unparseable dates count as zero.
    pub fn days_active(&self) -> i64 {
        NaiveDate::parse_from_str(&self.start_date, "%Y-%m-%d")
            .map(|start| (chrono::Utc::now().date_naive() - start).num_days().max(0))
            .unwrap_or(0)
    }
}

/// Coaching intensity preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountabilityLevel {
    Minimal,
    #[default]
    Moderate,
    Intensive,
}

impl AccountabilityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountabilityLevel::Minimal => "minimal",
            AccountabilityLevel::Moderate => "moderate",
            AccountabilityLevel::Intensive => "intensive",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "minimal" => AccountabilityLevel::Minimal,
            "intensive" => AccountabilityLevel::Intensive,
            _ => AccountabilityLevel::Moderate,
        }
    }
}

/// Per-user coaching preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: String,
    pub default_persona: Persona,
    pub accountability_level: AccountabilityLevel,
    pub proactive_check_ins: bool,
    /// HH:MM, start of the do-not-disturb window
    pub quiet_hours_start: Option<String>,
    /// HH:MM
    pub quiet_hours_end: Option<String>,
}

impl UserPreferences {
    pub fn defaults(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            default_persona: Persona::Strict,
            accountability_level: AccountabilityLevel::Moderate,
            proactive_check_ins: true,
            quiet_hours_start: None,
            quiet_hours_end: None,
        }
    }
}

/// Partial update of [`UserPreferences`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct PreferencePatch {
    pub default_persona: Option<Persona>,
    pub accountability_level: Option<AccountabilityLevel>,
    pub proactive_check_ins: Option<bool>,
    pub quiet_hours_start: Option<String>,
    pub quiet_hours_end: Option<String>,
}

impl PreferencePatch {
    pub fn is_empty(&self) -> bool {
        self.default_persona.is_none()
            && self.accountability_level.is_none()
            && self.proactive_check_ins.is_none()
            && self.quiet_hours_start.is_none()
            && self.quiet_hours_end.is_none()
    }

    /// Names of the fields this patch sets, for echoing back to the user.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.default_persona.is_some() {
            fields.push("default_persona");
        }
        if self.accountability_level.is_some() {
            fields.push("accountability_level");
        }
        if self.proactive_check_ins.is_some() {
            fields.push("proactive_check_ins");
        }
        if self.quiet_hours_start.is_some() {
            fields.push("quiet_hours_start");
        }
        if self.quiet_hours_end.is_some() {
            fields.push("quiet_hours_end");
        }
        fields
    }
}

/// The closed set of tools this subsystem can run.
///
/// Dispatch is by enum variant; a string only becomes a `ToolName` at the
/// boundary via [`ToolName::from_wire`], so every variant provably has a
/// handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ManageGoal,
    GetProgress,
    UpdatePreferences,
    EnhancedCoaching,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::ManageGoal => "manage_goal",
            ToolName::GetProgress => "get_progress",
            ToolName::UpdatePreferences => "update_preferences",
            ToolName::EnhancedCoaching => "enhanced_coaching",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "manage_goal" => Some(ToolName::ManageGoal),
            "get_progress" => Some(ToolName::GetProgress),
            "update_preferences" => Some(ToolName::UpdatePreferences),
            "enhanced_coaching" => Some(ToolName::EnhancedCoaching),
            _ => None,
        }
    }
}

/// One planned tool call. Lives only for the duration of a single message,
/// except as the source of a cache key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: ToolName,
    pub params: Map<String, Value>,
    pub user_id: String,
    pub channel: ChannelKind,
}

/// The always-present outcome of one invocation — produced on success,
/// validation failure, and execution failure alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: ToolName,
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub cached: bool,
    pub duration_ms: f64,
    pub channel: ChannelKind,
}

impl ToolResult {
    pub fn ok(invocation: &ToolInvocation, data: Value, duration_ms: f64) -> Self {
        Self {
            tool: invocation.tool,
            success: true,
            data: Some(data),
            error: None,
            cached: false,
            duration_ms,
            channel: invocation.channel,
        }
    }

    pub fn failed(invocation: &ToolInvocation, error: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            tool: invocation.tool,
            success: false,
            data: None,
            error: Some(error.into()),
            cached: false,
            duration_ms,
            channel: invocation.channel,
        }
    }
}
