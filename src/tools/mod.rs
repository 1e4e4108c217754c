//! Tool declarations: per-tool parameter schemas and cache ttls, plus the
//! schema validation the executor runs before any implementation is touched.

pub mod cache;
pub mod coaching;
pub mod executor;
pub mod manage_goal;
pub mod preferences;
pub mod progress;

use serde_json::{Map, Value};

use crate::types::ToolName;

pub use executor::ToolExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    Array,
}

/// One declared parameter: presence, type, and enum membership are checked
/// before execution; `default` documents the value implied by absence.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    /// Non-empty for enum-valued string parameters.
    pub allowed: &'static [&'static str],
    pub default: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: ToolName,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    /// Result cache time-to-live in seconds. `None` = never cached.
    pub cache_ttl: Option<u64>,
}

const fn param(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: false,
        allowed: &[],
        default: None,
    }
}

pub const MANAGE_GOAL_ACTIONS: &[&str] = &[
    "create",
    "update",
    "list",
    "get",
    "delete",
    "complete",
    "analyze_conflicts",
    "suggest_amendments",
];

static MANAGE_GOAL_SPEC: ToolSpec = ToolSpec {
    name: ToolName::ManageGoal,
    description: "Create, update, or retrieve user goals for accountability coaching",
    cache_ttl: None, // goal operations mutate state
    params: &[
        ParamSpec {
            name: "action",
            kind: ParamKind::String,
            required: true,
            allowed: MANAGE_GOAL_ACTIONS,
            default: None,
        },
        param("goal_id", ParamKind::String),
        param("goal_reference", ParamKind::String),
        param("title", ParamKind::String),
        param("description", ParamKind::String),
        ParamSpec {
            name: "goal_type",
            kind: ParamKind::String,
            required: false,
            allowed: &["habit", "project", "calendar"],
            default: Some("habit"),
        },
        param("frequency", ParamKind::String),
        param("target_value", ParamKind::Number),
        param("current_value", ParamKind::Number),
        param("start_date", ParamKind::String),
        param("end_date", ParamKind::String),
        param("retitle_hint", ParamKind::String),
        param("changes", ParamKind::String),
        ParamSpec {
            name: "check_conflicts",
            kind: ParamKind::Boolean,
            required: false,
            allowed: &[],
            default: Some("true"),
        },
    ],
};

static GET_PROGRESS_SPEC: ToolSpec = ToolSpec {
    name: ToolName::GetProgress,
    description: "Summarize goal progress for coaching check-ins",
    cache_ttl: Some(300),
    params: &[
        ParamSpec {
            name: "time_period",
            kind: ParamKind::String,
            required: false,
            allowed: &["today", "week", "month", "all"],
            default: Some("week"),
        },
        param("goal_id", ParamKind::String),
        param("goal_reference", ParamKind::String),
    ],
};

static UPDATE_PREFERENCES_SPEC: ToolSpec = ToolSpec {
    name: ToolName::UpdatePreferences,
    description: "Update accountability and coaching preferences",
    cache_ttl: None, // immediate effect
    params: &[
        ParamSpec {
            name: "default_persona",
            kind: ParamKind::String,
            required: false,
            allowed: &["strict", "encouraging"],
            default: None,
        },
        ParamSpec {
            name: "accountability_level",
            kind: ParamKind::String,
            required: false,
            allowed: &["minimal", "moderate", "intensive"],
            default: None,
        },
        param("proactive_check_ins", ParamKind::Boolean),
        param("quiet_hours_start", ParamKind::String),
        param("quiet_hours_end", ParamKind::String),
    ],
};

static ENHANCED_COACHING_SPEC: ToolSpec = ToolSpec {
    name: ToolName::EnhancedCoaching,
    description: "Expert coaching response driven by the full intent descriptor",
    cache_ttl: None, // personalized, never cached
    params: &[
        ParamSpec {
            name: "message",
            kind: ParamKind::String,
            required: true,
            allowed: &[],
            default: None,
        },
        ParamSpec {
            name: "domain",
            kind: ParamKind::String,
            required: true,
            allowed: &[
                "fitness",
                "learning",
                "productivity",
                "financial",
                "creative",
                "health",
                "general",
            ],
            default: None,
        },
        ParamSpec {
            name: "depth_level",
            kind: ParamKind::String,
            required: true,
            allowed: &["surface", "detailed", "implementation", "strategic", "expert"],
            default: None,
        },
        ParamSpec {
            name: "coaching_type",
            kind: ParamKind::String,
            required: true,
            allowed: &[
                "informational",
                "motivational",
                "tactical",
                "strategic",
                "troubleshooting",
            ],
            default: None,
        },
        ParamSpec {
            name: "follow_up_context",
            kind: ParamKind::String,
            required: true,
            allowed: &[
                "initial",
                "clarification",
                "deeper_detail",
                "implementation",
                "problem_solving",
            ],
            default: None,
        },
        ParamSpec {
            name: "specificity_needed",
            kind: ParamKind::String,
            required: true,
            allowed: &["high", "medium", "low"],
            default: None,
        },
        ParamSpec {
            name: "conversation_progression",
            kind: ParamKind::String,
            required: true,
            allowed: &["start", "continue", "deep_dive", "switching_topics", "wrapping_up"],
            default: None,
        },
        param("unresolved_needs", ParamKind::Array),
    ],
};

impl ToolName {
    pub fn spec(&self) -> &'static ToolSpec {
        match self {
            ToolName::ManageGoal => &MANAGE_GOAL_SPEC,
            ToolName::GetProgress => &GET_PROGRESS_SPEC,
            ToolName::UpdatePreferences => &UPDATE_PREFERENCES_SPEC,
            ToolName::EnhancedCoaching => &ENHANCED_COACHING_SPEC,
        }
    }
}

/// Validate parameters against a tool's schema. Returns the first violation
/// as user-readable text, or `None` when the invocation is well-formed.
/// `null` values count as absent; unknown parameters are ignored.
pub fn validate_parameters(params: &Map<String, Value>, spec: &ToolSpec) -> Option<String> {
    for param in spec.params {
        let value = params.get(param.name).filter(|v| !v.is_null());

        let Some(value) = value else {
            if param.required {
                return Some(format!("Missing required parameter: {}", param.name));
            }
            continue;
        };

        let type_ok = match param.kind {
            ParamKind::String => value.is_string(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Array => value.is_array(),
        };
        if !type_ok {
            return Some(format!(
                "Invalid type for {}: expected {}",
                param.name,
                match param.kind {
                    ParamKind::String => "string",
                    ParamKind::Number => "number",
                    ParamKind::Boolean => "boolean",
                    ParamKind::Array => "array",
                }
            ));
        }

        if !param.allowed.is_empty() {
            let s = value.as_str().unwrap_or("");
            if !param.allowed.contains(&s) {
                return Some(format!(
                    "Invalid value for {}. Must be one of: {}",
                    param.name,
                    param.allowed.join(", ")
                ));
            }
        }
    }
    None
}
