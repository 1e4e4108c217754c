//! Response Formatter: renders tool results and a free-text candidate reply
//! into one bounded, persona-voiced outbound message.
//!
//! A candidate that fits the channel's word budget goes out verbatim (minus
//! wrapping quotes). Otherwise the highest-priority successful tool result
//! is rendered through a persona template; with nothing usable, a generic
//! in-persona line goes out. This function cannot fail.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::types::{ChannelKind, Persona, ToolName, ToolResult};

/// Fixed priority when the candidate is over budget: goal management first,
/// then coaching, progress, preferences.
const RESULT_PRIORITY: [ToolName; 4] = [
    ToolName::ManageGoal,
    ToolName::EnhancedCoaching,
    ToolName::GetProgress,
    ToolName::UpdatePreferences,
];

/// Bare greetings and acknowledgements that can skip the whole pipeline.
static SIMPLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^(hi|hey|hello|yo)[.!]*$",
        r"(?i)^(thanks|thank you|thx)[.!]*$",
        r"(?i)^(ok|okay|got it|cool)[.!]*$",
        r"(?i)^(yes|no|yeah|nah|yep|nope)[.!]*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("simple message pattern"))
    .collect()
});

#[derive(Debug, Clone, PartialEq)]
pub struct ReplyMetadata {
    pub tools_used: usize,
    pub tool_names: Vec<String>,
    pub success_rate: f64,
}

#[derive(Debug, Clone)]
pub struct FormattedReply {
    pub text: String,
    pub metadata: ReplyMetadata,
}

/// Trivially simple message — a latency shortcut, not a correctness gate.
pub fn is_simple_message(message: &str) -> bool {
    let trimmed = message.trim();
    SIMPLE_PATTERNS.iter().any(|p| p.is_match(trimmed))
}

pub fn format_response(
    results: &[ToolResult],
    candidate: &str,
    persona: Persona,
    channel: ChannelKind,
) -> FormattedReply {
    let metadata = build_metadata(results);
    let budget = channel.word_budget();

    let candidate = trim_wrapping_quotes(candidate.trim());
    if !candidate.is_empty() && word_count(candidate) <= budget {
        return FormattedReply {
            text: candidate.to_string(),
            metadata,
        };
    }

    // Candidate over budget (or empty): render the best tool result instead.
    for tool in RESULT_PRIORITY {
        if let Some(result) = results.iter().find(|r| r.tool == tool && r.success) {
            if let Some(text) = render_result(result, persona) {
                return FormattedReply {
                    text: enforce_word_cap(&text, budget),
                    metadata,
                };
            }
        }
    }

    // Nothing renderable. Failed tools get a short in-persona error line;
    // a toolless turn gets the generic fallback. Never empty, never raw.
    let text = if results.iter().any(|r| !r.success) {
        error_line(persona)
    } else {
        fallback_line(persona)
    };
    FormattedReply {
        text: text.to_string(),
        metadata,
    }
}

pub fn fallback_line(persona: Persona) -> &'static str {
    match persona {
        Persona::Strict => "Back to work. One small step, right now. 💪",
        Persona::Encouraging => "You're doing better than you think — keep going! ✨",
    }
}

fn error_line(persona: Persona) -> &'static str {
    match persona {
        Persona::Strict => "That didn't go through. Try once more. 💪",
        Persona::Encouraging => "Small hiccup! Nothing stops your momentum — try again! ✨",
    }
}

fn build_metadata(results: &[ToolResult]) -> ReplyMetadata {
    let tools_used = results.len();
    let success_rate = if results.is_empty() {
        1.0
    } else {
        results.iter().filter(|r| r.success).count() as f64 / results.len() as f64
    };
    ReplyMetadata {
        tools_used,
        tool_names: results.iter().map(|r| r.tool.as_str().to_string()).collect(),
        success_rate,
    }
}

/// Persona template for one successful result. `None` when the data shape
/// isn't recognized, letting a lower-priority result take over.
fn render_result(result: &ToolResult, persona: Persona) -> Option<String> {
    let data = result.data.as_ref()?;
    match result.tool {
        ToolName::ManageGoal => render_goal_result(data, persona),
        ToolName::EnhancedCoaching => render_coaching(data, persona),
        ToolName::GetProgress => render_progress(data, persona),
        ToolName::UpdatePreferences => render_preferences(data, persona),
    }
}

fn render_goal_result(data: &Value, persona: Persona) -> Option<String> {
    if truthy(data, "goal_created") {
        let title = goal_title(data);
        if truthy(data, "has_potential_conflicts") {
            if let Some(note) = data["conversational_message"].as_str() {
                return Some(match persona {
                    Persona::Strict => format!("Goal \"{}\" created — heads up: {} 💪", title, note),
                    Persona::Encouraging => format!("Goal \"{}\" created! Note: {} ✨", title, note),
                });
            }
        }
        return Some(match persona {
            Persona::Strict => format!("Goal \"{}\" created. Now execute daily! 💪", title),
            Persona::Encouraging => format!("Amazing! \"{}\" is on the board! ✨", title),
        });
    }

    if truthy(data, "goal_updated") {
        let title = goal_title(data);
        return Some(match persona {
            Persona::Strict => format!("\"{}\" updated. Stop talking, start doing! 🔥", title),
            Persona::Encouraging => format!("\"{}\" updated perfectly! Keep crushing it! 🌟", title),
        });
    }

    if truthy(data, "goal_deleted") {
        return Some(match persona {
            Persona::Strict => "Goal deleted. Focus on what matters! ⚡".to_string(),
            Persona::Encouraging => "Goal removed! Space for new dreams! 🚀".to_string(),
        });
    }

    if truthy(data, "goal_completed") {
        return Some(match persona {
            Persona::Strict => "Goal completed. Set the next one! 🔥".to_string(),
            Persona::Encouraging => "Goal completed — incredible work! Celebrate it! 🎉".to_string(),
        });
    }

    if let Some(goals) = data["goals"].as_array() {
        // conflict/amendment reports also carry arrays; check their markers first
        if data.get("conflicts").is_some() {
            return render_conflicts(data, persona);
        }
        let count = goals.len();
        if count == 0 {
            return Some(match persona {
                Persona::Strict => "No goals set. Create one NOW! 💪".to_string(),
                Persona::Encouraging => "Ready to set your first goal? Let's go! ✨".to_string(),
            });
        }
        let titles: Vec<&str> = goals
            .iter()
            .take(3)
            .filter_map(|g| g["title"].as_str())
            .collect();
        let titles = titles.join(", ");
        return Some(match persona {
            Persona::Strict => format!("{} goals: {}. Execute them! 🎯", count, titles),
            Persona::Encouraging => format!("{} amazing goals: {}! You rock! 🌟", count, titles),
        });
    }

    if data.get("conflicts").is_some() {
        return render_conflicts(data, persona);
    }
    if data.get("amendments").is_some() {
        return render_amendments(data, persona);
    }

    None
}

fn render_conflicts(data: &Value, persona: Persona) -> Option<String> {
    let conflicts = data["conflicts"].as_array()?;
    if conflicts.is_empty() {
        return Some(match persona {
            Persona::Strict => "No conflicts found. Execute your plan! 💪".to_string(),
            Persona::Encouraging => "All goals aligned perfectly! Amazing planning! ✨".to_string(),
        });
    }
    let count = conflicts.len();
    let first_kind = conflicts[0]["findings"]
        .as_array()
        .and_then(|f| f.first())
        .and_then(|f| f["type"].as_str())
        .unwrap_or("scheduling");
    Some(match persona {
        Persona::Strict => format!("{} conflicts detected. Priority: {}. Fix it! ⚡", count, first_kind),
        Persona::Encouraging => format!("{} conflicts found. Let's prioritize {}! 🎯", count, first_kind),
    })
}

fn render_amendments(data: &Value, persona: Persona) -> Option<String> {
    let amendments = data["amendments"].as_array()?;
    let suggestion_count: usize = amendments
        .iter()
        .filter_map(|a| a["suggestions"].as_array().map(|s| s.len()))
        .sum();
    if suggestion_count == 0 {
        return Some(match persona {
            Persona::Strict => "Goals optimized. Execute the plan! 💪".to_string(),
            Persona::Encouraging => "Goals are perfect! Keep going strong! ✨".to_string(),
        });
    }
    let first_kind = amendments
        .iter()
        .filter_map(|a| a["suggestions"].as_array())
        .flatten()
        .next()
        .and_then(|s| s["type"].as_str())
        .unwrap_or("optimization");
    Some(match persona {
        Persona::Strict => format!("{} improvements: {}. Apply now! ⚡", suggestion_count, first_kind),
        Persona::Encouraging => {
            format!("{} great suggestions: {}! Let's optimize! 🚀", suggestion_count, first_kind)
        }
    })
}

fn render_coaching(data: &Value, persona: Persona) -> Option<String> {
    let response = data["coaching_response"].as_str()?;
    Some(format!("{} {}", response, persona.emoji()))
}

fn render_progress(data: &Value, persona: Persona) -> Option<String> {
    if let Some(rate) = data["overall_completion_rate"].as_f64() {
        let rate = rate.round() as i64;
        return Some(match persona {
            Persona::Strict => format!("{}% complete. Push harder! 💪", rate),
            Persona::Encouraging => format!("Amazing {}% progress! Keep shining! ✨", rate),
        });
    }
    if let Some(pct) = data["progress_percentage"].as_f64() {
        let title = data["goal"]["title"].as_str().unwrap_or("Your goal");
        let pct = pct.round() as i64;
        return Some(match persona {
            Persona::Strict => format!("{}: {}% in. Keep the streak! 🔥", title, pct),
            Persona::Encouraging => format!("{}: {}% already! So proud! 🌟", title, pct),
        });
    }
    None
}

fn render_preferences(data: &Value, persona: Persona) -> Option<String> {
    if let Some(new_persona) = data["default_persona"].as_str() {
        return Some(match persona {
            Persona::Strict => format!("Voice switched to {}. Let's work! 💪", new_persona),
            Persona::Encouraging => format!("Voice switched to {}! Love the change! ✨", new_persona),
        });
    }
    if data.get("preferences").is_some() {
        return Some(match persona {
            Persona::Strict => "Preferences updated. Back to the goals! 💪".to_string(),
            Persona::Encouraging => "Preferences updated! All set for you! ✨".to_string(),
        });
    }
    None
}

fn truthy(data: &Value, key: &str) -> bool {
    data[key].as_bool().unwrap_or(false)
}

fn goal_title(data: &Value) -> &str {
    data["goal"]["title"].as_str().unwrap_or("New goal")
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Strip one pair of wrapping quotes the model sometimes adds.
fn trim_wrapping_quotes(s: &str) -> &str {
    let stripped = s
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| {
            s.strip_prefix('\u{201c}')
                .and_then(|rest| rest.strip_suffix('\u{201d}'))
        });
    stripped.unwrap_or(s)
}

/// Hard-truncate to the word budget, marking the cut with "!".
fn enforce_word_cap(s: &str, cap: usize) -> String {
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() <= cap {
        return s.to_string();
    }
    format!("{}!", words[..cap].join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelKind, ToolInvocation, ToolName};
    use serde_json::json;

    fn result(tool: ToolName, data: Value) -> ToolResult {
        let invocation = ToolInvocation {
            tool,
            params: Default::default(),
            user_id: "u1".to_string(),
            channel: ChannelKind::Whatsapp,
        };
        ToolResult::ok(&invocation, data, 1.0)
    }

    fn failed(tool: ToolName) -> ToolResult {
        let invocation = ToolInvocation {
            tool,
            params: Default::default(),
            user_id: "u1".to_string(),
            channel: ChannelKind::Whatsapp,
        };
        ToolResult::failed(&invocation, "boom", 1.0)
    }

    #[test]
    fn test_candidate_within_budget_used_verbatim() {
        let reply = format_response(&[], "On it. Let's move.", Persona::Strict, ChannelKind::Whatsapp);
        assert_eq!(reply.text, "On it. Let's move.");
        assert_eq!(reply.metadata.tools_used, 0);
    }

    #[test]
    fn test_wrapping_quotes_trimmed() {
        let reply = format_response(&[], "\"Keep going!\"", Persona::Strict, ChannelKind::Whatsapp);
        assert_eq!(reply.text, "Keep going!");
    }

    #[test]
    fn test_over_budget_candidate_falls_through_to_tool_template() {
        let long = "word ".repeat(30);
        let results = vec![result(
            ToolName::ManageGoal,
            json!({"goals": [{"title": "Run 5k daily"}], "count": 1}),
        )];
        let reply = format_response(&results, &long, Persona::Strict, ChannelKind::Whatsapp);
        assert!(reply.text.contains("Run 5k daily"));
    }

    #[test]
    fn test_list_template_includes_literal_titles() {
        let results = vec![result(
            ToolName::ManageGoal,
            json!({"goals": [
                {"title": "Run 5k daily"},
                {"title": "Read 30 pages"},
            ], "count": 2}),
        )];
        for persona in [Persona::Strict, Persona::Encouraging] {
            let reply = format_response(&results, "", persona, ChannelKind::Telegram);
            assert!(reply.text.contains("Run 5k daily"), "got: {}", reply.text);
            assert!(reply.text.contains("Read 30 pages"), "got: {}", reply.text);
        }
    }

    #[test]
    fn test_empty_goal_list_has_empty_state_line() {
        let results = vec![result(ToolName::ManageGoal, json!({"goals": [], "count": 0}))];
        let reply = format_response(&results, "", Persona::Strict, ChannelKind::Whatsapp);
        assert!(reply.text.contains("No goals"), "got: {}", reply.text);
    }

    #[test]
    fn test_priority_prefers_goal_management() {
        let results = vec![
            result(ToolName::GetProgress, json!({"overall_completion_rate": 50.0})),
            result(
                ToolName::ManageGoal,
                json!({"goal_created": true, "goal": {"title": "Swim"}}),
            ),
        ];
        let reply = format_response(&results, "", Persona::Strict, ChannelKind::Whatsapp);
        assert!(reply.text.contains("Swim"), "got: {}", reply.text);
    }

    #[test]
    fn test_personas_are_lexically_distinct() {
        let results = vec![result(
            ToolName::ManageGoal,
            json!({"goal_created": true, "goal": {"title": "Swim"}}),
        )];
        let strict = format_response(&results, "", Persona::Strict, ChannelKind::Whatsapp);
        let encouraging =
            format_response(&results, "", Persona::Encouraging, ChannelKind::Whatsapp);
        assert_ne!(strict.text, encouraging.text);
        assert!(strict.text.contains("💪") || strict.text.contains("🔥"));
        assert!(encouraging.text.contains("✨") || encouraging.text.contains("🌟"));
    }

    #[test]
    fn test_failed_results_get_in_persona_error_line() {
        let results = vec![failed(ToolName::ManageGoal)];
        let reply = format_response(&results, "", Persona::Strict, ChannelKind::Whatsapp);
        // never the raw error text
        assert!(!reply.text.contains("boom"));
        assert_eq!(reply.text, error_line(Persona::Strict));
        assert_eq!(reply.metadata.success_rate, 0.0);
    }

    #[test]
    fn test_no_results_no_candidate_gets_fallback() {
        for persona in [Persona::Strict, Persona::Encouraging] {
            let reply = format_response(&[], "", persona, ChannelKind::Whatsapp);
            assert_eq!(reply.text, fallback_line(persona));
            assert!(word_count(&reply.text) <= ChannelKind::Whatsapp.word_budget());
        }
    }

    #[test]
    fn test_metadata_counts() {
        let results = vec![
            result(ToolName::ManageGoal, json!({"goals": [], "count": 0})),
            failed(ToolName::GetProgress),
        ];
        let reply = format_response(&results, "short reply", Persona::Strict, ChannelKind::Api);
        assert_eq!(reply.metadata.tools_used, 2);
        assert_eq!(reply.metadata.tool_names, vec!["manage_goal", "get_progress"]);
        assert_eq!(reply.metadata.success_rate, 0.5);
    }

    #[test]
    fn test_conflict_report_rendering() {
        let results = vec![result(
            ToolName::ManageGoal,
            json!({
                "total_goals": 2,
                "conflict_pairs": 1,
                "conflicts": [{
                    "goal_a": {"id": "1", "title": "A"},
                    "goal_b": {"id": "2", "title": "B"},
                    "findings": [{"type": "time_overload", "severity": "medium",
                                  "description": "d", "conversational": "c"}]
                }],
                "goals": []
            }),
        )];
        let reply = format_response(&results, "", Persona::Strict, ChannelKind::Telegram);
        assert!(reply.text.contains("1 conflicts detected"), "got: {}", reply.text);
        assert!(reply.text.contains("time_overload"));
    }

    #[test]
    fn test_simple_message_detection() {
        assert!(is_simple_message("hey"));
        assert!(is_simple_message("  Thanks!  "));
        assert!(is_simple_message("OK"));
        assert!(!is_simple_message("hey, what are my goals?"));
        assert!(!is_simple_message("I feel like giving up"));
    }

    #[test]
    fn test_enforce_word_cap() {
        assert_eq!(enforce_word_cap("one two three", 5), "one two three");
        assert_eq!(enforce_word_cap("one two three four", 2), "one two!");
    }

    mod proptest_formatter {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn format_response_never_panics(candidate in "\\PC{0,300}") {
                let reply = format_response(&[], &candidate, Persona::Strict, ChannelKind::Whatsapp);
                prop_assert!(!reply.text.is_empty());
            }

            #[test]
            fn bounded_output_for_toolless_turns(candidate in "\\PC{0,300}") {
                let reply = format_response(&[], &candidate, Persona::Encouraging, ChannelKind::Whatsapp);
                // either the fitting candidate or the fallback — both bounded
                prop_assert!(word_count(&reply.text) <= ChannelKind::Whatsapp.word_budget());
            }
        }
    }
}
