//! Pairwise goal-conflict analysis.
//!
//! Every unordered pair of active goals is checked on four axes, each a
//! separate semantic call. A failed call degrades only that axis to "no
//! conflict" — an outage makes the analyzer quieter, never broken.

pub mod amendments;

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::parsing::parse_payload;
use crate::traits::SemanticClient;
use crate::types::Goal;

/// Overlap percentage above which two goals count as the same activity.
const DUPLICATE_OVERLAP_THRESHOLD: f64 = 70.0;
/// Combined daily minutes above which a pair is a time overload (3 hours).
const DAILY_OVERLOAD_MINUTES: f64 = 180.0;
/// Assumed daily minutes when estimation fails or returns nothing.
const DEFAULT_ESTIMATE_MINUTES: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    DuplicateActivity,
    TimeOverload,
    ResourceContradiction,
    LifestyleContradiction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "medium" => Severity::Medium,
            "high" => Severity::High,
            _ => Severity::Low,
        }
    }
}

/// One detected incompatibility between two goals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictFinding {
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub severity: Severity,
    pub description: String,
    /// User-friendly phrasing for the formatter.
    pub conversational: String,
}

/// Lightweight goal handle carried in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalRef {
    pub id: String,
    pub title: String,
}

impl From<&Goal> for GoalRef {
    fn from(goal: &Goal) -> Self {
        Self {
            id: goal.id.clone(),
            title: goal.title.clone(),
        }
    }
}

/// All findings for one goal pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub goal_a: GoalRef,
    pub goal_b: GoalRef,
    pub findings: Vec<ConflictFinding>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConflictSummary {
    pub duplicate_activity: usize,
    pub time_overload: usize,
    pub resource_contradiction: usize,
    pub lifestyle_contradiction: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictReport {
    pub total_goals: usize,
    pub conflict_pairs: usize,
    pub conflicts: Vec<ConflictRecord>,
    pub summary: ConflictSummary,
    pub recommendations: Vec<String>,
}

// Wire payloads for the per-axis semantic calls.

#[derive(Debug, Deserialize, Default)]
struct DuplicatePayload {
    #[serde(default)]
    is_duplicate: bool,
    #[serde(default)]
    overlap_percentage: f64,
    #[serde(default)]
    #[allow(dead_code)]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TimeEstimatePayload {
    #[serde(default)]
    daily_minutes: f64,
}

#[derive(Debug, Deserialize, Default)]
struct ResourcePayload {
    #[serde(default)]
    has_conflict: bool,
    #[serde(default)]
    #[allow(dead_code)]
    conflict_type: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    severity: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LifestylePayload {
    #[serde(default)]
    has_contradiction: bool,
    #[serde(default)]
    #[allow(dead_code)]
    contradiction_type: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    conversational: Option<String>,
    #[serde(default)]
    severity: Option<String>,
}

pub struct ConflictAnalyzer {
    semantic: Arc<dyn SemanticClient>,
}

impl ConflictAnalyzer {
    pub fn new(semantic: Arc<dyn SemanticClient>) -> Self {
        Self { semantic }
    }

    /// Analyze every unordered pair in the active goal set. Pairs run
    /// concurrently; within a pair the four axis checks run concurrently.
    pub async fn analyze(&self, goals: &[Goal]) -> ConflictReport {
        let mut pair_futures = Vec::new();
        for i in 0..goals.len() {
            for j in (i + 1)..goals.len() {
                let (a, b) = (&goals[i], &goals[j]);
                pair_futures.push(async move {
                    let findings = self.analyze_pair(a, b).await;
                    (GoalRef::from(a), GoalRef::from(b), findings)
                });
            }
        }

        let mut conflicts = Vec::new();
        let mut summary = ConflictSummary::default();
        for (goal_a, goal_b, findings) in join_all(pair_futures).await {
            if findings.is_empty() {
                continue;
            }
            for finding in &findings {
                match finding.kind {
                    ConflictKind::DuplicateActivity => summary.duplicate_activity += 1,
                    ConflictKind::TimeOverload => summary.time_overload += 1,
                    ConflictKind::ResourceContradiction => summary.resource_contradiction += 1,
                    ConflictKind::LifestyleContradiction => summary.lifestyle_contradiction += 1,
                }
            }
            conflicts.push(ConflictRecord {
                goal_a,
                goal_b,
                findings,
            });
        }

        let recommendations = build_recommendations(&conflicts);
        ConflictReport {
            total_goals: goals.len(),
            conflict_pairs: conflicts.len(),
            conflicts,
            summary,
            recommendations,
        }
    }

    /// All findings for one pair. Used by `analyze`, by create-time conflict
    /// notes, and by the amendment suggester.
    pub async fn analyze_pair(&self, a: &Goal, b: &Goal) -> Vec<ConflictFinding> {
        let (duplicate, time, resource, lifestyle) = tokio::join!(
            self.check_duplicate(a, b),
            self.check_time_overload(a, b),
            self.check_resource(a, b),
            self.check_lifestyle(a, b),
        );

        [duplicate, time, resource, lifestyle]
            .into_iter()
            .flatten()
            .collect()
    }

    async fn check_duplicate(&self, a: &Goal, b: &Goal) -> Option<ConflictFinding> {
        let prompt = format!(
            "Analyze if these two goals have duplicate or overlapping activities:\n\n\
             Goal 1: \"{}\" ({})\n\
             Goal 2: \"{}\" ({})\n\n\
             Are these goals essentially the same activity or highly overlapping? \
             Respond in JSON:\n\
             {{\n\
             \x20 \"is_duplicate\": boolean,\n\
             \x20 \"overlap_percentage\": number (0-100),\n\
             \x20 \"reasoning\": \"brief explanation\"\n\
             }}\n\n\
             Use semantic understanding, not keyword matching.",
            a.title,
            describe(a),
            b.title,
            describe(b),
        );

        let payload: DuplicatePayload = self.call_axis("duplicate_activity", &prompt, 150).await?;
        if payload.is_duplicate && payload.overlap_percentage > DUPLICATE_OVERLAP_THRESHOLD {
            Some(ConflictFinding {
                kind: ConflictKind::DuplicateActivity,
                severity: Severity::High,
                description: "Goals appear to target the same or very similar activities"
                    .to_string(),
                conversational: "These goals seem to overlap significantly in their activities."
                    .to_string(),
            })
        } else {
            None
        }
    }

    async fn check_time_overload(&self, a: &Goal, b: &Goal) -> Option<ConflictFinding> {
        let (minutes_a, minutes_b) = tokio::join!(
            self.estimate_daily_minutes(a),
            self.estimate_daily_minutes(b),
        );
        let total_hours = (minutes_a + minutes_b) / 60.0;

        if total_hours * 60.0 > DAILY_OVERLOAD_MINUTES {
            Some(ConflictFinding {
                kind: ConflictKind::TimeOverload,
                severity: Severity::Medium,
                description: format!(
                    "Combined goals require {:.1} hours daily",
                    total_hours
                ),
                conversational: format!(
                    "These goals together might require {:.1} hours per day. That could be overwhelming.",
                    total_hours
                ),
            })
        } else {
            None
        }
    }

    /// Realistic daily time cost of one goal in minutes: a semantic estimate
    /// scaled by the literal frequency multiplier.
    async fn estimate_daily_minutes(&self, goal: &Goal) -> f64 {
        let prompt = format!(
            "Estimate the time requirement for this goal:\n\n\
             Goal: \"{}\"\n\
             Description: \"{}\"\n\
             Frequency: \"{}\"\n\n\
             What is the realistic time commitment per session in minutes? Respond in JSON:\n\
             {{\n\
             \x20 \"daily_minutes\": number,\n\
             \x20 \"reasoning\": \"brief explanation\"\n\
             }}\n\n\
             Use semantic understanding of the activity, not keyword lists.",
            goal.title,
            goal.description.as_deref().unwrap_or("no description"),
            goal.frequency.as_deref().unwrap_or("not specified"),
        );

        let base = match self
            .call_axis::<TimeEstimatePayload>("time_estimate", &prompt, 150)
            .await
        {
            Some(payload) if payload.daily_minutes > 0.0 => payload.daily_minutes,
            _ => DEFAULT_ESTIMATE_MINUTES,
        };
        base * frequency_multiplier(goal.frequency.as_deref())
    }

    async fn check_resource(&self, a: &Goal, b: &Goal) -> Option<ConflictFinding> {
        let prompt = format!(
            "Analyze if these goals have resource conflicts:\n\n\
             Goal 1: \"{}\" ({})\n\
             Goal 2: \"{}\" ({})\n\n\
             Do these goals conflict in terms of:\n\
             - Money/budget resources\n\
             - Physical space/location requirements\n\
             - Equipment/tools needed\n\n\
             Respond in JSON:\n\
             {{\n\
             \x20 \"has_conflict\": boolean,\n\
             \x20 \"conflict_type\": \"financial|spatial|equipment|none\",\n\
             \x20 \"reason\": \"specific explanation of the conflict\",\n\
             \x20 \"severity\": \"low|medium|high\"\n\
             }}\n\n\
             Use semantic understanding, not keyword matching.",
            a.title,
            describe(a),
            b.title,
            describe(b),
        );

        let payload: ResourcePayload = self.call_axis("resource_contradiction", &prompt, 200).await?;
        let severity = Severity::parse(payload.severity.as_deref().unwrap_or(""));
        if payload.has_conflict && severity >= Severity::Medium {
            let reason = payload
                .reason
                .unwrap_or_else(|| "Goals compete for the same scarce resource".to_string());
            Some(ConflictFinding {
                kind: ConflictKind::ResourceContradiction,
                severity,
                description: reason.clone(),
                conversational: reason,
            })
        } else {
            None
        }
    }

    async fn check_lifestyle(&self, a: &Goal, b: &Goal) -> Option<ConflictFinding> {
        let prompt = format!(
            "Analyze if these goals have lifestyle contradictions:\n\n\
             Goal 1: \"{}\" ({})\n\
             Goal 2: \"{}\" ({})\n\n\
             Check for lifestyle conflicts:\n\
             - Social vs solitary preferences (group vs individual activities)\n\
             - Time preferences (morning person vs night person activities)\n\
             - Energy patterns (high energy vs low energy activities)\n\
             - Location preferences (home vs outdoor vs gym vs office)\n\
             - Personality contradictions (competitive vs meditative)\n\n\
             Respond in JSON:\n\
             {{\n\
             \x20 \"has_contradiction\": boolean,\n\
             \x20 \"contradiction_type\": \"social_preference|time_preference|energy_pattern|location|personality|none\",\n\
             \x20 \"reason\": \"specific explanation of the contradiction\",\n\
             \x20 \"conversational\": \"user-friendly explanation with question\",\n\
             \x20 \"severity\": \"low|medium|high\"\n\
             }}\n\n\
             Use semantic understanding, not keyword matching.",
            a.title,
            describe(a),
            b.title,
            describe(b),
        );

        let payload: LifestylePayload = self.call_axis("lifestyle_contradiction", &prompt, 200).await?;
        let severity = Severity::parse(payload.severity.as_deref().unwrap_or(""));
        if payload.has_contradiction && severity >= Severity::Medium {
            let reason = payload
                .reason
                .unwrap_or_else(|| "Goals pull the user's routine in opposite directions".to_string());
            Some(ConflictFinding {
                kind: ConflictKind::LifestyleContradiction,
                severity,
                description: reason.clone(),
                conversational: payload.conversational.unwrap_or(reason),
            })
        } else {
            None
        }
    }

    /// One axis call: semantic complete + defensive parse. `None` on any
    /// failure — the caller treats it as "no conflict on this axis".
    async fn call_axis<T: serde::de::DeserializeOwned>(
        &self,
        axis: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Option<T> {
        let reply = match self.semantic.complete(prompt, max_tokens).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(axis, "Conflict axis call failed, degrading to no-conflict: {}", e);
                return None;
            }
        };
        match parse_payload::<T>(&reply) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(axis, "Conflict axis reply unparseable: {}", e);
                None
            }
        }
    }
}

fn describe(goal: &Goal) -> &str {
    goal.description.as_deref().unwrap_or("no description")
}

/// Session count per day implied by literal frequency text.
/// Mathematical, not semantic — the text is a closed vocabulary.
pub fn frequency_multiplier(frequency: Option<&str>) -> f64 {
    let Some(freq) = frequency else { return 1.0 };
    let freq = freq.to_lowercase();
    if freq.contains("twice") {
        2.0
    } else if freq.contains('3') || freq.contains("three") {
        3.0
    } else if freq.contains('4') || freq.contains("four") {
        4.0
    } else if freq.contains('5') || freq.contains("five") {
        5.0
    } else {
        // "daily", "weekly", unrecognized — one session per day at most
        1.0
    }
}

fn build_recommendations(conflicts: &[ConflictRecord]) -> Vec<String> {
    if conflicts.is_empty() {
        return vec!["No conflicts detected - your goals are well aligned".to_string()];
    }
    let mut recommendations = Vec::new();
    if conflicts.len() > 3 {
        recommendations.push(
            "Consider focusing on 2-3 primary goals and treating the others as secondary"
                .to_string(),
        );
    }
    if conflicts
        .iter()
        .any(|c| c.findings.iter().any(|f| f.kind == ConflictKind::TimeOverload))
    {
        recommendations
            .push("Your schedule is the tightest constraint - stagger the heavier goals".to_string());
    }
    if conflicts
        .iter()
        .any(|c| c.findings.iter().any(|f| f.kind == ConflictKind::DuplicateActivity))
    {
        recommendations.push("Merge goals that track the same activity".to_string());
    }
    recommendations.truncate(3);
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSemanticClient;
    use crate::types::Goal;

    fn goal(title: &str, frequency: &str) -> Goal {
        let mut g = Goal::new("u1", title);
        g.frequency = Some(frequency.to_string());
        g
    }

    #[test]
    fn test_frequency_multiplier() {
        assert_eq!(frequency_multiplier(Some("daily")), 1.0);
        assert_eq!(frequency_multiplier(Some("twice weekly")), 2.0);
        assert_eq!(frequency_multiplier(Some("3x per week")), 3.0);
        assert_eq!(frequency_multiplier(Some("four times a week")), 4.0);
        assert_eq!(frequency_multiplier(Some("5 days")), 5.0);
        assert_eq!(frequency_multiplier(None), 1.0);
    }

    #[tokio::test]
    async fn test_duplicate_detected_above_threshold() {
        let mock = MockSemanticClient::with_rules(vec![
            (
                "overlapping activities",
                r#"{"is_duplicate": true, "overlap_percentage": 85}"#,
            ),
            ("time requirement", r#"{"daily_minutes": 20}"#),
            ("resource conflicts", r#"{"has_conflict": false}"#),
            ("lifestyle contradictions", r#"{"has_contradiction": false}"#),
        ]);
        let analyzer = ConflictAnalyzer::new(Arc::new(mock));
        let findings = analyzer
            .analyze_pair(
                &goal("Run 5k daily", "daily"),
                &goal("Run 3 miles every morning", "daily"),
            )
            .await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, ConflictKind::DuplicateActivity);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn test_duplicate_below_threshold_ignored() {
        let mock = MockSemanticClient::with_rules(vec![
            (
                "overlapping activities",
                r#"{"is_duplicate": true, "overlap_percentage": 55}"#,
            ),
            ("time requirement", r#"{"daily_minutes": 10}"#),
            ("resource conflicts", r#"{"has_conflict": false}"#),
            ("lifestyle contradictions", r#"{"has_contradiction": false}"#),
        ]);
        let analyzer = ConflictAnalyzer::new(Arc::new(mock));
        let findings = analyzer
            .analyze_pair(&goal("Run", "daily"), &goal("Jog", "daily"))
            .await;
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn test_time_overload_over_three_hours() {
        let mock = MockSemanticClient::with_rules(vec![
            ("overlapping activities", r#"{"is_duplicate": false}"#),
            ("Study 3 hours nightly", r#"{"daily_minutes": 180}"#),
            ("Workout 2 hours nightly", r#"{"daily_minutes": 120}"#),
            ("resource conflicts", r#"{"has_conflict": false}"#),
            ("lifestyle contradictions", r#"{"has_contradiction": false}"#),
        ]);
        let analyzer = ConflictAnalyzer::new(Arc::new(mock));
        let findings = analyzer
            .analyze_pair(
                &goal("Study 3 hours nightly", "daily"),
                &goal("Workout 2 hours nightly", "daily"),
            )
            .await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, ConflictKind::TimeOverload);
        assert!(findings[0].description.contains("5.0 hours"));
    }

    #[tokio::test]
    async fn test_low_severity_resource_conflict_gated() {
        let mock = MockSemanticClient::with_rules(vec![
            ("overlapping activities", r#"{"is_duplicate": false}"#),
            ("time requirement", r#"{"daily_minutes": 15}"#),
            (
                "resource conflicts",
                r#"{"has_conflict": true, "conflict_type": "financial", "reason": "both cost money", "severity": "low"}"#,
            ),
            ("lifestyle contradictions", r#"{"has_contradiction": false}"#),
        ]);
        let analyzer = ConflictAnalyzer::new(Arc::new(mock));
        let findings = analyzer
            .analyze_pair(&goal("Gym membership", "daily"), &goal("Piano lessons", "weekly"))
            .await;
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn test_semantic_outage_degrades_to_no_conflicts() {
        let analyzer = ConflictAnalyzer::new(Arc::new(MockSemanticClient::failing()));
        let goals = vec![goal("Run", "daily"), goal("Swim", "daily")];
        let report = analyzer.analyze(&goals).await;
        assert_eq!(report.conflict_pairs, 0);
        assert_eq!(report.total_goals, 2);
        assert_eq!(
            report.recommendations,
            vec!["No conflicts detected - your goals are well aligned".to_string()]
        );
    }

    #[tokio::test]
    async fn test_report_summary_counts() {
        let mock = MockSemanticClient::with_rules(vec![
            (
                "overlapping activities",
                r#"{"is_duplicate": true, "overlap_percentage": 90}"#,
            ),
            ("time requirement", r#"{"daily_minutes": 120}"#),
            ("resource conflicts", r#"{"has_conflict": false}"#),
            ("lifestyle contradictions", r#"{"has_contradiction": false}"#),
        ]);
        let analyzer = ConflictAnalyzer::new(Arc::new(mock));
        let goals = vec![goal("Run 5k", "daily"), goal("Run 3 miles", "daily")];
        let report = analyzer.analyze(&goals).await;
        assert_eq!(report.conflict_pairs, 1);
        assert_eq!(report.summary.duplicate_activity, 1);
        assert_eq!(report.summary.time_overload, 1); // 120 + 120 > 180
    }

    #[tokio::test]
    async fn test_analyze_is_idempotent_with_deterministic_classifier() {
        let rules = vec![
            (
                "overlapping activities",
                r#"{"is_duplicate": true, "overlap_percentage": 80}"#,
            ),
            ("time requirement", r#"{"daily_minutes": 30}"#),
            ("resource conflicts", r#"{"has_conflict": false}"#),
            ("lifestyle contradictions", r#"{"has_contradiction": false}"#),
        ];
        let analyzer = ConflictAnalyzer::new(Arc::new(MockSemanticClient::with_rules(rules.clone())));
        let goals = vec![goal("Read daily", "daily"), goal("Read nightly", "daily")];

        let first = analyzer.analyze(&goals).await;
        let second = analyzer.analyze(&goals).await;
        assert_eq!(first.conflict_pairs, second.conflict_pairs);
        assert_eq!(first.summary, second.summary);
        assert_eq!(first.recommendations, second.recommendations);
    }
}
