//! Amendment suggestions: turn detected conflicts into concrete remediation
//! options per goal. Clean goals are reported explicitly as optimized so
//! callers can tell "analyzed, nothing to fix" from "never analyzed".

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::types::Goal;

use super::{ConflictAnalyzer, ConflictFinding, ConflictKind, GoalRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Consolidation,
    ScopeReduction,
    FrequencyAdjustment,
    ResourceOptimization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmendmentSuggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub description: String,
    pub reasoning: String,
}

/// A conflict finding paired with the goal it was found against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairedFinding {
    pub with_goal: GoalRef,
    pub finding: ConflictFinding,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalAmendments {
    pub goal: GoalRef,
    /// True when the goal was analyzed and came back clean.
    pub optimized: bool,
    pub conflicts: Vec<PairedFinding>,
    pub suggestions: Vec<AmendmentSuggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmendmentReport {
    pub goals_analyzed: usize,
    pub goals_with_conflicts: usize,
    pub amendments: Vec<GoalAmendments>,
}

pub struct AmendmentSuggester {
    analyzer: ConflictAnalyzer,
}

impl AmendmentSuggester {
    pub fn new(analyzer: ConflictAnalyzer) -> Self {
        Self { analyzer }
    }

    /// Suggest amendments for one goal (by id) or for the whole active set.
    pub async fn suggest(&self, goals: &[Goal], target_goal_id: Option<&str>) -> AmendmentReport {
        let targets: Vec<&Goal> = match target_goal_id {
            Some(id) => goals.iter().filter(|g| g.id == id).collect(),
            None => goals.iter().collect(),
        };

        let per_goal = join_all(targets.iter().map(|target| async move {
            let pair_results = join_all(
                goals
                    .iter()
                    .filter(|other| other.id != target.id)
                    .map(|other| async move {
                        let findings = self.analyzer.analyze_pair(target, other).await;
                        (GoalRef::from(other), findings)
                    }),
            )
            .await;

            let mut conflicts = Vec::new();
            for (with_goal, findings) in pair_results {
                for finding in findings {
                    conflicts.push(PairedFinding {
                        with_goal: with_goal.clone(),
                        finding,
                    });
                }
            }

            let suggestions = suggestions_for(&conflicts);
            GoalAmendments {
                goal: GoalRef::from(*target),
                optimized: conflicts.is_empty(),
                conflicts,
                suggestions,
            }
        }))
        .await;

        AmendmentReport {
            goals_analyzed: per_goal.len(),
            goals_with_conflicts: per_goal.iter().filter(|a| !a.optimized).count(),
            amendments: per_goal,
        }
    }
}

/// Map conflict kinds to remediation suggestions, one per kind.
fn suggestions_for(conflicts: &[PairedFinding]) -> Vec<AmendmentSuggestion> {
    let mut kinds: Vec<ConflictKind> = conflicts.iter().map(|c| c.finding.kind).collect();
    kinds.sort_by_key(|k| *k as u8);
    kinds.dedup();

    kinds
        .into_iter()
        .map(|kind| match kind {
            ConflictKind::DuplicateActivity => AmendmentSuggestion {
                kind: SuggestionKind::Consolidation,
                description: "Combine the overlapping goals into a single goal".to_string(),
                reasoning: "Improves focus and reduces goal fragmentation".to_string(),
            },
            ConflictKind::TimeOverload => AmendmentSuggestion {
                kind: SuggestionKind::ScopeReduction,
                description: "Reduce the goal's scope or target to fit your day".to_string(),
                reasoning: "Keeps progress sustainable and prevents burnout".to_string(),
            },
            ConflictKind::ResourceContradiction => AmendmentSuggestion {
                kind: SuggestionKind::ResourceOptimization,
                description: "Stagger or share the contested budget, space, or equipment"
                    .to_string(),
                reasoning: "Stops the goals from competing for the same scarce resource"
                    .to_string(),
            },
            ConflictKind::LifestyleContradiction => AmendmentSuggestion {
                kind: SuggestionKind::FrequencyAdjustment,
                description: "Adjust frequency or time of day for one of the goals".to_string(),
                reasoning: "Separates activities that pull your routine in opposite directions"
                    .to_string(),
            },
        })
        .collect()
}
