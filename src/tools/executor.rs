//! Tool Executor: validates, consults the cache, dispatches by variant, and
//! converts every failure into a `ToolResult`. Nothing escapes — a panic-free
//! boundary between planning and the tool implementations.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde_json::Value;
use tracing::{info, warn};

use crate::tools::cache::ResultCache;
use crate::tools::{coaching, manage_goal, preferences, progress, validate_parameters};
use crate::traits::{GoalStore, PreferenceStore, SemanticClient};
use crate::types::{ToolInvocation, ToolName, ToolResult};

pub struct ToolExecutor {
    goals: Arc<dyn GoalStore>,
    prefs: Arc<dyn PreferenceStore>,
    semantic: Arc<dyn SemanticClient>,
    cache: ResultCache,
}

impl ToolExecutor {
    pub fn new(
        goals: Arc<dyn GoalStore>,
        prefs: Arc<dyn PreferenceStore>,
        semantic: Arc<dyn SemanticClient>,
    ) -> Self {
        Self {
            goals,
            prefs,
            semantic,
            cache: ResultCache::new(),
        }
    }

    /// Run one invocation. Always returns a result:
    /// schema violations and implementation errors become failed results
    /// with the elapsed time intact.
    pub async fn execute(&self, invocation: &ToolInvocation) -> ToolResult {
        let started = Instant::now();
        let spec = invocation.tool.spec();

        if let Some(violation) = validate_parameters(&invocation.params, spec) {
            warn!(
                tool = invocation.tool.as_str(),
                user_id = %invocation.user_id,
                violation,
                "Invocation rejected by schema validation"
            );
            return ToolResult::failed(invocation, violation, elapsed_ms(started));
        }

        let cache_key = ResultCache::key(invocation);
        if spec.cache_ttl.is_some() {
            if let Some(hit) = self.cache.get(&cache_key).await {
                info!(tool = invocation.tool.as_str(), "Cache hit");
                return hit;
            }
        }

        info!(
            tool = invocation.tool.as_str(),
            user_id = %invocation.user_id,
            "Executing tool"
        );
        match self.dispatch(invocation).await {
            Ok(data) => {
                let result = ToolResult::ok(invocation, data, elapsed_ms(started));
                if let Some(ttl) = spec.cache_ttl.filter(|ttl| *ttl > 0) {
                    self.cache.put(cache_key, &result, ttl).await;
                }
                result
            }
            Err(e) => {
                warn!(
                    tool = invocation.tool.as_str(),
                    user_id = %invocation.user_id,
                    "Tool execution failed: {}",
                    e
                );
                ToolResult::failed(invocation, e.to_string(), elapsed_ms(started))
            }
        }
    }

    /// Run a message's invocations concurrently and independently — one
    /// failure never cancels another.
    pub async fn execute_all(&self, invocations: &[ToolInvocation]) -> Vec<ToolResult> {
        join_all(invocations.iter().map(|inv| self.execute(inv))).await
    }

    /// Variant dispatch — every `ToolName` has exactly one arm.
    async fn dispatch(&self, invocation: &ToolInvocation) -> anyhow::Result<Value> {
        match invocation.tool {
            ToolName::ManageGoal => {
                manage_goal::run(&self.goals, &self.semantic, invocation).await
            }
            ToolName::GetProgress => progress::run(&self.goals, invocation).await,
            ToolName::UpdatePreferences => preferences::run(&self.prefs, invocation).await,
            ToolName::EnhancedCoaching => {
                coaching::run(&self.goals, &self.semantic, invocation).await
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
