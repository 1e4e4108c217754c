use async_trait::async_trait;

use crate::types::{Goal, PreferencePatch, UserPreferences};

/// Semantic text-understanding service — prompt in, free text out.
///
/// The reply is *expected* to contain a structured payload, but callers must
/// treat it as untrusted text and parse defensively (see [`crate::parsing`]).
/// Implementations apply a bounded timeout; they never retry.
#[async_trait]
pub trait SemanticClient: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> anyhow::Result<String>;
}

/// Narrow interface over the relational goal store, scoped by user id.
///
/// The store is an external transactional collaborator: every method is a
/// single operation and read-after-write ordering is the store's problem.
#[async_trait]
pub trait GoalStore: Send + Sync {
    async fn list_active_goals(&self, user_id: &str) -> anyhow::Result<Vec<Goal>>;
    async fn get_goal(&self, user_id: &str, goal_id: &str) -> anyhow::Result<Option<Goal>>;
    async fn insert_goal(&self, goal: &Goal) -> anyhow::Result<()>;
    async fn update_goal(&self, goal: &Goal) -> anyhow::Result<()>;
    /// Returns false when no goal with that id belongs to the user.
    async fn delete_goal(&self, user_id: &str, goal_id: &str) -> anyhow::Result<bool>;
    /// Marks the goal completed. Returns false when not found.
    async fn complete_goal(&self, user_id: &str, goal_id: &str) -> anyhow::Result<bool>;
}

/// Read/update access to per-user coaching preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Returns stored preferences, or defaults for a user with none.
    async fn get_preferences(&self, user_id: &str) -> anyhow::Result<UserPreferences>;
    async fn update_preferences(
        &self,
        user_id: &str,
        patch: &PreferencePatch,
    ) -> anyhow::Result<UserPreferences>;
}
