//! SQLite-backed goal and preference stores.
//!
//! One pool, idempotent migrations at connect time, single-operation calls —
//! transactional concerns live in the database, not here.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::info;

use crate::traits::{GoalStore, PreferenceStore};
use crate::types::{
    AccountabilityLevel, Goal, GoalStatus, GoalType, Persona, PreferencePatch, UserPreferences,
};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(db_path: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!(db_path, "SQLite store ready");
        Ok(store)
    }

    async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS goals (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                goal_type TEXT NOT NULL DEFAULT 'habit',
                frequency TEXT,
                target_value REAL,
                current_value REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'active',
                start_date TEXT NOT NULL,
                end_date TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_goals_user_status ON goals (user_id, status)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_preferences (
                user_id TEXT PRIMARY KEY,
                default_persona TEXT NOT NULL DEFAULT 'strict',
                accountability_level TEXT NOT NULL DEFAULT 'moderate',
                proactive_check_ins INTEGER NOT NULL DEFAULT 1,
                quiet_hours_start TEXT,
                quiet_hours_end TEXT,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn goal_from_row(row: &sqlx::sqlite::SqliteRow) -> Goal {
    Goal {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        description: row.get("description"),
        goal_type: GoalType::parse(&row.get::<String, _>("goal_type")),
        frequency: row.get("frequency"),
        target_value: row.get("target_value"),
        current_value: row.get("current_value"),
        status: GoalStatus::parse(&row.get::<String, _>("status")),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl GoalStore for SqliteStore {
    async fn list_active_goals(&self, user_id: &str) -> anyhow::Result<Vec<Goal>> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, description, goal_type, frequency, target_value,
             current_value, status, start_date, end_date, created_at, updated_at
             FROM goals WHERE user_id = ? AND status = 'active'
             ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(goal_from_row).collect())
    }

    async fn get_goal(&self, user_id: &str, goal_id: &str) -> anyhow::Result<Option<Goal>> {
        let row = sqlx::query(
            "SELECT id, user_id, title, description, goal_type, frequency, target_value,
             current_value, status, start_date, end_date, created_at, updated_at
             FROM goals WHERE id = ? AND user_id = ?",
        )
        .bind(goal_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(goal_from_row))
    }

    async fn insert_goal(&self, goal: &Goal) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO goals (
                id, user_id, title, description, goal_type, frequency, target_value,
                current_value, status, start_date, end_date, created_at, updated_at
             )
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&goal.id)
        .bind(&goal.user_id)
        .bind(&goal.title)
        .bind(&goal.description)
        .bind(goal.goal_type.as_str())
        .bind(&goal.frequency)
        .bind(goal.target_value)
        .bind(goal.current_value)
        .bind(goal.status.as_str())
        .bind(&goal.start_date)
        .bind(&goal.end_date)
        .bind(&goal.created_at)
        .bind(&goal.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_goal(&self, goal: &Goal) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE goals SET title = ?, description = ?, goal_type = ?, frequency = ?,
             target_value = ?, current_value = ?, status = ?, start_date = ?, end_date = ?,
             updated_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(&goal.title)
        .bind(&goal.description)
        .bind(goal.goal_type.as_str())
        .bind(&goal.frequency)
        .bind(goal.target_value)
        .bind(goal.current_value)
        .bind(goal.status.as_str())
        .bind(&goal.start_date)
        .bind(&goal.end_date)
        .bind(&goal.updated_at)
        .bind(&goal.id)
        .bind(&goal.user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_goal(&self, user_id: &str, goal_id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM goals WHERE id = ? AND user_id = ?")
            .bind(goal_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn complete_goal(&self, user_id: &str, goal_id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE goals SET status = 'completed', updated_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(goal_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PreferenceStore for SqliteStore {
    async fn get_preferences(&self, user_id: &str) -> anyhow::Result<UserPreferences> {
        let row = sqlx::query(
            "SELECT user_id, default_persona, accountability_level, proactive_check_ins,
             quiet_hours_start, quiet_hours_end
             FROM user_preferences WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => UserPreferences {
                user_id: row.get("user_id"),
                default_persona: Persona::parse(&row.get::<String, _>("default_persona"))
                    .unwrap_or_default(),
                accountability_level: AccountabilityLevel::parse(
                    &row.get::<String, _>("accountability_level"),
                ),
                proactive_check_ins: row.get::<i64, _>("proactive_check_ins") != 0,
                quiet_hours_start: row.get("quiet_hours_start"),
                quiet_hours_end: row.get("quiet_hours_end"),
            },
            None => UserPreferences::defaults(user_id),
        })
    }

    async fn update_preferences(
        &self,
        user_id: &str,
        patch: &PreferencePatch,
    ) -> anyhow::Result<UserPreferences> {
        let mut preferences = self.get_preferences(user_id).await?;

        if let Some(persona) = patch.default_persona {
            preferences.default_persona = persona;
        }
        if let Some(level) = patch.accountability_level {
            preferences.accountability_level = level;
        }
        if let Some(proactive) = patch.proactive_check_ins {
            preferences.proactive_check_ins = proactive;
        }
        if let Some(start) = patch.quiet_hours_start.clone() {
            preferences.quiet_hours_start = Some(start);
        }
        if let Some(end) = patch.quiet_hours_end.clone() {
            preferences.quiet_hours_end = Some(end);
        }

        sqlx::query(
            "INSERT OR REPLACE INTO user_preferences (
                user_id, default_persona, accountability_level, proactive_check_ins,
                quiet_hours_start, quiet_hours_end, updated_at
             )
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(preferences.default_persona.as_str())
        .bind(preferences.accountability_level.as_str())
        .bind(preferences.proactive_check_ins as i64)
        .bind(&preferences.quiet_hours_start)
        .bind(&preferences.quiet_hours_end)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(preferences)
    }
}
