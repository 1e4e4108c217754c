use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub coach: CoachConfig,
}

/// Connection settings for the semantic text-understanding service
/// (any OpenAI-compatible chat-completion endpoint).
#[derive(Debug, Deserialize, Clone)]
pub struct SemanticConfig {
    /// May be left empty in config.toml and supplied via COACHD_API_KEY.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "coachd.db".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoachConfig {
    /// Persona used when a user has no stored preference: "strict" or "encouraging".
    #[serde(default = "default_persona")]
    pub default_persona: String,
    /// Channel assumed by the local chat loop.
    #[serde(default = "default_channel")]
    pub default_channel: String,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            default_persona: default_persona(),
            default_channel: default_channel(),
        }
    }
}

fn default_persona() -> String {
    "strict".to_string()
}
fn default_channel() -> String {
    "api".to_string()
}

impl AppConfig {
    /// Load config.toml. A missing file yields all defaults; the API key
    /// falls back to the COACHD_API_KEY environment variable.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config: AppConfig = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            toml::from_str("")?
        };

        if config.semantic.api_key.is_empty() {
            if let Ok(key) = std::env::var("COACHD_API_KEY") {
                config.semantic.api_key = key;
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.semantic.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(config.semantic.timeout_secs, 10);
        assert_eq!(config.state.db_path, "coachd.db");
        assert_eq!(config.coach.default_persona, "strict");
    }

    #[test]
    fn test_partial_config_overrides() {
        let config: AppConfig = toml::from_str(
            r#"
            [semantic]
            api_key = "sk-test"
            model = "mixtral-8x7b"

            [coach]
            default_persona = "encouraging"
            "#,
        )
        .unwrap();
        assert_eq!(config.semantic.api_key, "sk-test");
        assert_eq!(config.semantic.model, "mixtral-8x7b");
        assert_eq!(config.coach.default_persona, "encouraging");
        // untouched sections keep defaults
        assert_eq!(config.state.db_path, "coachd.db");
    }
}
