//! Configuration loading from wanderai.toml.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// LLM provider configuration.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Amap configuration.
    #[serde(default)]
    pub maps: MapsConfig,

    /// Knowledge base configuration.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    /// DashScope API key. Falls back to the DASHSCOPE_API_KEY env var.
    pub api_key: Option<String>,

    /// Chat model.
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Model used for one-shot plan generation.
    #[serde(default = "default_plan_model")]
    pub plan_model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_chat_model(),
            plan_model: default_plan_model(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MapsConfig {
    /// Amap API key. Falls back to the AMAP_API_KEY env var.
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KnowledgeConfig {
    /// Path to the knowledge SQLite database.
    #[serde(default = "default_knowledge_path")]
    pub path: String,

    /// Embedding backend: "hash" (offline) or "dashscope".
    #[serde(default)]
    pub embedder: EmbedderKind,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: default_knowledge_path(),
            embedder: EmbedderKind::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    #[default]
    Hash,
    DashScope,
}

fn default_chat_model() -> String {
    agent::QWEN_TURBO.to_string()
}

fn default_plan_model() -> String {
    agent::QWEN_MAX.to_string()
}

fn default_knowledge_path() -> String {
    "wanderai_knowledge.db".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// The DashScope key from config, then environment.
    pub fn dashscope_key(&self) -> Option<String> {
        self.provider
            .api_key
            .clone()
            .or_else(|| std::env::var("DASHSCOPE_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }

    /// The Amap key from config, then environment.
    pub fn amap_key(&self) -> Option<String> {
        self.maps
            .api_key
            .clone()
            .or_else(|| std::env::var("AMAP_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.provider.model, "qwen-turbo");
        assert_eq!(config.provider.plan_model, "qwen-max");
        assert_eq!(config.knowledge.embedder, EmbedderKind::Hash);
        assert_eq!(config.knowledge.path, "wanderai_knowledge.db");
    }

    #[test]
    fn full_config_parses() {
        let config = Config::parse(
            r#"
            [provider]
            api_key = "sk-test"
            model = "qwen-plus"

            [maps]
            api_key = "amap-test"

            [knowledge]
            path = "/tmp/kb.db"
            embedder = "dashscope"
            "#,
        )
        .unwrap();
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.provider.model, "qwen-plus");
        assert_eq!(config.maps.api_key.as_deref(), Some("amap-test"));
        assert_eq!(config.knowledge.path, "/tmp/kb.db");
        assert_eq!(config.knowledge.embedder, EmbedderKind::DashScope);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        assert!(matches!(
            Config::parse("[provider"),
            Err(ConfigError::Parse(_))
        ));
    }
}
