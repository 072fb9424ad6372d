//! Configuration loading and validation for Acontext.
//!
//! Loads configuration from `~/.acontext/config.toml`, then applies
//! environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.acontext/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion service API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible completion endpoint
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,

    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    #[serde(default = "default_llm_temperature")]
    pub llm_temperature: f32,

    /// "json" for JSON log lines, anything else for compact text
    #[serde(default = "default_logging_format")]
    pub logging_format: String,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_database_pool_size")]
    pub database_pool_size: u32,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_llm_model() -> String {
    "gpt-4.1".into()
}
fn default_llm_temperature() -> f32 {
    0.2
}
fn default_logging_format() -> String {
    "text".into()
}
fn default_database_url() -> String {
    format!(
        "sqlite://{}",
        AppConfig::config_dir().join("acontext.db").display()
    )
}
fn default_database_pool_size() -> u32 {
    8
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let api_key = match self.llm_api_key {
            Some(_) => "[REDACTED]",
            None => "None",
        };
        f.debug_struct("AppConfig")
            .field("llm_api_key", &api_key)
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("llm_temperature", &self.llm_temperature)
            .field("logging_format", &self.logging_format)
            .field("database_url", &self.database_url)
            .field("database_pool_size", &self.database_pool_size)
            .field("agent", &self.agent)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on dispatch passes per `process` call
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    3
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.acontext/config.toml).
    ///
    /// Environment variables named after the upper-cased field override the
    /// file: `LLM_API_KEY`, `LLM_BASE_URL`, `LLM_MODEL`, `LOGGING_FORMAT`,
    /// `DATABASE_URL`.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("LLM_API_KEY") {
            self.llm_api_key = Some(key);
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            self.llm_base_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm_model = model;
        }
        if let Some(format) = lookup("LOGGING_FORMAT") {
            self.logging_format = format;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".acontext")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm_temperature) {
            return Err(ConfigError::ValidationError(
                "llm_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.database_pool_size == 0 {
            return Err(ConfigError::ValidationError(
                "database_pool_size must be at least 1".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Whether a non-blank API key is set.
    pub fn has_api_key(&self) -> bool {
        self.llm_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    pub fn json_logs(&self) -> bool {
        self.logging_format.eq_ignore_ascii_case("json")
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm_api_key: None,
            llm_base_url: default_llm_base_url(),
            llm_model: default_llm_model(),
            llm_temperature: default_llm_temperature(),
            logging_format: default_logging_format(),
            database_url: default_database_url(),
            database_pool_size: default_database_pool_size(),
            agent: AgentConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.llm_model, "gpt-4.1");
        assert_eq!(config.agent.max_iterations, 3);
        assert!(config.database_url.ends_with("acontext.db"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.llm_base_url, config.llm_base_url);
        assert_eq!(parsed.agent.max_iterations, config.agent.max_iterations);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            llm_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = AppConfig {
            agent: AgentConfig { max_iterations: 0 },
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.llm_base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
llm_model = "gpt-4o-mini"
logging_format = "json"

[agent]
max_iterations = 5
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.llm_model, "gpt-4o-mini");
        assert!(config.json_logs());
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.database_pool_size, 8);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "llm_temperature = \"warm\"").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn environment_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("LLM_API_KEY", "sk-test"),
            ("LLM_MODEL", "gpt-4o"),
            ("DATABASE_URL", "sqlite::memory:"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert!(config.has_api_key());
        assert_eq!(config.llm_model, "gpt-4o");
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.logging_format, "text");
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            llm_api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4.1"));
        assert!(toml_str.contains("max_iterations = 3"));
    }
}
