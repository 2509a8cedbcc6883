//! Configuration loading, validation, and management for foliobot.
//!
//! Loads configuration from `~/.foliobot/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! This is process-level configuration (where to listen, which provider,
//! which database). The assistant's model and prompt are admin data and are
//! loaded per request from the config store instead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.foliobot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Deployment environment; `development` exposes error details
    #[serde(default)]
    pub environment: Environment,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// Orchestration limits
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Terminal client settings
    #[serde(default)]
    pub terminal: TerminalConfig,
}

fn default_provider() -> String {
    "openrouter".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("environment", &self.environment)
            .field("providers", &self.providers)
            .field("gateway", &self.gateway)
            .field("database", &self.database)
            .field("assistant", &self.assistant)
            .field("terminal", &self.terminal)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
    Test,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::ValidationError(format!(
                "environment must be development, production or test (got '{other}')"
            ))),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Maximum accepted request body
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Origins allowed by CORS; empty means same-origin only
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    42618
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit_bytes: default_body_limit(),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL for the portfolio database
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    format!(
        "sqlite://{}",
        AppConfig::config_dir().join("portfolio.db").display()
    )
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Model steps allowed in the retrieval phase
    #[serde(default = "default_max_retrieval_steps")]
    pub max_retrieval_steps: u32,

    /// Cap on retrieved tool text handed to the final-answer phase
    #[serde(default = "default_tool_context_char_limit")]
    pub tool_context_char_limit: usize,

    /// Row limit the retrieval tool uses when the model gives none
    #[serde(default = "default_row_limit")]
    pub default_row_limit: usize,
}

fn default_max_retrieval_steps() -> u32 {
    5
}
fn default_tool_context_char_limit() -> usize {
    12_000
}
fn default_row_limit() -> usize {
    5
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            max_retrieval_steps: default_max_retrieval_steps(),
            tool_context_char_limit: default_tool_context_char_limit(),
            default_row_limit: default_row_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Chat endpoint the terminal posts to
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Where the command history and AI conversation are persisted
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_endpoint() -> String {
    format!("http://{}:{}/api/chat", default_host(), default_port())
}
fn default_storage_dir() -> PathBuf {
    AppConfig::config_dir().join("terminal")
}
fn default_history_limit() -> usize {
    50
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            storage_dir: default_storage_dir(),
            history_limit: default_history_limit(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.foliobot/config.toml).
    ///
    /// Also checks environment variables:
    /// - `FOLIOBOT_API_KEY` (highest priority), `OPENROUTER_API_KEY`, `OPENAI_API_KEY`
    /// - `FOLIOBOT_PROVIDER`, `FOLIOBOT_ENV`, `FOLIOBOT_DATABASE_URL`, `FOLIOBOT_ENDPOINT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("FOLIOBOT_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("FOLIOBOT_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(env) = std::env::var("FOLIOBOT_ENV") {
            config.environment = env.parse()?;
        }

        if let Ok(url) = std::env::var("FOLIOBOT_DATABASE_URL") {
            config.database.url = url;
        }

        if let Ok(endpoint) = std::env::var("FOLIOBOT_ENDPOINT") {
            config.terminal.endpoint = endpoint;
        }

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

    pub fn config_dir() -> PathBuf {
        dirs_home().join(".foliobot")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.assistant.max_retrieval_steps == 0 {
            return Err(ConfigError::ValidationError(
                "assistant.max_retrieval_steps must be at least 1".into(),
            ));
        }

        if self.assistant.tool_context_char_limit == 0 {
            return Err(ConfigError::ValidationError(
                "assistant.tool_context_char_limit must be > 0".into(),
            ));
        }

        if self.terminal.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "terminal.history_limit must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            environment: Environment::default(),
            providers: HashMap::new(),
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            assistant: AssistantConfig::default(),
            terminal: TerminalConfig::default(),
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

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider, "openrouter");
        assert_eq!(config.gateway.port, 42618);
        assert_eq!(config.assistant.tool_context_char_limit, 12_000);
        assert_eq!(config.terminal.history_limit, 50);
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.database.url, config.database.url);
    }

    #[test]
    fn zero_retrieval_steps_rejected() {
        let mut config = AppConfig::default();
        config.assistant.max_retrieval_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "openrouter");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
environment = "development"

[gateway]
port = 9000

[assistant]
max_retrieval_steps = 3
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!(config.environment.is_development());
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.assistant.max_retrieval_steps, 3);
        assert_eq!(config.assistant.default_row_limit, 5);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "gateway = [not toml").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn environment_parsing() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn debug_output_redacts_keys() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
