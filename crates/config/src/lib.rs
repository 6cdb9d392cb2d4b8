//! Configuration loading, validation, and management for Memweave.
//!
//! Loads configuration from `~/.memweave/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.memweave/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default generation provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Model used by the knowledge synthesizer (falls back to `default_model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis_model: Option<String>,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Persona sent as the system instruction on every conversational call
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,

    /// Memory store configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Dispatch loop configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool sandbox configuration
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_system_instruction() -> String {
    "You are a helpful assistant with a perfect memory of past conversations. \
     Use the provided conversation history and your knowledge base to inform your \
     answers and maintain context. Be concise and helpful."
        .into()
}

/// Redact a secret for Debug output.
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
            .field("default_model", &self.default_model)
            .field("synthesis_model", &self.synthesis_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("system_instruction", &self.system_instruction)
            .field("memory", &self.memory)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Directory holding both store files
    #[serde(default = "default_memory_dir")]
    pub dir: PathBuf,

    /// Interaction journal file name (inside `dir`)
    #[serde(default = "default_journal_file")]
    pub journal_file: String,

    /// Knowledge base file name (inside `dir`)
    #[serde(default = "default_knowledge_file")]
    pub knowledge_file: String,

    /// How many recent exchanges are woven into each prompt
    #[serde(default = "default_recent_count")]
    pub recent_count: usize,

    /// Append blocked turns (with the apology as the answer) to the journal
    #[serde(default)]
    pub log_blocked_turns: bool,
}

fn default_memory_dir() -> PathBuf {
    AppConfig::config_dir().join("memory")
}
fn default_journal_file() -> String {
    "episodic_journal.json".into()
}
fn default_knowledge_file() -> String {
    "semantic_knowledge_base.json".into()
}
fn default_recent_count() -> usize {
    5
}

impl MemoryConfig {
    pub fn journal_path(&self) -> PathBuf {
        self.dir.join(&self.journal_file)
    }

    pub fn knowledge_path(&self) -> PathBuf {
        self.dir.join(&self.knowledge_file)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dir: default_memory_dir(),
            journal_file: default_journal_file(),
            knowledge_file: default_knowledge_file(),
            recent_count: default_recent_count(),
            log_blocked_turns: false,
        }
    }
}

/// How directives are located in generated text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveStrategy {
    /// First opener to the last matching closer in the text
    #[default]
    FirstLast,
    /// First opener to its depth-matched closer
    Balanced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum generation round trips per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default)]
    pub directive_strategy: DirectiveStrategy,
}

fn default_max_iterations() -> u32 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            directive_strategy: DirectiveStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// The only directory file tools may touch
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,
}

fn default_workspace_dir() -> PathBuf {
    AppConfig::config_dir().join("workspace")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workspace_dir: default_workspace_dir(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.memweave/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `MEMWEAVE_API_KEY` (highest priority)
    /// - `GEMINI_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("MEMWEAVE_API_KEY")
                .or_else(|| lookup("GEMINI_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("MEMWEAVE_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("MEMWEAVE_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".memweave")
    }

    /// The model the synthesizer should use.
    pub fn synthesis_model(&self) -> &str {
        self.synthesis_model.as_deref().unwrap_or(&self.default_model)
    }

    /// The API key for `provider`: its own entry first, then the global key.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.memory.journal_file == self.memory.knowledge_file {
            return Err(ConfigError::ValidationError(
                "memory.journal_file and memory.knowledge_file must differ".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available for the default provider.
    pub fn has_api_key(&self) -> bool {
        self.api_key_for(&self.default_provider).is_some()
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            synthesis_model: None,
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            system_instruction: default_system_instruction(),
            memory: MemoryConfig::default(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
            providers: HashMap::new(),
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
        assert_eq!(config.default_provider, "gemini");
        assert_eq!(config.memory.recent_count, 5);
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.agent.directive_strategy, DirectiveStrategy::FirstLast);
        assert!(!config.memory.log_blocked_turns);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.memory.dir, config.memory.dir);
        assert_eq!(parsed.agent.max_iterations, config.agent.max_iterations);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().default_provider, "gemini");
    }

    #[test]
    fn load_from_file_with_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_provider = "openai"
default_model = "gpt-4o-mini"

[memory]
dir = "/var/lib/memweave"
recent_count = 3
log_blocked_turns = true

[agent]
max_iterations = 4
directive_strategy = "balanced"

[providers.openai]
api_key = "sk-test"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.memory.recent_count, 3);
        assert!(config.memory.log_blocked_turns);
        assert_eq!(
            config.memory.journal_path(),
            PathBuf::from("/var/lib/memweave/episodic_journal.json")
        );
        assert_eq!(config.agent.max_iterations, 4);
        assert_eq!(config.agent.directive_strategy, DirectiveStrategy::Balanced);
        assert_eq!(config.api_key_for("openai").as_deref(), Some("sk-test"));
        assert!(config.has_api_key());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_provider = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_follow_priority() {
        let mut config = AppConfig::default();
        config.apply_env(|key| match key {
            "GEMINI_API_KEY" => Some("gemini-key".into()),
            "OPENAI_API_KEY" => Some("openai-key".into()),
            "MEMWEAVE_MODEL" => Some("gemini-2.0-flash".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("gemini-key"));
        assert_eq!(config.default_model, "gemini-2.0-flash");
        assert_eq!(config.default_provider, "gemini");
    }

    #[test]
    fn env_does_not_replace_configured_key() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(|_| Some("from-env".into()));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn synthesis_model_falls_back_to_default() {
        let mut config = AppConfig::default();
        assert_eq!(config.synthesis_model(), "gemini-1.5-flash");
        config.synthesis_model = Some("gemini-1.5-pro".into());
        assert_eq!(config.synthesis_model(), "gemini-1.5-pro");
    }

    #[test]
    fn debug_output_redacts_keys() {
        let config = AppConfig {
            api_key: Some("super-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini"));
        assert!(toml_str.contains("recent_count"));
    }
}
