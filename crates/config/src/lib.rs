//! Configuration loading, validation, and management for Jarvis.
//!
//! Loads configuration from `~/.jarvis/config.toml` with environment
//! variable overrides. Validates all settings at startup. Secrets are
//! handed to providers and tools at construction time; the engine itself
//! never reads them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.jarvis/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Persona configuration
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Prompt budget and history limits
    #[serde(default)]
    pub context: ContextConfig,

    /// Tool invocation settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Long-term memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.8
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_true() -> bool {
    true
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
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("persona", &self.persona)
            .field("context", &self.context)
            .field("tools", &self.tools)
            .field("memory", &self.memory)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
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
pub struct PersonaConfig {
    #[serde(default = "default_persona_name")]
    pub name: String,

    /// How the assistant addresses the user
    #[serde(default = "default_persona_title")]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<String>,

    /// Preface tool results with an in-character acknowledgement
    #[serde(default = "default_true")]
    pub acknowledge_actions: bool,
}

fn default_persona_name() -> String {
    "J.A.R.V.I.S.".into()
}
fn default_persona_title() -> String {
    "Sir".into()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: default_persona_name(),
            title: default_persona_title(),
            system_prompt_override: None,
            prompt_file: None,
            acknowledge_actions: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Token budget for the assembled prompt
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Turns kept in a session's history before the oldest are evicted
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

fn default_token_budget() -> usize {
    4096
}
fn default_max_history_turns() -> usize {
    40
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            max_history_turns: default_max_history_turns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Per-call timeout in seconds
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    /// Tools left out of the registry
    #[serde(default)]
    pub disabled: Vec<String>,

    /// Ask the model to phrase successful tool results
    #[serde(default = "default_true")]
    pub narrate_results: bool,

    #[serde(default = "default_search_url")]
    pub search_url: String,

    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,

    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
}

fn default_tool_timeout() -> u64 {
    15
}
fn default_search_url() -> String {
    "https://api.duckduckgo.com/".into()
}
fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".into()
}
fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".into()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
            disabled: Vec::new(),
            narrate_results: true,
            search_url: default_search_url(),
            geocoding_url: default_geocoding_url(),
            forecast_url: default_forecast_url(),
        }
    }
}

impl ToolsConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        !self.disabled.iter().any(|d| d == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// JSONL file; defaults to `~/.jarvis/memory/memories.jsonl`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Memories recalled into the prompt at session start
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,
}

fn default_recall_limit() -> usize {
    10
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            recall_limit: default_recall_limit(),
        }
    }
}

impl MemoryConfig {
    /// The memory file path, resolving the default location.
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(p) => PathBuf::from(p),
            None => AppConfig::config_dir().join("memory").join("memories.jsonl"),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.jarvis/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `JARVIS_API_KEY` (highest priority)
    /// - `OPENAI_API_KEY`
    /// - `OPENROUTER_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
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

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("JARVIS_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("JARVIS_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("JARVIS_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".jarvis")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.context.token_budget == 0 {
            return Err(ConfigError::ValidationError(
                "context.token_budget must be > 0".into(),
            ));
        }

        if self.context.max_history_turns == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_history_turns must be > 0".into(),
            ));
        }

        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tools.timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some() || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// Whether the default provider is a local server that takes no key.
    pub fn is_local_provider(&self) -> bool {
        matches!(self.default_provider.as_str(), "ollama" | "llamacpp" | "llama.cpp")
    }

    /// Generate a default config TOML string (for `onboard` command).
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
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            persona: PersonaConfig::default(),
            context: ContextConfig::default(),
            tools: ToolsConfig::default(),
            memory: MemoryConfig::default(),
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
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.persona.title, "Sir");
        assert_eq!(config.tools.timeout_secs, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.context.token_budget, config.context.token_budget);
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
    fn zero_timeout_rejected() {
        let mut config = AppConfig::default();
        config.tools.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "openai");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_model = "gpt-4o"

[persona]
title = "Madam"

[tools]
disabled = ["weather"]
timeout_secs = 5
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_model, "gpt-4o");
        assert_eq!(config.persona.title, "Madam");
        assert_eq!(config.persona.name, "J.A.R.V.I.S.");
        assert!(!config.tools.is_enabled("weather"));
        assert!(config.tools.is_enabled("search_web"));
        assert_eq!(config.context.max_history_turns, 40);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_model = [").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn debug_redacts_api_keys() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.providers.insert("openai".into(), ProviderConfig {
            api_key: Some("sk-other".into()),
            api_url: None,
        });
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("sk-other"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn local_providers_are_recognised() {
        let config = AppConfig {
            default_provider: "ollama".into(),
            ..AppConfig::default()
        };
        assert!(config.is_local_provider());
        assert!(!AppConfig::default().is_local_provider());
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("[persona]"));
    }

    #[test]
    fn memory_path_defaults_under_config_dir() {
        let memory = MemoryConfig::default();
        assert!(memory.resolved_path().ends_with("memory/memories.jsonl"));
    }
}
