//! Configuration loading, validation, and management for Joi.
//!
//! Loads configuration from `~/.joi/config.toml` (or `$JOI_HOME/config.toml`)
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Provider selectors with built-in adapters.
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "gemini"];

/// The root configuration structure.
///
/// Maps directly to `~/.joi/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model selector used when a chat doesn't name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Maximum consecutive tool rounds in a single user turn
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// Stream model output fragment by fragment
    #[serde(default = "default_true")]
    pub streaming: bool,

    /// Replaces the built-in system prompt entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations, keyed by selector
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_model() -> String {
    "openai".into()
}
fn default_max_tool_rounds() -> usize {
    15
}
fn default_true() -> bool {
    true
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
            .field("default_model", &self.default_model)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("streaming", &self.streaming)
            .field(
                "system_prompt_override",
                &self.system_prompt_override.as_ref().map(|p| p.len()),
            )
            .field("gateway", &self.gateway)
            .field("providers", &self.providers)
            .field("tools", &self.tools)
            .finish()
    }
}

/// Settings for one model provider.
///
/// Unset sampling fields fall back to the adapter's own defaults.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ProviderConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("top_k", &self.top_k)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed by the CORS layer
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5174".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Sandbox root for the filesystem tools (default `~/Desktop/ai_workspace`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_dir: Option<PathBuf>,

    /// Register the `app` tool
    #[serde(default = "default_true")]
    pub enable_app_launcher: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workspace_dir: None,
            enable_app_launcher: true,
        }
    }
}

impl ToolsConfig {
    /// The effective workspace directory.
    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace_dir
            .clone()
            .unwrap_or_else(|| dirs_home().join("Desktop").join("ai_workspace"))
    }
}

impl AppConfig {
    /// Load configuration from the default path (`~/.joi/config.toml`).
    ///
    /// Environment variables take precedence over the file:
    /// - `OPENAI_API_KEY`, `OPENAI_API_BASE`
    /// - `GEMINI_API_KEY`
    /// - `JOI_MODEL`, `JOI_MAX_TOOL_ROUNDS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
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

    /// Apply overrides from an environment lookup (`std::env::var` in production).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.provider_mut("openai").api_key = Some(key);
        }
        if let Some(url) = non_empty("OPENAI_API_BASE") {
            self.provider_mut("openai").api_url = Some(url);
        }
        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.provider_mut("gemini").api_key = Some(key);
        }
        if let Some(model) = non_empty("JOI_MODEL") {
            self.default_model = model;
        }
        if let Some(rounds) = non_empty("JOI_MAX_TOOL_ROUNDS") {
            self.max_tool_rounds = rounds.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "JOI_MAX_TOOL_ROUNDS must be a positive integer, got '{rounds}'"
                ))
            })?;
        }

        Ok(())
    }

    /// Settings for a provider selector (defaults when unconfigured).
    pub fn provider(&self, name: &str) -> ProviderConfig {
        self.providers.get(name).cloned().unwrap_or_default()
    }

    fn provider_mut(&mut self, name: &str) -> &mut ProviderConfig {
        self.providers.entry(name.to_string()).or_default()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        match std::env::var("JOI_HOME") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs_home().join(".joi"),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "default_model must not be empty".into(),
            ));
        }

        if self.max_tool_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "max_tool_rounds must be at least 1".into(),
            ));
        }

        for (name, provider) in &self.providers {
            if let Some(t) = provider.temperature
                && !(0.0..=2.0).contains(&t)
            {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{name}.temperature must be between 0.0 and 2.0"
                )));
            }
            if let Some(p) = provider.top_p
                && !(0.0..=1.0).contains(&p)
            {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{name}.top_p must be between 0.0 and 1.0"
                )));
            }
        }

        Ok(())
    }

    /// Whether the provider behind `name` has an API key.
    pub fn has_api_key(&self, name: &str) -> bool {
        self.providers.get(name).is_some_and(ProviderConfig::has_api_key)
    }

    /// A copy with every API key replaced by `[REDACTED]`, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for provider in config.providers.values_mut() {
            if provider.api_key.is_some() {
                provider.api_key = Some("[REDACTED]".into());
            }
        }
        config
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            max_tool_rounds: default_max_tool_rounds(),
            streaming: true,
            system_prompt_override: None,
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
            tools: ToolsConfig::default(),
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
