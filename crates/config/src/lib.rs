//! Configuration loading, validation, and management for TicketForge.
//!
//! Loads configuration from `~/.ticketforge/config.toml` with environment
//! variable overrides. Validates all settings at startup. Budget ceilings
//! and transcript caps are plain fields so a run can be tuned (or a test
//! can shrink them) without touching any global state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ticketforge/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model-service API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the model-service base URL (proxies, testing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model used for every call of a run
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nominal output-size limit per model call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Tool loop ceilings and transcript caps
    #[serde(default)]
    pub agent: AgentSettings,

    /// Bounds for `search_files`
    #[serde(default)]
    pub search: SearchSettings,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    4096
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
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("search", &self.search)
            .finish()
    }
}

/// Ceilings for one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Model round-trips before the loop is forced to finish
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Hard stop across all tool types
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,

    /// `read_file`, `peek_file`, `read_files` (one per call)
    #[serde(default = "default_max_reads")]
    pub max_reads: u32,

    /// `search_files`
    #[serde(default = "default_max_searches")]
    pub max_searches: u32,

    /// User-role messages kept when pruning the transcript
    #[serde(default = "default_history_cap")]
    pub max_user_messages: usize,

    /// Model-role messages kept when pruning the transcript
    #[serde(default = "default_history_cap")]
    pub max_model_messages: usize,

    /// Fraction of `max_tokens` used for the retry after a rate limit
    #[serde(default = "default_rate_limit_token_factor")]
    pub rate_limit_token_factor: f32,

    /// Upper bound on the pause before the rate-limit retry (0 = none)
    #[serde(default)]
    pub rate_limit_wait_secs: u64,

    /// Character budget for the repository listing in the seed prompt
    #[serde(default = "default_repo_context_chars")]
    pub repo_context_chars: usize,

    /// Artifact written when a run produces no edits
    #[serde(default = "default_notes_file")]
    pub notes_file: String,

    /// Namespace prepended to derived branch names
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_max_tool_calls() -> u32 {
    25
}
fn default_max_reads() -> u32 {
    12
}
fn default_max_searches() -> u32 {
    6
}
fn default_history_cap() -> usize {
    4
}
fn default_rate_limit_token_factor() -> f32 {
    0.6
}
fn default_repo_context_chars() -> usize {
    4000
}
fn default_notes_file() -> String {
    "IMPLEMENTATION_NOTES.md".into()
}
fn default_branch_prefix() -> String {
    "feature/".into()
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_tool_calls: default_max_tool_calls(),
            max_reads: default_max_reads(),
            max_searches: default_max_searches(),
            max_user_messages: default_history_cap(),
            max_model_messages: default_history_cap(),
            rate_limit_token_factor: default_rate_limit_token_factor(),
            rate_limit_wait_secs: 0,
            repo_context_chars: default_repo_context_chars(),
            notes_file: default_notes_file(),
            branch_prefix: default_branch_prefix(),
        }
    }
}

/// Bounds that keep `search_files` from stalling on pathological trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_max_result_files")]
    pub max_result_files: usize,

    #[serde(default = "default_max_lines_per_file")]
    pub max_lines_per_file: usize,

    #[serde(default = "default_max_scanned_files")]
    pub max_scanned_files: usize,

    #[serde(default = "default_max_scanned_bytes")]
    pub max_scanned_bytes: u64,

    /// Files larger than this are skipped
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

fn default_max_result_files() -> usize {
    20
}
fn default_max_lines_per_file() -> usize {
    5
}
fn default_max_scanned_files() -> usize {
    5000
}
fn default_max_scanned_bytes() -> u64 {
    64 * 1024 * 1024
}
fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_result_files: default_max_result_files(),
            max_lines_per_file: default_max_lines_per_file(),
            max_scanned_files: default_max_scanned_files(),
            max_scanned_bytes: default_max_scanned_bytes(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ticketforge/config.toml).
    ///
    /// Environment overrides:
    /// - `TICKETFORGE_API_KEY`, then `ANTHROPIC_API_KEY` (when no key is configured)
    /// - `TICKETFORGE_MODEL`
    /// - `TICKETFORGE_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("TICKETFORGE_API_KEY").or_else(|| lookup("ANTHROPIC_API_KEY"));
        }
        if let Some(model) = lookup("TICKETFORGE_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("TICKETFORGE_BASE_URL") {
            self.base_url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ticketforge")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError("max_tokens must be > 0".into()));
        }

        let a = &self.agent;
        let ceilings = [
            ("agent.max_iterations", a.max_iterations as usize),
            ("agent.max_tool_calls", a.max_tool_calls as usize),
            ("agent.max_reads", a.max_reads as usize),
            ("agent.max_searches", a.max_searches as usize),
            ("agent.max_user_messages", a.max_user_messages),
            ("agent.max_model_messages", a.max_model_messages),
            ("search.max_result_files", self.search.max_result_files),
            ("search.max_lines_per_file", self.search.max_lines_per_file),
            ("search.max_scanned_files", self.search.max_scanned_files),
        ];
        for (name, value) in ceilings {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!("{name} must be >= 1")));
            }
        }

        if !(a.rate_limit_token_factor > 0.0 && a.rate_limit_token_factor <= 1.0) {
            return Err(ConfigError::ValidationError(
                "agent.rate_limit_token_factor must be in (0, 1]".into(),
            ));
        }
        if a.notes_file.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "agent.notes_file must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The configuration as TOML, with the API key redacted.
    pub fn to_redacted_toml(&self) -> String {
        let mut shown = self.clone();
        if shown.api_key.is_some() {
            shown.api_key = Some("[REDACTED]".into());
        }
        toml::to_string_pretty(&shown).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentSettings::default(),
            search: SearchSettings::default(),
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
