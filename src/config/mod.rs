//! Configuration management
//!
//! This module handles loading, validation, and management of the Gondola
//! configuration. Configuration is stored in TOML format at
//! ~/.gondola/config.toml and is created with defaults on first run.
//!
//! # Configuration Sections
//!
//! - **server**: Bind address for the web application
//! - **backend**: Venice API base URL, credential, and default models
//! - **generation**: Default sampling parameters for model calls
//! - **history**: Recent-window size and summarization thresholds
//! - **executor**: Command whitelist and execution timeout
//! - **agent**: Agent loop bounds
//! - **storage**: Conversation database path (supports ~ expansion)
//!
//! The loaded `Config` is immutable and passed by reference (or `Arc`)
//! into each component at construction time. The `VENICE_API_KEY`
//! environment variable takes precedence over the configured credential.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Web server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Generative backend settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Default generation parameters
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Conversation history settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Command executor settings
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Generative backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL for the Venice API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; the VENICE_API_KEY environment variable wins when set
    #[serde(default)]
    pub api_key: Option<String>,

    /// Default model for text chat
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Default model for agent task runs
    #[serde(default = "default_agent_model")]
    pub agent_model: String,

    /// Default model for image generation
    #[serde(default = "default_image_model")]
    pub image_model: String,
}

/// Default sampling parameters for model calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_top_p")]
    pub top_p: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_presence_penalty")]
    pub presence_penalty: f64,

    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f64,
}

/// Conversation history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Number of recent messages pulled into the prompt context
    #[serde(default = "default_recent_limit")]
    pub recent_limit: u32,

    /// Word-count estimate above which the context is compacted
    #[serde(default = "default_summary_threshold")]
    pub summary_threshold: usize,

    /// Reply token cap for the summarization call
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
}

/// Command executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Commands executable without explicit approval (first token,
    /// case-sensitive)
    #[serde(default = "default_whitelist")]
    pub whitelist: Vec<String>,

    /// Execution timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum plan-execute-check rounds before the run fails
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Conversation database path (supports ~ expansion)
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_base_url() -> String {
    "https://api.venice.ai/api/v1".to_string()
}

fn default_chat_model() -> String {
    "llama-3.3-70b".to_string()
}

fn default_agent_model() -> String {
    "deepseek-r1-671b".to_string()
}

fn default_image_model() -> String {
    "fluently-xl".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.9
}

fn default_max_tokens() -> u32 {
    7000
}

fn default_presence_penalty() -> f64 {
    1.0
}

fn default_frequency_penalty() -> f64 {
    0.9
}

fn default_recent_limit() -> u32 {
    10
}

fn default_summary_threshold() -> usize {
    1000
}

fn default_summary_max_tokens() -> u32 {
    300
}

fn default_whitelist() -> Vec<String> {
    vec![
        "ls".to_string(),
        "pwd".to_string(),
        "whoami".to_string(),
        "echo".to_string(),
    ]
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_iterations() -> u32 {
    10
}

fn default_db_path() -> PathBuf {
    PathBuf::from("~/.gondola/conversations.db")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            chat_model: default_chat_model(),
            agent_model: default_agent_model(),
            image_model: default_image_model(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            presence_penalty: default_presence_penalty(),
            frequency_penalty: default_frequency_penalty(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
            summary_threshold: default_summary_threshold(),
            summary_max_tokens: default_summary_max_tokens(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            whitelist: default_whitelist(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            backend: BackendConfig::default(),
            generation: GenerationConfig::default(),
            history: HistoryConfig::default(),
            executor: ExecutorConfig::default(),
            agent: AgentConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.gondola/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default
    /// configuration. Validates the configuration after loading.
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let mut config: Config = toml::from_str(&contents).context("Failed to parse config")?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save it to `path`
    fn create_default(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let mut config = Self::default();
        config.validate_and_process()?;

        let toml_string = toml::to_string_pretty(&config).context("Failed to serialize config")?;

        fs::write(path, toml_string).context("Failed to write config file")?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.gondola/config.toml)
    pub fn default_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".gondola").join("config.toml"))
    }

    /// Resolve the credential for backend calls.
    ///
    /// The `VENICE_API_KEY` environment variable wins; the configured
    /// `backend.api_key` is the fallback. Per-request keys supplied by
    /// clients override both at call time.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var("VENICE_API_KEY") {
            if !key.is_empty() {
                return Some(key);
            }
        }
        self.backend.api_key.clone()
    }

    /// Validate the configuration and expand paths
    fn validate_and_process(&mut self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log_level,
                valid_log_levels.join(", ")
            );
        }

        if self.server.port == 0 {
            bail!("server.port must be non-zero");
        }

        if self.executor.whitelist.iter().any(|c| c.trim().is_empty()) {
            bail!("executor.whitelist entries must be non-empty");
        }

        if self.agent.max_iterations == 0 {
            bail!("agent.max_iterations must be at least 1");
        }

        if self.history.recent_limit == 0 {
            bail!("history.recent_limit must be at least 1");
        }

        self.storage.path = expand_path(&self.storage.path)?;

        Ok(())
    }
}

/// Expand ~ in a path to the user's home directory
fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path.to_str().context("Invalid UTF-8 in path")?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir().context("Could not determine home directory")
    } else {
        Ok(path.to_path_buf())
    }
}
