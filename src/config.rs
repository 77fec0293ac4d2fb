//! Configuration system for the Rally host
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (RALLY_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Main host configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Host agent identity and decision loop limits
    pub agent: AgentSettings,

    /// Friend agent addresses and timeouts
    pub peers: PeerSettings,

    /// OpenAI-compatible chat model settings
    pub model: ModelSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Host agent identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Agent name, also used as the session app name
    pub name: String,

    /// User id sessions are stored under
    pub user_id: String,

    /// Maximum model/tool rounds per query
    pub max_tool_rounds: u32,
}

/// Friend agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerSettings {
    /// Base addresses of the friend agents, resolved once at startup
    pub addresses: Vec<String>,

    /// Path of the capability card relative to each address
    pub card_path: String,

    /// Card resolution timeout in seconds
    pub resolve_timeout_secs: u64,

    /// Message send timeout in seconds
    pub request_timeout_secs: u64,
}

/// OpenAI-compatible chat model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// API base URL (e.g., "https://api.openai.com/v1", "http://localhost:11434/v1")
    pub base_url: String,

    /// API key (empty string for local servers like Ollama)
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries on transient failures
    pub max_retries: u32,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: "Host_Agent".to_string(),
            user_id: "host_agent".to_string(),
            max_tool_rounds: 8,
        }
    }
}

impl Default for PeerSettings {
    fn default() -> Self {
        Self {
            addresses: vec![
                "http://localhost:10002".to_string(),
                "http://localhost:10003".to_string(),
                "http://localhost:10004".to_string(),
            ],
            card_path: "/.well-known/agent.json".to_string(),
            resolve_timeout_secs: 30,
            request_timeout_secs: 120,
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            api_key: String::new(),
            model: "llama3.2:3b".to_string(),
            temperature: None,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl PeerSettings {
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl HostConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        let config_file = Self::find_config_file(config_path)?;
        if let Some(path) = config_file {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
                message: e.to_string(),
                source: Some(e),
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            PathBuf::from("rally-host.toml"),
            dirs::config_dir()
                .map(|p| p.join("rally").join("host.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".rally").join("host.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/rally/host.toml"),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Agent settings
        if let Ok(val) = std::env::var("RALLY_AGENT_NAME") {
            self.agent.name = val;
        }
        if let Ok(val) = std::env::var("RALLY_USER_ID") {
            self.agent.user_id = val;
        }
        if let Ok(val) = std::env::var("RALLY_MAX_TOOL_ROUNDS") {
            if let Ok(n) = val.parse() {
                self.agent.max_tool_rounds = n;
            }
        }

        // Peer settings; addresses are comma separated
        if let Ok(val) = std::env::var("RALLY_PEER_ADDRESSES") {
            self.peers.addresses = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(val) = std::env::var("RALLY_CARD_PATH") {
            self.peers.card_path = val;
        }
        if let Ok(val) = std::env::var("RALLY_RESOLVE_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.peers.resolve_timeout_secs = n;
            }
        }
        if let Ok(val) = std::env::var("RALLY_REQUEST_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.peers.request_timeout_secs = n;
            }
        }

        // Model settings
        if let Ok(val) = std::env::var("RALLY_MODEL_BASE_URL") {
            self.model.base_url = val;
        }
        if let Ok(val) = std::env::var("RALLY_MODEL_API_KEY") {
            self.model.api_key = val;
        }
        if let Ok(val) = std::env::var("RALLY_MODEL") {
            self.model.model = val;
        }
        if let Ok(val) = std::env::var("RALLY_MODEL_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.model.timeout_secs = n;
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("RALLY_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("RALLY_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("RALLY_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub(crate) fn validate(&self) -> Result<()> {
        if self.agent.name.trim().is_empty() {
            return Err(Error::config_field_invalid("agent.name", "Agent name cannot be empty"));
        }
        if self.agent.max_tool_rounds == 0 {
            return Err(Error::config_field_invalid(
                "agent.max_tool_rounds",
                "max_tool_rounds must be at least 1",
            ));
        }

        for address in &self.peers.addresses {
            let parsed = url::Url::parse(address).map_err(|e| {
                Error::config_field_invalid(
                    "peers.addresses",
                    format!("Invalid peer address '{}': {}", address, e),
                )
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(Error::config_field_invalid(
                    "peers.addresses",
                    format!("Peer address '{}' must start with http:// or https://", address),
                ));
            }
        }
        if !self.peers.card_path.starts_with('/') {
            return Err(Error::config_field_invalid(
                "peers.card_path",
                "card_path must start with '/'",
            ));
        }
        if self.peers.resolve_timeout_secs == 0 || self.peers.request_timeout_secs == 0 {
            return Err(Error::config_field_invalid(
                "peers",
                "Peer timeouts must be greater than zero",
            ));
        }

        if url::Url::parse(&self.model.base_url).is_err() {
            return Err(Error::config_field_invalid(
                "model.base_url",
                format!("Invalid model base URL '{}'", self.model.base_url),
            ));
        }
        if self.model.model.is_empty() {
            return Err(Error::config_field_invalid("model.model", "Model cannot be empty"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".rally")
                .join("host.toml")
        });

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# Rally Host Configuration

[agent]
# Agent name (also the session app name)
name = "Host_Agent"

# User id sessions are stored under
user_id = "host_agent"

# Maximum model/tool rounds per query
max_tool_rounds = 8

[peers]
# Friend agent base addresses, resolved once at startup
addresses = [
    "http://localhost:10002",
    "http://localhost:10003",
    "http://localhost:10004",
]

# Capability card path relative to each address
card_path = "/.well-known/agent.json"

# Card resolution timeout in seconds
resolve_timeout_secs = 30

# Message send timeout in seconds
request_timeout_secs = 120

[model]
# OpenAI-compatible API base URL (OpenAI, Ollama, vLLM, LM Studio, etc.)
base_url = "http://localhost:11434/v1"

# API key (leave empty for local servers like Ollama)
api_key = ""

# Model identifier
model = "llama3.2:3b"

# Request timeout in seconds
timeout_secs = 120

# Maximum retries on transient failures
max_retries = 2

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.rally/logs/host.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}
