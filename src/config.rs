use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Engine configuration.
///
/// Loaded with priority: environment variables > config file > defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Autosave timer period for active editing sessions.
    pub autosave_interval_ms: u64,
    /// Background reconciliation period.
    pub sync_interval_ms: u64,
    /// Keep the local copy (marked synced) after a confirmed remote write,
    /// or purge it.
    pub retention_after_sync: bool,
    /// Consecutive failed sync attempts for one draft before a non-blocking
    /// advisory is raised.
    pub advisory_after_failures: u32,
    /// Remote API base URL (e.g. "https://qa.example.com").
    pub server_url: Option<String>,
    /// Bearer token for the remote API.
    pub api_token: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            autosave_interval_ms: 30_000,
            sync_interval_ms: 300_000,
            retention_after_sync: true,
            advisory_after_failures: 3,
            server_url: None,
            api_token: None,
        }
    }
}

impl EngineConfig {
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    /// Returns true if the remote gateway can be constructed from this
    /// config.
    pub fn is_remote_configured(&self) -> bool {
        self.server_url.is_some() && self.api_token.is_some()
    }

    /// Load configuration with priority: env vars > config file > defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
        }

        // Environment variable overrides
        if let Ok(ms) = std::env::var("JOBDRAFT_AUTOSAVE_INTERVAL_MS") {
            config.autosave_interval_ms = parse_env("JOBDRAFT_AUTOSAVE_INTERVAL_MS", &ms)?;
        }
        if let Ok(ms) = std::env::var("JOBDRAFT_SYNC_INTERVAL_MS") {
            config.sync_interval_ms = parse_env("JOBDRAFT_SYNC_INTERVAL_MS", &ms)?;
        }
        if let Ok(url) = std::env::var("JOBDRAFT_SERVER_URL") {
            config.server_url = Some(url);
        }
        if let Ok(token) = std::env::var("JOBDRAFT_API_TOKEN") {
            config.api_token = Some(token);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.autosave_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "autosave_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.sync_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "sync_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/jobdraft/
    /// - macOS: ~/Library/Application Support/jobdraft/
    /// - Windows: %APPDATA%/jobdraft/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jobdraft")
    }

    /// Default data directory for the file-backed draft store.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jobdraft")
            .join("drafts")
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

fn parse_env(name: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} must be an integer, got '{}'", name, value)))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    ReadError(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{0}': {1}")]
    ParseError(PathBuf, #[source] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
