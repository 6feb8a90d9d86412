//! Server configuration loaded from TOML.

use std::path::Path;

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Configuration for the league server.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ServerConfig {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    db_path: String,

    /// Address the HTTP server binds to.
    #[serde(default = "default_host")]
    host: String,

    /// Port the HTTP server binds to.
    #[serde(default = "default_port")]
    port: u16,

    /// Seconds between average-moves recomputations.
    #[serde(default = "default_cache_refresh_secs")]
    cache_refresh_secs: u64,

    /// Seconds between reminder runs.
    #[serde(default = "default_reminder_interval_secs")]
    reminder_interval_secs: u64,

    /// Commit attempts per move or cancel before giving up on a busy game.
    #[serde(default = "default_max_commit_retries")]
    max_commit_retries: u32,

    /// From-address used for reminders.
    #[serde(default = "default_sender_address")]
    sender_address: String,
}

fn default_db_path() -> String {
    "tictactoe.db".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cache_refresh_secs() -> u64 {
    60
}

fn default_reminder_interval_secs() -> u64 {
    3600
}

fn default_max_commit_retries() -> u32 {
    3
}

fn default_sender_address() -> String {
    "noreply@tictactoe.local".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            host: default_host(),
            port: default_port(),
            cache_refresh_secs: default_cache_refresh_secs(),
            reminder_interval_secs: default_reminder_interval_secs(),
            max_commit_retries: default_max_commit_retries(),
            sender_address: default_sender_address(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if
    /// an interval is zero.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed TOML or a zero interval.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        info!(db_path = %config.db_path, port = config.port, "Config loaded successfully");
        Ok(config)
    }

    /// Loads `path` when given and present, defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an existing file is invalid.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => Self::from_file(path),
            Some(path) => {
                info!(
                    "Config file not found at {}, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Replaces the database path.
    pub fn with_db_path(mut self, db_path: impl Into<String>) -> Self {
        self.db_path = db_path.into();
        self
    }

    /// Replaces the bind host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Replaces the bind port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_refresh_secs == 0 {
            return Err(ConfigError::new("cache_refresh_secs must be positive"));
        }
        if self.reminder_interval_secs == 0 {
            return Err(ConfigError::new("reminder_interval_secs must be positive"));
        }
        if self.max_commit_retries == 0 {
            return Err(ConfigError::new("max_commit_retries must be positive"));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port(), &3000);
        assert_eq!(config.max_commit_retries(), &3);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = ServerConfig::from_toml(
            r#"
            db_path = "league.db"
            port = 8080
            sender_address = "league@example.com"
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path(), "league.db");
        assert_eq!(config.port(), &8080);
        assert_eq!(config.host(), "127.0.0.1");
        assert_eq!(config.sender_address(), "league@example.com");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = ServerConfig::from_toml("cache_refresh_secs = 0").unwrap_err();
        assert!(err.message.contains("cache_refresh_secs"));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = ServerConfig::from_toml("port = \"eighty\"").unwrap_err();
        assert!(err.message.starts_with("Failed to parse config"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config =
            ServerConfig::load(Some(Path::new("/nonexistent/tictactoe.toml"))).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::default()
            .with_db_path("x.db")
            .with_host("0.0.0.0")
            .with_port(9000);
        assert_eq!(config.db_path(), "x.db");
        assert_eq!(config.host(), "0.0.0.0");
        assert_eq!(config.port(), &9000);
    }
}
