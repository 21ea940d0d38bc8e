//! Configuration module for filebox.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{FileboxError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins (empty allows any origin).
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Require a valid `?token=` on the live-update WebSocket.
    #[serde(default)]
    pub require_ws_token: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            require_ws_token: false,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `users.json` and `files.json`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Directory holding uploaded blobs.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    /// Maximum upload request size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_max_upload_size() -> u64 {
    100
}

impl StorageConfig {
    /// Path of the credential document.
    pub fn users_file(&self) -> PathBuf {
        Path::new(&self.data_dir).join("users.json")
    }

    /// Path of the file metadata document.
    pub fn files_file(&self) -> PathBuf {
        Path::new(&self.data_dir).join("files.json")
    }

    /// Maximum upload request size in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            upload_dir: default_upload_dir(),
            max_upload_size_mb: default_max_upload_size(),
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Token signing secret. Empty means "generate one at boot".
    #[serde(default)]
    pub token_secret: String,
    /// Session token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    /// Username of the account seeded on first boot.
    #[serde(default = "default_username")]
    pub default_username: String,
    /// Password of the account seeded on first boot.
    #[serde(default = "default_password")]
    pub default_password: String,
    /// Quota of the account seeded on first boot, in bytes.
    #[serde(default = "default_quota")]
    pub default_quota_bytes: u64,
}

fn default_token_ttl() -> u64 {
    3600 // 1 hour
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "admin".to_string()
}

fn default_quota() -> u64 {
    100 * 1024 * 1024 // 100MB
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            token_ttl_secs: default_token_ttl(),
            default_username: default_username(),
            default_password: default_password(),
            default_quota_bytes: default_quota(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty disables file logging.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/filebox.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FileboxError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FileboxError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FILEBOX_TOKEN_SECRET`: Override the token signing secret
    /// - `FILEBOX_PORT`: Override the listen port
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("FILEBOX_TOKEN_SECRET") {
            if !secret.is_empty() {
                self.auth.token_secret = secret;
            }
        }

        if let Ok(port) = std::env::var("FILEBOX_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid FILEBOX_PORT"),
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.auth.token_ttl_secs == 0 {
            return Err(FileboxError::Config(
                "auth.token_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.auth.default_username.is_empty() {
            return Err(FileboxError::Config(
                "auth.default_username must not be empty".to_string(),
            ));
        }
        if self.auth.default_password.is_empty() {
            return Err(FileboxError::Config(
                "auth.default_password must not be empty".to_string(),
            ));
        }
        if self.auth.default_quota_bytes == 0 {
            return Err(FileboxError::Config(
                "auth.default_quota_bytes must be greater than zero".to_string(),
            ));
        }
        if self.storage.max_upload_size_mb == 0 {
            return Err(FileboxError::Config(
                "storage.max_upload_size_mb must be greater than zero".to_string(),
            ));
        }
        format!("{}:{}", self.server.host, self.server.port)
            .parse::<std::net::SocketAddr>()
            .map_err(|e| FileboxError::Config(format!("invalid server address: {e}")))?;
        Ok(())
    }
}
