//! Server configuration.
//!
//! Loaded from a TOML file. Every section and key has a default, so an empty
//! file yields a runnable configuration.

use crate::manifest::Protocol;
use crate::utils::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub client_defaults: ClientDefaults,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub address: String,

    /// TCP port
    pub port: u16,

    /// Maximum number of concurrent sessions
    pub max_children: usize,

    /// Seconds a single send or receive may block before the session is dropped
    pub network_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the backup store; each client has a subdirectory
    pub directory: PathBuf,

    /// Directory holding one config file per client
    pub clientconfdir: PathBuf,

    /// Manifest protocol used unless a client overrides it
    pub protocol: Protocol,
}

/// Per-client settings applied when a client file does not set them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientDefaults {
    pub password_check: bool,
    pub version_warn: bool,
    pub browse_cache: bool,
    pub keep: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 4971,
            max_children: 5,
            network_timeout_secs: 60 * 60 * 2,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/var/spool/backup-server"),
            clientconfdir: PathBuf::from("/etc/backup-server/clientconfdir"),
            protocol: Protocol::V1,
        }
    }
}

impl Default for ClientDefaults {
    fn default() -> Self {
        Self {
            password_check: true,
            version_warn: true,
            browse_cache: false,
            keep: Vec::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_children == 0 {
            return Err(ConfigError::InvalidValue {
                key: "server.max_children",
                reason: "must be at least 1".into(),
            });
        }
        if self.server.network_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "server.network_timeout_secs",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.server.network_timeout_secs)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.address, self.server.port)
    }
}
