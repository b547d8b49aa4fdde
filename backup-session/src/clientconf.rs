//! Per-client configuration.
//!
//! Each client has a TOML file in the client config directory, named after
//! the client. Keys it leaves out take the server's `[client_defaults]`.

use crate::config::{ClientDefaults, Config};
use crate::manifest::Protocol;
use crate::utils::ConfigError;
use serde::Deserialize;
use std::future::Future;
use std::path::PathBuf;

/// Settings for one client, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Identity used for authorisation; falls back to the client name.
    pub trust_name: Option<String>,
    pub password: Option<String>,
    /// Salted DES-crypt hash, 13 characters.
    pub passwd: Option<String>,
    pub password_check: bool,
    pub keep: Vec<u32>,
    pub version_warn: bool,
    pub browse_cache: bool,
    pub protocol: Protocol,
}

impl ClientConfig {
    /// Number of backups retained at the first retention level; zero when
    /// unset.
    pub fn retention(&self) -> u32 {
        self.keep.first().copied().unwrap_or(0)
    }

    pub fn from_defaults(defaults: &ClientDefaults, protocol: Protocol) -> Self {
        Self {
            trust_name: None,
            password: None,
            passwd: None,
            password_check: defaults.password_check,
            keep: defaults.keep.clone(),
            version_warn: defaults.version_warn,
            browse_cache: defaults.browse_cache,
            protocol,
        }
    }
}

/// Optional overrides as they appear in a client file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClientFile {
    #[serde(alias = "ssl_peer_cn")]
    trust_name: Option<String>,
    password: Option<String>,
    passwd: Option<String>,
    password_check: Option<bool>,
    keep: Option<Vec<u32>>,
    version_warn: Option<bool>,
    browse_cache: Option<bool>,
    protocol: Option<Protocol>,
}

impl ClientFile {
    fn apply(self, base: &mut ClientConfig) {
        if self.trust_name.is_some() {
            base.trust_name = self.trust_name;
        }
        if self.password.is_some() {
            base.password = self.password;
        }
        if self.passwd.is_some() {
            base.passwd = self.passwd;
        }
        if let Some(v) = self.password_check {
            base.password_check = v;
        }
        if let Some(v) = self.keep {
            base.keep = v;
        }
        if let Some(v) = self.version_warn {
            base.version_warn = v;
        }
        if let Some(v) = self.browse_cache {
            base.browse_cache = v;
        }
        if let Some(v) = self.protocol {
            base.protocol = v;
        }
    }
}

/// Loads a client's configuration by name.
pub trait ClientConfigStore {
    fn load(
        &self,
        client: &str,
    ) -> impl Future<Output = Result<ClientConfig, ConfigError>> + Send;
}

/// Client names become file names, so anything that could escape the
/// directory is refused.
pub fn validate_client_name(name: &str) -> Result<(), ConfigError> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(ConfigError::InvalidClientName(name.to_string()));
    }
    Ok(())
}

/// A directory with one TOML file per client.
#[derive(Debug, Clone)]
pub struct ClientConfDir {
    dir: PathBuf,
    defaults: ClientDefaults,
    protocol: Protocol,
}

impl ClientConfDir {
    pub fn new(dir: impl Into<PathBuf>, defaults: ClientDefaults, protocol: Protocol) -> Self {
        Self {
            dir: dir.into(),
            defaults,
            protocol,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.storage.clientconfdir.clone(),
            config.client_defaults.clone(),
            config.storage.protocol,
        )
    }
}

impl ClientConfigStore for ClientConfDir {
    async fn load(&self, client: &str) -> Result<ClientConfig, ConfigError> {
        validate_client_name(client)?;
        let path = self.dir.join(client);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::UnknownClient(client.to_string()));
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let file: ClientFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        let mut config = ClientConfig::from_defaults(&self.defaults, self.protocol);
        file.apply(&mut config);
        Ok(config)
    }
}
