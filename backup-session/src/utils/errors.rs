//! Error types for the session core.
//!
//! Each subsystem has its own enum so callers can tell a dead connection
//! from a corrupt manifest. Authentication is the exception: every cause is
//! logged where it happens and collapsed into [`AuthFailed`] before it
//! reaches the caller.

use thiserror::Error;

/// Failures of the framed message channel.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network timeout after {0}s")]
    Timeout(u64),

    #[error("peer closed the connection")]
    Closed,

    #[error("malformed frame: {0}")]
    BadFrame(String),

    #[error("payload of {0} bytes exceeds the frame limit")]
    PayloadTooLarge(usize),
}

/// Failures loading server or client configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid client name: {0:?}")]
    InvalidClientName(String),

    #[error("unknown client: {0}")]
    UnknownClient(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,

    #[error("invalid version component {component:?} in {version:?}")]
    InvalidComponent { version: String, component: String },
}

/// Failures decoding a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated manifest record")]
    Truncated,

    #[error("bad record header: {0}")]
    BadHeader(String),

    #[error("unexpected command {found:?} while expecting {expected}")]
    UnexpectedCommand { found: char, expected: &'static str },

    #[error("bad attributes: {0}")]
    BadAttribs(String),
}

/// Failures answering a browse request.
#[derive(Error, Debug)]
pub enum BrowseError {
    #[error("unknown backup {0}")]
    UnknownBackup(u64),

    #[error("bad client name: {0}")]
    Client(#[source] ConfigError),

    #[error("cannot open manifest {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest decode error: {0}")]
    Decode(#[source] ManifestError),

    #[error("browse cache build failed: {0}")]
    CacheBuild(#[source] Box<BrowseError>),

    #[error("JSON rendering failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ManifestError> for BrowseError {
    fn from(e: ManifestError) -> Self {
        BrowseError::Decode(e)
    }
}

/// The specific reason a handshake failed. Only ever logged.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("{step}: {source}")]
    Channel {
        step: &'static str,
        #[source]
        source: ChannelError,
    },

    #[error("could not load config for client {client}: {source}")]
    ConfigLoad {
        client: String,
        #[source]
        source: ConfigError,
    },

    #[error("{0}")]
    Rejected(String),

    #[error("version check failed: {0}")]
    VersionParse(#[from] VersionError),

    #[error("no trust name available")]
    NoTrustName,
}

/// The uniform failure a caller of the handshake sees.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("authentication failed")]
pub struct AuthFailed;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthFailed),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}
