//! Utility modules for the session core.

pub mod errors;
pub mod logger;

pub use errors::{
    AuthError, AuthFailed, BrowseError, ChannelError, ConfigError, ManifestError, SessionError,
    VersionError,
};
