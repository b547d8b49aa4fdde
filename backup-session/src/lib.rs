//! Backup Session Library
//!
//! Per-connection core of the backup server: the client handshake and
//! browsing of backup manifests, with an optional build-once browse cache.

pub mod auth;
pub mod backups;
pub mod browse;
pub mod clientconf;
pub mod config;
pub mod manifest;
pub mod proto;
pub mod session;
pub mod utils;
pub mod version;

// Re-export commonly used types
pub use auth::{authenticate, AuthOutcome};
pub use browse::{BrowseCache, StatRecord};
pub use clientconf::{ClientConfDir, ClientConfig, ClientConfigStore};
pub use config::Config;
pub use manifest::{FsManifestSource, ManifestReader, ManifestSource, Protocol};
pub use proto::{FramedChannel, MessageChannel};
pub use session::{Session, SessionContext};
pub use utils::errors::{AuthFailed, BrowseError, SessionError};
