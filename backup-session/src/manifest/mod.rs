//! Backup manifests: the path-sorted log of everything captured in a backup.
//!
//! The browse code only depends on the [`ManifestReader`] and
//! [`ManifestSource`] traits; [`FsManifestSource`] is the implementation
//! that reads manifests from the backup store.

pub mod attribs;
pub mod reader;

pub use attribs::Stat;
pub use reader::ManioReader;

use crate::proto::Command;
use crate::utils::{BrowseError, ManifestError};
use async_compression::tokio::bufread::GzipDecoder;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, BufReader};

/// Manifest layout version of a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Protocol {
    /// Gzipped manifest; end-file records trail their entry.
    V1,
    /// Plain manifest; end-file records are standalone markers.
    V2,
}

impl Protocol {
    pub fn manifest_name(self) -> &'static str {
        match self {
            Protocol::V1 => "manifest.gz",
            Protocol::V2 => "manifest",
        }
    }
}

impl TryFrom<u8> for Protocol {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, String> {
        match v {
            1 => Ok(Protocol::V1),
            2 => Ok(Protocol::V2),
            other => Err(format!("unsupported protocol {other}, expected 1 or 2")),
        }
    }
}

impl From<Protocol> for u8 {
    fn from(p: Protocol) -> u8 {
        match p {
            Protocol::V1 => 1,
            Protocol::V2 => 2,
        }
    }
}

/// One completed, immutable backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInstance {
    pub number: u64,
    pub timestamp: String,
    pub path: PathBuf,
    pub protocol: Protocol,
}

impl BackupInstance {
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(self.protocol.manifest_name())
    }
}

/// One decoded manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub cmd: Command,
    pub path: String,
    pub stat: Stat,
    pub link_target: Option<String>,
    pub datapth: Option<String>,
    pub endfile: Option<String>,
}

impl ManifestEntry {
    pub fn new(cmd: Command, path: impl Into<String>, stat: Stat) -> Self {
        Self {
            cmd,
            path: path.into(),
            stat,
            link_target: None,
            datapth: None,
            endfile: None,
        }
    }

    /// A protocol 2 end-file marker, which names no path.
    pub fn endfile_marker(endfile: String) -> Self {
        Self {
            cmd: Command::EndFile,
            path: String::new(),
            stat: Stat::default(),
            link_target: None,
            datapth: None,
            endfile: Some(endfile),
        }
    }

    pub fn is_endfile_marker(&self) -> bool {
        self.cmd == Command::EndFile
    }
}

/// Sequential access to a manifest.
///
/// `Ok(None)` means the manifest ended cleanly; it is distinct from a decode
/// error.
pub trait ManifestReader {
    fn next_entry(
        &mut self,
    ) -> impl Future<Output = Result<Option<ManifestEntry>, ManifestError>> + Send;
}

/// Opens the manifest of a backup.
pub trait ManifestSource {
    type Reader: ManifestReader + Send;

    fn open(
        &self,
        backup: &BackupInstance,
    ) -> impl Future<Output = Result<Self::Reader, BrowseError>> + Send;
}

pub type BoxedBufRead = Box<dyn AsyncBufRead + Unpin + Send>;

/// Reads manifests from the backup store.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsManifestSource;

impl ManifestSource for FsManifestSource {
    type Reader = ManioReader<BoxedBufRead>;

    async fn open(&self, backup: &BackupInstance) -> Result<Self::Reader, BrowseError> {
        let path = backup.manifest_path();
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|source| BrowseError::Open {
                path: path.display().to_string(),
                source,
            })?;
        tracing::debug!("Opened manifest {}", path.display());

        let inner: BoxedBufRead = match backup.protocol {
            Protocol::V1 => {
                let mut decoder = GzipDecoder::new(BufReader::new(file));
                decoder.multiple_members(true);
                Box::new(BufReader::new(decoder))
            }
            Protocol::V2 => Box::new(BufReader::new(file)),
        };
        Ok(ManioReader::new(inner, backup.protocol))
    }
}
