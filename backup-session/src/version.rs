//! Dotted numeric versions, compared component by component.

use crate::utils::VersionError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Oldest client version that is told the server's version in `whoareyou`.
pub const MIN_VERSION_FOR_SERVER_REPLY: &str = "1.3.2";

/// The version this server reports to clients.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A parsed version such as `1.10.0`. Missing trailing components count as
/// zero, so `1.3` equals `1.3.0`.
#[derive(Debug, Clone, Eq)]
pub struct Version(Vec<u64>);

impl Version {
    fn component(&self, i: usize) -> u64 {
        self.0.get(i).copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, VersionError> {
        if s.is_empty() {
            return Err(VersionError::Empty);
        }
        let parts = s
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(VersionError::InvalidComponent {
                        version: s.to_string(),
                        component: part.to_string(),
                    });
                }
                part.parse::<u64>().map_err(|_| VersionError::InvalidComponent {
                    version: s.to_string(),
                    component: part.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Version(parts))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join("."))
    }
}

/// Whether a client at `client_version` should be sent the server version.
pub fn wants_server_version(client_version: &str) -> Result<bool, VersionError> {
    let min: Version = MIN_VERSION_FOR_SERVER_REPLY.parse()?;
    let client: Version = client_version.parse()?;
    Ok(client >= min)
}
