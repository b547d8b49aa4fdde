//! Discovery of the completed backups stored for a client.
//!
//! Each backup lives in its own directory under the client's storage
//! directory, named `<number> <timestamp>`, e.g. `0000012 2024-03-01 02:00:05`.

use crate::clientconf::validate_client_name;
use crate::manifest::{BackupInstance, Protocol};
use crate::utils::BrowseError;
use std::path::{Path, PathBuf};

/// Storage directory of `client` below the server's storage root. The name
/// is checked here too, whichever store authenticated it.
pub fn client_dir(storage: &Path, client: &str) -> Result<PathBuf, BrowseError> {
    validate_client_name(client).map_err(BrowseError::Client)?;
    Ok(storage.join(client))
}

/// Split a backup directory name into its number and timestamp.
fn parse_dir_name(name: &str) -> Option<(u64, String)> {
    let digits = name.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let number = name[..digits].parse().ok()?;
    let timestamp = name[digits..].trim().to_string();
    Some((number, timestamp))
}

/// All backups of a client, oldest first. A client without a storage
/// directory has no backups yet.
pub async fn list_backups(
    client_dir: &Path,
    protocol: Protocol,
) -> Result<Vec<BackupInstance>, BrowseError> {
    let open_err = |source| BrowseError::Open {
        path: client_dir.display().to_string(),
        source,
    };

    let mut read_dir = match tokio::fs::read_dir(client_dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(open_err(e)),
    };

    let mut backups = Vec::new();
    while let Some(entry) = read_dir.next_entry().await.map_err(open_err)? {
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        let name = entry.file_name();
        let Some((number, timestamp)) = parse_dir_name(&name.to_string_lossy()) else {
            continue;
        };
        backups.push(BackupInstance {
            number,
            timestamp,
            path: entry.path(),
            protocol,
        });
    }

    backups.sort_by_key(|b| b.number);
    Ok(backups)
}

/// The backup numbered `number`.
pub async fn find_backup(
    client_dir: &Path,
    protocol: Protocol,
    number: u64,
) -> Result<BackupInstance, BrowseError> {
    list_backups(client_dir, protocol)
        .await?
        .into_iter()
        .find(|b| b.number == number)
        .ok_or(BrowseError::UnknownBackup(number))
}
