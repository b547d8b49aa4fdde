//! Browsing backup manifests.
//!
//! A listing is produced either by scanning the manifest directly, or,
//! when the client has browse caching enabled, from an index built by one
//! full scan and reused for every later request against the same backup.

pub mod cache;
pub mod filter;
pub mod json;

pub use cache::BrowseCache;
pub use json::StatRecord;

use crate::manifest::{BackupInstance, ManifestEntry, ManifestReader, ManifestSource};
use crate::utils::BrowseError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub entries_read: usize,
    pub matched: usize,
}

/// Feed every entry that can appear in a listing to `f`, until the manifest
/// ends. Returns the number of entries read.
pub(crate) async fn for_each_listable<R, F>(reader: &mut R, mut f: F) -> Result<usize, BrowseError>
where
    R: ManifestReader,
    F: FnMut(&ManifestEntry),
{
    let mut read = 0;
    while let Some(entry) = reader.next_entry().await? {
        read += 1;
        if entry.is_endfile_marker() || !entry.cmd.is_listable() {
            continue;
        }
        f(&entry);
    }
    Ok(read)
}

/// List `browse` by reading the whole manifest once.
///
/// Matches are appended to `out` as they are found; on a decode error the
/// records already appended stay there.
pub async fn scan<R>(
    reader: &mut R,
    browse: &str,
    out: &mut Vec<StatRecord>,
) -> Result<ScanSummary, BrowseError>
where
    R: ManifestReader,
{
    let dir = filter::normalize(browse);
    let mut last_match = None;
    let mut matched = 0;

    let entries_read = for_each_listable(reader, |entry| {
        if let Some(rec) = filter::check_browsedir(dir, entry, &mut last_match) {
            out.push(rec);
            matched += 1;
        }
    })
    .await?;

    Ok(ScanSummary {
        entries_read,
        matched,
    })
}

/// Answer one browse request, through the cache when `use_cache` is set.
pub async fn browse_backup<S>(
    source: &S,
    cache: &BrowseCache,
    use_cache: bool,
    client: &str,
    backup: &BackupInstance,
    browse: &str,
    out: &mut Vec<StatRecord>,
) -> Result<(), BrowseError>
where
    S: ManifestSource + Sync,
{
    if use_cache {
        let records = cache.browse(source, client, backup, browse).await?;
        out.extend(records);
        return Ok(());
    }

    let mut reader = source.open(backup).await?;
    let summary = scan(&mut reader, browse, out).await?;
    tracing::debug!(
        "Scanned {} entries of backup {} for {:?}, {} matched",
        summary.entries_read,
        backup.number,
        browse,
        summary.matched
    );
    Ok(())
}
