//! Build-once directory index per (client, backup).
//!
//! Backups never change once complete, so one full pass over a manifest is
//! enough to answer every later listing of it. Each key owns a
//! `tokio::sync::OnceCell`: concurrent first requests wait for a single
//! build, and a failed build leaves the cell empty for the next caller.

use super::filter::{check_browsedir, normalize};
use super::json::StatRecord;
use super::for_each_listable;
use crate::manifest::{BackupInstance, ManifestEntry, ManifestSource};
use crate::utils::BrowseError;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub client: String,
    pub backup: u64,
}

impl CacheKey {
    pub fn new(client: &str, backup: u64) -> Self {
        Self {
            client: client.to_string(),
            backup,
        }
    }
}

/// Directory path → its listing, for one backup.
#[derive(Debug, Default)]
pub struct BrowseIndex {
    dirs: HashMap<String, Vec<StatRecord>>,
    entries_read: usize,
}

impl BrowseIndex {
    /// Listing of `browse`; empty when nothing lives there.
    pub fn lookup(&self, browse: &str) -> &[StatRecord] {
        self.dirs
            .get(normalize(browse))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    pub fn entries_read(&self) -> usize {
        self.entries_read
    }
}

/// Accumulates an index from a full manifest pass, applying the same match
/// rule a direct scan applies to each directory.
#[derive(Default)]
struct IndexBuilder {
    dirs: HashMap<String, Vec<StatRecord>>,
    last_match: HashMap<String, Option<String>>,
}

impl IndexBuilder {
    fn add(&mut self, entry: &ManifestEntry) {
        for dir in candidate_dirs(&entry.path) {
            let last = self.last_match.entry(dir.to_string()).or_default();
            if let Some(rec) = check_browsedir(dir, entry, last) {
                self.dirs.entry(dir.to_string()).or_default().push(rec);
            }
        }
    }

    fn finish(self, entries_read: usize) -> BrowseIndex {
        BrowseIndex {
            dirs: self.dirs,
            entries_read,
        }
    }
}

/// Every directory whose listing `path` can appear in: the root listing
/// plus each proper prefix ending before a `/`.
fn candidate_dirs(path: &str) -> impl Iterator<Item = &str> {
    let prefixes = path
        .match_indices('/')
        .map(move |(i, _)| if i == 0 { "/" } else { &path[..i] });
    std::iter::once("").chain(prefixes)
}

async fn build_index<S>(source: &S, backup: &BackupInstance) -> Result<BrowseIndex, BrowseError>
where
    S: ManifestSource + Sync,
{
    let mut reader = source.open(backup).await?;
    let mut builder = IndexBuilder::default();
    let entries_read = for_each_listable(&mut reader, |entry| builder.add(entry)).await?;
    Ok(builder.finish(entries_read))
}

/// Process-wide browse cache shared by all sessions.
#[derive(Default)]
pub struct BrowseCache {
    indexes: DashMap<CacheKey, Arc<OnceCell<Arc<BrowseIndex>>>>,
}

impl BrowseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_built(&self, client: &str, backup: u64) -> bool {
        self.indexes
            .get(&CacheKey::new(client, backup))
            .map(|cell| cell.initialized())
            .unwrap_or(false)
    }

    /// Number of backups with a built index.
    pub fn len(&self) -> usize {
        self.indexes
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the index for one backup, e.g. after the backup was deleted.
    pub fn evict(&self, client: &str, backup: u64) -> bool {
        self.indexes.remove(&CacheKey::new(client, backup)).is_some()
    }

    /// List `browse` in `backup`, building the index on first use.
    pub async fn browse<S>(
        &self,
        source: &S,
        client: &str,
        backup: &BackupInstance,
        browse: &str,
    ) -> Result<Vec<StatRecord>, BrowseError>
    where
        S: ManifestSource + Sync,
    {
        let index = self.index(source, client, backup).await?;
        Ok(index.lookup(browse).to_vec())
    }

    async fn index<S>(
        &self,
        source: &S,
        client: &str,
        backup: &BackupInstance,
    ) -> Result<Arc<BrowseIndex>, BrowseError>
    where
        S: ManifestSource + Sync,
    {
        let cell = self
            .indexes
            .entry(CacheKey::new(client, backup.number))
            .or_default()
            .clone();

        let index = cell
            .get_or_try_init(|| async {
                tracing::info!(
                    "Building browse cache for {} backup {}",
                    client,
                    backup.number
                );
                let index = build_index(source, backup)
                    .await
                    .map_err(|e| BrowseError::CacheBuild(Box::new(e)))?;
                tracing::info!(
                    "Browse cache for {} backup {} holds {} directories from {} entries",
                    client,
                    backup.number,
                    index.dir_count(),
                    index.entries_read()
                );
                Ok::<_, BrowseError>(Arc::new(index))
            })
            .await?;
        Ok(index.clone())
    }
}
