//! One client connection: handshake first, then browse requests until the
//! client hangs up.
//!
//! Requests are generic-text messages:
//!
//! ```text
//! list                      -> {"number":..,"timestamp":..} per backup, then list:done
//! browse:<number>:<path>    -> one JSON record per entry, then browse:done
//! ```
//!
//! A request that fails is answered with an error message and the session
//! carries on; only channel failures end it.

use crate::auth::{self, AuthOutcome};
use crate::backups;
use crate::browse::{self, BrowseCache, StatRecord};
use crate::clientconf::ClientConfigStore;
use crate::manifest::ManifestSource;
use crate::proto::{Command, Message, MessageChannel};
use crate::utils::{BrowseError, ChannelError, SessionError};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Everything a session needs from the server, shared by all sessions.
pub struct SessionContext<S, M> {
    pub store: S,
    pub source: M,
    pub cache: Arc<BrowseCache>,
    pub storage_dir: PathBuf,
    pub server_version: String,
}

/// State of a single connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub client: Option<String>,
    pub version: Option<String>,
    pub requests: usize,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            client: None,
            version: None,
            requests: 0,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Request<'a> {
    List,
    Browse { number: u64, path: &'a str },
}

impl<'a> Request<'a> {
    fn parse(text: &'a str) -> Option<Self> {
        if text == "list" {
            return Some(Request::List);
        }
        let rest = text.strip_prefix("browse:")?;
        // The path may itself contain ':' (drive letters).
        let (number, path) = rest.split_once(':')?;
        Some(Request::Browse {
            number: number.parse().ok()?,
            path,
        })
    }
}

#[derive(Serialize)]
struct BackupListing<'a> {
    number: u64,
    timestamp: &'a str,
}

/// Serve one connection to completion.
///
/// Returns `Ok` when the client closed the connection after a successful
/// handshake.
pub async fn run<C, S, M>(channel: &mut C, ctx: &SessionContext<S, M>) -> Result<Session, SessionError>
where
    C: MessageChannel + Send,
    S: ClientConfigStore + Sync,
    M: ManifestSource + Sync,
{
    let mut session = Session::new();
    let span = tracing::info_span!("session", id = %session.id);
    serve(channel, ctx, &mut session).instrument(span).await?;
    Ok(session)
}

async fn serve<C, S, M>(
    channel: &mut C,
    ctx: &SessionContext<S, M>,
    session: &mut Session,
) -> Result<(), SessionError>
where
    C: MessageChannel + Send,
    S: ClientConfigStore + Sync,
    M: ManifestSource + Sync,
{
    let outcome = auth::authenticate(channel, &ctx.store, &ctx.server_version).await?;
    session.client = Some(outcome.client.clone());
    session.version = outcome.version.clone();

    loop {
        let msg = match channel.recv().await {
            Ok(msg) => msg,
            Err(ChannelError::Closed) => {
                tracing::info!(
                    "Client {} disconnected after {} requests",
                    outcome.client,
                    session.requests
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        session.requests += 1;

        let text = msg.text();
        let request = match msg.cmd {
            Command::Gen => Request::parse(&text),
            _ => None,
        };
        match request {
            Some(Request::List) => handle_list(channel, ctx, &outcome).await?,
            Some(Request::Browse { number, path }) => {
                handle_browse(channel, ctx, &outcome, number, path).await?
            }
            None => {
                tracing::warn!("Unknown request from {}: {:?}", outcome.client, text);
                send_error(channel, "unknown request").await?;
            }
        }
    }
}

async fn send_error<C: MessageChannel>(channel: &mut C, text: &str) -> Result<(), ChannelError> {
    channel.send(Message::new(Command::Error, text)).await
}

async fn handle_list<C, S, M>(
    channel: &mut C,
    ctx: &SessionContext<S, M>,
    outcome: &AuthOutcome,
) -> Result<(), ChannelError>
where
    C: MessageChannel,
{
    let listing = match backups::client_dir(&ctx.storage_dir, &outcome.client) {
        Ok(dir) => backups::list_backups(&dir, outcome.config.protocol).await,
        Err(e) => Err(e),
    };
    let listing = listing.and_then(|list| {
        list.iter()
            .map(|b| {
                serde_json::to_string(&BackupListing {
                    number: b.number,
                    timestamp: &b.timestamp,
                })
                .map_err(BrowseError::from)
            })
            .collect::<Result<Vec<_>, _>>()
    });

    match listing {
        Ok(lines) => {
            for line in &lines {
                channel.send_str(line).await?;
            }
            channel.send_str("list:done").await
        }
        Err(e) => {
            tracing::warn!("Listing backups for {} failed: {}", outcome.client, e);
            send_error(channel, "list failed").await
        }
    }
}

async fn handle_browse<C, S, M>(
    channel: &mut C,
    ctx: &SessionContext<S, M>,
    outcome: &AuthOutcome,
    number: u64,
    path: &str,
) -> Result<(), ChannelError>
where
    C: MessageChannel,
    M: ManifestSource + Sync,
{
    let mut records = Vec::new();
    let result = browse_request(ctx, outcome, number, path, &mut records).await;

    // Whatever was matched before a failure still goes out.
    for rec in &records {
        match rec.to_json() {
            Ok(line) => channel.send_str(&line).await?,
            Err(e) => {
                tracing::warn!("Rendering {} failed: {}", rec.name, e);
                return send_error(channel, "browse failed").await;
            }
        }
    }

    match result {
        Ok(()) => {
            tracing::debug!(
                "Browse of {:?} in backup {} for {}: {} entries",
                path,
                number,
                outcome.client,
                records.len()
            );
            channel.send_str("browse:done").await
        }
        Err(e) => {
            tracing::warn!(
                "Browse of {:?} in backup {} for {} failed: {}",
                path,
                number,
                outcome.client,
                e
            );
            send_error(channel, "browse failed").await
        }
    }
}

async fn browse_request<S, M>(
    ctx: &SessionContext<S, M>,
    outcome: &AuthOutcome,
    number: u64,
    path: &str,
    out: &mut Vec<StatRecord>,
) -> Result<(), BrowseError>
where
    M: ManifestSource + Sync,
{
    let dir = backups::client_dir(&ctx.storage_dir, &outcome.client)?;
    let backup = match backups::find_backup(&dir, outcome.config.protocol, number).await {
        Ok(backup) => backup,
        Err(e @ BrowseError::UnknownBackup(_)) => {
            // A deleted backup must not keep its index alive.
            if ctx.cache.evict(&outcome.client, number) {
                tracing::info!("Dropped browse cache for {} backup {}", outcome.client, number);
            }
            return Err(e);
        }
        Err(e) => return Err(e),
    };
    browse::browse_backup(
        &ctx.source,
        &ctx.cache,
        outcome.config.browse_cache,
        &outcome.client,
        &backup,
        path,
        out,
    )
    .await
}
