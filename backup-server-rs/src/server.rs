use crate::state::AppState;
use backup_session::{session, FramedChannel};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Accept connections until `cancel` fires, one task per session.
///
/// A session slot is taken before accepting, so with every slot busy new
/// clients wait in the listen backlog.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    loop {
        let permit = tokio::select! {
            _ = cancel.cancelled() => break,
            permit = state.session_slots.clone().acquire_owned() => permit?,
        };

        let (stream, peer) = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    continue;
                }
            },
        };

        let ctx = state.context.clone();
        let timeout = state.config.network_timeout();
        tokio::spawn(async move {
            let _permit = permit;
            let mut channel = FramedChannel::new(stream, timeout);
            match session::run(&mut channel, &ctx).await {
                Ok(s) => tracing::info!(
                    "Session {} for {} from {} finished",
                    s.id,
                    s.client.as_deref().unwrap_or("-"),
                    peer
                ),
                Err(e) => tracing::warn!("Session from {} ended: {}", peer, e),
            }
        }
        .instrument(tracing::info_span!("conn", %peer)));
    }

    tracing::info!("Stopped accepting connections");
    Ok(())
}
