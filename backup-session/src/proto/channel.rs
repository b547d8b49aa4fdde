//! Request/response channel used by the handshake and the session loop.

use super::{Message, MessageCodec};
use crate::utils::ChannelError;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

/// Send and receive whole messages.
///
/// Every call is a suspension point; a failed call means the session is
/// over. There is no partial-message retry.
pub trait MessageChannel {
    fn recv(&mut self) -> impl Future<Output = Result<Message, ChannelError>> + Send;

    fn send(&mut self, msg: Message) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Send a generic-text message.
    fn send_str(&mut self, text: &str) -> impl Future<Output = Result<(), ChannelError>> + Send {
        self.send(Message::gen(text))
    }
}

/// [`MessageChannel`] over any byte stream, with a per-operation timeout.
pub struct FramedChannel<T> {
    framed: Framed<T, MessageCodec>,
    timeout: Duration,
}

impl<T> FramedChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(io: T, timeout: Duration) -> Self {
        Self {
            framed: Framed::new(io, MessageCodec),
            timeout,
        }
    }

    pub fn into_inner(self) -> T {
        self.framed.into_inner()
    }
}

impl<T> MessageChannel for FramedChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Message, ChannelError> {
        match tokio::time::timeout(self.timeout, self.framed.next()).await {
            Err(_) => Err(ChannelError::Timeout(self.timeout.as_secs())),
            Ok(None) => Err(ChannelError::Closed),
            Ok(Some(Err(e))) => Err(e),
            Ok(Some(Ok(msg))) => {
                tracing::trace!(cmd = %msg.cmd.as_char(), len = msg.payload.len(), "recv");
                Ok(msg)
            }
        }
    }

    async fn send(&mut self, msg: Message) -> Result<(), ChannelError> {
        tracing::trace!(cmd = %msg.cmd.as_char(), len = msg.payload.len(), "send");
        match tokio::time::timeout(self.timeout, self.framed.send(msg)).await {
            Err(_) => Err(ChannelError::Timeout(self.timeout.as_secs())),
            Ok(res) => res,
        }
    }
}
