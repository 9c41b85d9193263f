//! One-way outbound transport from the dApp side to the host.
//!
//! Implementations:
//! - **ChannelTransport**: in-process unbounded channel (embedding, tests)
//! - **FramedTransport**: length-prefixed frames over any `AsyncWrite` (pipes, sockets)
//! - any `Fn(String) -> Result<(), TransportError>` closure (native message handlers)
//!
//! `post_message` never blocks and never carries a response. Answers come back out of
//! band as [`Completion`](super::protocol::Completion)s.

use std::io;

use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::bytes::Bytes;
use tokio_util::codec::FramedWrite;

use super::codec::frame_codec;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("transport rejected message: {0}")]
    Rejected(String),
}

/// Fire-and-forget send of one serialized envelope.
///
/// An `Err` only reports that the message could not be handed off at all. Delivery
/// failures further down are invisible to the bridge.
pub trait OutboundTransport: Send + Sync {
    fn post_message(&self, message: String) -> Result<(), TransportError>;
}

impl<F> OutboundTransport for F
where
    F: Fn(String) -> Result<(), TransportError> + Send + Sync,
{
    fn post_message(&self, message: String) -> Result<(), TransportError> {
        self(message)
    }
}

/// In-process transport: every posted message lands on the paired receiver.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl OutboundTransport for ChannelTransport {
    fn post_message(&self, message: String) -> Result<(), TransportError> {
        self.tx.send(message).map_err(|_| TransportError::Closed)
    }
}

/// Stream transport: a background task writes each message as one length-prefixed frame.
///
/// Once the writer fails or the task ends, further posts return [`TransportError::Closed`].
#[derive(Debug, Clone)]
pub struct FramedTransport {
    tx: mpsc::UnboundedSender<String>,
}

impl FramedTransport {
    /// Spawn the writer task. Must be called from within a tokio runtime.
    ///
    /// The task finishes (flushing and shutting down the writer) once every
    /// `FramedTransport` clone has been dropped.
    pub fn spawn<W>(writer: W) -> (Self, JoinHandle<io::Result<()>>)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let handle = tokio::spawn(async move {
            let mut framed = FramedWrite::new(writer, frame_codec());
            while let Some(message) = rx.recv().await {
                tracing::trace!(frame_bytes = message.len(), "Writing request frame");
                if let Err(e) = framed.send(Bytes::from(message)).await {
                    tracing::warn!(error = %e, "Request writer failed, closing transport");
                    return Err(e);
                }
            }
            tracing::debug!("Request writer finished");
            SinkExt::<Bytes>::close(&mut framed).await
        });

        (Self { tx }, handle)
    }
}

impl OutboundTransport for FramedTransport {
    fn post_message(&self, message: String) -> Result<(), TransportError> {
        self.tx.send(message).map_err(|_| TransportError::Closed)
    }
}
