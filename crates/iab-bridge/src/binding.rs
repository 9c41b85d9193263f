//! Host binding: feeds completions arriving on a byte stream into a bridge.
//!
//! The host answers with length-prefixed JSON frames, one [`Completion`] each.
//! This is the only place inbound bytes meet the bridge; the bridge itself never
//! reads from a transport.

use std::io;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::bridge::codec::JsonCodec;
use crate::bridge::protocol::Completion;
use crate::provider::RequestBridge;

/// Counters reported when a completion stream ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionStats {
    pub applied: usize,
    /// Completions for ids that were not pending (already logged by the bridge).
    pub rejected: usize,
}

/// Apply every completion read from `reader` until end of stream.
///
/// Completions for unknown ids are counted and skipped. A malformed frame ends the
/// loop with an `InvalidData` error.
pub async fn run_completion_loop<R>(
    reader: R,
    bridge: Arc<RequestBridge>,
) -> io::Result<CompletionStats>
where
    R: AsyncRead + Unpin,
{
    let mut frames = FramedRead::new(reader, JsonCodec::<Completion>::new());
    let mut stats = CompletionStats::default();

    while let Some(frame) = frames.next().await {
        let completion = frame.inspect_err(|e| {
            tracing::error!(error = %e, "Failed to decode completion frame");
        })?;

        match bridge.apply(completion) {
            Ok(()) => stats.applied += 1,
            Err(_) => stats.rejected += 1,
        }
    }

    tracing::debug!(
        applied = stats.applied,
        rejected = stats.rejected,
        pending = bridge.pending_count(),
        "Completion stream closed"
    );
    Ok(stats)
}
