//! Writer task: drains the outbound queues onto the transport.
//!
//! Shutdown is observed first, then high-priority frames, then low-priority
//! frames. Request and payload frames are fragmented here when the engine
//! is configured to do so, so producers always queue logical frames.

use std::sync::Arc;

use super::{ConnectionInner, OutboundQueues, Priority, QueuedFrame};
use crate::{
    error::RSocketError,
    fragment::Fragmenter,
    frame::Frame,
    metrics::{self, Direction},
};

pub(super) async fn run(inner: Arc<ConnectionInner>, mut queues: OutboundQueues) {
    let fragmenter = inner.config().fragmentation().map(Fragmenter::new);
    loop {
        let next = tokio::select! {
            biased;
            () = inner.shutdown.cancelled() => None,
            next = queues.recv() => next,
        };
        let Some((priority, queued)) = next else {
            break;
        };
        if queued.is_cancelled() {
            tracing::trace!(?priority, ?queued, "discarding frame of cancelled stream");
            continue;
        }
        if !write(&inner, fragmenter.as_ref(), queued).await {
            break;
        }
    }
    queues.close();
    tracing::debug!(side = %inner.side(), "writer stopped");
}

/// Write one queued frame; returns `false` once the connection is unusable.
async fn write(inner: &Arc<ConnectionInner>, fragmenter: Option<&Fragmenter>, queued: QueuedFrame) -> bool {
    let frames = match (queued.frame, fragmenter) {
        (Frame::Request(request), Some(fragmenter)) => fragmenter
            .fragment(request)
            .into_iter()
            .map(Frame::Request)
            .collect(),
        (frame, _) => vec![frame],
    };
    for frame in frames {
        if inner.shutdown.is_cancelled() {
            return false;
        }
        let bytes = match frame.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                encode_failed(inner, &frame, &err.to_string()).await;
                return !inner.is_closed();
            }
        };
        if let Err(err) = inner.transport.send(bytes).await {
            inner
                .terminate(RSocketError::connection_error(format!("transport write failed: {err}")), false)
                .await;
            return false;
        }
        metrics::inc_frames(Direction::Outbound);
        tracing::trace!(
            stream_id = frame.stream_id(),
            frame_type = ?frame.frame_type(),
            "frame written"
        );
    }
    true
}

/// A frame the codec cannot represent fails its stream locally; on stream 0
/// it fails the connection.
async fn encode_failed(inner: &Arc<ConnectionInner>, frame: &Frame, reason: &str) {
    metrics::inc_errors(metrics::ErrorKind::Frame);
    let stream_id = frame.stream_id();
    tracing::warn!(stream_id, frame_type = ?frame.frame_type(), reason, "frame could not be encoded");
    if stream_id == 0 {
        inner
            .terminate(RSocketError::connection_error(format!("frame could not be encoded: {reason}")), true)
            .await;
        return;
    }
    let error = RSocketError::invalid(format!("frame could not be encoded: {reason}"));
    let announced = !matches!(frame, Frame::Request(request) if request.frame_type.is_request());
    inner.streams.fail(stream_id, error.clone());
    if announced && !matches!(frame, Frame::Error(_)) {
        let reply = QueuedFrame::new(Frame::error(stream_id, error.into_stream_error()));
        if let Err((err, _)) = inner.outbound.send_control(reply) {
            tracing::debug!(stream_id, error = %err, "could not report encoding failure");
        }
    }
}
