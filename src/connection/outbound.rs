//! Prioritised outbound queues feeding the connection writer.
//!
//! Control frames (REQUEST_N, CANCEL, KEEPALIVE, LEASE, rejections) travel
//! on the high-priority queue; request, payload and stream ERROR frames on
//! the low-priority one.
//! The control queue is unbounded so synchronous paths (the reader loop,
//! drop handlers) can queue without waiting; its depth is limited by the
//! number of live streams. The payload queue is bounded and applies
//! backpressure to producers. Frames keep FIFO order within a priority
//! level. Producers hold a
//! cloneable [`OutboundHandle`]; the writer owns [`OutboundQueues`].

use std::fmt;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::frame::Frame;

/// Consecutive high-priority frames written before the low-priority queue
/// gets a turn.
pub(crate) const HIGH_PRIORITY_BURST_LIMIT: usize = 8;

/// Priority level for outbound frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    /// Connection and stream control.
    High,
    /// Requests and payloads.
    Low,
}

/// Failures when queueing a frame.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum OutboundError {
    /// The writer has stopped.
    #[error("outbound queue closed")]
    Closed,
}

/// A frame waiting for the writer, optionally bound to a stream's
/// cancellation token. Frames whose token fired are discarded unsent.
pub(crate) struct QueuedFrame {
    pub(crate) frame: Frame,
    cancel: Option<CancellationToken>,
}

impl QueuedFrame {
    pub(crate) fn new(frame: Frame) -> Self { Self { frame, cancel: None } }

    pub(crate) fn bound(frame: Frame, cancel: CancellationToken) -> Self {
        Self {
            frame,
            cancel: Some(cancel),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

impl fmt::Debug for QueuedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedFrame")
            .field("stream_id", &self.frame.stream_id())
            .field("frame_type", &self.frame.frame_type())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Producer side of the outbound queues.
#[derive(Clone, Debug)]
pub(crate) struct OutboundHandle {
    high_tx: mpsc::UnboundedSender<QueuedFrame>,
    low_tx: mpsc::Sender<QueuedFrame>,
}

impl OutboundHandle {
    /// Queue a frame, waiting for payload-queue capacity.
    ///
    /// Capacity is reserved before the frame is handed over so a closed
    /// writer is reported instead of silently dropping the frame.
    pub(crate) async fn send(&self, frame: QueuedFrame, priority: Priority) -> Result<(), OutboundError> {
        if priority == Priority::High {
            return self.send_control(frame).map_err(|(err, _)| err);
        }
        let permit = self
            .low_tx
            .clone()
            .reserve_owned()
            .await
            .map_err(|_| OutboundError::Closed)?;
        tracing::trace!(?priority, ?frame, "frame queued");
        let returned = permit.send(frame);
        if returned.is_closed() {
            return Err(OutboundError::Closed);
        }
        Ok(())
    }

    /// Queue a control frame behind every control frame queued before it.
    /// Fails only once the writer has stopped; the frame is handed back.
    pub(crate) fn send_control(&self, frame: QueuedFrame) -> Result<(), (OutboundError, QueuedFrame)> {
        tracing::trace!(priority = ?Priority::High, ?frame, "frame queued");
        self.high_tx
            .send(frame)
            .map_err(|mpsc::error::SendError(frame)| (OutboundError::Closed, frame))
    }
}

/// Receiver side of the outbound queues, owned by the writer.
pub(crate) struct OutboundQueues {
    high_rx: mpsc::UnboundedReceiver<QueuedFrame>,
    low_rx: mpsc::Receiver<QueuedFrame>,
    high_streak: usize,
}

impl OutboundQueues {
    /// Build the queues and their producer handle; `low_capacity` bounds
    /// the payload queue.
    pub(crate) fn new(low_capacity: usize) -> (Self, OutboundHandle) {
        let (high_tx, high_rx) = mpsc::unbounded_channel();
        let (low_tx, low_rx) = mpsc::channel(low_capacity.max(1));
        (
            Self {
                high_rx,
                low_rx,
                high_streak: 0,
            },
            OutboundHandle { high_tx, low_tx },
        )
    }

    /// Receive the next frame, preferring high priority.
    ///
    /// After [`HIGH_PRIORITY_BURST_LIMIT`] consecutive high-priority frames a
    /// ready low-priority frame is taken first. Returns `None` once both
    /// queues are closed and drained.
    pub(crate) async fn recv(&mut self) -> Option<(Priority, QueuedFrame)> {
        if self.high_streak >= HIGH_PRIORITY_BURST_LIMIT {
            self.high_streak = 0;
            if let Ok(frame) = self.low_rx.try_recv() {
                return Some((Priority::Low, frame));
            }
        }
        let mut high_closed = false;
        let mut low_closed = false;
        loop {
            tokio::select! {
                biased;
                res = self.high_rx.recv(), if !high_closed => match res {
                    Some(frame) => {
                        self.high_streak += 1;
                        return Some((Priority::High, frame));
                    }
                    None => high_closed = true,
                },
                res = self.low_rx.recv(), if !low_closed => match res {
                    Some(frame) => {
                        self.high_streak = 0;
                        return Some((Priority::Low, frame));
                    }
                    None => low_closed = true,
                },
                else => return None,
            }
        }
    }

    /// Close both receivers; later sends fail with [`OutboundError::Closed`].
    pub(crate) fn close(&mut self) {
        self.high_rx.close();
        self.low_rx.close();
    }
}
