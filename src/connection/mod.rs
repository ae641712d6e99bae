//! The per-connection engine shared by clients and servers.
//!
//! A connection runs three long-lived tasks: the writer draining the
//! outbound queues onto the transport, the reader decoding inbound frames
//! and dispatching them in order, and the keepalive monitor. Stream
//! production (responder outputs, channel inputs) runs in further tasks
//! tracked by a [`TaskTracker`] and stopped by child tokens of the
//! connection's shutdown token.

mod counter;
mod outbound;
mod reader;
mod writer;

use std::{
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{Arc, OnceLock},
    time::Duration,
};

pub use counter::active_connection_count;
use futures::{FutureExt, StreamExt};
pub use outbound::{OutboundError, Priority};
pub(crate) use outbound::{OutboundHandle, OutboundQueues, QueuedFrame};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::EngineConfig,
    error::{ErrorCode, RSocketError},
    flow::CreditGate,
    frame::{Frame, RequestFrame},
    handler::{PayloadStream, RSocket},
    keepalive::KeepAliveMonitor,
    lease::LeaseTracker,
    metrics,
    panic::format_panic,
    setup::ConnectionSetup,
    stream::{StreamIdAllocator, StreamRegistry},
    transport::Connection,
};

/// How long teardown waits on the transport for the final ERROR frame and
/// for the close handshake.
pub(crate) const TEARDOWN_GRACE: Duration = Duration::from_secs(1);

/// Which end of the connection this peer is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Sent SETUP; allocates odd stream ids.
    Client,
    /// Accepted SETUP; allocates even stream ids.
    Server,
}

impl Side {
    fn allocator(self) -> StreamIdAllocator {
        match self {
            Self::Client => StreamIdAllocator::client(),
            Self::Server => StreamIdAllocator::server(),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Client => "client",
            Self::Server => "server",
        })
    }
}

/// State shared by every task of one connection.
pub(crate) struct ConnectionInner {
    side: Side,
    transport: Arc<dyn Connection>,
    outbound: OutboundHandle,
    pub(crate) streams: StreamRegistry,
    shutdown: CancellationToken,
    tasks: TaskTracker,
    config: EngineConfig,
    keepalive: KeepAliveMonitor,
    received_lease: Option<LeaseTracker>,
    granted_lease: Option<LeaseTracker>,
    close_reason: OnceLock<RSocketError>,
}

impl ConnectionInner {
    /// Build the engine state for a negotiated connection. The writer is not
    /// running until [`spawn_writer`] is called with the returned queues.
    pub(crate) fn new(
        side: Side,
        transport: Arc<dyn Connection>,
        setup: &ConnectionSetup,
        config: EngineConfig,
    ) -> (Arc<Self>, OutboundQueues) {
        let (queues, outbound) = OutboundQueues::new(config.low_capacity());
        let lease = || setup.honor_lease.then(LeaseTracker::new);
        let inner = Arc::new(Self {
            side,
            transport,
            outbound,
            streams: StreamRegistry::new(side.allocator()),
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
            config,
            keepalive: KeepAliveMonitor::new(setup.keep_alive),
            received_lease: lease(),
            granted_lease: lease(),
            close_reason: OnceLock::new(),
        });
        (inner, queues)
    }

    pub(crate) fn side(&self) -> Side { self.side }

    pub(crate) fn config(&self) -> &EngineConfig { &self.config }

    /// Allowance granted by the peer, when leasing was negotiated.
    pub(crate) fn received_lease(&self) -> Option<&LeaseTracker> { self.received_lease.as_ref() }

    /// Allowance this side granted, when leasing was negotiated.
    pub(crate) fn granted_lease(&self) -> Option<&LeaseTracker> { self.granted_lease.as_ref() }

    /// Token for one stream's outbound direction, cancelled with the
    /// connection.
    pub(crate) fn stream_token(&self) -> CancellationToken { self.shutdown.child_token() }

    pub(crate) fn is_closed(&self) -> bool { self.shutdown.is_cancelled() }

    /// Why the connection closed, if it has.
    pub(crate) fn close_reason(&self) -> Option<RSocketError> {
        self.close_reason.get().cloned().or_else(|| {
            self.is_closed()
                .then(|| RSocketError::connection_close("connection closed"))
        })
    }

    /// Fail fast when the connection is gone.
    pub(crate) fn ensure_open(&self) -> Result<(), RSocketError> {
        self.close_reason().map_or(Ok(()), Err)
    }

    /// Error reported to callers whose frames could not be queued.
    pub(crate) fn closed_error(&self) -> RSocketError {
        self.close_reason()
            .unwrap_or_else(|| RSocketError::connection_close("connection closed"))
    }

    /// Wait until the connection closes and report why.
    pub(crate) async fn closed(&self) -> RSocketError {
        self.shutdown.cancelled().await;
        self.closed_error()
    }

    /// Queue `frame`, waiting for capacity.
    pub(crate) async fn send(&self, frame: QueuedFrame, priority: Priority) -> Result<(), RSocketError> {
        self.outbound
            .send(frame, priority)
            .await
            .map_err(|_| self.closed_error())
    }

    /// Queue a control frame without blocking the caller.
    ///
    /// Used from the reader loop and from synchronous drop paths. Control
    /// frames reach the writer in the order they were queued.
    pub(crate) fn send_control(&self, frame: Frame) { self.queue_control(QueuedFrame::new(frame)); }

    /// As [`Self::send_control`], for a frame bound to a stream token.
    pub(crate) fn queue_control(&self, frame: QueuedFrame) {
        if let Err((_, frame)) = self.outbound.send_control(frame) {
            tracing::trace!(?frame, "connection closed; control frame dropped");
        }
    }

    /// Send a stream ERROR, mapping non-stream codes to APPLICATION_ERROR.
    ///
    /// The frame shares the payload queue so it follows every PAYLOAD the
    /// stream already queued.
    pub(crate) async fn send_error(&self, stream_id: u32, error: RSocketError) {
        metrics::inc_errors(metrics::ErrorKind::Stream);
        let frame = Frame::error(stream_id, error.into_stream_error());
        let _ = self.send(QueuedFrame::new(frame), Priority::Low).await;
    }

    /// Run `future` on the connection's task tracker, converting a panic
    /// into a log entry.
    pub(crate) fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let side = self.side;
        self.tasks.spawn(async move {
            if let Err(panic) = AssertUnwindSafe(future).catch_unwind().await {
                log::error!("connection task panicked: side={side}, panic={}", format_panic(panic));
            }
        });
    }

    /// Best-effort ERROR on stream 0; a stalled transport gives up after
    /// [`TEARDOWN_GRACE`].
    async fn notify_peer(&self, reason: &RSocketError) {
        let bytes = match Frame::error(0, reason.clone()).to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(error = %err, "could not encode connection error");
                return;
            }
        };
        match tokio::time::timeout(TEARDOWN_GRACE, self.transport.send(bytes)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::debug!(error = %err, "could not deliver connection error"),
            Err(_) => tracing::debug!(side = %self.side, "connection error not delivered before deadline"),
        }
    }

    /// Close the connection once: record `reason`, stop every task, fail
    /// every stream, optionally tell the peer with ERROR on stream 0, and
    /// close the transport.
    pub(crate) async fn terminate(&self, reason: RSocketError, notify_peer: bool) {
        if self.close_reason.set(reason.clone()).is_err() {
            return;
        }
        if reason.code == ErrorCode::CONNECTION_CLOSE {
            log::info!(
                "connection closing: side={}, code={}, message={}",
                self.side,
                reason.code,
                reason.message
            );
        } else {
            metrics::inc_errors(metrics::ErrorKind::Connection);
            log::warn!(
                "connection failed: side={}, code={}, message={}",
                self.side,
                reason.code,
                reason.message
            );
        }
        self.shutdown.cancel();
        let streams = self.streams.close_all(&reason);
        tracing::debug!(side = %self.side, streams, "streams closed");
        if notify_peer {
            self.notify_peer(&reason).await;
        }
        if tokio::time::timeout(TEARDOWN_GRACE, self.transport.close())
            .await
            .is_err()
        {
            tracing::debug!(side = %self.side, "transport close timed out");
        }
        self.tasks.close();
    }
}

/// Start the writer task for `inner`.
pub(crate) fn spawn_writer(inner: &Arc<ConnectionInner>, queues: OutboundQueues) {
    let writer_inner = Arc::clone(inner);
    inner.spawn(writer::run(writer_inner, queues));
}

/// Start the reader loop dispatching requests to `responder`.
pub(crate) fn spawn_reader(inner: &Arc<ConnectionInner>, responder: Arc<dyn RSocket>) {
    let reader_inner = Arc::clone(inner);
    inner.spawn(reader::run(reader_inner, responder));
}

/// Start the keepalive monitor.
pub(crate) fn spawn_keepalive(inner: &Arc<ConnectionInner>) {
    let monitor_inner = Arc::clone(inner);
    inner.spawn(async move {
        let inner = monitor_inner;
        let outbound = inner.outbound.clone();
        let result = inner
            .keepalive
            .run(inner.shutdown.clone(), move |frame| {
                let outbound = outbound.clone();
                async move {
                    outbound
                        .send(QueuedFrame::new(frame), Priority::High)
                        .await
                        .is_ok()
                }
            })
            .await;
        if let Err(err) = result {
            log::warn!("keepalive timeout: side={}, message={}", inner.side, err.message);
            inner.terminate(err, true).await;
        }
    });
}

/// Emit `output` as PAYLOAD frames on `stream_id`, one per unit of credit.
///
/// Items are pulled before credit is awaited, so completion and errors are
/// sent even when the peer's demand is exhausted. An error fails the local
/// stream and is reported with ERROR; `cancel` stops production silently.
pub(crate) async fn drive_output(
    inner: Arc<ConnectionInner>,
    stream_id: u32,
    mut output: PayloadStream,
    credit: Arc<CreditGate>,
    cancel: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            item = output.next() => item,
        };
        match item {
            Some(Ok(payload)) => {
                if !credit.acquire(&cancel).await {
                    return;
                }
                let frame = QueuedFrame::bound(RequestFrame::next(stream_id, payload).into(), cancel.clone());
                if inner.send(frame, Priority::Low).await.is_err() {
                    return;
                }
            }
            Some(Err(err)) => {
                tracing::debug!(stream_id, code = %err.code, "stream output failed");
                inner.streams.fail(stream_id, err.clone());
                inner.send_error(stream_id, err).await;
                return;
            }
            None => {
                let frame = QueuedFrame::bound(RequestFrame::complete(stream_id).into(), cancel.clone());
                if inner.send(frame, Priority::Low).await.is_ok() {
                    inner.streams.complete_outbound(stream_id);
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests;
