//! Requester-side interactions.
//!
//! Each interaction allocates a stream id, registers the stream, and queues
//! its request frame. Dropping a response future or stream before it
//! terminates sends CANCEL once and releases the id.

use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    connection::{self, ConnectionInner, Priority, QueuedFrame, Side},
    error::RSocketError,
    flow::CreditGate,
    frame::{Frame, RequestFrame},
    handler::{Capabilities, PayloadStream, RSocket, error_stream},
    interceptor::Interceptors,
    lease::Lease,
    payload::Payload,
    stream::{InteractionKind, RegistryError, Role, Signal, StreamEntry, inbound::InboundStream},
};

/// Sends CANCEL and releases the stream unless disarmed.
struct CancelGuard {
    inner: Arc<ConnectionInner>,
    stream_id: u32,
    armed: bool,
}

impl CancelGuard {
    fn new(inner: &Arc<ConnectionInner>, stream_id: u32) -> Self {
        Self {
            inner: Arc::clone(inner),
            stream_id,
            armed: true,
        }
    }

    fn disarm(mut self) { self.armed = false; }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if !self.armed || self.inner.streams.release(self.stream_id).is_none() {
            return;
        }
        tracing::debug!(stream_id = self.stream_id, "request abandoned; cancelling");
        if !self.inner.is_closed() {
            self.inner.send_control(Frame::Cancel {
                stream_id: self.stream_id,
            });
        }
    }
}

struct Registered {
    stream_id: u32,
    rx: mpsc::UnboundedReceiver<Signal>,
    cancel: CancellationToken,
}

fn allocation_error(err: RegistryError) -> RSocketError { RSocketError::rejected(err.to_string()) }

/// The engine's own requester before interceptors are applied.
struct RequesterCore {
    inner: Arc<ConnectionInner>,
}

impl RequesterCore {
    /// Lease first, then connection state.
    fn admit(&self) -> Result<(), RSocketError> {
        if let Some(lease) = self.inner.received_lease() {
            lease.try_use()?;
        }
        self.inner.ensure_open()
    }

    /// Register a stream whose only live direction is inbound. The token
    /// discards the request frame if the stream is released before it is
    /// written.
    fn register(&self, kind: InteractionKind) -> Result<Registered, RSocketError> {
        self.register_with(StreamEntry::new(Role::Requester, kind, self.inner.stream_token()))
    }

    /// Allocate an id for `entry` with an inbound direction attached.
    fn register_with(&self, entry: StreamEntry) -> Result<Registered, RSocketError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = entry.cancel_token();
        let stream_id = self
            .inner
            .streams
            .allocate(entry.with_inbound(tx))
            .map_err(allocation_error)?;
        Ok(Registered { stream_id, rx, cancel })
    }

    async fn open_stream(inner: Arc<ConnectionInner>, payload: Payload) -> Result<PayloadStream, RSocketError> {
        let core = Self { inner };
        core.admit()?;
        let strategy = core.inner.config().request_strategy();
        let demand = Arc::new(CreditGate::new(strategy.start().first_request()));
        let entry = StreamEntry::new(Role::Requester, InteractionKind::RequestStream, core.inner.stream_token())
            .with_demand(Arc::clone(&demand));
        let Registered { stream_id, rx, cancel } = core.register_with(entry)?;
        let inbound = InboundStream::requested(Arc::clone(&core.inner), stream_id, rx, strategy, demand)
            .with_request_token(cancel.clone());
        let frame = RequestFrame::request_stream(stream_id, strategy.start().first_request(), payload);
        core.inner
            .send(QueuedFrame::bound(frame.into(), cancel), Priority::Low)
            .await?;
        tracing::debug!(stream_id, "request-stream sent");
        Ok(inbound.boxed())
    }

    async fn open_channel(
        inner: Arc<ConnectionInner>,
        initial: Payload,
        input: PayloadStream,
    ) -> Result<PayloadStream, RSocketError> {
        let core = Self { inner };
        core.admit()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = core.inner.stream_token();
        let credit = Arc::new(CreditGate::new(0));
        let strategy = core.inner.config().request_strategy();
        let demand = Arc::new(CreditGate::new(strategy.start().first_request()));
        let entry = StreamEntry::new(Role::Requester, InteractionKind::RequestChannel, cancel.clone())
            .with_inbound(tx)
            .with_demand(Arc::clone(&demand))
            .with_outbound(Arc::clone(&credit));
        let stream_id = core.inner.streams.allocate(entry).map_err(allocation_error)?;
        let inbound = InboundStream::requested(Arc::clone(&core.inner), stream_id, rx, strategy, demand);
        let frame = RequestFrame::request_channel(stream_id, strategy.start().first_request(), initial, false);
        core.inner
            .send(QueuedFrame::bound(frame.into(), cancel.clone()), Priority::Low)
            .await?;
        tracing::debug!(stream_id, "request-channel sent");
        let producer = Arc::clone(&core.inner);
        core.inner
            .spawn(connection::drive_output(producer, stream_id, input, credit, cancel));
        Ok(inbound.boxed())
    }
}

/// Defers opening a stream until the returned stream is first polled.
fn lazy_stream<F>(open: F) -> PayloadStream
where
    F: Future<Output = Result<PayloadStream, RSocketError>> + Send + 'static,
{
    stream::once(async move {
        match open.await {
            Ok(stream) => stream,
            Err(err) => error_stream(err),
        }
    })
    .flatten()
    .boxed()
}

#[async_trait]
impl RSocket for RequesterCore {
    async fn metadata_push(&self, metadata: Bytes) -> Result<(), RSocketError> {
        self.inner.ensure_open()?;
        self.inner
            .send(QueuedFrame::new(Frame::MetadataPush(metadata)), Priority::Low)
            .await
    }

    async fn fire_and_forget(&self, payload: Payload) -> Result<(), RSocketError> {
        self.admit()?;
        let stream_id = self.inner.streams.next_id().map_err(allocation_error)?;
        let frame = RequestFrame::fire_and_forget(stream_id, payload);
        self.inner.send(QueuedFrame::new(frame.into()), Priority::Low).await
    }

    async fn request_response(&self, payload: Payload) -> Result<Payload, RSocketError> {
        self.admit()?;
        let Registered {
            stream_id,
            mut rx,
            cancel,
        } = self.register(InteractionKind::RequestResponse)?;
        let guard = CancelGuard::new(&self.inner, stream_id);
        let frame = RequestFrame::request_response(stream_id, payload);
        self.inner
            .send(QueuedFrame::bound(frame.into(), cancel), Priority::Low)
            .await?;
        let result = match rx.recv().await {
            Some(Signal::Next(payload)) => Ok(payload),
            Some(Signal::Complete) => Ok(Payload::EMPTY),
            Some(Signal::Error(err)) => Err(err),
            None => Err(self.inner.closed_error()),
        };
        guard.disarm();
        self.inner.streams.release(stream_id);
        result
    }

    fn request_stream(&self, payload: Payload) -> PayloadStream {
        lazy_stream(Self::open_stream(Arc::clone(&self.inner), payload))
    }

    fn request_channel(&self, initial: Payload, input: PayloadStream) -> PayloadStream {
        lazy_stream(Self::open_channel(Arc::clone(&self.inner), initial, input))
    }
}

/// Handle for sending requests to the peer of one connection.
///
/// Cloning is cheap; all clones share the connection. Requests pass through
/// the requester interceptors configured on the connector or server.
#[derive(Clone)]
pub struct Requester {
    rsocket: Arc<dyn RSocket>,
    inner: Arc<ConnectionInner>,
}

impl Requester {
    pub(crate) fn new(inner: &Arc<ConnectionInner>, interceptors: &Interceptors) -> Self {
        let core: Arc<dyn RSocket> = Arc::new(RequesterCore {
            inner: Arc::clone(inner),
        });
        Self {
            rsocket: interceptors.wrap_requester(core),
            inner: Arc::clone(inner),
        }
    }

    /// Which end of the connection this requester belongs to.
    #[must_use]
    pub fn side(&self) -> Side { self.inner.side() }

    /// Grant the peer a lease and start enforcing it on inbound requests.
    ///
    /// # Errors
    ///
    /// Returns `INVALID` when leasing was not negotiated, or the close
    /// reason when the connection is gone.
    pub async fn send_lease(&self, lease: Lease) -> Result<(), RSocketError> {
        let Some(granted) = self.inner.granted_lease() else {
            return Err(RSocketError::invalid("leasing was not negotiated for this connection"));
        };
        self.inner.ensure_open()?;
        granted.apply(&lease);
        self.inner
            .send(QueuedFrame::new(Frame::Lease(lease)), Priority::High)
            .await
    }

    /// Requests left in the lease granted by the peer; `None` when leasing
    /// is not in use.
    #[must_use]
    pub fn available_requests(&self) -> Option<u32> { self.inner.received_lease().map(|lease| lease.remaining()) }

    /// Close the connection, telling the peer with CONNECTION_CLOSE.
    pub async fn close(&self) {
        self.inner
            .terminate(RSocketError::connection_close("closed by application"), true)
            .await;
    }

    /// Wait until the connection closes and return why.
    pub async fn closed(&self) -> RSocketError { self.inner.closed().await }

    /// Whether the connection has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.inner.is_closed() }

    /// Number of live streams on this connection.
    #[must_use]
    pub fn active_streams(&self) -> usize { self.inner.streams.len() }
}

impl fmt::Debug for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requester")
            .field("side", &self.inner.side())
            .field("closed", &self.inner.is_closed())
            .field("active_streams", &self.inner.streams.len())
            .finish()
    }
}

#[async_trait]
impl RSocket for Requester {
    fn capabilities(&self) -> Capabilities { self.rsocket.capabilities() }

    async fn metadata_push(&self, metadata: Bytes) -> Result<(), RSocketError> {
        self.rsocket.metadata_push(metadata).await
    }

    async fn fire_and_forget(&self, payload: Payload) -> Result<(), RSocketError> {
        self.rsocket.fire_and_forget(payload).await
    }

    async fn request_response(&self, payload: Payload) -> Result<Payload, RSocketError> {
        self.rsocket.request_response(payload).await
    }

    fn request_stream(&self, payload: Payload) -> PayloadStream { self.rsocket.request_stream(payload) }

    fn request_channel(&self, initial: Payload, input: PayloadStream) -> PayloadStream {
        self.rsocket.request_channel(initial, input)
    }
}
