//! Consumer side of an inbound payload stream.
//!
//! [`InboundStream`] turns registry signals into a `Stream` of payloads and
//! sends REQUEST_N as items are consumed. The demand it grants is shared
//! with the registry entry, which refuses NEXT frames beyond it.
//! Dropping it before the stream terminates cancels the stream.

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::Signal;
use crate::{
    connection::{ConnectionInner, QueuedFrame},
    error::RSocketError,
    flow::{CreditGate, DemandTracker, RequestStrategy},
    frame::Frame,
    payload::Payload,
};

/// What an early drop releases besides sending CANCEL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Abandon {
    /// Requester side: the whole stream is released.
    Stream,
    /// Responder channel input: only the inbound direction closes; the
    /// responder's output keeps running.
    Inbound,
}

/// Inbound payloads of one stream.
pub(crate) struct InboundStream {
    inner: Arc<ConnectionInner>,
    stream_id: u32,
    rx: mpsc::UnboundedReceiver<Signal>,
    credit: Arc<CreditGate>,
    demand: DemandTracker,
    pending_request: Option<u32>,
    request_token: Option<CancellationToken>,
    abandon: Abandon,
    done: bool,
}

impl InboundStream {
    /// Stream whose initial demand travelled with the request frame;
    /// `credit` must already hold it.
    pub(crate) fn requested(
        inner: Arc<ConnectionInner>,
        stream_id: u32,
        rx: mpsc::UnboundedReceiver<Signal>,
        strategy: RequestStrategy,
        credit: Arc<CreditGate>,
    ) -> Self {
        let demand = strategy.start();
        Self {
            inner,
            stream_id,
            rx,
            credit,
            demand,
            pending_request: None,
            request_token: None,
            abandon: Abandon::Stream,
            done: false,
        }
    }

    /// Channel input on the responder; the initial REQUEST_N is sent on
    /// first poll.
    pub(crate) fn channel_input(
        inner: Arc<ConnectionInner>,
        stream_id: u32,
        rx: mpsc::UnboundedReceiver<Signal>,
        strategy: RequestStrategy,
        credit: Arc<CreditGate>,
    ) -> Self {
        let demand = strategy.start();
        Self {
            inner,
            stream_id,
            rx,
            credit,
            pending_request: Some(demand.first_request()),
            demand,
            request_token: None,
            abandon: Abandon::Inbound,
            done: false,
        }
    }

    /// Discard queued REQUEST_N frames once `token` fires. Only valid when
    /// the token ends with the inbound direction.
    pub(crate) fn with_request_token(mut self, token: CancellationToken) -> Self {
        self.request_token = Some(token);
        self
    }

    fn request(&mut self, n: u32) {
        self.credit.grant(n);
        let frame = Frame::RequestN {
            stream_id: self.stream_id,
            n,
        };
        self.inner.queue_control(match &self.request_token {
            Some(token) => QueuedFrame::bound(frame, token.clone()),
            None => QueuedFrame::new(frame),
        });
    }

    fn abandon(&mut self) {
        self.done = true;
        self.inner.send_control(Frame::Cancel {
            stream_id: self.stream_id,
        });
        match self.abandon {
            Abandon::Stream => {
                self.inner.streams.release(self.stream_id);
            }
            Abandon::Inbound => self.inner.streams.close_inbound(self.stream_id),
        }
    }
}

impl Stream for InboundStream {
    type Item = Result<Payload, RSocketError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(None);
        }
        if let Some(n) = this.pending_request.take() {
            this.request(n);
        }
        let Some(signal) = std::task::ready!(this.rx.poll_recv(cx)) else {
            this.done = true;
            return Poll::Ready(None);
        };
        match signal {
            Signal::Next(payload) => {
                if let Some(n) = this.demand.next_request() {
                    this.request(n);
                }
                Poll::Ready(Some(Ok(payload)))
            }
            Signal::Complete => {
                this.done = true;
                Poll::Ready(None)
            }
            Signal::Error(err) => {
                this.done = true;
                Poll::Ready(Some(Err(err)))
            }
        }
    }
}

impl Drop for InboundStream {
    fn drop(&mut self) {
        if !self.done && !self.inner.is_closed() && self.inner.streams.inbound_open(self.stream_id) {
            tracing::debug!(stream_id = self.stream_id, "inbound stream dropped early; cancelling");
            self.abandon();
        }
    }
}
