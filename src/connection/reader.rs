//! Reader loop: decodes inbound frames and dispatches them in order.
//!
//! Stream 0 frames are handled here. Request frames go through the
//! reassembler first; complete requests are handed to the responder, while
//! PAYLOAD, REQUEST_N, CANCEL and ERROR frames are routed to the stream
//! registry. Frames for unknown streams are late arrivals and are dropped.

use std::{panic::AssertUnwindSafe, sync::Arc};

use bytes::Bytes;
use futures::FutureExt;

use super::{ConnectionInner, counter::ActiveConnection};
use crate::{
    error::RSocketError,
    flow::FlowControlError,
    fragment::Reassembler,
    frame::{ErrorFrame, Frame, FrameType, RequestFrame},
    handler::RSocket,
    keepalive,
    metrics::{self, Direction},
    panic::format_panic,
    responder,
    stream::{Role, Signal},
};

pub(super) async fn run(inner: Arc<ConnectionInner>, responder: Arc<dyn RSocket>) {
    let _guard = ActiveConnection::open(inner.side());
    let reassembler = Reassembler::new(inner.config().max_reassembly_size());
    let mut dispatcher = Dispatcher {
        inner: Arc::clone(&inner),
        responder,
        reassembler,
    };
    loop {
        let received = tokio::select! {
            biased;
            () = inner.shutdown.cancelled() => break,
            received = inner.transport.receive() => received,
        };
        let bytes = match received {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                inner
                    .terminate(RSocketError::connection_close("connection closed by peer"), false)
                    .await;
                break;
            }
            Err(err) => {
                inner
                    .terminate(RSocketError::connection_error(format!("transport read failed: {err}")), false)
                    .await;
                break;
            }
        };
        inner.keepalive.mark_activity();
        metrics::inc_frames(Direction::Inbound);
        let result = match Frame::decode(bytes) {
            Ok(frame) => dispatcher.dispatch(frame).await,
            Err(err) if err.is_ignorable() => {
                tracing::debug!(error = %err, "ignoring unknown frame");
                Ok(())
            }
            Err(err) => {
                metrics::inc_errors(metrics::ErrorKind::Frame);
                Err(RSocketError::connection_error(format!("malformed frame: {err}")))
            }
        };
        if let Err(err) = result {
            inner.terminate(err, true).await;
            break;
        }
    }
    dispatcher.reassembler.clear();
}

struct Dispatcher {
    inner: Arc<ConnectionInner>,
    responder: Arc<dyn RSocket>,
    reassembler: Reassembler,
}

impl Dispatcher {
    /// Handle one frame. An error is a connection-level failure.
    async fn dispatch(&mut self, frame: Frame) -> Result<(), RSocketError> {
        tracing::trace!(
            stream_id = frame.stream_id(),
            frame_type = ?frame.frame_type(),
            "frame received"
        );
        match frame {
            Frame::Setup(_) => Err(RSocketError::connection_error("unexpected SETUP frame")),
            Frame::Lease(lease) => {
                match self.inner.received_lease() {
                    Some(tracker) => {
                        tracing::debug!(
                            ttl_ms = lease.ttl.as_millis(),
                            requests = lease.number_of_requests,
                            "lease received"
                        );
                        tracker.apply(&lease);
                    }
                    None => tracing::debug!("ignoring LEASE; leasing was not negotiated"),
                }
                Ok(())
            }
            Frame::KeepAlive(frame) => {
                if let Some(reply) = keepalive::echo(&frame) {
                    self.inner.send_control(reply);
                }
                Ok(())
            }
            Frame::MetadataPush(metadata) => {
                self.metadata_push(metadata);
                Ok(())
            }
            Frame::Resume(_) | Frame::ResumeOk { .. } => {
                Err(RSocketError::rejected_resume("resumption is not supported"))
            }
            Frame::Error(ErrorFrame { stream_id: 0, error }) => {
                self.inner.terminate(error, false).await;
                Ok(())
            }
            Frame::Error(ErrorFrame { stream_id, error }) => {
                self.reassembler.discard(stream_id);
                if !self.inner.streams.fail(stream_id, error) {
                    tracing::trace!(stream_id, "ERROR for unknown stream dropped");
                }
                Ok(())
            }
            Frame::RequestN { stream_id, n } => {
                if !self.inner.streams.grant(stream_id, n) {
                    tracing::trace!(stream_id, n, "REQUEST_N for unknown stream dropped");
                }
                Ok(())
            }
            Frame::Cancel { stream_id } => {
                self.cancel(stream_id);
                Ok(())
            }
            Frame::Request(frame) => self.request(frame),
            Frame::Extension(frame) if frame.ignore => {
                tracing::debug!(extended_type = frame.extended_type, "ignoring extension frame");
                Ok(())
            }
            Frame::Extension(frame) => Err(RSocketError::connection_error(format!(
                "unsupported extension frame {:#x}",
                frame.extended_type
            ))),
        }
    }

    fn request(&mut self, frame: RequestFrame) -> Result<(), RSocketError> {
        let frame = match self.reassembler.push(frame) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(()),
            Err(err) => {
                metrics::inc_errors(metrics::ErrorKind::Frame);
                return Err(RSocketError::connection_error(err.to_string()));
            }
        };
        if frame.frame_type == FrameType::Payload {
            self.payload(frame);
        } else {
            responder::handle_request(&self.inner, &self.responder, frame);
        }
        Ok(())
    }

    fn payload(&self, frame: RequestFrame) {
        let stream_id = frame.stream_id;
        if !frame.next && !frame.complete {
            tracing::debug!(stream_id, "PAYLOAD without NEXT or COMPLETE dropped");
            return;
        }
        let mut delivered = true;
        if frame.next {
            match self.inner.streams.deliver_next(stream_id, frame.payload) {
                Ok(next) => delivered = next,
                Err(err) => {
                    self.overrun(stream_id, &err);
                    return;
                }
            }
        }
        if frame.complete {
            delivered &= self.inner.streams.deliver(stream_id, Signal::Complete);
        }
        if !delivered {
            tracing::trace!(stream_id, "PAYLOAD for unknown stream dropped");
        }
    }

    /// The peer sent NEXT beyond the demand this side granted: the consumer
    /// sees INVALID and the peer gets CANCEL. A responder's channel output
    /// keeps running.
    fn overrun(&self, stream_id: u32, err: &FlowControlError) {
        tracing::debug!(stream_id, error = %err, "payload exceeded demand");
        let error = RSocketError::invalid(err.to_string());
        match self.inner.streams.role(stream_id) {
            Some(Role::Requester) => {
                self.inner.streams.fail(stream_id, error);
            }
            Some(Role::Responder) => {
                self.inner.streams.deliver(stream_id, Signal::Error(error));
            }
            None => return,
        }
        self.inner.send_control(Frame::Cancel { stream_id });
    }

    /// A requester CANCEL stops this responder's output and ends the channel
    /// input; a responder CANCEL only stops this requester's channel output.
    fn cancel(&mut self, stream_id: u32) {
        self.reassembler.discard(stream_id);
        match self.inner.streams.role(stream_id) {
            Some(Role::Responder) => {
                self.inner.streams.cancel_outbound(stream_id);
                self.inner
                    .streams
                    .deliver(stream_id, Signal::Error(RSocketError::canceled("cancelled by requester")));
            }
            Some(Role::Requester) => self.inner.streams.cancel_outbound(stream_id),
            None => tracing::trace!(stream_id, "CANCEL for unknown stream dropped"),
        }
    }

    fn metadata_push(&self, metadata: Bytes) {
        if !self.responder.capabilities().metadata_push {
            tracing::debug!("metadata push not supported; dropped");
            return;
        }
        let responder = Arc::clone(&self.responder);
        self.inner.spawn(async move {
            match AssertUnwindSafe(responder.metadata_push(metadata)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::debug!(code = %err.code, message = %err.message, "metadata push failed"),
                Err(panic) => log::error!("metadata push handler panicked: panic={}", format_panic(panic)),
            }
        });
    }
}
