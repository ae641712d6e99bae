//! Responder-side interactions.
//!
//! [`handle_request`] is called by the reader loop for every complete
//! request frame. It validates the stream id, the lease and the handler's
//! capabilities, registers the stream, and runs the handler in a task so
//! the reader never waits on application code.

use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::{FutureExt, StreamExt, stream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    connection::{self, ConnectionInner, Priority, QueuedFrame},
    error::RSocketError,
    flow::CreditGate,
    frame::{Frame, RequestFrame},
    handler::{PayloadStream, RSocket, unsupported},
    panic::{format_panic, panic_error},
    stream::{InteractionKind, Role, StreamEntry, inbound::InboundStream},
};

pub(crate) fn handle_request(inner: &Arc<ConnectionInner>, handler: &Arc<dyn RSocket>, frame: RequestFrame) {
    let stream_id = frame.stream_id;
    let Some(kind) = InteractionKind::from_frame_type(frame.frame_type) else {
        return;
    };
    if let Err(err) = admit(inner, handler.as_ref(), stream_id, kind) {
        reject(inner, stream_id, kind, err);
        return;
    }
    tracing::debug!(stream_id, %kind, "request accepted");
    match kind {
        InteractionKind::FireAndForget => fire_and_forget(inner, handler, frame),
        InteractionKind::RequestResponse => request_response(inner, handler, frame),
        InteractionKind::RequestStream => request_stream(inner, handler.as_ref(), frame),
        InteractionKind::RequestChannel => request_channel(inner, handler.as_ref(), frame),
        InteractionKind::MetadataPush => {}
    }
}

fn admit(
    inner: &ConnectionInner,
    handler: &dyn RSocket,
    stream_id: u32,
    kind: InteractionKind,
) -> Result<(), RSocketError> {
    if inner.streams.owns(stream_id) {
        return Err(RSocketError::invalid(format!(
            "stream {stream_id} belongs to the {}",
            inner.side()
        )));
    }
    if inner.streams.contains(stream_id) {
        return Err(RSocketError::invalid(format!("stream {stream_id} is already active")));
    }
    if !handler.capabilities().supports(kind) {
        return Err(unsupported(kind));
    }
    if let Some(lease) = inner.granted_lease() {
        lease.try_use()?;
    }
    Ok(())
}

/// Refuse a request; fire-and-forget has no stream to answer on.
fn reject(inner: &Arc<ConnectionInner>, stream_id: u32, kind: InteractionKind, error: RSocketError) {
    tracing::debug!(stream_id, %kind, code = %error.code, message = %error.message, "request rejected");
    crate::metrics::inc_errors(crate::metrics::ErrorKind::Stream);
    if kind != InteractionKind::FireAndForget {
        inner.send_control(Frame::error(stream_id, error.into_stream_error()));
    }
}

/// Guard a handler stream against panics: a panic ends the stream with
/// APPLICATION_ERROR.
fn catch_stream(output: PayloadStream) -> PayloadStream {
    AssertUnwindSafe(output)
        .catch_unwind()
        .map(|item| item.unwrap_or_else(|panic| Err(panic_error(panic))))
        .boxed()
}

fn call_stream(make: impl FnOnce() -> PayloadStream) -> PayloadStream {
    match std::panic::catch_unwind(AssertUnwindSafe(make)) {
        Ok(output) => catch_stream(output),
        Err(panic) => {
            let error = panic_error(panic);
            stream::once(async move { Err(error) }).boxed()
        }
    }
}

fn fire_and_forget(inner: &Arc<ConnectionInner>, handler: &Arc<dyn RSocket>, frame: RequestFrame) {
    let handler = Arc::clone(handler);
    let stream_id = frame.stream_id;
    inner.spawn(async move {
        match AssertUnwindSafe(handler.fire_and_forget(frame.payload)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::debug!(stream_id, code = %err.code, "fire-and-forget handler failed"),
            Err(panic) => log::error!(
                "fire-and-forget handler panicked: stream_id={stream_id}, panic={}",
                format_panic(panic)
            ),
        }
    });
}

fn request_response(inner: &Arc<ConnectionInner>, handler: &Arc<dyn RSocket>, frame: RequestFrame) {
    let stream_id = frame.stream_id;
    let cancel = inner.stream_token();
    let entry = StreamEntry::new(Role::Responder, InteractionKind::RequestResponse, cancel.clone())
        .with_outbound(Arc::new(CreditGate::new(1)));
    if let Err(err) = inner.streams.register(stream_id, entry) {
        reject(inner, stream_id, InteractionKind::RequestResponse, RSocketError::invalid(err.to_string()));
        return;
    }
    let handler = Arc::clone(handler);
    let task_inner = Arc::clone(inner);
    inner.spawn(async move {
        let inner = task_inner;
        let call = AssertUnwindSafe(handler.request_response(frame.payload)).catch_unwind();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            result = call => result.unwrap_or_else(|panic| Err(panic_error(panic))),
        };
        match result {
            Ok(payload) => {
                let reply = RequestFrame::next_complete(stream_id, payload);
                if inner
                    .send(QueuedFrame::bound(reply.into(), cancel), Priority::Low)
                    .await
                    .is_ok()
                {
                    inner.streams.complete_outbound(stream_id);
                }
            }
            Err(err) => {
                inner.streams.release(stream_id);
                inner.send_error(stream_id, err).await;
            }
        }
    });
}

fn request_stream(inner: &Arc<ConnectionInner>, handler: &dyn RSocket, frame: RequestFrame) {
    let stream_id = frame.stream_id;
    let cancel = inner.stream_token();
    let credit = Arc::new(CreditGate::new(frame.initial_request));
    let entry = StreamEntry::new(Role::Responder, InteractionKind::RequestStream, cancel.clone())
        .with_outbound(Arc::clone(&credit));
    if let Err(err) = inner.streams.register(stream_id, entry) {
        reject(inner, stream_id, InteractionKind::RequestStream, RSocketError::invalid(err.to_string()));
        return;
    }
    let payload = frame.payload;
    let output = call_stream(|| handler.request_stream(payload));
    spawn_output(inner, stream_id, output, credit, cancel);
}

fn request_channel(inner: &Arc<ConnectionInner>, handler: &dyn RSocket, frame: RequestFrame) {
    let stream_id = frame.stream_id;
    let cancel = inner.stream_token();
    let credit = Arc::new(CreditGate::new(frame.initial_request));
    let demand = Arc::new(CreditGate::new(0));
    let (tx, rx) = mpsc::unbounded_channel();
    let mut entry = StreamEntry::new(Role::Responder, InteractionKind::RequestChannel, cancel.clone())
        .with_outbound(Arc::clone(&credit));
    if !frame.complete {
        entry = entry.with_inbound(tx).with_demand(Arc::clone(&demand));
    }
    if let Err(err) = inner.streams.register(stream_id, entry) {
        reject(inner, stream_id, InteractionKind::RequestChannel, RSocketError::invalid(err.to_string()));
        return;
    }
    let input: PayloadStream = if frame.complete {
        stream::empty().boxed()
    } else {
        let strategy = inner.config().request_strategy();
        InboundStream::channel_input(Arc::clone(inner), stream_id, rx, strategy, demand).boxed()
    };
    let initial = frame.payload;
    let output = call_stream(|| handler.request_channel(initial, input));
    spawn_output(inner, stream_id, output, credit, cancel);
}

fn spawn_output(
    inner: &Arc<ConnectionInner>,
    stream_id: u32,
    output: PayloadStream,
    credit: Arc<CreditGate>,
    cancel: CancellationToken,
) {
    let producer = Arc::clone(inner);
    inner.spawn(connection::drive_output(producer, stream_id, output, credit, cancel));
}
