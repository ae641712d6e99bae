//! Engine tests driving one side of a connection over an in-memory peer.

use std::{sync::Arc, time::Duration};

use futures::stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{ConnectionInner, Priority, QueuedFrame, Side, drive_output, spawn_reader, spawn_writer};
use crate::{
    config::EngineConfig,
    error::{ErrorCode, RSocketError},
    flow::CreditGate,
    frame::{Frame, RequestFrame},
    handler::{PayloadStream, RequestHandler},
    payload::Payload,
    setup::ConnectionSetup,
    stream::{InteractionKind, Role, Signal, StreamEntry},
    transport::{Connection, MemoryConnection, memory_pair},
};

fn engine(side: Side) -> (Arc<ConnectionInner>, MemoryConnection) {
    let (local, peer) = memory_pair(16);
    let (inner, queues) = ConnectionInner::new(side, Arc::new(local), &ConnectionSetup::new(), EngineConfig::default());
    spawn_writer(&inner, queues);
    (inner, peer)
}

async fn next_frame(peer: &MemoryConnection) -> Frame {
    let bytes = tokio::time::timeout(Duration::from_secs(5), peer.receive())
        .await
        .expect("frame should arrive")
        .expect("transport")
        .expect("connection open");
    Frame::decode(bytes).expect("valid frame")
}

async fn assert_silent(peer: &MemoryConnection) {
    let result = tokio::time::timeout(Duration::from_millis(50), peer.receive()).await;
    assert!(result.is_err(), "unexpected frame: {result:?}");
}

#[tokio::test]
async fn terminate_runs_once_and_fails_streams() {
    let (inner, peer) = engine(Side::Client);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let entry = StreamEntry::new(Role::Requester, InteractionKind::RequestStream, inner.stream_token()).with_inbound(tx);
    inner.streams.register(1, entry).expect("free id");

    inner.terminate(RSocketError::connection_error("first"), true).await;
    inner.terminate(RSocketError::connection_error("second"), true).await;

    assert_eq!(next_frame(&peer).await, Frame::error(0, RSocketError::connection_error("first")));
    assert_eq!(peer.receive().await.expect("closed"), None);
    assert_eq!(rx.recv().await, Some(Signal::Error(RSocketError::connection_error("first"))));
    assert!(inner.streams.is_empty());
    assert_eq!(inner.ensure_open(), Err(RSocketError::connection_error("first")));
}

#[tokio::test(start_paused = true)]
async fn output_waits_for_credit_and_completes_without_it() {
    let (inner, peer) = engine(Side::Server);
    let cancel = inner.stream_token();
    let credit = Arc::new(CreditGate::new(1));
    let entry = StreamEntry::new(Role::Responder, InteractionKind::RequestStream, cancel.clone())
        .with_outbound(Arc::clone(&credit));
    inner.streams.register(1, entry).expect("free id");
    let output: PayloadStream = Box::pin(stream::iter([Ok(Payload::new("a")), Ok(Payload::new("b"))]));
    tokio::spawn(drive_output(Arc::clone(&inner), 1, output, credit, cancel));

    assert_eq!(next_frame(&peer).await, Frame::from(RequestFrame::next(1, Payload::new("a"))));
    assert_silent(&peer).await;
    assert!(inner.streams.grant(1, 1));
    assert_eq!(next_frame(&peer).await, Frame::from(RequestFrame::next(1, Payload::new("b"))));
    assert_eq!(next_frame(&peer).await, Frame::from(RequestFrame::complete(1)));
    tokio::task::yield_now().await;
    assert!(!inner.streams.contains(1));
}

#[tokio::test(start_paused = true)]
async fn output_error_is_reported_on_the_stream() {
    let (inner, peer) = engine(Side::Server);
    let cancel = inner.stream_token();
    let credit = Arc::new(CreditGate::new(0));
    let entry = StreamEntry::new(Role::Responder, InteractionKind::RequestStream, cancel.clone())
        .with_outbound(Arc::clone(&credit));
    inner.streams.register(1, entry).expect("free id");
    let output: PayloadStream = Box::pin(stream::iter([Err(RSocketError::application("broken"))]));
    drive_output(Arc::clone(&inner), 1, output, credit, cancel).await;

    assert_eq!(next_frame(&peer).await, Frame::error(1, RSocketError::application("broken")));
    assert!(!inner.streams.contains(1));
}

#[tokio::test(start_paused = true)]
async fn frames_of_cancelled_streams_are_discarded() {
    let (inner, peer) = engine(Side::Client);
    let token = CancellationToken::new();
    token.cancel();
    let stale = QueuedFrame::bound(RequestFrame::next(1, Payload::new("stale")).into(), token);
    inner.send(stale, Priority::Low).await.expect("queued");
    inner
        .send(QueuedFrame::new(Frame::Cancel { stream_id: 3 }), Priority::Low)
        .await
        .expect("queued");

    assert_eq!(next_frame(&peer).await, Frame::Cancel { stream_id: 3 });
    assert_silent(&peer).await;
}

#[tokio::test(start_paused = true)]
async fn reader_rejects_unsupported_and_misnumbered_requests() {
    let (inner, peer) = engine(Side::Client);
    spawn_reader(&inner, Arc::new(RequestHandler::default()));

    let unsupported = RequestFrame::request_response(2, Payload::new("q"));
    peer.send(Frame::from(unsupported).to_bytes().expect("encode"))
        .await
        .expect("send");
    let Frame::Error(reply) = next_frame(&peer).await else {
        panic!("expected ERROR");
    };
    assert_eq!(reply.stream_id, 2);
    assert_eq!(reply.error.code, ErrorCode::REJECTED);

    let wrong_parity = RequestFrame::request_stream(1, 4, Payload::new("q"));
    peer.send(Frame::from(wrong_parity).to_bytes().expect("encode"))
        .await
        .expect("send");
    let Frame::Error(reply) = next_frame(&peer).await else {
        panic!("expected ERROR");
    };
    assert_eq!(reply.stream_id, 1);
    assert_eq!(reply.error.code, ErrorCode::INVALID);
    assert!(inner.streams.is_empty());
}

#[tokio::test(start_paused = true)]
async fn peer_close_terminates_the_connection() {
    let (inner, peer) = engine(Side::Server);
    spawn_reader(&inner, Arc::new(RequestHandler::default()));
    peer.close().await;
    let reason = tokio::time::timeout(Duration::from_secs(1), inner.closed())
        .await
        .expect("connection should close");
    assert_eq!(reason.code, ErrorCode::CONNECTION_CLOSE);
}
