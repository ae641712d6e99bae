//! Keepalive probing, echo and timeout.

use std::time::Duration;

use bytes::Bytes;
use rsframe::{
    ConnectionSetup,
    Connector,
    ErrorCode,
    KeepAlive,
    RequestHandler,
    Payload,
    RSocket,
    Server,
    acceptor::serve_with,
    frame::{ErrorFrame, Frame, KeepAliveFrame},
    transport::memory_pair,
};
use rsframe_testing::{RawPeer, connect_pair};

fn short_keepalive() -> ConnectionSetup {
    ConnectionSetup::new().with_keep_alive(KeepAlive::new(Duration::from_millis(100), Duration::from_millis(500)))
}

#[tokio::test(start_paused = true)]
async fn silent_peer_is_disconnected_once() {
    let (mut peer, client, _setup) = RawPeer::server_of(&Connector::new(short_keepalive()))
        .await
        .expect("setup");

    let mut pings = 0;
    let error = loop {
        match peer.recv_any(Duration::from_secs(5)).await.expect("frame") {
            Some(Frame::KeepAlive(KeepAliveFrame { respond: true, .. })) => pings += 1,
            Some(Frame::Error(ErrorFrame { stream_id: 0, error })) => break error,
            other => panic!("unexpected frame {other:?}"),
        }
    };
    assert!(pings >= 3, "expected several keepalives, saw {pings}");
    assert_eq!(error.code, ErrorCode::CONNECTION_ERROR);
    assert_eq!(error.message, "no keep-alive for 500 ms");
    assert_eq!(peer.recv_any(Duration::from_secs(5)).await.expect("eof"), None);

    let reason = client.closed().await;
    assert_eq!(reason, error);
}

#[tokio::test(start_paused = true)]
async fn respond_flag_is_echoed_with_same_data() {
    let (mut peer, _client, _setup) = RawPeer::server_of(&Connector::new(ConnectionSetup::new()))
        .await
        .expect("setup");
    peer.send(Frame::KeepAlive(KeepAliveFrame {
        respond: true,
        last_position: 0,
        data: Bytes::from_static(b"ping"),
    }))
    .await
    .expect("send");

    match peer.recv_any(Duration::from_secs(1)).await.expect("frame") {
        Some(Frame::KeepAlive(KeepAliveFrame { respond, data, .. })) => {
            assert!(!respond);
            assert_eq!(data.as_ref(), b"ping");
        }
        other => panic!("expected keepalive echo, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn active_connections_stay_open() {
    let server = Server::new(serve_with(RequestHandler::default()));
    let (client, server_side) = connect_pair(&Connector::new(short_keepalive()), &server)
        .await
        .expect("connect");
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!client.is_closed());
    assert!(!server_side.is_closed());
}

#[tokio::test(start_paused = true)]
async fn timeout_on_stalled_transport_fails_pending_requests() {
    let (client_io, _server_io) = memory_pair(1);
    let client = Connector::new(short_keepalive())
        .connect(client_io)
        .await
        .expect("connect");
    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.request_response(Payload::new("stuck")).await }
    });

    let reason = client.closed().await;
    assert_eq!(reason.message, "no keep-alive for 500 ms");
    let outcome = tokio::time::timeout(Duration::from_secs(30), pending)
        .await
        .expect("pending request should be failed")
        .expect("request task");
    let err = outcome.expect_err("request cannot succeed");
    assert_eq!(err.code, ErrorCode::CONNECTION_ERROR);
    assert_eq!(client.active_streams(), 0);
}
