//! Request-channel: two independently flow-controlled directions.

use std::time::Duration;

use futures::{StreamExt, stream};
use rsframe::{
    ConnectionSetup,
    Connector,
    Payload,
    PayloadStream,
    RSocket,
    RequestHandler,
    Server,
    acceptor::serve_with,
    frame::{Frame, FrameType, RequestFrame},
};
use rsframe_testing::{RawPeer, connect_pair};
use rstest::{fixture, rstest};

fn upper(payload: &Payload) -> Payload { Payload::new(payload.data.to_ascii_uppercase()) }

/// Echoes the initial payload and every input element in upper case.
#[fixture]
fn shouting_server() -> Server {
    let handler = RequestHandler::builder()
        .on_request_channel(|initial: Payload, input: PayloadStream| {
            stream::once(async move { Ok(upper(&initial)) }).chain(input.map(|item| item.map(|p| upper(&p))))
        })
        .build();
    Server::new(serve_with(handler))
}

fn connector() -> Connector { Connector::new(ConnectionSetup::new()) }

#[rstest]
#[tokio::test]
async fn channel_echoes_both_directions(shouting_server: Server) {
    let (client, server_side) = connect_pair(&connector(), &shouting_server).await.expect("connect");
    let input: PayloadStream = stream::iter(["b", "c", "d"].map(|s| Ok(Payload::new(s)))).boxed();
    let replies: Vec<_> = client
        .request_channel(Payload::new("a"), input)
        .map(|item| item.expect("payload").data)
        .collect()
        .await;
    assert_eq!(replies, ["A", "B", "C", "D"]);

    tokio::time::timeout(Duration::from_secs(5), async {
        while client.active_streams() > 0 || server_side.active_streams() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("channel fully released");
}

#[rstest]
#[tokio::test]
async fn responder_requests_input_before_it_is_sent(shouting_server: Server) {
    let (mut peer, _handle) = RawPeer::client_of(&shouting_server, ConnectionSetup::new())
        .await
        .expect("setup");
    peer.send(RequestFrame::request_channel(1, 8, Payload::new("x"), false))
        .await
        .expect("request");

    let mut saw_request_n = false;
    let mut saw_initial = false;
    while !(saw_request_n && saw_initial) {
        match peer.recv().await.expect("frame") {
            Some(Frame::RequestN { stream_id: 1, n }) => {
                assert!(n > 0);
                saw_request_n = true;
            }
            Some(Frame::Request(RequestFrame {
                frame_type: FrameType::Payload,
                stream_id: 1,
                payload,
                ..
            })) => {
                assert_eq!(payload.data.as_ref(), b"X");
                saw_initial = true;
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    peer.send(RequestFrame::payload(1, Payload::new("y"), true, true))
        .await
        .expect("last input");
    assert_eq!(
        peer.recv().await.expect("echo"),
        Some(Frame::Request(RequestFrame::next(1, Payload::new("Y"))))
    );
    assert_eq!(
        peer.recv().await.expect("complete"),
        Some(Frame::Request(RequestFrame::complete(1)))
    );
}

#[rstest]
#[tokio::test]
async fn requester_cancel_ends_responder_input(shouting_server: Server) {
    let (mut peer, handle) = RawPeer::client_of(&shouting_server, ConnectionSetup::new())
        .await
        .expect("setup");
    peer.send(RequestFrame::request_channel(1, 8, Payload::new("x"), false))
        .await
        .expect("request");
    peer.send(Frame::Cancel { stream_id: 1 }).await.expect("cancel");

    let server_side = handle.await.expect("accept task").expect("accepted");
    tokio::time::timeout(Duration::from_secs(5), async {
        while server_side.active_streams() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("stream released after cancel");
    assert!(!server_side.is_closed());
}
