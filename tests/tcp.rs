//! Serving and connecting over TCP.

use std::time::Duration;

use rsframe::{ConnectionSetup, Connector, ErrorCode, Payload, RSocket, RequestHandler, Server, acceptor::serve_with};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn tcp_round_trip_and_graceful_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handler = RequestHandler::builder()
        .on_request_response(|payload: Payload| async move { Ok(payload) })
        .build();
    let server = Server::new(serve_with(handler));
    let shutdown = CancellationToken::new();
    let serving = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { server.serve(listener, shutdown).await })
    };

    let client = Connector::new(ConnectionSetup::new())
        .connect_tcp(addr)
        .await
        .expect("connect");
    let reply = client
        .request_response(Payload::new("over tcp").with_metadata("route"))
        .await
        .expect("echo");
    assert_eq!(reply.data.as_ref(), b"over tcp");
    assert_eq!(reply.metadata.as_deref(), Some(&b"route"[..]));

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .expect("server stops")
        .expect("server task");
    let reason = tokio::time::timeout(Duration::from_secs(5), client.closed())
        .await
        .expect("client sees the close");
    assert_eq!(reason.code, ErrorCode::CONNECTION_CLOSE);
}
