#![doc(html_root_url = "https://docs.rs/rsframe/latest")]
//! Public API for the `rsframe` library.
//!
//! `rsframe` is a multiplexed, flow-controlled message protocol engine
//! speaking the RSocket 1.0 wire format over any reliable byte transport.
//! One connection carries many concurrent streams, each following one of
//! the interaction models: fire-and-forget, request-response,
//! request-stream, request-channel and metadata push.
//!
//! Clients start with a [`Connector`], servers with a [`Server`]. Both hand
//! the application a [`Requester`] for sending requests to the peer, and
//! serve the peer's requests with an [`RSocket`] handler such as
//! [`RequestHandler`].
//!
//! ```
//! use rsframe::{
//!     ConnectionSetup, Connector, Payload, RSocket, RequestHandler, Server,
//!     acceptor::serve_with,
//!     transport::memory_pair,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let handler = RequestHandler::builder()
//!     .on_request_response(|payload: Payload| async move { Ok(payload) })
//!     .build();
//! let server = Server::new(serve_with(handler));
//! let (client_io, server_io) = memory_pair(16);
//! let connector = Connector::new(ConnectionSetup::new());
//! let (client, accepted) = tokio::join!(
//!     connector.connect(client_io),
//!     server.accept_connection(server_io),
//! );
//! let client = client.expect("client connects");
//! let _server_side = accepted.expect("server accepts");
//!
//! let reply = client
//!     .request_response(Payload::new("ping"))
//!     .await
//!     .expect("echo");
//! assert_eq!(reply.data.as_ref(), b"ping");
//! # }
//! ```

pub mod acceptor;
pub mod byte_order;
pub mod codec;
pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod flow;
pub mod fragment;
pub mod frame;
pub mod handler;
pub mod interceptor;
pub mod keepalive;
pub mod lease;
pub mod metadata;
pub mod metrics;
pub mod mime;
pub mod panic;
pub mod payload;
pub mod requester;
mod responder;
pub mod server;
pub mod setup;
pub mod stream;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use acceptor::{AcceptorContext, ConnectionAcceptor};
pub use config::EngineConfig;
pub use connection::{Side, active_connection_count};
pub use connector::Connector;
pub use error::{ConnectionError, ErrorCode, RSocketError, Result};
pub use flow::RequestStrategy;
pub use handler::{Capabilities, PayloadStream, RSocket, RequestHandler};
pub use interceptor::Interceptors;
pub use keepalive::KeepAlive;
pub use lease::Lease;
pub use metrics::{CONNECTIONS_ACTIVE, Direction, ERRORS_TOTAL, FRAMES_PROCESSED, STREAMS_ACTIVE};
pub use payload::{Payload, PayloadMimeType};
pub use requester::Requester;
pub use server::Server;
pub use setup::{ConnectionSetup, SetupValidator, Version};
pub use transport::{Connection, FramedConnection, memory_pair};
