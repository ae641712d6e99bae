//! Utilities for exercising `rsframe` connections in tests.
//!
//! [`connect_pair`] wires a [`Connector`](rsframe::Connector) to a
//! [`Server`](rsframe::Server) over an in-memory transport. [`RawPeer`]
//! speaks frames directly so tests can observe exactly what an engine puts
//! on the wire.
//!
//! ```rust
//! use rsframe::{ConnectionSetup, Connector, RequestHandler, Server, acceptor::serve_with};
//! use rsframe_testing::connect_pair;
//!
//! # async fn demo() -> Result<(), rsframe::ConnectionError> {
//! let server = Server::new(serve_with(RequestHandler::default()));
//! let (client, _server_side) = connect_pair(&Connector::new(ConnectionSetup::new()), &server).await?;
//! assert!(!client.is_closed());
//! # Ok(())
//! # }
//! ```

pub mod logging;
pub mod pair;
pub mod raw;

pub use logging::{LoggerHandle, logger};
pub use pair::{DEFAULT_CAPACITY, connect_pair};
pub use raw::RawPeer;
