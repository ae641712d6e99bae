//! Client entry point: sends SETUP and starts the engine.

use std::sync::Arc;

use tokio::net::{TcpStream, ToSocketAddrs};

use crate::{
    acceptor::{AcceptorContext, ConnectionAcceptor, serve_with},
    config::EngineConfig,
    connection::{self, ConnectionInner, Side},
    error::{ConnectionError, RSocketError},
    frame::Frame,
    handler::{RSocket, RequestHandler},
    interceptor::Interceptors,
    requester::Requester,
    setup::ConnectionSetup,
    transport::{Connection, FramedConnection},
};

/// Builds client connections.
///
/// The client's responder defaults to a handler that rejects every request;
/// install one with [`Connector::with_responder`] or
/// [`Connector::with_acceptor`] to serve requests from the server.
#[derive(Clone)]
pub struct Connector {
    setup: ConnectionSetup,
    config: EngineConfig,
    interceptors: Interceptors,
    acceptor: Arc<dyn ConnectionAcceptor>,
}

impl Connector {
    /// Connector sending `setup`.
    #[must_use]
    pub fn new(setup: ConnectionSetup) -> Self {
        Self {
            setup,
            config: EngineConfig::default(),
            interceptors: Interceptors::default(),
            acceptor: Arc::new(serve_with(RequestHandler::default())),
        }
    }

    /// Override engine settings.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Install interceptors.
    #[must_use]
    pub fn with_interceptors(mut self, interceptors: Interceptors) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Choose the responder once the connection is set up.
    #[must_use]
    pub fn with_acceptor(mut self, acceptor: impl ConnectionAcceptor) -> Self {
        self.acceptor = Arc::new(acceptor);
        self
    }

    /// Serve the server's requests with `handler`.
    #[must_use]
    pub fn with_responder<R: RSocket>(self, handler: R) -> Self { self.with_acceptor(serve_with(handler)) }

    /// SETUP parameters sent by this connector.
    #[must_use]
    pub fn setup(&self) -> &ConnectionSetup { &self.setup }

    /// Open a connection over `connection`.
    ///
    /// # Errors
    ///
    /// Fails when SETUP cannot be encoded or sent, or when the acceptor
    /// refuses the connection.
    pub async fn connect<C: Connection>(&self, connection: C) -> Result<Requester, ConnectionError> {
        let transport = self.interceptors.wrap_connection(Arc::new(connection));
        let setup = Frame::Setup(self.setup.clone()).to_bytes()?;
        transport.send(setup).await?;
        tracing::debug!(
            honor_lease = self.setup.honor_lease,
            keepalive_ms = self.setup.keep_alive.interval.as_millis(),
            "setup sent"
        );

        let (inner, queues) = ConnectionInner::new(Side::Client, transport, &self.setup, self.config);
        connection::spawn_writer(&inner, queues);
        let requester = Requester::new(&inner, &self.interceptors);
        let ctx = AcceptorContext {
            setup: self.setup.clone(),
            requester: requester.clone(),
        };
        let acceptor = self.interceptors.wrap_acceptor(Arc::clone(&self.acceptor));
        let responder = match acceptor.accept(ctx).await {
            Ok(responder) => responder,
            Err(err) => {
                inner
                    .terminate(RSocketError::connection_error(err.message.clone()), true)
                    .await;
                return Err(ConnectionError::Protocol(err));
            }
        };
        connection::spawn_reader(&inner, self.interceptors.wrap_responder(responder));
        connection::spawn_keepalive(&inner);
        Ok(requester)
    }

    /// Open a TCP connection to `addr`.
    ///
    /// # Errors
    ///
    /// Returns the connect failure, or any error from [`Connector::connect`].
    pub async fn connect_tcp(&self, addr: impl ToSocketAddrs) -> Result<Requester, ConnectionError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr().ok();
        log::info!("tcp connection established: peer_addr={peer_addr:?}");
        self.connect(FramedConnection::new(stream)).await
    }
}
