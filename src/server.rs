//! Server entry point: validates SETUP, runs the acceptor, and serves
//! accepted connections.

use std::{net::SocketAddr, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use log::{error, warn};
use tokio::{
    net::{TcpListener, TcpStream},
    time::sleep,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    acceptor::{AcceptorContext, ConnectionAcceptor},
    config::EngineConfig,
    connection::{self, ConnectionInner, Side},
    error::{ConnectionError, ErrorCode, RSocketError},
    frame::Frame,
    interceptor::Interceptors,
    metrics,
    panic::format_panic,
    requester::Requester,
    setup::{ConnectionSetup, SetupValidator},
    transport::{Connection, FramedConnection},
};

/// Exponential back-off applied when `accept()` fails.
///
/// Starts at `initial_delay`, doubles on each consecutive failure and is
/// capped at `max_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on the delay.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffConfig {
    /// Clamp delays to at least one millisecond with
    /// `initial_delay <= max_delay`.
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use rsframe::server::BackoffConfig;
    ///
    /// let cfg = BackoffConfig {
    ///     initial_delay: Duration::from_millis(5),
    ///     max_delay: Duration::ZERO,
    /// };
    /// let normalized = cfg.normalized();
    /// assert_eq!(normalized.initial_delay, Duration::from_millis(1));
    /// assert_eq!(normalized.max_delay, Duration::from_millis(5));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.initial_delay = self.initial_delay.max(Duration::from_millis(1));
        self.max_delay = self.max_delay.max(Duration::from_millis(1));
        if self.initial_delay > self.max_delay {
            std::mem::swap(&mut self.initial_delay, &mut self.max_delay);
        }
        self
    }
}

/// Default time allowed for the first frame to arrive.
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Accepts connections whose first frame is a valid SETUP.
#[derive(Clone)]
pub struct Server {
    acceptor: Arc<dyn ConnectionAcceptor>,
    validator: SetupValidator,
    config: EngineConfig,
    interceptors: Interceptors,
    backoff: BackoffConfig,
    setup_timeout: Duration,
}

impl Server {
    /// Server deciding on connections with `acceptor`.
    #[must_use]
    pub fn new(acceptor: impl ConnectionAcceptor) -> Self {
        Self {
            acceptor: Arc::new(acceptor),
            validator: SetupValidator::default(),
            config: EngineConfig::default(),
            interceptors: Interceptors::default(),
            backoff: BackoffConfig::default(),
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
        }
    }

    /// Replace the SETUP validator.
    #[must_use]
    pub fn with_setup_validator(mut self, validator: SetupValidator) -> Self {
        self.validator = validator;
        self
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

    /// Back-off for failing `accept()` calls in [`Server::serve`].
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff.normalized();
        self
    }

    /// Time allowed for the client's SETUP.
    #[must_use]
    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    /// Negotiate and start one connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Protocol`] carrying the error sent to the
    /// client when SETUP is missing, invalid, or refused by the acceptor,
    /// and [`ConnectionError::Closed`] when the client leaves before
    /// sending anything.
    pub async fn accept_connection<C: Connection>(&self, connection: C) -> Result<Requester, ConnectionError> {
        let transport = self.interceptors.wrap_connection(Arc::new(connection));
        let setup = match self.read_setup(transport.as_ref()).await {
            Ok(setup) => setup,
            Err(ConnectionError::Protocol(err)) => return Err(reject(transport.as_ref(), err).await),
            Err(err) => {
                transport.close().await;
                return Err(err);
            }
        };
        if let Err(err) = self.validator.validate(&setup) {
            return Err(reject(transport.as_ref(), err).await);
        }

        let (inner, queues) = ConnectionInner::new(Side::Server, transport, &setup, self.config);
        connection::spawn_writer(&inner, queues);
        let requester = Requester::new(&inner, &self.interceptors);
        let ctx = AcceptorContext {
            setup: setup.clone(),
            requester: requester.clone(),
        };
        let acceptor = self.interceptors.wrap_acceptor(Arc::clone(&self.acceptor));
        let responder = match acceptor.accept(ctx).await {
            Ok(responder) => responder,
            Err(err) => {
                let err = as_setup_rejection(err);
                warn!("setup rejected: code={}, message={}", err.code, err.message);
                inner.terminate(err.clone(), true).await;
                return Err(ConnectionError::Protocol(err));
            }
        };
        connection::spawn_reader(&inner, self.interceptors.wrap_responder(responder));
        connection::spawn_keepalive(&inner);
        log::info!(
            "setup accepted: version={}, honor_lease={}, data_mime={}",
            setup.version,
            setup.honor_lease,
            setup.mime_types.data
        );
        Ok(requester)
    }

    async fn read_setup(&self, transport: &dyn Connection) -> Result<ConnectionSetup, ConnectionError> {
        let first = tokio::time::timeout(self.setup_timeout, transport.receive())
            .await
            .map_err(|_| RSocketError::invalid_setup("setup timed out"))?;
        let Some(bytes) = first? else {
            return Err(ConnectionError::Closed);
        };
        match Frame::decode(bytes) {
            Ok(Frame::Setup(setup)) => Ok(setup),
            Ok(Frame::Resume(_)) if !self.validator.resume_supported() => {
                Err(RSocketError::rejected_resume("resumption is not supported").into())
            }
            Ok(other) => {
                tracing::debug!(frame_type = ?other.frame_type(), "first frame is not SETUP");
                Err(RSocketError::invalid_setup("Invalid setup frame").into())
            }
            Err(err) => {
                tracing::debug!(error = %err, "first frame is malformed");
                Err(RSocketError::invalid_setup("Invalid setup frame").into())
            }
        }
    }

    /// Accept TCP connections until `shutdown` fires, then close every
    /// connection and wait for their tasks.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) {
        let tracker = TaskTracker::new();
        let backoff = self.backoff.normalized();
        let mut delay = backoff.initial_delay;
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        self.spawn_connection(stream, peer_addr, &tracker, shutdown.clone());
                        delay = backoff.initial_delay;
                    }
                    Err(e) => {
                        let local_addr = listener.local_addr().ok();
                        warn!("accept error: error={e:?}, local_addr={local_addr:?}");
                        sleep(delay).await;
                        delay = (delay * 2).min(backoff.max_delay);
                    }
                },
            }
        }
        tracker.close();
        tracker.wait().await;
    }

    fn spawn_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        tracker: &TaskTracker,
        shutdown: CancellationToken,
    ) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("failed to set TCP_NODELAY: error={e}, peer_addr={peer_addr}");
        }
        let server = self.clone();
        tracker.spawn(async move {
            let task = AssertUnwindSafe(async move {
                match server.accept_connection(FramedConnection::new(stream)).await {
                    Ok(requester) => {
                        tokio::select! {
                            () = shutdown.cancelled() => requester.close().await,
                            _ = requester.closed() => {}
                        }
                    }
                    Err(e) => warn!("connection setup failed: error={e}, peer_addr={peer_addr}"),
                }
            });
            if let Err(panic) = task.catch_unwind().await {
                error!(
                    "connection task panicked: panic={}, peer_addr={peer_addr}",
                    format_panic(panic)
                );
            }
        });
    }
}

fn as_setup_rejection(err: RSocketError) -> RSocketError {
    match err.code {
        ErrorCode::INVALID_SETUP | ErrorCode::UNSUPPORTED_SETUP | ErrorCode::REJECTED_SETUP => err,
        _ => RSocketError::rejected_setup(err.message),
    }
}

/// Send ERROR on stream 0 and close; no further frames follow.
async fn reject(transport: &dyn Connection, err: RSocketError) -> ConnectionError {
    warn!("setup rejected: code={}, message={}", err.code, err.message);
    metrics::inc_errors(metrics::ErrorKind::Connection);
    match Frame::error(0, err.clone()).to_bytes() {
        Ok(bytes) => {
            if let Err(e) = transport.send(bytes).await {
                tracing::debug!(error = %e, "could not deliver setup rejection");
            }
        }
        Err(e) => tracing::debug!(error = %e, "could not encode setup rejection"),
    }
    transport.close().await;
    ConnectionError::Protocol(err)
}
