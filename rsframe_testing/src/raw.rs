//! A frame-level peer for observing wire behaviour.

use std::{io, time::Duration};

use futures::{SinkExt, StreamExt};
use rsframe::{
    ConnectionError,
    ConnectionSetup,
    Connector,
    FramedConnection,
    Requester,
    Server,
    codec::{CodecError, FrameCodec},
    frame::Frame,
};
use tokio::{io::DuplexStream, task::JoinHandle};
use tokio_util::codec::Framed;

const DUPLEX_CAPACITY: usize = 64 * 1024;

/// Default time [`RawPeer::recv`] waits for a frame.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// One end of a connection driven frame by frame.
pub struct RawPeer {
    framed: Framed<DuplexStream, FrameCodec>,
}

impl RawPeer {
    fn new(io: DuplexStream) -> Self {
        Self {
            framed: Framed::new(io, FrameCodec::default()),
        }
    }

    /// Play the client against `server`: SETUP is sent for you and the
    /// server's accept result is returned through the join handle.
    ///
    /// # Errors
    ///
    /// Fails if SETUP cannot be written.
    pub async fn client_of(
        server: &Server,
        setup: ConnectionSetup,
    ) -> Result<(Self, JoinHandle<Result<Requester, ConnectionError>>), CodecError> {
        let mut peer = Self::unsetup_client_of(server);
        peer.0.send(Frame::Setup(setup)).await?;
        Ok(peer)
    }

    /// Play the client against `server` without sending anything yet.
    #[must_use]
    pub fn unsetup_client_of(server: &Server) -> (Self, JoinHandle<Result<Requester, ConnectionError>>) {
        let (local, remote) = tokio::io::duplex(DUPLEX_CAPACITY);
        let server = server.clone();
        let handle = tokio::spawn(async move { server.accept_connection(FramedConnection::new(remote)).await });
        (Self::new(local), handle)
    }

    /// Play the server for `connector`; the SETUP it sent is returned.
    ///
    /// # Errors
    ///
    /// Fails if the connector cannot connect or its first frame is not
    /// SETUP.
    pub async fn server_of(connector: &Connector) -> io::Result<(Self, Requester, ConnectionSetup)> {
        let (local, remote) = tokio::io::duplex(DUPLEX_CAPACITY);
        let requester = connector
            .connect(FramedConnection::new(remote))
            .await
            .map_err(io::Error::other)?;
        let mut peer = Self::new(local);
        match peer.recv().await? {
            Some(Frame::Setup(setup)) => Ok((peer, requester, setup)),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected SETUP, got {other:?}"),
            )),
        }
    }

    /// Send one frame.
    ///
    /// # Errors
    ///
    /// Fails if the frame cannot be encoded or written.
    pub async fn send(&mut self, frame: impl Into<Frame>) -> Result<(), CodecError> { self.framed.send(frame.into()).await }

    /// Next frame, skipping keepalives; `None` once the engine closed the
    /// connection.
    ///
    /// # Errors
    ///
    /// Fails on a malformed frame or when nothing arrives within
    /// [`RECV_TIMEOUT`].
    pub async fn recv(&mut self) -> io::Result<Option<Frame>> {
        loop {
            match self.recv_any(RECV_TIMEOUT).await? {
                Some(Frame::KeepAlive(_)) => {}
                other => return Ok(other),
            }
        }
    }

    /// Next frame including keepalives, waiting at most `limit`.
    ///
    /// # Errors
    ///
    /// Fails on a malformed frame or a timeout.
    pub async fn recv_any(&mut self, limit: Duration) -> io::Result<Option<Frame>> {
        match tokio::time::timeout(limit, self.framed.next()).await {
            Ok(Some(frame)) => frame.map(Some).map_err(io::Error::from),
            Ok(None) => Ok(None),
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "no frame within the limit")),
        }
    }

    /// Assert that no non-keepalive frame arrives within `quiet`.
    ///
    /// # Panics
    ///
    /// Panics if a frame arrives or the stream fails.
    pub async fn expect_silence(&mut self, quiet: Duration) {
        loop {
            match self.recv_any(quiet).await {
                Err(err) if err.kind() == io::ErrorKind::TimedOut => return,
                Ok(Some(Frame::KeepAlive(_))) => {}
                other => panic!("expected no frame, got {other:?}"),
            }
        }
    }

    /// Close the write half, signalling EOF to the engine.
    ///
    /// # Errors
    ///
    /// Fails if the transport cannot be flushed.
    pub async fn close(&mut self) -> Result<(), CodecError> { SinkExt::<Frame>::close(&mut self.framed).await }
}
