//! Byte-frame transports.
//!
//! The engine exchanges whole frame bodies with a [`Connection`]; stream
//! transports add the 24-bit length prefix through [`FramedConnection`],
//! while [`memory_pair`] connects two engines in-process.

use std::{
    io,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf},
    sync::{Mutex as AsyncMutex, mpsc},
};
use tokio_util::{
    codec::{FramedRead, FramedWrite},
    sync::CancellationToken,
};

use crate::codec::LengthPrefixedCodec;

/// A bidirectional channel of frame bodies.
///
/// `send` and `receive` may be called concurrently from different tasks.
/// After `close`, `receive` returns `Ok(None)` and `send` fails.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Deliver one frame body.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the transport failed or was closed.
    async fn send(&self, frame: Bytes) -> io::Result<()>;

    /// Next frame body; `Ok(None)` once the peer closed cleanly.
    ///
    /// # Errors
    ///
    /// Returns an I/O error for a broken transport or a malformed length
    /// prefix.
    async fn receive(&self) -> io::Result<Option<Bytes>>;

    /// Close the transport. Idempotent.
    async fn close(&self);
}

fn closed_error() -> io::Error { io::Error::new(io::ErrorKind::BrokenPipe, "connection closed") }

/// Length-prefixed frames over any byte stream.
pub struct FramedConnection<T> {
    reader: AsyncMutex<FramedRead<ReadHalf<T>, LengthPrefixedCodec>>,
    writer: AsyncMutex<FramedWrite<WriteHalf<T>, LengthPrefixedCodec>>,
    closed: CancellationToken,
}

impl<T> FramedConnection<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap `io` using the default 16 MiB frame limit.
    #[must_use]
    pub fn new(io: T) -> Self { Self::with_codec(io, LengthPrefixedCodec::default()) }

    /// Wrap `io` with a custom codec.
    #[must_use]
    pub fn with_codec(io: T, codec: LengthPrefixedCodec) -> Self {
        let (read, write) = tokio::io::split(io);
        Self {
            reader: AsyncMutex::new(FramedRead::new(read, codec.clone())),
            writer: AsyncMutex::new(FramedWrite::new(write, codec)),
            closed: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl<T> Connection for FramedConnection<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn send(&self, frame: Bytes) -> io::Result<()> {
        if self.closed.is_cancelled() {
            return Err(closed_error());
        }
        let mut writer = self.writer.lock().await;
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(closed_error()),
            result = writer.send(frame) => result.map_err(io::Error::from),
        }
    }

    async fn receive(&self) -> io::Result<Option<Bytes>> {
        let mut reader = self.reader.lock().await;
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Ok(None),
            next = reader.next() => next.transpose().map_err(io::Error::from),
        }
    }

    async fn close(&self) {
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();
        let mut writer = self.writer.lock().await;
        if let Err(err) = writer.close().await {
            tracing::debug!(error = %err, "transport shutdown failed");
        }
    }
}

/// One end of an in-process transport created by [`memory_pair`].
#[derive(Debug)]
pub struct MemoryConnection {
    tx: Mutex<Option<mpsc::Sender<Bytes>>>,
    rx: AsyncMutex<mpsc::Receiver<Bytes>>,
    closed: CancellationToken,
}

/// Two connected in-process transports, each buffering up to `capacity`
/// frames.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use rsframe::transport::{Connection, memory_pair};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (a, b) = memory_pair(4);
/// a.send(Bytes::from_static(b"ping")).await.expect("send");
/// assert_eq!(b.receive().await.expect("receive"), Some(Bytes::from_static(b"ping")));
/// a.close().await;
/// assert_eq!(b.receive().await.expect("receive"), None);
/// # }
/// ```
#[must_use]
pub fn memory_pair(capacity: usize) -> (MemoryConnection, MemoryConnection) {
    let capacity = capacity.max(1);
    let (a_tx, b_rx) = mpsc::channel(capacity);
    let (b_tx, a_rx) = mpsc::channel(capacity);
    (MemoryConnection::new(a_tx, a_rx), MemoryConnection::new(b_tx, b_rx))
}

impl MemoryConnection {
    fn new(tx: mpsc::Sender<Bytes>, rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
            rx: AsyncMutex::new(rx),
            closed: CancellationToken::new(),
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<Bytes>> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn send(&self, frame: Bytes) -> io::Result<()> {
        let sender = self.sender().ok_or_else(closed_error)?;
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(closed_error()),
            result = sender.send(frame) => result.map_err(|_| closed_error()),
        }
    }

    async fn receive(&self) -> io::Result<Option<Bytes>> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Ok(None),
            frame = rx.recv() => Ok(frame),
        }
    }

    async fn close(&self) {
        self.closed.cancel();
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::{Connection, FramedConnection, memory_pair};

    #[tokio::test]
    async fn framed_connection_adds_length_prefix() {
        let (client, mut server) = tokio::io::duplex(64);
        let conn = FramedConnection::new(client);
        conn.send(Bytes::from_static(&[0, 0, 0, 1, 0x24, 0x00]))
            .await
            .expect("send");
        let mut buf = [0u8; 9];
        server.read_exact(&mut buf).await.expect("read");
        assert_eq!(buf, [0, 0, 6, 0, 0, 0, 1, 0x24, 0x00]);
    }

    #[tokio::test]
    async fn framed_connection_reports_clean_eof_as_none() {
        let (client, mut server) = tokio::io::duplex(64);
        let conn = FramedConnection::new(client);
        server
            .write_all(&[0, 0, 6, 0, 0, 0, 1, 0x24, 0x00])
            .await
            .expect("write");
        drop(server);
        let frame = conn.receive().await.expect("frame");
        assert_eq!(frame.as_deref(), Some(&[0, 0, 0, 1, 0x24, 0x00][..]));
        assert_eq!(conn.receive().await.expect("eof"), None);
    }

    #[tokio::test]
    async fn framed_connection_fails_on_truncated_frame() {
        let (client, mut server) = tokio::io::duplex(64);
        let conn = FramedConnection::new(client);
        server.write_all(&[0, 0, 9, 1, 2]).await.expect("write");
        drop(server);
        let err = conn.receive().await.expect_err("frame is incomplete");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn closed_memory_connection_stops_both_directions() {
        let (a, b) = memory_pair(1);
        a.close().await;
        assert!(a.send(Bytes::from_static(b"x")).await.is_err());
        assert_eq!(a.receive().await.expect("closed"), None);
        assert_eq!(b.receive().await.expect("peer closed"), None);
    }

    #[tokio::test]
    async fn memory_pair_preserves_order() {
        let (a, b) = memory_pair(8);
        for i in 0..5u8 {
            a.send(Bytes::from(vec![i])).await.expect("send");
        }
        for i in 0..5u8 {
            assert_eq!(b.receive().await.expect("receive"), Some(Bytes::from(vec![i])));
        }
    }
}
