//! Length-prefixed framing for byte-stream transports.
//!
//! Stream transports such as TCP carry each frame behind a 24-bit big-endian
//! length. [`LengthPrefixedCodec`] splits a byte stream into frame bodies and
//! prefixes outgoing ones; [`FrameCodec`] additionally decodes the bodies
//! into [`Frame`] values. Transports that preserve message boundaries (for
//! example, an in-memory channel) skip this layer entirely.
//!
//! # Error Handling
//!
//! The codec layer reports failures through [`CodecError`], which separates
//! framing errors, malformed frame bodies, I/O errors, and EOF conditions.
//! See the [`error`] module for details.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::{
    byte_order::{U24_MAX, read_network_u24},
    frame::{Frame, HEADER_SIZE},
};

pub mod error;

pub use error::{CodecError, EofError, FramingError};

/// Largest frame body expressible by the 24-bit length prefix.
pub const MAX_FRAME_LENGTH: usize = U24_MAX as usize;

/// Length prefix header size (3 bytes, big-endian).
pub const LENGTH_HEADER_SIZE: usize = 3;

/// Codec applying the 24-bit length prefix to opaque frame bodies.
///
/// # Examples
///
/// ```
/// use bytes::{Bytes, BytesMut};
/// use rsframe::codec::LengthPrefixedCodec;
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let mut codec = LengthPrefixedCodec::default();
/// let mut buf = BytesMut::new();
/// codec
///     .encode(Bytes::from_static(&[0, 0, 0, 1, 0x24, 0]), &mut buf)
///     .expect("frame fits");
/// assert_eq!(&buf[..3], &[0, 0, 6]);
/// let body = codec.decode(&mut buf).expect("valid").expect("complete");
/// assert_eq!(body.len(), 6);
/// ```
#[derive(Clone, Debug)]
pub struct LengthPrefixedCodec {
    inner: LengthDelimitedCodec,
    max_frame_length: usize,
}

impl LengthPrefixedCodec {
    /// Construct a codec accepting bodies up to `max_frame_length` bytes.
    ///
    /// Values above [`MAX_FRAME_LENGTH`] are clamped to it.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        let max_frame_length = max_frame_length.clamp(HEADER_SIZE, MAX_FRAME_LENGTH);
        let inner = LengthDelimitedCodec::builder()
            .length_field_length(LENGTH_HEADER_SIZE)
            .max_frame_length(max_frame_length)
            .new_codec();
        Self {
            inner,
            max_frame_length,
        }
    }

    /// Return the maximum frame length accepted by this codec.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }

    fn check_header(&self, src: &BytesMut) -> Result<(), CodecError> {
        let Some(size) = peek_length(src) else {
            return Ok(());
        };
        if size > self.max_frame_length {
            return Err(FramingError::OversizedFrame {
                size,
                max: self.max_frame_length,
            }
            .into());
        }
        if size < HEADER_SIZE {
            return Err(FramingError::UndersizedFrame {
                size,
                header: HEADER_SIZE,
            }
            .into());
        }
        Ok(())
    }
}

impl Default for LengthPrefixedCodec {
    fn default() -> Self { Self::new(MAX_FRAME_LENGTH) }
}

fn peek_length(src: &BytesMut) -> Option<usize> {
    src.get(..LENGTH_HEADER_SIZE)
        .and_then(|slice| <[u8; LENGTH_HEADER_SIZE]>::try_from(slice).ok())
        .map(|bytes| read_network_u24(bytes) as usize)
}

impl Decoder for LengthPrefixedCodec {
    type Item = Bytes;
    type Error = CodecError;

    // The prefix stays in `src` until the whole body has arrived, so EOF
    // errors can always report the expected length.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.check_header(src)?;
        let Some(size) = peek_length(src) else {
            return Ok(None);
        };
        let total = LENGTH_HEADER_SIZE + size;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        let mut frame = src.split_to(total);
        let body = frame.split_off(LENGTH_HEADER_SIZE);
        Ok(Some(body.freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                tracing::debug!(
                    remaining = src.len(),
                    "connection closed inside a frame"
                );
                Err(build_eof_error(src))
            }
        }
    }
}

/// Build the appropriate EOF error based on remaining buffer state.
///
/// - [`EofError::MidHeader`]: fewer than 3 bytes received.
/// - [`EofError::MidFrame`]: the length prefix was read but the body is
///   incomplete.
fn build_eof_error(src: &BytesMut) -> CodecError {
    let bytes_received = src.len();
    match peek_length(src) {
        Some(expected) => CodecError::Eof(EofError::MidFrame {
            bytes_received: bytes_received.saturating_sub(LENGTH_HEADER_SIZE),
            expected,
        }),
        None => CodecError::Eof(EofError::MidHeader {
            bytes_received,
            header_size: LENGTH_HEADER_SIZE,
        }),
    }
}

impl Encoder<Bytes> for LengthPrefixedCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_length {
            return Err(FramingError::OversizedFrame {
                size: item.len(),
                max: self.max_frame_length,
            }
            .into());
        }
        Ok(self.inner.encode(item, dst)?)
    }
}

/// Codec producing decoded [`Frame`] values from a length-prefixed stream.
#[derive(Clone, Debug, Default)]
pub struct FrameCodec {
    framing: LengthPrefixedCodec,
}

impl FrameCodec {
    /// Frame codec accepting bodies up to `max_frame_length` bytes.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            framing: LengthPrefixedCodec::new(max_frame_length),
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.framing.decode(src)? {
            Some(body) => Ok(Some(Frame::decode(body)?)),
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.framing.decode_eof(src)? {
            Some(body) => Ok(Some(Frame::decode(body)?)),
            None => Ok(None),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = item.to_bytes()?;
        self.framing.encode(body, dst)
    }
}

#[cfg(test)]
mod tests;
