//! Errors raised while encoding or decoding frames.

use thiserror::Error;

use super::FrameType;

/// Structural violation in a frame.
///
/// Decoding failures are fatal for the connection, except for
/// [`FrameError::UnknownFrameType`] with `ignorable` set, which the engine
/// drops.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The frame ended before a field was complete.
    #[error("truncated frame: {field} needs {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Field being read.
        field: &'static str,
        /// Bytes required by the field.
        needed: usize,
        /// Bytes left in the frame.
        remaining: usize,
    },

    /// The reserved top bit of the stream id was set.
    #[error("stream id {0:#010x} sets the reserved bit")]
    ReservedStreamIdBit(u32),

    /// The frame type is not known to this implementation.
    #[error("unknown frame type {type_id:#04x} (ignorable: {ignorable})")]
    UnknownFrameType {
        /// Raw 6-bit type identifier.
        type_id: u8,
        /// Whether the IGNORE flag was set.
        ignorable: bool,
    },

    /// A connection frame used a non-zero stream id.
    #[error("{frame_type:?} frame must use stream 0, got {stream_id}")]
    ConnectionStreamRequired {
        /// Offending frame type.
        frame_type: FrameType,
        /// Stream id found on the wire.
        stream_id: u32,
    },

    /// A stream frame used stream 0.
    #[error("{0:?} frame requires a non-zero stream id")]
    StreamIdRequired(FrameType),

    /// A request-n value was zero or exceeded 31 bits.
    #[error("request n must be between 1 and 2^31-1, got {0}")]
    InvalidRequestN(u32),

    /// Metadata longer than the 24-bit length field allows.
    #[error("metadata of {0} bytes exceeds the 24-bit length field")]
    MetadataTooLarge(usize),

    /// A mime type was not ASCII or exceeded 255 bytes.
    #[error("invalid mime type: {0:?}")]
    InvalidMimeType(String),

    /// A resume token exceeded 65535 bytes.
    #[error("resume token of {0} bytes exceeds the 16-bit length field")]
    ResumeTokenTooLarge(usize),

    /// A duration did not fit the 31-bit millisecond field.
    #[error("{field} of {millis} ms does not fit the wire field")]
    DurationOutOfRange {
        /// Field being encoded.
        field: &'static str,
        /// Duration in milliseconds.
        millis: u128,
    },

    /// An ERROR frame message was not valid UTF-8.
    #[error("error message is not valid UTF-8")]
    InvalidUtf8,
}

impl FrameError {
    /// Whether the engine may drop the frame and continue.
    #[must_use]
    pub fn is_ignorable(&self) -> bool {
        matches!(
            self,
            Self::UnknownFrameType {
                ignorable: true,
                ..
            }
        )
    }
}
