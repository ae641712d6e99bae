//! Error types for the codec layer.
//!
//! This module distinguishes framing errors (length-prefix problems), frame
//! errors (a well-delimited frame whose body is malformed), I/O errors, and
//! EOF conditions.
//!
//! # Error Categories
//!
//! - [`FramingError`]: Wire-level issues in the 24-bit length prefix.
//! - [`FrameError`]: Structural violations inside a delimited frame.
//! - [`EofError`]: End-of-stream conditions distinguishing clean closure from premature
//!   disconnection.
//! - [`CodecError`]: Top-level enum wrapping all categories plus I/O errors.

use std::io;

use thiserror::Error;

use crate::frame::FrameError;

/// Framing-level errors occurring during frame boundary detection.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Frame length exceeds the configured maximum.
    #[error("frame exceeds max length: {size} > {max}")]
    OversizedFrame {
        /// Actual frame size indicated by the length prefix.
        size: usize,
        /// Maximum allowed frame size.
        max: usize,
    },

    /// Frame shorter than the fixed frame header.
    #[error("frame of {size} bytes is shorter than the {header} byte header")]
    UndersizedFrame {
        /// Length indicated by the prefix.
        size: usize,
        /// Fixed frame header size.
        header: usize,
    },
}

/// EOF handling variants distinguishing normal vs. premature closure.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// Clean EOF at frame boundary - normal socket closure.
    #[error("connection closed cleanly at frame boundary")]
    CleanClose,

    /// EOF received mid-frame - premature socket closure.
    #[error("premature EOF: {bytes_received} bytes of {expected} byte frame received")]
    MidFrame {
        /// Bytes received before EOF.
        bytes_received: usize,
        /// Expected total frame size.
        expected: usize,
    },

    /// EOF received while reading the length prefix.
    #[error("premature EOF during header: {bytes_received} of {header_size} header bytes")]
    MidHeader {
        /// Header bytes received before EOF.
        bytes_received: usize,
        /// Expected header size.
        header_size: usize,
    },
}

/// Top-level codec error taxonomy.
///
/// # Examples
///
/// ```
/// use rsframe::codec::{CodecError, EofError, FramingError};
///
/// let err = CodecError::Framing(FramingError::OversizedFrame {
///     size: 2000,
///     max: 1024,
/// });
/// assert!(err.should_disconnect());
/// assert!(CodecError::Eof(EofError::CleanClose).is_clean_close());
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Framing layer error.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// A delimited frame could not be parsed or serialised.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Transport layer I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// End-of-stream handling.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Returns true if this error represents a clean connection close.
    #[must_use]
    pub fn is_clean_close(&self) -> bool { matches!(self, Self::Eof(EofError::CleanClose)) }

    /// Returns true if the connection must be terminated.
    ///
    /// Only unknown frames flagged as ignorable can be skipped; every other
    /// codec failure leaves the byte stream or the protocol state unusable.
    #[must_use]
    pub fn should_disconnect(&self) -> bool {
        !matches!(self, Self::Frame(err) if err.is_ignorable())
    }

    /// Returns the error category as a string for logging and metrics.
    ///
    /// # Returns
    ///
    /// One of: `"framing"`, `"frame"`, `"io"`, or `"eof"`.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Frame(_) => "frame",
            Self::Io(_) => "io",
            Self::Eof(_) => "eof",
        }
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Framing(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Frame(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
