//! Errors raised while encoding or decoding metadata layouts.

use thiserror::Error;

/// Failures of the metadata extensions.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    /// The buffer ended inside a field.
    #[error("metadata truncated reading {field}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Field being read.
        field: &'static str,
        /// Bytes the field needs.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },
    /// A type name is empty, longer than 127 bytes, or not ASCII.
    #[error("type name must be 1 to 127 ASCII bytes: {0:?}")]
    InvalidTypeName(String),
    /// A compact identifier does not fit in 7 bits.
    #[error("type identifier {0:#04x} does not fit in 7 bits")]
    InvalidIdentifier(u8),
    /// A composite entry exceeds the 24-bit length field.
    #[error("composite entry of {0} bytes exceeds the 24-bit length field")]
    EntryTooLarge(usize),
    /// A routing tag is empty or longer than 255 bytes.
    #[error("routing tag must be 1 to 255 bytes, got {0}")]
    InvalidTagLength(usize),
    /// A simple-auth username exceeds the 16-bit length field.
    #[error("username of {0} bytes exceeds 65535")]
    UsernameTooLong(usize),
    /// A text field is not valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 {
        /// Field being read.
        field: &'static str,
    },
}
