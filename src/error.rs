//! Canonical error and result types for the crate.
//!
//! [`RSocketError`] is the protocol-visible error carried by ERROR frames and
//! returned to callers of requester operations. [`ConnectionError`] is the
//! top-level failure of a connection: transport, codec, malformed frames, or
//! a connection-scope protocol error.

use std::{fmt, io};

use thiserror::Error;

use crate::{codec::CodecError, frame::FrameError};

/// Protocol error code carried by ERROR frames.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(u32);

/// Range an [`ErrorCode`] belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorScope {
    /// Applies to the whole connection and must be sent on stream 0.
    Connection,
    /// Applies to a single stream.
    Stream,
    /// Application-defined code in the custom range.
    Custom,
    /// Reserved by the protocol and never sent.
    Reserved,
    /// Inside a protocol range but not assigned.
    Unassigned,
}

impl ErrorCode {
    /// Reserved zero code.
    pub const RESERVED: Self = Self(0x0000_0000);
    /// The SETUP frame is invalid for the server.
    pub const INVALID_SETUP: Self = Self(0x0000_0001);
    /// Some SETUP parameters are not supported by the server.
    pub const UNSUPPORTED_SETUP: Self = Self(0x0000_0002);
    /// The server rejected the SETUP.
    pub const REJECTED_SETUP: Self = Self(0x0000_0003);
    /// The server rejected the RESUME.
    pub const REJECTED_RESUME: Self = Self(0x0000_0004);
    /// The connection is being terminated because of an error.
    pub const CONNECTION_ERROR: Self = Self(0x0000_0101);
    /// The connection is being terminated normally.
    pub const CONNECTION_CLOSE: Self = Self(0x0000_0102);
    /// The application failed to handle the request.
    pub const APPLICATION_ERROR: Self = Self(0x0000_0201);
    /// The responder refused to handle the request.
    pub const REJECTED: Self = Self(0x0000_0202);
    /// The responder cancelled the request.
    pub const CANCELED: Self = Self(0x0000_0203);
    /// The request is invalid.
    pub const INVALID: Self = Self(0x0000_0204);
    /// Reserved for extension.
    pub const RESERVED_EXTENSION: Self = Self(0xFFFF_FFFF);

    /// Smallest application-defined code.
    pub const CUSTOM_MIN: u32 = 0x0000_0301;
    /// Largest application-defined code.
    pub const CUSTOM_MAX: u32 = 0xFFFF_FFFE;

    /// Wrap a raw wire value.
    #[must_use]
    pub const fn new(value: u32) -> Self { Self(value) }

    /// Build an application-defined code, rejecting values outside the
    /// custom range.
    #[must_use]
    pub const fn custom(value: u32) -> Option<Self> {
        if value >= Self::CUSTOM_MIN && value <= Self::CUSTOM_MAX {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Raw wire value.
    #[must_use]
    pub const fn value(self) -> u32 { self.0 }

    /// Range this code belongs to.
    #[must_use]
    pub const fn scope(self) -> ErrorScope {
        match self.0 {
            0x0000_0000 | 0xFFFF_FFFF => ErrorScope::Reserved,
            0x0000_0001..=0x0000_0004 | 0x0000_0101..=0x0000_0102 => ErrorScope::Connection,
            0x0000_0201..=0x0000_0204 => ErrorScope::Stream,
            Self::CUSTOM_MIN..=Self::CUSTOM_MAX => ErrorScope::Custom,
            _ => ErrorScope::Unassigned,
        }
    }

    /// Symbolic name for assigned codes.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0x0000_0001 => "INVALID_SETUP",
            0x0000_0002 => "UNSUPPORTED_SETUP",
            0x0000_0003 => "REJECTED_SETUP",
            0x0000_0004 => "REJECTED_RESUME",
            0x0000_0101 => "CONNECTION_ERROR",
            0x0000_0102 => "CONNECTION_CLOSE",
            0x0000_0201 => "APPLICATION_ERROR",
            0x0000_0202 => "REJECTED",
            0x0000_0203 => "CANCELED",
            0x0000_0204 => "INVALID",
            _ => return None,
        })
    }
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}({:#x})", self.0),
            None => write!(f, "ErrorCode({:#x})", self.0),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#x}", self.0),
        }
    }
}

/// Protocol-visible error with a code and a human-readable message.
///
/// # Examples
///
/// ```
/// use rsframe::{ErrorCode, RSocketError};
///
/// let err = RSocketError::rejected("no handler");
/// assert_eq!(err.code, ErrorCode::REJECTED);
/// assert_eq!(err.to_string(), "REJECTED: no handler");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RSocketError {
    /// Protocol error code.
    pub code: ErrorCode,
    /// UTF-8 message carried alongside the code.
    pub message: String,
}

impl RSocketError {
    /// Build an error from a code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// `INVALID_SETUP` error.
    #[must_use]
    pub fn invalid_setup(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_SETUP, message)
    }

    /// `UNSUPPORTED_SETUP` error.
    #[must_use]
    pub fn unsupported_setup(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UNSUPPORTED_SETUP, message)
    }

    /// `REJECTED_SETUP` error.
    #[must_use]
    pub fn rejected_setup(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::REJECTED_SETUP, message)
    }

    /// `REJECTED_RESUME` error.
    #[must_use]
    pub fn rejected_resume(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::REJECTED_RESUME, message)
    }

    /// `CONNECTION_ERROR` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CONNECTION_ERROR, message)
    }

    /// `CONNECTION_CLOSE` error.
    #[must_use]
    pub fn connection_close(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CONNECTION_CLOSE, message)
    }

    /// `APPLICATION_ERROR` error.
    #[must_use]
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::APPLICATION_ERROR, message)
    }

    /// `REJECTED` error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self { Self::new(ErrorCode::REJECTED, message) }

    /// `CANCELED` error.
    #[must_use]
    pub fn canceled(message: impl Into<String>) -> Self { Self::new(ErrorCode::CANCELED, message) }

    /// `INVALID` error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self { Self::new(ErrorCode::INVALID, message) }

    /// Application-defined error; returns `None` outside the custom range.
    #[must_use]
    pub fn custom(code: u32, message: impl Into<String>) -> Option<Self> {
        ErrorCode::custom(code).map(|code| Self::new(code, message))
    }

    /// Whether the error terminates the whole connection.
    #[must_use]
    pub fn is_connection_scoped(&self) -> bool { self.code.scope() == ErrorScope::Connection }

    /// Rewrite the error into one a responder may send on a stream.
    ///
    /// Stream-scope and custom codes pass through; anything else becomes
    /// `APPLICATION_ERROR` with the same message.
    #[must_use]
    pub fn into_stream_error(self) -> Self {
        match self.code.scope() {
            ErrorScope::Stream | ErrorScope::Custom => self,
            _ => Self::application(self.message),
        }
    }
}

/// Top-level failure of a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Transport failure (for example, a socket reset).
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// Length-prefix framing failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// A frame could not be decoded or encoded.
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),
    /// Connection-scope protocol error, sent or received.
    #[error("protocol error: {0}")]
    Protocol(#[from] RSocketError),
    /// The connection was closed.
    #[error("connection closed")]
    Closed,
}

impl ConnectionError {
    /// Protocol error to surface on streams torn down by this failure.
    #[must_use]
    pub fn to_rsocket_error(&self) -> RSocketError {
        match self {
            Self::Protocol(err) => err.clone(),
            Self::Closed => RSocketError::connection_close("connection closed"),
            other => RSocketError::connection_error(other.to_string()),
        }
    }

    /// Returns true if this error represents a clean connection close.
    #[must_use]
    pub fn is_clean_close(&self) -> bool {
        match self {
            Self::Closed => true,
            Self::Codec(err) => err.is_clean_close(),
            Self::Protocol(err) => err.code == ErrorCode::CONNECTION_CLOSE,
            _ => false,
        }
    }
}

/// Canonical result alias used by connection-level APIs.
pub type Result<T> = std::result::Result<T, ConnectionError>;
