//! Frame model for the multiplexed protocol.
//!
//! A [`Frame`] is one logical protocol unit: a 6-byte header (stream id, type,
//! flags) followed by a type-specific body. [`Frame::encode`] and
//! [`Frame::decode`] convert between frames and their unprefixed wire bytes;
//! the length prefix is applied by [`crate::codec`].
//!
//! [`RequestFrame`] covers every fragmentable frame (the four request types
//! and PAYLOAD), so fragmentation and reassembly operate on a single type.

mod decode;
mod encode;
pub mod error;
pub mod types;

use bytes::Bytes;

pub use error::FrameError;
pub use types::{
    FLAGS_MASK,
    FRAME_TYPE_SHIFT,
    FrameType,
    HEADER_SIZE,
    MAX_REQUEST_N,
    MAX_STREAM_ID,
    flags,
};

use crate::{
    error::RSocketError,
    lease::Lease,
    payload::Payload,
    setup::{ConnectionSetup, Version},
};

/// A decoded protocol frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// SETUP on stream 0.
    Setup(ConnectionSetup),
    /// LEASE on stream 0.
    Lease(Lease),
    /// KEEPALIVE on stream 0.
    KeepAlive(KeepAliveFrame),
    /// REQUEST_* or PAYLOAD.
    Request(RequestFrame),
    /// REQUEST_N.
    RequestN {
        /// Target stream.
        stream_id: u32,
        /// Additional demand, in `1..=MAX_REQUEST_N`.
        n: u32,
    },
    /// CANCEL.
    Cancel {
        /// Target stream.
        stream_id: u32,
    },
    /// ERROR on stream 0 (connection) or a stream.
    Error(ErrorFrame),
    /// METADATA_PUSH on stream 0.
    MetadataPush(Bytes),
    /// RESUME on stream 0.
    Resume(ResumeFrame),
    /// RESUME_OK on stream 0.
    ResumeOk {
        /// Last implied position received from the client.
        last_received_client_position: u64,
    },
    /// EXT.
    Extension(ExtensionFrame),
}

impl Frame {
    /// Stream id carried in the header.
    #[must_use]
    pub fn stream_id(&self) -> u32 {
        match self {
            Self::Setup(_)
            | Self::Lease(_)
            | Self::KeepAlive(_)
            | Self::MetadataPush(_)
            | Self::Resume(_)
            | Self::ResumeOk { .. } => 0,
            Self::Request(frame) => frame.stream_id,
            Self::RequestN { stream_id, .. } | Self::Cancel { stream_id } => *stream_id,
            Self::Error(frame) => frame.stream_id,
            Self::Extension(frame) => frame.stream_id,
        }
    }

    /// Frame type carried in the header.
    #[must_use]
    pub fn frame_type(&self) -> FrameType {
        match self {
            Self::Setup(_) => FrameType::Setup,
            Self::Lease(_) => FrameType::Lease,
            Self::KeepAlive(_) => FrameType::KeepAlive,
            Self::Request(frame) => frame.frame_type,
            Self::RequestN { .. } => FrameType::RequestN,
            Self::Cancel { .. } => FrameType::Cancel,
            Self::Error(_) => FrameType::Error,
            Self::MetadataPush(_) => FrameType::MetadataPush,
            Self::Resume(_) => FrameType::Resume,
            Self::ResumeOk { .. } => FrameType::ResumeOk,
            Self::Extension(_) => FrameType::Extension,
        }
    }

    /// Header flags implied by the frame contents.
    #[must_use]
    pub fn flags(&self) -> u16 {
        let metadata = |present: bool| if present { flags::METADATA } else { 0 };
        match self {
            Self::Setup(setup) => {
                let mut bits = metadata(setup.payload.has_metadata());
                if setup.resume_token.is_some() {
                    bits |= flags::RESUME_ENABLE;
                }
                if setup.honor_lease {
                    bits |= flags::LEASE;
                }
                bits
            }
            Self::Lease(lease) => metadata(lease.metadata.is_some()),
            Self::KeepAlive(frame) if frame.respond => flags::RESPOND,
            Self::Request(frame) => frame.flags(),
            Self::MetadataPush(_) => flags::METADATA,
            Self::Extension(frame) => {
                let ignore = if frame.ignore { flags::IGNORE } else { 0 };
                ignore | metadata(frame.payload.has_metadata())
            }
            Self::KeepAlive(_)
            | Self::RequestN { .. }
            | Self::Cancel { .. }
            | Self::Error(_)
            | Self::Resume(_)
            | Self::ResumeOk { .. } => 0,
        }
    }

    /// Error frame for `stream_id`.
    #[must_use]
    pub fn error(stream_id: u32, error: RSocketError) -> Self {
        Self::Error(ErrorFrame { stream_id, error })
    }

    /// Whether the frame terminates or addresses a single stream.
    #[must_use]
    pub fn is_stream_frame(&self) -> bool { self.stream_id() != 0 }
}

/// KEEPALIVE body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeepAliveFrame {
    /// Whether the peer must echo the frame.
    pub respond: bool,
    /// Resume position of the sender; zero when resumption is unused.
    pub last_position: u64,
    /// Opaque data echoed back by the peer.
    pub data: Bytes,
}

/// Fragmentable frame: REQUEST_RESPONSE, REQUEST_FNF, REQUEST_STREAM,
/// REQUEST_CHANNEL, or PAYLOAD.
///
/// `complete` is only meaningful for REQUEST_CHANNEL and PAYLOAD, `next` only
/// for PAYLOAD, and `initial_request` only for REQUEST_STREAM and
/// REQUEST_CHANNEL; the wire flags ignore them elsewhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestFrame {
    /// One of the fragmentable frame types.
    pub frame_type: FrameType,
    /// Non-zero stream id.
    pub stream_id: u32,
    /// More fragments follow.
    pub follows: bool,
    /// The sender's direction is complete.
    pub complete: bool,
    /// The frame carries a payload element.
    pub next: bool,
    /// Initial demand for stream and channel requests.
    pub initial_request: u32,
    /// Metadata and data.
    pub payload: Payload,
}

impl RequestFrame {
    fn base(frame_type: FrameType, stream_id: u32, payload: Payload) -> Self {
        Self {
            frame_type,
            stream_id,
            follows: false,
            complete: false,
            next: false,
            initial_request: 0,
            payload,
        }
    }

    /// REQUEST_RESPONSE.
    #[must_use]
    pub fn request_response(stream_id: u32, payload: Payload) -> Self {
        Self::base(FrameType::RequestResponse, stream_id, payload)
    }

    /// REQUEST_FNF.
    #[must_use]
    pub fn fire_and_forget(stream_id: u32, payload: Payload) -> Self {
        Self::base(FrameType::RequestFnf, stream_id, payload)
    }

    /// REQUEST_STREAM with initial demand `initial_request`.
    #[must_use]
    pub fn request_stream(stream_id: u32, initial_request: u32, payload: Payload) -> Self {
        Self {
            initial_request,
            ..Self::base(FrameType::RequestStream, stream_id, payload)
        }
    }

    /// REQUEST_CHANNEL with initial demand `initial_request`.
    #[must_use]
    pub fn request_channel(
        stream_id: u32,
        initial_request: u32,
        payload: Payload,
        complete: bool,
    ) -> Self {
        Self {
            initial_request,
            complete,
            ..Self::base(FrameType::RequestChannel, stream_id, payload)
        }
    }

    /// PAYLOAD with explicit NEXT and COMPLETE flags.
    #[must_use]
    pub fn payload(stream_id: u32, payload: Payload, next: bool, complete: bool) -> Self {
        Self {
            next,
            complete,
            ..Self::base(FrameType::Payload, stream_id, payload)
        }
    }

    /// PAYLOAD(NEXT).
    #[must_use]
    pub fn next(stream_id: u32, payload: Payload) -> Self {
        Self::payload(stream_id, payload, true, false)
    }

    /// PAYLOAD(NEXT|COMPLETE).
    #[must_use]
    pub fn next_complete(stream_id: u32, payload: Payload) -> Self {
        Self::payload(stream_id, payload, true, true)
    }

    /// PAYLOAD(COMPLETE) without an element.
    #[must_use]
    pub fn complete(stream_id: u32) -> Self {
        Self::payload(stream_id, Payload::EMPTY, false, true)
    }

    /// Header flags implied by the frame type and fields.
    #[must_use]
    pub fn flags(&self) -> u16 {
        let mut bits = 0;
        if self.payload.has_metadata() {
            bits |= flags::METADATA;
        }
        if self.follows {
            bits |= flags::FOLLOWS;
        }
        if self.complete && self.carries_complete() {
            bits |= flags::COMPLETE;
        }
        if self.next && self.frame_type == FrameType::Payload {
            bits |= flags::NEXT;
        }
        bits
    }

    fn carries_complete(&self) -> bool {
        matches!(self.frame_type, FrameType::RequestChannel | FrameType::Payload)
    }
}

impl From<RequestFrame> for Frame {
    fn from(frame: RequestFrame) -> Self { Self::Request(frame) }
}

/// ERROR body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorFrame {
    /// Zero for connection errors.
    pub stream_id: u32,
    /// Code and message.
    pub error: RSocketError,
}

/// RESUME body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResumeFrame {
    /// Protocol version of the client.
    pub version: Version,
    /// Token identifying the session to resume.
    pub token: Bytes,
    /// Last implied position received from the server.
    pub last_received_server_position: u64,
    /// Earliest position the client can replay.
    pub first_available_client_position: u64,
}

/// EXT body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionFrame {
    /// Zero or a stream id.
    pub stream_id: u32,
    /// The receiver may drop the frame if it does not understand it.
    pub ignore: bool,
    /// Extension-defined type.
    pub extended_type: u32,
    /// Extension payload.
    pub payload: Payload,
}

#[cfg(test)]
mod tests;
