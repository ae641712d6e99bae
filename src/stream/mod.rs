//! Stream multiplexing: id allocation, the per-connection stream table, and
//! the consumer side of inbound payload streams.

mod id;
pub(crate) mod inbound;
mod registry;

use std::fmt;

pub use id::StreamIdAllocator;
pub use registry::{RegistryError, StreamEntry, StreamRegistry};

use crate::{error::RSocketError, frame::FrameType, payload::Payload};

/// Which side of an interaction this peer plays on a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// This peer sent the request.
    Requester,
    /// This peer received the request.
    Responder,
}

/// Interaction model of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    /// METADATA_PUSH on stream 0.
    MetadataPush,
    /// REQUEST_FNF.
    FireAndForget,
    /// REQUEST_RESPONSE.
    RequestResponse,
    /// REQUEST_STREAM.
    RequestStream,
    /// REQUEST_CHANNEL.
    RequestChannel,
}

impl InteractionKind {
    /// Interaction started by a request frame of `frame_type`.
    #[must_use]
    pub fn from_frame_type(frame_type: FrameType) -> Option<Self> {
        match frame_type {
            FrameType::RequestFnf => Some(Self::FireAndForget),
            FrameType::RequestResponse => Some(Self::RequestResponse),
            FrameType::RequestStream => Some(Self::RequestStream),
            FrameType::RequestChannel => Some(Self::RequestChannel),
            FrameType::MetadataPush => Some(Self::MetadataPush),
            _ => None,
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MetadataPush => "metadata push",
            Self::FireAndForget => "fire-and-forget",
            Self::RequestResponse => "request-response",
            Self::RequestStream => "request-stream",
            Self::RequestChannel => "request-channel",
        })
    }
}

/// Event delivered to the consumer of a stream's inbound direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signal {
    /// One payload element.
    Next(Payload),
    /// The peer completed its direction.
    Complete,
    /// The stream failed; also used for connection teardown.
    Error(RSocketError),
}

impl Signal {
    /// Whether no further signal follows this one.
    #[must_use]
    pub fn is_terminal(&self) -> bool { !matches!(self, Self::Next(_)) }
}
