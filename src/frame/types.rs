//! Frame type identifiers, header flags, and wire constants.

use static_assertions::const_assert;

/// Size of the fixed frame header: stream id plus type/flags.
pub const HEADER_SIZE: usize = 6;

/// Largest usable stream id (31 bits).
pub const MAX_STREAM_ID: u32 = 0x7FFF_FFFF;

/// Largest request-n value; demand saturates here.
pub const MAX_REQUEST_N: u32 = 0x7FFF_FFFF;

/// Bit shift of the frame type inside the type/flags field.
pub const FRAME_TYPE_SHIFT: u16 = 10;

/// Mask selecting the flags inside the type/flags field.
pub const FLAGS_MASK: u16 = 0x03FF;

const_assert!(MAX_REQUEST_N == i32::MAX as u32);
const_assert!(FLAGS_MASK == (1 << FRAME_TYPE_SHIFT) - 1);

/// Header flag bits.
pub mod flags {
    /// The frame may be ignored if not understood.
    pub const IGNORE: u16 = 0x200;
    /// Metadata is present.
    pub const METADATA: u16 = 0x100;
    /// More fragments follow this one.
    pub const FOLLOWS: u16 = 0x80;
    /// The stream is complete.
    pub const COMPLETE: u16 = 0x40;
    /// The frame carries a payload element.
    pub const NEXT: u16 = 0x20;
    /// KEEPALIVE: the receiver must echo this frame.
    pub const RESPOND: u16 = 0x80;
    /// SETUP: the client supports resumption.
    pub const RESUME_ENABLE: u16 = 0x80;
    /// SETUP: the client will honour LEASE.
    pub const LEASE: u16 = 0x40;
}

/// Frame type identifier (6 bits on the wire).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Connection setup, sent once by the client.
    Setup = 0x01,
    /// Lease grant.
    Lease = 0x02,
    /// Connection liveness check.
    KeepAlive = 0x03,
    /// Single-response request.
    RequestResponse = 0x04,
    /// Request without a response.
    RequestFnf = 0x05,
    /// Request for a finite or infinite stream.
    RequestStream = 0x06,
    /// Bidirectional stream request.
    RequestChannel = 0x07,
    /// Additional demand for a stream.
    RequestN = 0x08,
    /// Cancel an outstanding request.
    Cancel = 0x09,
    /// Stream element and/or completion.
    Payload = 0x0A,
    /// Connection or stream error.
    Error = 0x0B,
    /// Connection-level metadata.
    MetadataPush = 0x0C,
    /// Resumption request.
    Resume = 0x0D,
    /// Resumption acknowledgement.
    ResumeOk = 0x0E,
    /// Extension frame.
    Extension = 0x3F,
}

impl FrameType {
    /// Wire identifier.
    #[must_use]
    pub const fn id(self) -> u8 { self as u8 }

    /// Look up a frame type by wire identifier.
    #[must_use]
    pub const fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            0x01 => Self::Setup,
            0x02 => Self::Lease,
            0x03 => Self::KeepAlive,
            0x04 => Self::RequestResponse,
            0x05 => Self::RequestFnf,
            0x06 => Self::RequestStream,
            0x07 => Self::RequestChannel,
            0x08 => Self::RequestN,
            0x09 => Self::Cancel,
            0x0A => Self::Payload,
            0x0B => Self::Error,
            0x0C => Self::MetadataPush,
            0x0D => Self::Resume,
            0x0E => Self::ResumeOk,
            0x3F => Self::Extension,
            _ => return None,
        })
    }

    /// Whether the type starts a new stream.
    #[must_use]
    pub const fn is_request(self) -> bool {
        matches!(
            self,
            Self::RequestResponse | Self::RequestFnf | Self::RequestStream | Self::RequestChannel
        )
    }

    /// Whether the body starts with an initial request-n.
    #[must_use]
    pub const fn has_initial_request(self) -> bool {
        matches!(self, Self::RequestStream | Self::RequestChannel)
    }

    /// Whether the type may be split into fragments.
    #[must_use]
    pub const fn is_fragmentable(self) -> bool { self.is_request() || matches!(self, Self::Payload) }

    /// Required stream-id scope: `Some(true)` for stream 0 only,
    /// `Some(false)` for non-zero ids only, `None` when either is allowed.
    #[must_use]
    pub const fn connection_scope(self) -> Option<bool> {
        match self {
            Self::Setup
            | Self::Lease
            | Self::KeepAlive
            | Self::MetadataPush
            | Self::Resume
            | Self::ResumeOk => Some(true),
            Self::RequestResponse
            | Self::RequestFnf
            | Self::RequestStream
            | Self::RequestChannel
            | Self::RequestN
            | Self::Cancel
            | Self::Payload => Some(false),
            Self::Error | Self::Extension => None,
        }
    }
}

/// Pack a frame type and flags into the 16-bit header field.
#[must_use]
pub const fn type_and_flags(frame_type: FrameType, flags: u16) -> u16 {
    ((frame_type.id() as u16) << FRAME_TYPE_SHIFT) | (flags & FLAGS_MASK)
}

/// Split the 16-bit header field into a raw type id and flags.
#[must_use]
pub const fn split_type_and_flags(field: u16) -> (u8, u16) {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the shifted value has at most 6 significant bits"
    )]
    let type_id = (field >> FRAME_TYPE_SHIFT) as u8;
    (type_id, field & FLAGS_MASK)
}
