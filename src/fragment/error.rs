//! Errors emitted by the reassembly layer.

use std::num::NonZeroUsize;

use thiserror::Error;

use crate::frame::FrameType;

/// Errors produced by [`Reassembler`](crate::fragment::Reassembler).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    /// A frame other than a PAYLOAD continuation arrived mid-chain.
    #[error("stream {stream_id}: {frame_type:?} arrived while a fragmented frame was pending")]
    UnexpectedFrame {
        /// Stream carrying the pending chain.
        stream_id: u32,
        /// Type of the offending frame.
        frame_type: FrameType,
    },
    /// The reassembled frame would exceed the configured cap.
    #[error("stream {stream_id}: reassembled payload of {attempted} bytes exceeds {limit}")]
    MessageTooLarge {
        /// Stream carrying the chain.
        stream_id: u32,
        /// Size the payload would have reached.
        attempted: usize,
        /// Configured limit.
        limit: NonZeroUsize,
    },
}
