//! Inbound helper that stitches fragment chains back into logical frames.
//!
//! [`Reassembler`] mirrors the outbound [`Fragmenter`](crate::fragment::Fragmenter)
//! by collecting fragment payloads keyed by stream id. It guards against
//! unbounded allocation with a configurable cap. Partial chains are dropped
//! without error when their stream is cancelled or the connection closes.

use std::{
    collections::{HashMap, hash_map::Entry},
    num::NonZeroUsize,
};

use bytes::BytesMut;

use super::ReassemblyError;
use crate::{
    frame::{FrameType, RequestFrame},
    payload::Payload,
};

#[derive(Debug)]
struct PartialFrame {
    head: RequestFrame,
    metadata: Option<BytesMut>,
    data: BytesMut,
}

impl PartialFrame {
    fn new(mut head: RequestFrame) -> Self {
        let Payload { metadata, data } = std::mem::take(&mut head.payload);
        Self {
            head,
            metadata: metadata.map(|bytes| BytesMut::from(bytes.as_ref())),
            data: BytesMut::from(data.as_ref()),
        }
    }

    fn len(&self) -> usize { self.metadata.as_ref().map_or(0, BytesMut::len) + self.data.len() }

    fn push(&mut self, payload: &Payload) {
        if let Some(part) = &payload.metadata {
            self.metadata
                .get_or_insert_with(BytesMut::new)
                .extend_from_slice(part);
        }
        self.data.extend_from_slice(&payload.data);
    }

    fn finish(self, complete: bool) -> RequestFrame {
        RequestFrame {
            follows: false,
            complete,
            payload: Payload {
                metadata: self.metadata.map(BytesMut::freeze),
                data: self.data.freeze(),
            },
            ..self.head
        }
    }
}

/// Stateful fragment re-assembler keyed by stream id.
#[derive(Debug)]
pub struct Reassembler {
    max_message_size: NonZeroUsize,
    pending: HashMap<u32, PartialFrame>,
}

impl Reassembler {
    /// Create a re-assembler that caps reconstructed payloads at
    /// `max_message_size` bytes.
    #[must_use]
    pub fn new(max_message_size: NonZeroUsize) -> Self {
        Self {
            max_message_size,
            pending: HashMap::new(),
        }
    }

    /// Feed one fragment.
    ///
    /// Returns `Ok(Some(_))` with the logical frame once a fragment without
    /// FOLLOWS completes the chain, and `Ok(None)` while more fragments are
    /// expected. Frames that are not fragmented pass straight through.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::UnexpectedFrame`] when a request frame
    /// arrives while a chain is pending for its stream, and
    /// [`ReassemblyError::MessageTooLarge`] when the payload would exceed
    /// the cap. The pending chain is dropped in both cases.
    pub fn push(&mut self, frame: RequestFrame) -> Result<Option<RequestFrame>, ReassemblyError> {
        let stream_id = frame.stream_id;
        match self.pending.entry(stream_id) {
            Entry::Occupied(mut occupied) => {
                if frame.frame_type != FrameType::Payload {
                    occupied.remove();
                    return Err(ReassemblyError::UnexpectedFrame {
                        stream_id,
                        frame_type: frame.frame_type,
                    });
                }
                let attempted = occupied.get().len().saturating_add(frame.payload.len());
                if attempted > self.max_message_size.get() {
                    occupied.remove();
                    return Err(ReassemblyError::MessageTooLarge {
                        stream_id,
                        attempted,
                        limit: self.max_message_size,
                    });
                }
                occupied.get_mut().push(&frame.payload);
                if frame.follows {
                    return Ok(None);
                }
                Ok(Some(occupied.remove().finish(frame.complete)))
            }
            Entry::Vacant(vacant) => {
                if frame.payload.len() > self.max_message_size.get() {
                    return Err(ReassemblyError::MessageTooLarge {
                        stream_id,
                        attempted: frame.payload.len(),
                        limit: self.max_message_size,
                    });
                }
                if !frame.follows {
                    return Ok(Some(frame));
                }
                vacant.insert(PartialFrame::new(frame));
                Ok(None)
            }
        }
    }

    /// Drop the pending chain for `stream_id`, returning whether one existed.
    pub fn discard(&mut self, stream_id: u32) -> bool { self.pending.remove(&stream_id).is_some() }

    /// Drop every pending chain.
    pub fn clear(&mut self) { self.pending.clear(); }

    /// Whether a chain is pending for `stream_id`.
    #[must_use]
    pub fn is_pending(&self, stream_id: u32) -> bool { self.pending.contains_key(&stream_id) }

    /// Number of partial chains currently buffered.
    #[must_use]
    pub fn buffered_len(&self) -> usize { self.pending.len() }
}

impl Default for Reassembler {
    fn default() -> Self { Self::new(crate::config::DEFAULT_MAX_REASSEMBLY_SIZE) }
}
