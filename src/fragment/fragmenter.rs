//! Outbound helper that splits request and payload frames into fragments.

use bytes::Bytes;

use super::FragmentationConfig;
use crate::{
    frame::{FrameType, RequestFrame},
    payload::Payload,
};

/// Splits frames whose payload exceeds the fragment size.
///
/// The first fragment keeps the original frame type and initial request-n;
/// later fragments are PAYLOAD frames. FOLLOWS is set on all but the last
/// fragment and COMPLETE only on the last. Metadata bytes are emitted before
/// data bytes.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use rsframe::{
///     Payload,
///     fragment::{FragmentationConfig, Fragmenter},
///     frame::RequestFrame,
/// };
///
/// let fragmenter = Fragmenter::new(FragmentationConfig::new(NonZeroUsize::new(4).expect("non-zero")));
/// let frame = RequestFrame::request_response(1, Payload::new("0123456789"));
/// let fragments = fragmenter.fragment(frame);
/// assert_eq!(fragments.len(), 3);
/// assert!(fragments[0].follows && fragments[1].follows && !fragments[2].follows);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Fragmenter {
    config: FragmentationConfig,
}

impl Fragmenter {
    /// Create a fragmenter for `config`.
    #[must_use]
    pub const fn new(config: FragmentationConfig) -> Self { Self { config } }

    /// Maximum metadata plus data bytes per fragment.
    #[must_use]
    pub const fn fragment_size(&self) -> usize { self.config.fragment_size.get() }

    /// Whether `frame` needs more than one fragment.
    #[must_use]
    pub fn needs_fragmentation(&self, frame: &RequestFrame) -> bool {
        frame.payload.len() > self.fragment_size()
    }

    /// Split `frame` into a chain of fragments.
    ///
    /// Frames that fit are returned unchanged as a single-element chain.
    #[must_use]
    pub fn fragment(&self, frame: RequestFrame) -> Vec<RequestFrame> {
        if !self.needs_fragmentation(&frame) {
            return vec![frame];
        }

        let size = self.fragment_size();
        let Payload { metadata, mut data } = frame.payload.clone();
        let had_metadata = metadata.is_some();
        let mut metadata = metadata.unwrap_or_default();
        let mut fragments = Vec::with_capacity(frame.payload.len().div_ceil(size));

        while fragments.is_empty() || !metadata.is_empty() || !data.is_empty() {
            let first = fragments.is_empty();
            let metadata_part = if had_metadata && (first || !metadata.is_empty()) {
                Some(metadata.split_to(metadata.len().min(size)))
            } else {
                None
            };
            let used = metadata_part.as_ref().map_or(0, Bytes::len);
            let data_part = data.split_to(data.len().min(size - used));
            let last = metadata.is_empty() && data.is_empty();
            let payload = Payload {
                metadata: metadata_part,
                data: data_part,
            };

            let mut fragment = if first {
                RequestFrame {
                    payload,
                    ..frame.clone()
                }
            } else {
                RequestFrame::payload(frame.stream_id, payload, continuation_next(&frame), false)
            };
            fragment.follows = !last;
            fragment.complete = last && frame.complete;
            fragments.push(fragment);
        }

        tracing::trace!(
            stream_id = frame.stream_id,
            fragments = fragments.len(),
            "fragmented frame"
        );
        fragments
    }
}

/// Continuation fragments of a request always carry data.
fn continuation_next(frame: &RequestFrame) -> bool {
    frame.frame_type != FrameType::Payload || frame.next
}
