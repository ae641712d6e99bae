//! Application payloads carried by request and response frames.
//!
//! A [`Payload`] pairs optional metadata with a data section. Both halves are
//! reference-counted [`Bytes`], so cloning and slicing a payload never copies
//! the underlying buffers.

use std::fmt;

use bytes::Bytes;

use crate::mime::WellKnownMimeType;

/// Immutable metadata and data pair.
///
/// `metadata` distinguishes "absent" (`None`) from "present but empty"
/// (`Some` of an empty buffer); the distinction survives encoding and
/// fragmentation because the METADATA flag is driven by it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Payload {
    /// Optional metadata section.
    pub metadata: Option<Bytes>,
    /// Data section.
    pub data: Bytes,
}

impl Payload {
    /// Payload without metadata and with empty data.
    pub const EMPTY: Self = Self {
        metadata: None,
        data: Bytes::new(),
    };

    /// Build a payload from a data section.
    ///
    /// # Examples
    ///
    /// ```
    /// use rsframe::Payload;
    ///
    /// let payload = Payload::new("hello").with_metadata("route");
    /// assert_eq!(payload.data.as_ref(), b"hello");
    /// assert_eq!(payload.metadata.as_deref(), Some(&b"route"[..]));
    /// ```
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            metadata: None,
            data: data.into(),
        }
    }

    /// Attach metadata to the payload.
    #[must_use]
    pub fn with_metadata(mut self, metadata: impl Into<Bytes>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    /// Whether the payload carries a metadata section.
    #[must_use]
    pub fn has_metadata(&self) -> bool { self.metadata.is_some() }

    /// Combined length of the metadata and data sections.
    #[must_use]
    pub fn len(&self) -> usize { self.metadata.as_ref().map_or(0, Bytes::len) + self.data.len() }

    /// Whether both sections are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("metadata_len", &self.metadata.as_ref().map(Bytes::len))
            .field("data_len", &self.data.len())
            .finish()
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self { Self::new(data) }
}

impl From<&'static str> for Payload {
    fn from(data: &'static str) -> Self { Self::new(data) }
}

impl From<&'static [u8]> for Payload {
    fn from(data: &'static [u8]) -> Self { Self::new(data) }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self { Self::new(data) }
}

impl From<String> for Payload {
    fn from(data: String) -> Self { Self::new(data) }
}

/// Mime types negotiated for metadata and data during setup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadMimeType {
    /// Mime type of payload metadata.
    pub metadata: String,
    /// Mime type of payload data.
    pub data: String,
}

impl PayloadMimeType {
    /// Build a mime type pair.
    #[must_use]
    pub fn new(metadata: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            metadata: metadata.into(),
            data: data.into(),
        }
    }
}

impl Default for PayloadMimeType {
    fn default() -> Self {
        let octet_stream = WellKnownMimeType::ApplicationOctetStream.as_str();
        Self::new(octet_stream, octet_stream)
    }
}
