//! Several mime-tagged metadata entries in one buffer.
//!
//! Each entry is the compact mime type, a 24-bit content length and the
//! content. Entries keep their order and a mime type may repeat.

use bytes::{BufMut, Bytes, BytesMut};

use super::{MetadataError, MetadataExtension, MetadataMimeType, Reader, compact::CompactType};
use crate::{
    byte_order::{read_network_u24, write_network_u24},
    mime::WellKnownMimeType,
};

/// One entry of [`CompositeMetadata`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeEntry {
    /// Mime type of `content`.
    pub mime_type: MetadataMimeType,
    /// Entry bytes.
    pub content: Bytes,
}

/// Ordered list of metadata entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompositeMetadata {
    entries: Vec<CompositeEntry>,
}

impl CompositeMetadata {
    /// No entries.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append an entry.
    #[must_use]
    pub fn with_entry(mut self, mime_type: impl Into<MetadataMimeType>, content: impl Into<Bytes>) -> Self {
        self.push(mime_type, content);
        self
    }

    /// Append `metadata` tagged with its layout's mime type.
    ///
    /// # Errors
    ///
    /// Fails when `metadata` cannot be encoded.
    pub fn with_metadata<M: MetadataExtension>(self, metadata: &M) -> Result<Self, MetadataError> {
        Ok(self.with_entry(M::MIME_TYPE, metadata.encode()?))
    }

    /// Append an entry in place.
    pub fn push(&mut self, mime_type: impl Into<MetadataMimeType>, content: impl Into<Bytes>) {
        self.entries.push(CompositeEntry {
            mime_type: mime_type.into(),
            content: content.into(),
        });
    }

    /// Entries in wire order.
    #[must_use]
    pub fn entries(&self) -> &[CompositeEntry] { &self.entries }

    /// Whether any entry has `mime_type`.
    #[must_use]
    pub fn contains(&self, mime_type: &MetadataMimeType) -> bool { self.get(mime_type).is_some() }

    /// Content of the first entry with `mime_type`.
    #[must_use]
    pub fn get(&self, mime_type: &MetadataMimeType) -> Option<&Bytes> {
        self.entries
            .iter()
            .find(|entry| &entry.mime_type == mime_type)
            .map(|entry| &entry.content)
    }

    /// Contents of every entry with `mime_type`, in order.
    pub fn all<'a>(&'a self, mime_type: &'a MetadataMimeType) -> impl Iterator<Item = &'a Bytes> + 'a {
        self.entries
            .iter()
            .filter(move |entry| &entry.mime_type == mime_type)
            .map(|entry| &entry.content)
    }

    /// Decode the first entry tagged with `M`'s mime type, if present.
    #[must_use]
    pub fn read<M: MetadataExtension>(&self) -> Option<Result<M, MetadataError>> {
        self.get(&M::MIME_TYPE.into()).cloned().map(M::decode)
    }

    /// Serialise every entry.
    ///
    /// # Errors
    ///
    /// Fails when an entry is larger than 16 MiB or a custom mime type is
    /// not a valid name.
    pub fn encode(&self) -> Result<Bytes, MetadataError> {
        let mut buf = BytesMut::new();
        for entry in &self.entries {
            entry.mime_type.to_compact().write(&mut buf)?;
            let len = u32::try_from(entry.content.len())
                .ok()
                .and_then(write_network_u24)
                .ok_or(MetadataError::EntryTooLarge(entry.content.len()))?;
            buf.put_slice(&len);
            buf.put_slice(&entry.content);
        }
        Ok(buf.freeze())
    }

    /// Parse entries until `bytes` is exhausted. Entry contents share
    /// `bytes`' allocation.
    ///
    /// # Errors
    ///
    /// Fails when an entry is truncated or its mime type is malformed.
    pub fn decode(bytes: Bytes) -> Result<Self, MetadataError> {
        let mut reader = Reader::new(bytes);
        let mut entries = Vec::new();
        while !reader.is_empty() {
            let mime_type = MetadataMimeType::from_compact(CompactType::read(&mut reader)?);
            let len = read_network_u24(reader.array("entry length")?);
            let content = reader.take("entry content", len as usize)?;
            entries.push(CompositeEntry { mime_type, content });
        }
        Ok(Self { entries })
    }
}

impl MetadataExtension for CompositeMetadata {
    const MIME_TYPE: WellKnownMimeType = WellKnownMimeType::MessageCompositeMetadata;

    fn encode(&self) -> Result<Bytes, MetadataError> { Self::encode(self) }

    fn decode(bytes: Bytes) -> Result<Self, MetadataError> { Self::decode(bytes) }
}
