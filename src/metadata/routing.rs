//! Route tags: each tag is a one-byte length followed by UTF-8 text.

use bytes::{BufMut, Bytes, BytesMut};

use super::{MetadataError, MetadataExtension, Reader};
use crate::mime::WellKnownMimeType;

/// Ordered route tags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutingMetadata {
    tags: Vec<String>,
}

impl RoutingMetadata {
    /// Routing metadata for `tags`.
    ///
    /// # Errors
    ///
    /// Fails when a tag is empty or longer than 255 bytes.
    pub fn new<I, T>(tags: I) -> Result<Self, MetadataError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        for tag in &tags {
            tag_len(tag)?;
        }
        Ok(Self { tags })
    }

    /// Tags in wire order.
    #[must_use]
    pub fn tags(&self) -> &[String] { &self.tags }

    /// The first tag, conventionally the route itself.
    #[must_use]
    pub fn route(&self) -> Option<&str> { self.tags.first().map(String::as_str) }
}

fn tag_len(tag: &str) -> Result<u8, MetadataError> {
    match u8::try_from(tag.len()) {
        Ok(len) if len > 0 => Ok(len),
        _ => Err(MetadataError::InvalidTagLength(tag.len())),
    }
}

impl MetadataExtension for RoutingMetadata {
    const MIME_TYPE: WellKnownMimeType = WellKnownMimeType::MessageRouting;

    fn encode(&self) -> Result<Bytes, MetadataError> {
        let mut buf = BytesMut::with_capacity(self.tags.iter().map(|tag| tag.len() + 1).sum());
        for tag in &self.tags {
            buf.put_u8(tag_len(tag)?);
            buf.put_slice(tag.as_bytes());
        }
        Ok(buf.freeze())
    }

    fn decode(bytes: Bytes) -> Result<Self, MetadataError> {
        let mut reader = Reader::new(bytes);
        let mut tags = Vec::new();
        while !reader.is_empty() {
            let len = reader.u8("tag length")?;
            if len == 0 {
                return Err(MetadataError::InvalidTagLength(0));
            }
            tags.push(reader.text("tag", usize::from(len))?);
        }
        Ok(Self { tags })
    }
}
