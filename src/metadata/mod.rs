//! Structured layouts for payload metadata.
//!
//! These extensions describe how metadata bytes are laid out when a
//! connection's metadata mime type names them:
//!
//! - [`CompositeMetadata`] packs several mime-tagged entries into one
//!   metadata buffer;
//! - [`RoutingMetadata`] carries a list of route tags;
//! - [`AuthMetadata`] carries simple, bearer or custom credentials.
//!
//! Mime and authentication types share a compact encoding: a well-known
//! type is one byte with the high bit set, any other type is its ASCII
//! name prefixed by a one-byte length.

pub mod auth;
mod compact;
pub mod composite;
pub mod error;
pub mod routing;

use bytes::Bytes;

pub use auth::{AuthMetadata, AuthType};
pub use compact::MetadataMimeType;
pub use composite::{CompositeEntry, CompositeMetadata};
pub use error::MetadataError;
pub use routing::RoutingMetadata;

use crate::mime::WellKnownMimeType;

/// A metadata layout identified by a well-known mime type.
///
/// # Examples
///
/// ```
/// use rsframe::metadata::{CompositeMetadata, MetadataExtension, RoutingMetadata};
///
/// let route = RoutingMetadata::new(["orders.create"]).expect("valid tag");
/// let composite = CompositeMetadata::new()
///     .with_metadata(&route)
///     .expect("route fits");
/// let bytes = composite.encode().expect("entries fit");
///
/// let decoded = CompositeMetadata::decode(bytes).expect("well formed");
/// let found = decoded.read::<RoutingMetadata>().expect("route present");
/// assert_eq!(found.expect("route decodes"), route);
/// ```
pub trait MetadataExtension: Sized {
    /// Mime type tagging this layout inside composite metadata.
    const MIME_TYPE: WellKnownMimeType;

    /// Serialise the layout.
    ///
    /// # Errors
    ///
    /// Fails when a field does not fit its length prefix.
    fn encode(&self) -> Result<Bytes, MetadataError>;

    /// Parse the layout from `bytes`.
    ///
    /// # Errors
    ///
    /// Fails on truncated or malformed input.
    fn decode(bytes: Bytes) -> Result<Self, MetadataError>;
}

/// Bounds-checked cursor over a metadata buffer.
struct Reader {
    buf: Bytes,
}

impl Reader {
    fn new(buf: Bytes) -> Self { Self { buf } }

    fn is_empty(&self) -> bool { self.buf.is_empty() }

    fn take(&mut self, field: &'static str, len: usize) -> Result<Bytes, MetadataError> {
        if self.buf.len() < len {
            return Err(MetadataError::Truncated {
                field,
                needed: len,
                remaining: self.buf.len(),
            });
        }
        Ok(self.buf.split_to(len))
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], MetadataError> {
        let bytes = self.take(field, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, MetadataError> {
        let [byte] = self.array::<1>(field)?;
        Ok(byte)
    }

    fn text(&mut self, field: &'static str, len: usize) -> Result<String, MetadataError> {
        let bytes = self.take(field, len)?;
        utf8(field, bytes)
    }

    fn rest(&mut self) -> Bytes { std::mem::take(&mut self.buf) }
}

fn utf8(field: &'static str, bytes: Bytes) -> Result<String, MetadataError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| MetadataError::InvalidUtf8 { field })
}

#[cfg(test)]
mod tests;
