//! Compact type encoding shared by mime and authentication types.

use std::fmt;

use bytes::{BufMut, BytesMut};

use super::{MetadataError, Reader};
use crate::mime::WellKnownMimeType;

/// High bit marking a one-byte identifier.
const KNOWN_TYPE_FLAG: u8 = 0x80;
/// Longest name whose length byte leaves the flag bit clear.
const MAX_NAME_LEN: usize = 0x7F;

/// A type as it appears on the wire, before it is matched against a table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum CompactType {
    Id(u8),
    Name(String),
}

impl CompactType {
    pub(super) fn write(&self, buf: &mut BytesMut) -> Result<(), MetadataError> {
        match self {
            Self::Id(id) => buf.put_u8(KNOWN_TYPE_FLAG | checked_identifier(*id)?),
            Self::Name(name) => {
                let len = checked_name(name)?;
                buf.put_u8(len);
                buf.put_slice(name.as_bytes());
            }
        }
        Ok(())
    }

    pub(super) fn read(reader: &mut Reader) -> Result<Self, MetadataError> {
        let byte = reader.u8("type")?;
        if byte & KNOWN_TYPE_FLAG != 0 {
            return Ok(Self::Id(byte & !KNOWN_TYPE_FLAG));
        }
        let name = reader.text("type name", usize::from(byte))?;
        checked_name(&name)?;
        Ok(Self::Name(name))
    }
}

pub(super) fn checked_identifier(id: u8) -> Result<u8, MetadataError> {
    if id & KNOWN_TYPE_FLAG == 0 {
        Ok(id)
    } else {
        Err(MetadataError::InvalidIdentifier(id))
    }
}

pub(super) fn checked_name(name: &str) -> Result<u8, MetadataError> {
    match u8::try_from(name.len()) {
        Ok(len) if !name.is_empty() && name.len() <= MAX_NAME_LEN && name.is_ascii() => Ok(len),
        _ => Err(MetadataError::InvalidTypeName(name.to_owned())),
    }
}

/// Mime type of one composite metadata entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MetadataMimeType {
    /// A type from the well-known table.
    WellKnown(WellKnownMimeType),
    /// An identifier the table does not assign.
    Reserved(u8),
    /// A type carried by name.
    Custom(String),
}

impl MetadataMimeType {
    /// Type for `name`, preferring the well-known identifier.
    ///
    /// # Errors
    ///
    /// Fails when a custom name is empty, longer than 127 bytes, or not
    /// ASCII.
    pub fn named(name: &str) -> Result<Self, MetadataError> {
        if let Ok(known) = name.parse() {
            return Ok(Self::WellKnown(known));
        }
        checked_name(name)?;
        Ok(Self::Custom(name.to_owned()))
    }

    /// Type for a 7-bit identifier.
    ///
    /// # Errors
    ///
    /// Fails when `id` has the high bit set.
    pub fn identified(id: u8) -> Result<Self, MetadataError> {
        let id = checked_identifier(id)?;
        Ok(WellKnownMimeType::from_identifier(id).map_or(Self::Reserved(id), Self::WellKnown))
    }

    pub(super) fn to_compact(&self) -> CompactType {
        match self {
            Self::WellKnown(known) => CompactType::Id(known.identifier()),
            Self::Reserved(id) => CompactType::Id(*id),
            Self::Custom(name) => CompactType::Name(name.clone()),
        }
    }

    pub(super) fn from_compact(compact: CompactType) -> Self {
        match compact {
            CompactType::Id(id) => WellKnownMimeType::from_identifier(id).map_or(Self::Reserved(id), Self::WellKnown),
            CompactType::Name(name) => name.parse().map_or(Self::Custom(name), Self::WellKnown),
        }
    }
}

impl From<WellKnownMimeType> for MetadataMimeType {
    fn from(value: WellKnownMimeType) -> Self { Self::WellKnown(value) }
}

impl fmt::Display for MetadataMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WellKnown(known) => known.fmt(f),
            Self::Reserved(id) => write!(f, "reserved({id:#04x})"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}
