//! Authentication metadata.
//!
//! The buffer starts with the compact authentication type. Simple
//! credentials follow as a 16-bit username length, the username and the
//! password; bearer credentials as the token text. Any other type keeps its
//! content as raw bytes.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use super::{
    MetadataError,
    MetadataExtension,
    Reader,
    compact::{CompactType, checked_name},
    utf8,
};
use crate::{
    byte_order::{read_network_u16, write_network_u16},
    mime::WellKnownMimeType,
};

const SIMPLE_ID: u8 = 0x00;
const BEARER_ID: u8 = 0x01;

/// Authentication scheme.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AuthType {
    /// Username and password (`simple`).
    Simple,
    /// Token (`bearer`).
    Bearer,
    /// An identifier with no well-known scheme.
    Reserved(u8),
    /// A scheme carried by name.
    Custom(String),
}

impl AuthType {
    /// Scheme for `name`, preferring the well-known identifier.
    ///
    /// # Errors
    ///
    /// Fails when a custom name is empty, longer than 127 bytes, or not
    /// ASCII.
    pub fn named(name: &str) -> Result<Self, MetadataError> {
        match name {
            "simple" => Ok(Self::Simple),
            "bearer" => Ok(Self::Bearer),
            _ => {
                checked_name(name)?;
                Ok(Self::Custom(name.to_owned()))
            }
        }
    }

    fn to_compact(&self) -> CompactType {
        match self {
            Self::Simple => CompactType::Id(SIMPLE_ID),
            Self::Bearer => CompactType::Id(BEARER_ID),
            Self::Reserved(id) => CompactType::Id(*id),
            Self::Custom(name) => CompactType::Name(name.clone()),
        }
    }

    fn from_compact(compact: CompactType) -> Self {
        match compact {
            CompactType::Id(SIMPLE_ID) => Self::Simple,
            CompactType::Id(BEARER_ID) => Self::Bearer,
            CompactType::Id(id) => Self::Reserved(id),
            CompactType::Name(name) => Self::named(&name).unwrap_or(Self::Custom(name)),
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => f.write_str("simple"),
            Self::Bearer => f.write_str("bearer"),
            Self::Reserved(id) => write!(f, "reserved({id:#04x})"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// Credentials carried in metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthMetadata {
    /// Username and password.
    Simple {
        /// At most 65535 bytes.
        username: String,
        /// Rest of the buffer.
        password: String,
    },
    /// A bearer token.
    Bearer {
        /// Token text.
        token: String,
    },
    /// Any other scheme, content uninterpreted.
    Raw {
        /// Scheme of `content`.
        auth_type: AuthType,
        /// Scheme-specific bytes.
        content: Bytes,
    },
}

impl AuthMetadata {
    /// Simple credentials.
    #[must_use]
    pub fn simple(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Simple {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Bearer credentials.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self { Self::Bearer { token: token.into() } }

    /// Scheme of these credentials.
    #[must_use]
    pub fn auth_type(&self) -> AuthType {
        match self {
            Self::Simple { .. } => AuthType::Simple,
            Self::Bearer { .. } => AuthType::Bearer,
            Self::Raw { auth_type, .. } => auth_type.clone(),
        }
    }
}

impl MetadataExtension for AuthMetadata {
    const MIME_TYPE: WellKnownMimeType = WellKnownMimeType::MessageAuthentication;

    fn encode(&self) -> Result<Bytes, MetadataError> {
        let mut buf = BytesMut::new();
        self.auth_type().to_compact().write(&mut buf)?;
        match self {
            Self::Simple { username, password } => {
                let len = u16::try_from(username.len()).map_err(|_| MetadataError::UsernameTooLong(username.len()))?;
                buf.put_slice(&write_network_u16(len));
                buf.put_slice(username.as_bytes());
                buf.put_slice(password.as_bytes());
            }
            Self::Bearer { token } => buf.put_slice(token.as_bytes()),
            Self::Raw { content, .. } => buf.put_slice(content),
        }
        Ok(buf.freeze())
    }

    fn decode(bytes: Bytes) -> Result<Self, MetadataError> {
        let mut reader = Reader::new(bytes);
        match AuthType::from_compact(CompactType::read(&mut reader)?) {
            AuthType::Simple => {
                let len = read_network_u16(reader.array("username length")?);
                let username = reader.text("username", usize::from(len))?;
                let password = utf8("password", reader.rest())?;
                Ok(Self::Simple { username, password })
            }
            AuthType::Bearer => Ok(Self::Bearer {
                token: utf8("token", reader.rest())?,
            }),
            auth_type => Ok(Self::Raw {
                auth_type,
                content: reader.rest(),
            }),
        }
    }
}
