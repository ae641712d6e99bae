//! Frame parsing.

use std::time::Duration;

use bytes::Bytes;

use super::{
    ErrorFrame,
    ExtensionFrame,
    Frame,
    FrameError,
    FrameType,
    KeepAliveFrame,
    MAX_REQUEST_N,
    MAX_STREAM_ID,
    RequestFrame,
    ResumeFrame,
    flags,
    types::split_type_and_flags,
};
use crate::{
    byte_order::{read_network_u16, read_network_u24, read_network_u32, read_network_u64},
    error::{ErrorCode, RSocketError},
    keepalive::KeepAlive,
    lease::Lease,
    payload::{Payload, PayloadMimeType},
    setup::{ConnectionSetup, Version},
};

/// Bounds-checked cursor over a frame body.
struct Reader {
    buf: Bytes,
}

impl Reader {
    fn take(&mut self, field: &'static str, len: usize) -> Result<Bytes, FrameError> {
        if self.buf.len() < len {
            return Err(FrameError::Truncated {
                field,
                needed: len,
                remaining: self.buf.len(),
            });
        }
        Ok(self.buf.split_to(len))
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], FrameError> {
        let bytes = self.take(field, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, FrameError> {
        let [byte] = self.array::<1>(field)?;
        Ok(byte)
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, FrameError> {
        self.array(field).map(read_network_u16)
    }

    fn u24(&mut self, field: &'static str) -> Result<u32, FrameError> {
        self.array(field).map(read_network_u24)
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, FrameError> {
        self.array(field).map(read_network_u32)
    }

    fn u64(&mut self, field: &'static str) -> Result<u64, FrameError> {
        self.array(field).map(read_network_u64)
    }

    fn rest(self) -> Bytes { self.buf }

    fn request_n(&mut self, field: &'static str) -> Result<u32, FrameError> {
        let n = self.u32(field)?;
        if n == 0 || n > MAX_REQUEST_N {
            return Err(FrameError::InvalidRequestN(n));
        }
        Ok(n)
    }

    fn millis(&mut self, field: &'static str) -> Result<Duration, FrameError> {
        self.u32(field).map(|ms| Duration::from_millis(u64::from(ms)))
    }

    fn version(&mut self) -> Result<Version, FrameError> {
        Ok(Version {
            major: self.u16("major version")?,
            minor: self.u16("minor version")?,
        })
    }

    fn token(&mut self) -> Result<Bytes, FrameError> {
        let len = self.u16("resume token length")?;
        self.take("resume token", usize::from(len))
    }

    fn mime_type(&mut self, field: &'static str) -> Result<String, FrameError> {
        let len = self.u8(field)?;
        let raw = self.take(field, usize::from(len))?;
        let text = String::from_utf8_lossy(&raw).into_owned();
        if raw.is_ascii() {
            Ok(text)
        } else {
            Err(FrameError::InvalidMimeType(text))
        }
    }

    fn payload(mut self, has_metadata: bool) -> Result<Payload, FrameError> {
        let metadata = if has_metadata {
            let len = self.u24("metadata length")?;
            Some(self.take("metadata", len as usize)?)
        } else {
            None
        };
        Ok(Payload {
            metadata,
            data: self.rest(),
        })
    }
}

impl Frame {
    /// Parse a frame from its unprefixed wire bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] for truncated bodies, reserved bits, an
    /// unknown frame type, or a stream id outside the type's scope.
    ///
    /// # Examples
    ///
    /// ```
    /// use rsframe::frame::Frame;
    ///
    /// let frame = Frame::Cancel { stream_id: 5 };
    /// let bytes = frame.to_bytes().expect("encode");
    /// assert_eq!(Frame::decode(bytes), Ok(frame));
    /// ```
    pub fn decode(src: Bytes) -> Result<Self, FrameError> {
        let mut reader = Reader { buf: src };
        let stream_id = reader.u32("stream id")?;
        if stream_id > MAX_STREAM_ID {
            return Err(FrameError::ReservedStreamIdBit(stream_id));
        }
        let (type_id, bits) = split_type_and_flags(reader.u16("frame type")?);
        let Some(frame_type) = FrameType::from_id(type_id) else {
            return Err(FrameError::UnknownFrameType {
                type_id,
                ignorable: bits & flags::IGNORE != 0,
            });
        };
        check_scope(frame_type, stream_id)?;
        let has_metadata = bits & flags::METADATA != 0;

        Ok(match frame_type {
            FrameType::Setup => {
                let version = reader.version()?;
                let keep_alive = KeepAlive {
                    interval: reader.millis("keepalive interval")?,
                    max_lifetime: reader.millis("max lifetime")?,
                };
                let resume_token = if bits & flags::RESUME_ENABLE != 0 {
                    Some(reader.token()?)
                } else {
                    None
                };
                let metadata = reader.mime_type("metadata mime type")?;
                let data = reader.mime_type("data mime type")?;
                Self::Setup(ConnectionSetup {
                    version,
                    honor_lease: bits & flags::LEASE != 0,
                    keep_alive,
                    resume_token,
                    mime_types: PayloadMimeType { metadata, data },
                    payload: reader.payload(has_metadata)?,
                })
            }
            FrameType::Lease => {
                let ttl = reader.millis("lease ttl")?;
                let number_of_requests = reader.u32("lease request count")?;
                let rest = reader.rest();
                Self::Lease(Lease {
                    ttl,
                    number_of_requests,
                    metadata: has_metadata.then_some(rest),
                })
            }
            FrameType::KeepAlive => {
                let last_position = reader.u64("last received position")?;
                Self::KeepAlive(KeepAliveFrame {
                    respond: bits & flags::RESPOND != 0,
                    last_position,
                    data: reader.rest(),
                })
            }
            FrameType::RequestResponse
            | FrameType::RequestFnf
            | FrameType::RequestStream
            | FrameType::RequestChannel
            | FrameType::Payload => {
                let initial_request = if frame_type.has_initial_request() {
                    reader.request_n("initial request n")?
                } else {
                    0
                };
                let carries_complete =
                    matches!(frame_type, FrameType::RequestChannel | FrameType::Payload);
                Self::Request(RequestFrame {
                    frame_type,
                    stream_id,
                    follows: bits & flags::FOLLOWS != 0,
                    complete: carries_complete && bits & flags::COMPLETE != 0,
                    next: frame_type == FrameType::Payload && bits & flags::NEXT != 0,
                    initial_request,
                    payload: reader.payload(has_metadata)?,
                })
            }
            FrameType::RequestN => Self::RequestN {
                stream_id,
                n: reader.request_n("request n")?,
            },
            FrameType::Cancel => Self::Cancel { stream_id },
            FrameType::Error => {
                let code = ErrorCode::new(reader.u32("error code")?);
                let message = String::from_utf8(reader.rest().to_vec())
                    .map_err(|_| FrameError::InvalidUtf8)?;
                Self::Error(ErrorFrame {
                    stream_id,
                    error: RSocketError::new(code, message),
                })
            }
            FrameType::MetadataPush => Self::MetadataPush(reader.rest()),
            FrameType::Resume => Self::Resume(ResumeFrame {
                version: reader.version()?,
                token: reader.token()?,
                last_received_server_position: reader.u64("last received server position")?,
                first_available_client_position: reader.u64("first available client position")?,
            }),
            FrameType::ResumeOk => Self::ResumeOk {
                last_received_client_position: reader.u64("last received client position")?,
            },
            FrameType::Extension => {
                let extended_type = reader.u32("extended type")?;
                Self::Extension(ExtensionFrame {
                    stream_id,
                    ignore: bits & flags::IGNORE != 0,
                    extended_type,
                    payload: reader.payload(has_metadata)?,
                })
            }
        })
    }
}

fn check_scope(frame_type: FrameType, stream_id: u32) -> Result<(), FrameError> {
    match frame_type.connection_scope() {
        Some(true) if stream_id != 0 => Err(FrameError::ConnectionStreamRequired {
            frame_type,
            stream_id,
        }),
        Some(false) if stream_id == 0 => Err(FrameError::StreamIdRequired(frame_type)),
        _ => Ok(()),
    }
}
