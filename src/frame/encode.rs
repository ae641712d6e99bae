//! Frame serialisation.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use super::{Frame, FrameError, MAX_STREAM_ID, RequestFrame, types::type_and_flags};
use crate::{
    byte_order::{write_network_u16, write_network_u24, write_network_u32, write_network_u64},
    payload::Payload,
    setup::Version,
};

/// Largest duration representable in a 31-bit millisecond field.
const MAX_WIRE_MILLIS: u128 = 0x7FFF_FFFF;

impl Frame {
    /// Append the frame's header and body to `dst`.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] if a field cannot be represented on the wire,
    /// for example metadata longer than 24 bits or a non-ASCII mime type.
    /// `dst` may contain a partial frame when an error is returned.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), FrameError> {
        let stream_id = self.stream_id();
        if stream_id > MAX_STREAM_ID {
            return Err(FrameError::ReservedStreamIdBit(stream_id));
        }
        dst.put_slice(&write_network_u32(stream_id));
        dst.put_slice(&write_network_u16(type_and_flags(
            self.frame_type(),
            self.flags(),
        )));
        match self {
            Self::Setup(setup) => {
                put_version(dst, setup.version);
                put_millis(dst, "keepalive interval", setup.keep_alive.interval)?;
                put_millis(dst, "max lifetime", setup.keep_alive.max_lifetime)?;
                if let Some(token) = &setup.resume_token {
                    put_token(dst, token)?;
                }
                put_mime_type(dst, &setup.mime_types.metadata)?;
                put_mime_type(dst, &setup.mime_types.data)?;
                put_payload(dst, &setup.payload)
            }
            Self::Lease(lease) => {
                put_millis(dst, "lease ttl", lease.ttl)?;
                dst.put_slice(&write_network_u32(lease.number_of_requests));
                if let Some(metadata) = &lease.metadata {
                    dst.put_slice(metadata);
                }
                Ok(())
            }
            Self::KeepAlive(frame) => {
                dst.put_slice(&write_network_u64(frame.last_position));
                dst.put_slice(&frame.data);
                Ok(())
            }
            Self::Request(frame) => encode_request(dst, frame),
            Self::RequestN { n, .. } => put_request_n(dst, *n),
            Self::Cancel { .. } => Ok(()),
            Self::Error(frame) => {
                dst.put_slice(&write_network_u32(frame.error.code.value()));
                dst.put_slice(frame.error.message.as_bytes());
                Ok(())
            }
            Self::MetadataPush(metadata) => {
                dst.put_slice(metadata);
                Ok(())
            }
            Self::Resume(frame) => {
                put_version(dst, frame.version);
                put_token(dst, &frame.token)?;
                dst.put_slice(&write_network_u64(frame.last_received_server_position));
                dst.put_slice(&write_network_u64(frame.first_available_client_position));
                Ok(())
            }
            Self::ResumeOk {
                last_received_client_position,
            } => {
                dst.put_slice(&write_network_u64(*last_received_client_position));
                Ok(())
            }
            Self::Extension(frame) => {
                dst.put_slice(&write_network_u32(frame.extended_type));
                put_payload(dst, &frame.payload)
            }
        }
    }

    /// Encode the frame into a fresh buffer.
    ///
    /// # Errors
    ///
    /// See [`Frame::encode`].
    pub fn to_bytes(&self) -> Result<Bytes, FrameError> {
        let mut dst = BytesMut::with_capacity(super::HEADER_SIZE + self.body_size_hint());
        self.encode(&mut dst)?;
        Ok(dst.freeze())
    }

    fn body_size_hint(&self) -> usize {
        match self {
            Self::Request(frame) => 4 + 3 + frame.payload.len(),
            Self::Setup(setup) => 64 + setup.payload.len(),
            _ => 16,
        }
    }
}

fn encode_request(dst: &mut BytesMut, frame: &RequestFrame) -> Result<(), FrameError> {
    if frame.stream_id == 0 {
        return Err(FrameError::StreamIdRequired(frame.frame_type));
    }
    if frame.frame_type.has_initial_request() {
        put_request_n(dst, frame.initial_request)?;
    }
    put_payload(dst, &frame.payload)
}

fn put_request_n(dst: &mut BytesMut, n: u32) -> Result<(), FrameError> {
    if n == 0 || n > super::MAX_REQUEST_N {
        return Err(FrameError::InvalidRequestN(n));
    }
    dst.put_slice(&write_network_u32(n));
    Ok(())
}

fn put_version(dst: &mut BytesMut, version: Version) {
    dst.put_slice(&write_network_u16(version.major));
    dst.put_slice(&write_network_u16(version.minor));
}

fn put_millis(dst: &mut BytesMut, field: &'static str, value: Duration) -> Result<(), FrameError> {
    let millis = value.as_millis();
    let wire = u32::try_from(millis)
        .ok()
        .filter(|ms| u128::from(*ms) <= MAX_WIRE_MILLIS)
        .ok_or(FrameError::DurationOutOfRange { field, millis })?;
    dst.put_slice(&write_network_u32(wire));
    Ok(())
}

fn put_token(dst: &mut BytesMut, token: &Bytes) -> Result<(), FrameError> {
    let len = u16::try_from(token.len()).map_err(|_| FrameError::ResumeTokenTooLarge(token.len()))?;
    dst.put_slice(&write_network_u16(len));
    dst.put_slice(token);
    Ok(())
}

fn put_mime_type(dst: &mut BytesMut, mime: &str) -> Result<(), FrameError> {
    let len = u8::try_from(mime.len())
        .ok()
        .filter(|_| mime.is_ascii())
        .ok_or_else(|| FrameError::InvalidMimeType(mime.to_owned()))?;
    dst.put_u8(len);
    dst.put_slice(mime.as_bytes());
    Ok(())
}

/// Write optional length-prefixed metadata followed by data.
fn put_payload(dst: &mut BytesMut, payload: &Payload) -> Result<(), FrameError> {
    if let Some(metadata) = &payload.metadata {
        let prefix = u32::try_from(metadata.len())
            .ok()
            .and_then(write_network_u24)
            .ok_or(FrameError::MetadataTooLarge(metadata.len()))?;
        dst.put_slice(&prefix);
        dst.put_slice(metadata);
    }
    dst.put_slice(&payload.data);
    Ok(())
}
