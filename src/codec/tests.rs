//! Tests for the length-prefixed codecs.

use bytes::{BufMut, Bytes, BytesMut};
use rstest::rstest;
use tokio_util::codec::{Decoder, Encoder};

use super::{
    CodecError,
    EofError,
    FrameCodec,
    FramingError,
    LENGTH_HEADER_SIZE,
    LengthPrefixedCodec,
    MAX_FRAME_LENGTH,
};
use crate::{
    frame::{Frame, FrameError},
    payload::Payload,
};

const CANCEL: [u8; 6] = [0, 0, 0, 1, 0x24, 0x00];

#[test]
fn prefix_is_three_bytes_big_endian() {
    let mut codec = LengthPrefixedCodec::default();
    let mut buf = BytesMut::new();
    codec
        .encode(Bytes::from(vec![7u8; 0x0102]), &mut buf)
        .expect("encode should succeed");
    assert_eq!(&buf[..LENGTH_HEADER_SIZE], &[0x00, 0x01, 0x02]);
    assert_eq!(buf.len(), LENGTH_HEADER_SIZE + 0x0102);
}

#[test]
fn partial_input_waits_for_more_bytes() {
    let mut codec = LengthPrefixedCodec::default();
    let mut buf = BytesMut::from(&[0u8, 0][..]);
    assert!(codec.decode(&mut buf).expect("incomplete prefix").is_none());
    buf.put_slice(&[6, 0, 0]);
    assert!(codec.decode(&mut buf).expect("incomplete body").is_none());
    buf.put_slice(&CANCEL[2..]);
    let body = codec.decode(&mut buf).expect("valid").expect("complete");
    assert_eq!(body.as_ref(), &CANCEL);
    assert!(buf.is_empty());
}

#[test]
fn configured_limit_is_clamped_to_prefix_range() {
    assert_eq!(LengthPrefixedCodec::new(usize::MAX).max_frame_length(), MAX_FRAME_LENGTH);
    assert_eq!(LengthPrefixedCodec::new(64).max_frame_length(), 64);
}

#[test]
fn oversized_prefix_is_a_framing_error() {
    let mut codec = LengthPrefixedCodec::new(64);
    let mut buf = BytesMut::from(&[0u8, 0, 65][..]);
    let err = codec.decode(&mut buf).expect_err("65 > 64");
    assert!(matches!(
        err,
        CodecError::Framing(FramingError::OversizedFrame { size: 65, max: 64 })
    ));
}

#[test]
fn undersized_prefix_is_a_framing_error() {
    let mut codec = LengthPrefixedCodec::default();
    let mut buf = BytesMut::from(&[0u8, 0, 2, 1, 2][..]);
    let err = codec.decode(&mut buf).expect_err("shorter than a frame header");
    assert!(matches!(
        err,
        CodecError::Framing(FramingError::UndersizedFrame { size: 2, .. })
    ));
}

#[test]
fn oversized_body_is_refused_on_encode() {
    let mut codec = LengthPrefixedCodec::new(64);
    let mut buf = BytesMut::new();
    let err = codec
        .encode(Bytes::from(vec![0u8; 65]), &mut buf)
        .expect_err("body too large");
    assert!(matches!(
        err,
        CodecError::Framing(FramingError::OversizedFrame { size: 65, max: 64 })
    ));
    assert!(buf.is_empty());
}

#[rstest]
#[case::clean(vec![], None)]
#[case::mid_header(vec![0, 0], Some(EofError::MidHeader { bytes_received: 2, header_size: 3 }))]
#[case::mid_frame(
    vec![0, 0, 6, 0, 0, 0],
    Some(EofError::MidFrame { bytes_received: 3, expected: 6 })
)]
fn eof_is_classified(#[case] bytes: Vec<u8>, #[case] expected: Option<EofError>) {
    let mut codec = LengthPrefixedCodec::default();
    let mut buf = BytesMut::from(bytes.as_slice());
    match (codec.decode_eof(&mut buf), expected) {
        (Ok(None), None) => {}
        (Err(CodecError::Eof(actual)), Some(expected)) => assert_eq!(actual, expected),
        (other, expected) => panic!("expected {expected:?}, got {other:?}"),
    }
}

#[test]
fn frame_codec_decodes_frames() {
    let mut codec = FrameCodec::default();
    let mut buf = BytesMut::new();
    let frame = Frame::Request(crate::frame::RequestFrame::request_response(
        1,
        Payload::new("ping"),
    ));
    codec.encode(frame.clone(), &mut buf).expect("encode");
    let mut prefixed = BytesMut::from(&[0u8, 0, 6][..]);
    prefixed.put_slice(&CANCEL);
    buf.unsplit(prefixed);

    assert_eq!(codec.decode(&mut buf).expect("decode"), Some(frame));
    assert_eq!(
        codec.decode(&mut buf).expect("decode"),
        Some(Frame::Cancel { stream_id: 1 })
    );
    assert!(buf.is_empty());
}

#[test]
fn frame_codec_reports_malformed_bodies() {
    let mut codec = FrameCodec::default();
    let mut buf = BytesMut::from(&[0u8, 0, 10, 0, 0, 0, 1, 0x20, 0x00, 0, 0, 0, 0][..]);
    let err = codec.decode(&mut buf).expect_err("request n of zero");
    assert!(matches!(err, CodecError::Frame(FrameError::InvalidRequestN(0))));
    assert!(err.should_disconnect());
}
