//! Unit tests for frame encoding and decoding.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use proptest::prop_assert_eq;
use rstest::rstest;

use super::{Frame, FrameError, FrameType, KeepAliveFrame, RequestFrame, flags};
use crate::{
    error::{ErrorCode, RSocketError},
    keepalive::KeepAlive,
    payload::{Payload, PayloadMimeType},
    setup::{ConnectionSetup, Version},
    test_helpers::{deterministic_runner, frame_strategy},
};

fn encode(frame: &Frame) -> Vec<u8> { frame.to_bytes().expect("frame should encode").to_vec() }

#[rstest]
#[case::request_n(
    Frame::RequestN { stream_id: 5, n: 3 },
    vec![0, 0, 0, 5, 0x20, 0x00, 0, 0, 0, 3]
)]
#[case::cancel(Frame::Cancel { stream_id: 1 }, vec![0, 0, 0, 1, 0x24, 0x00])]
#[case::next_complete_with_metadata(
    Frame::Request(RequestFrame::next_complete(2, Payload::new("hi").with_metadata("m"))),
    vec![0, 0, 0, 2, 0x29, 0x60, 0, 0, 1, b'm', b'h', b'i']
)]
#[case::keepalive_respond(
    Frame::KeepAlive(KeepAliveFrame { respond: true, last_position: 0, data: Bytes::from_static(b"x") }),
    vec![0, 0, 0, 0, 0x0C, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, b'x']
)]
#[case::request_stream(
    Frame::Request(RequestFrame::request_stream(1, 2, Payload::new("q"))),
    vec![0, 0, 0, 1, 0x18, 0x00, 0, 0, 0, 2, b'q']
)]
#[case::connection_error(
    Frame::error(0, RSocketError::connection_error("boom")),
    vec![0, 0, 0, 0, 0x2C, 0x00, 0, 0, 1, 1, b'b', b'o', b'o', b'm']
)]
fn frames_have_expected_wire_bytes(#[case] frame: Frame, #[case] expected: Vec<u8>) {
    assert_eq!(encode(&frame), expected);
    assert_eq!(Frame::decode(Bytes::from(expected)), Ok(frame));
}

#[test]
fn setup_frame_layout() {
    let setup = Frame::Setup(ConnectionSetup {
        version: Version::CURRENT,
        honor_lease: true,
        keep_alive: KeepAlive::new(Duration::from_millis(500), Duration::from_secs(2)),
        resume_token: Some(Bytes::from_static(b"tk")),
        mime_types: PayloadMimeType::new("a/b", "c/d"),
        payload: Payload::EMPTY,
    });
    let expected = vec![
        0, 0, 0, 0, // stream 0
        0x04, 0xC0, // SETUP | RESUME_ENABLE | LEASE
        0, 1, 0, 0, // version 1.0
        0, 0, 0x01, 0xF4, // 500 ms
        0, 0, 0x07, 0xD0, // 2000 ms
        0, 2, b't', b'k', // token
        3, b'a', b'/', b'b', // metadata mime
        3, b'c', b'/', b'd', // data mime
    ];
    assert_eq!(encode(&setup), expected);
    assert_eq!(Frame::decode(Bytes::from(expected)), Ok(setup));
}

#[rstest]
#[case::empty(vec![], "stream id")]
#[case::short_header(vec![0, 0, 0, 1, 0x20], "frame type")]
#[case::short_request_n(vec![0, 0, 0, 1, 0x20, 0x00, 0, 0], "request n")]
#[case::short_metadata(vec![0, 0, 0, 1, 0x29, 0x20, 0, 0, 9, b'x'], "metadata")]
fn truncated_frames_are_rejected(#[case] bytes: Vec<u8>, #[case] field: &str) {
    match Frame::decode(Bytes::from(bytes)) {
        Err(FrameError::Truncated { field: actual, .. }) => assert_eq!(actual, field),
        other => panic!("expected truncation error, got {other:?}"),
    }
}

#[rstest]
#[case::request_n_on_stream_zero(
    vec![0, 0, 0, 0, 0x20, 0x00, 0, 0, 0, 1],
    FrameError::StreamIdRequired(FrameType::RequestN)
)]
#[case::keepalive_on_stream(
    vec![0, 0, 0, 3, 0x0C, 0x00, 0, 0, 0, 0, 0, 0, 0, 0],
    FrameError::ConnectionStreamRequired { frame_type: FrameType::KeepAlive, stream_id: 3 }
)]
#[case::zero_request_n(vec![0, 0, 0, 1, 0x20, 0x00, 0, 0, 0, 0], FrameError::InvalidRequestN(0))]
#[case::reserved_bit(vec![0x80, 0, 0, 1, 0x24, 0x00], FrameError::ReservedStreamIdBit(0x8000_0001))]
#[case::unknown_ignorable(
    vec![0, 0, 0, 1, 0x42, 0x00],
    FrameError::UnknownFrameType { type_id: 0x10, ignorable: true }
)]
#[case::unknown_strict(
    vec![0, 0, 0, 1, 0x40, 0x00],
    FrameError::UnknownFrameType { type_id: 0x10, ignorable: false }
)]
#[case::bad_utf8(vec![0, 0, 0, 1, 0x2C, 0x00, 0, 0, 2, 1, 0xFF], FrameError::InvalidUtf8)]
fn invalid_frames_are_rejected(#[case] bytes: Vec<u8>, #[case] expected: FrameError) {
    assert_eq!(Frame::decode(Bytes::from(bytes)), Err(expected));
}

#[test]
fn unknown_ignorable_frames_are_flagged() {
    let err = Frame::decode(Bytes::from_static(&[0, 0, 0, 1, 0x42, 0x00]))
        .expect_err("type 0x10 is unassigned");
    assert!(err.is_ignorable());
}

#[rstest]
#[case::metadata(
    Frame::Request(RequestFrame::next(1, Payload::new("").with_metadata(vec![0u8; 0x0100_0000]))),
    FrameError::MetadataTooLarge(0x0100_0000)
)]
#[case::mime(
    Frame::Setup(ConnectionSetup {
        mime_types: PayloadMimeType::new("caf\u{e9}", "a"),
        ..ConnectionSetup::default()
    }),
    FrameError::InvalidMimeType("caf\u{e9}".to_owned())
)]
#[case::request_n(Frame::RequestN { stream_id: 1, n: 0 }, FrameError::InvalidRequestN(0))]
#[case::stream_zero_request(
    Frame::Request(RequestFrame::request_response(0, Payload::EMPTY)),
    FrameError::StreamIdRequired(FrameType::RequestResponse)
)]
fn unrepresentable_frames_fail_to_encode(#[case] frame: Frame, #[case] expected: FrameError) {
    let mut dst = BytesMut::new();
    assert_eq!(frame.encode(&mut dst), Err(expected));
}

#[test]
fn flags_are_scoped_to_frame_type() {
    let mut frame = RequestFrame::request_response(1, Payload::EMPTY);
    frame.complete = true;
    frame.next = true;
    assert_eq!(frame.flags(), 0);

    let channel = RequestFrame::request_channel(1, 1, Payload::EMPTY, true);
    assert_eq!(channel.flags(), flags::COMPLETE);
}

#[test]
fn error_codes_survive_round_trip() {
    let frame = Frame::error(7, RSocketError::new(ErrorCode::new(0x0000_0400), "custom"));
    let decoded = Frame::decode(frame.to_bytes().expect("encode")).expect("decode");
    assert_eq!(decoded, frame);
}

#[rstest]
#[case(256, 64)]
#[case(4096, 32)]
fn generated_frames_round_trip(#[case] max_len: usize, #[case] cases: u32) {
    let mut runner = deterministic_runner(cases);
    runner
        .run(&frame_strategy(max_len), |frame| {
            let bytes = frame
                .to_bytes()
                .map_err(|err| proptest::test_runner::TestCaseError::fail(err.to_string()))?;
            prop_assert_eq!(Frame::decode(bytes), Ok(frame));
            Ok(())
        })
        .expect("generated frames should round-trip");
}
