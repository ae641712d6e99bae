#![cfg(test)]
//! Test-only helpers shared by unit tests: deterministic property runners
//! and frame strategies.

use std::time::Duration;

use bytes::Bytes;
use proptest::{
    prelude::*,
    test_runner::{Config as ProptestConfig, RngAlgorithm, TestRng, TestRunner},
};

use crate::{
    error::{ErrorCode, RSocketError},
    frame::{ExtensionFrame, Frame, FrameType, KeepAliveFrame, RequestFrame, ResumeFrame},
    keepalive::KeepAlive,
    lease::Lease,
    payload::{Payload, PayloadMimeType},
    setup::{ConnectionSetup, Version},
};

/// Runner with a fixed seed so failures reproduce across runs.
pub fn deterministic_runner(cases: u32) -> TestRunner {
    let config = ProptestConfig {
        cases,
        ..ProptestConfig::default()
    };
    let rng = TestRng::deterministic_rng(RngAlgorithm::ChaCha);
    TestRunner::new_with_rng(config, rng)
}

pub fn bytes_strategy(max_len: usize) -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..=max_len).prop_map(Bytes::from)
}

pub fn payload_strategy(max_len: usize) -> impl Strategy<Value = Payload> {
    (prop::option::of(bytes_strategy(max_len)), bytes_strategy(max_len))
        .prop_map(|(metadata, data)| Payload { metadata, data })
}

pub fn stream_id_strategy() -> impl Strategy<Value = u32> { 1u32..=0x7FFF_FFFF }

pub fn request_n_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![Just(1u32), Just(0x7FFF_FFFF), 1u32..=0x7FFF_FFFF]
}

fn millis_strategy() -> impl Strategy<Value = Duration> {
    (0u64..=0x7FFF_FFFF).prop_map(Duration::from_millis)
}

fn mime_strategy() -> impl Strategy<Value = String> { "[a-z/+.-]{0,40}" }

/// Any fragmentable frame with flags valid for its type.
pub fn request_frame_strategy(max_len: usize) -> impl Strategy<Value = RequestFrame> {
    (
        prop_oneof![
            Just(FrameType::RequestResponse),
            Just(FrameType::RequestFnf),
            Just(FrameType::RequestStream),
            Just(FrameType::RequestChannel),
            Just(FrameType::Payload),
        ],
        stream_id_strategy(),
        request_n_strategy(),
        any::<(bool, bool, bool)>(),
        payload_strategy(max_len),
    )
        .prop_map(|(frame_type, stream_id, n, (follows, complete, next), payload)| {
            let mut frame = match frame_type {
                FrameType::RequestResponse => RequestFrame::request_response(stream_id, payload),
                FrameType::RequestFnf => RequestFrame::fire_and_forget(stream_id, payload),
                FrameType::RequestStream => RequestFrame::request_stream(stream_id, n, payload),
                FrameType::RequestChannel => {
                    RequestFrame::request_channel(stream_id, n, payload, complete)
                }
                _ => RequestFrame::payload(stream_id, payload, next, complete),
            };
            frame.follows = follows;
            frame
        })
}

fn setup_strategy(max_len: usize) -> impl Strategy<Value = Frame> {
    (
        any::<(u16, u16, bool)>(),
        millis_strategy(),
        millis_strategy(),
        prop::option::of(bytes_strategy(32)),
        mime_strategy(),
        mime_strategy(),
        payload_strategy(max_len),
    )
        .prop_map(
            |((major, minor, honor_lease), interval, max_lifetime, resume_token, md, data, payload)| {
                Frame::Setup(ConnectionSetup {
                    version: Version { major, minor },
                    honor_lease,
                    keep_alive: KeepAlive {
                        interval,
                        max_lifetime,
                    },
                    resume_token,
                    mime_types: PayloadMimeType::new(md, data),
                    payload,
                })
            },
        )
}

/// Any valid frame.
pub fn frame_strategy(max_len: usize) -> impl Strategy<Value = Frame> {
    prop_oneof![
        connection_frame_strategy(max_len),
        stream_frame_strategy(max_len),
    ]
}

fn connection_frame_strategy(max_len: usize) -> impl Strategy<Value = Frame> {
    prop_oneof![
        setup_strategy(max_len),
        (millis_strategy(), any::<u32>(), prop::option::of(bytes_strategy(max_len))).prop_map(
            |(ttl, number_of_requests, metadata)| Frame::Lease(Lease {
                ttl,
                number_of_requests,
                metadata,
            })
        ),
        (any::<bool>(), any::<u64>(), bytes_strategy(max_len)).prop_map(
            |(respond, last_position, data)| Frame::KeepAlive(KeepAliveFrame {
                respond,
                last_position,
                data,
            })
        ),
        bytes_strategy(max_len).prop_map(Frame::MetadataPush),
        (any::<(u16, u16)>(), bytes_strategy(32), any::<(u64, u64)>()).prop_map(
            |((major, minor), token, (server, client))| Frame::Resume(ResumeFrame {
                version: Version { major, minor },
                token,
                last_received_server_position: server,
                first_available_client_position: client,
            })
        ),
        any::<u64>().prop_map(|position| Frame::ResumeOk {
            last_received_client_position: position,
        }),
    ]
}

fn stream_frame_strategy(max_len: usize) -> impl Strategy<Value = Frame> {
    prop_oneof![
        request_frame_strategy(max_len).prop_map(Frame::Request),
        (stream_id_strategy(), request_n_strategy())
            .prop_map(|(stream_id, n)| Frame::RequestN { stream_id, n }),
        stream_id_strategy().prop_map(|stream_id| Frame::Cancel { stream_id }),
        (0u32..=0x7FFF_FFFF, any::<u32>(), ".{0,32}").prop_map(|(stream_id, code, message)| {
            Frame::error(stream_id, RSocketError::new(ErrorCode::new(code), message))
        }),
        (
            0u32..=0x7FFF_FFFF,
            any::<bool>(),
            any::<u32>(),
            payload_strategy(max_len)
        )
            .prop_map(|(stream_id, ignore, extended_type, payload)| {
                Frame::Extension(ExtensionFrame {
                    stream_id,
                    ignore,
                    extended_type,
                    payload,
                })
            }),
    ]
}
