//! Tests for the metadata layouts.

use bytes::Bytes;
use proptest::{collection, prelude::*, prop_assert_eq};
use rstest::rstest;

use super::{
    AuthMetadata,
    AuthType,
    CompositeMetadata,
    MetadataError,
    MetadataExtension,
    MetadataMimeType,
    RoutingMetadata,
};
use crate::{
    mime::WellKnownMimeType,
    test_helpers::{bytes_strategy, deterministic_runner},
};

fn custom(name: &str) -> MetadataMimeType { MetadataMimeType::named(name).expect("valid mime name") }

#[test]
fn composite_entries_use_compact_types_and_24_bit_lengths() {
    let composite = CompositeMetadata::new()
        .with_entry(WellKnownMimeType::ApplicationJson, "{}")
        .with_entry(custom("x/y"), "ab");
    let bytes = composite.encode().expect("entries fit");
    assert_eq!(
        bytes.as_ref(),
        [
            0x85, 0x00, 0x00, 0x02, b'{', b'}', // well-known id 0x05
            0x03, b'x', b'/', b'y', 0x00, 0x00, 0x02, b'a', b'b',
        ]
    );
    assert_eq!(CompositeMetadata::decode(bytes), Ok(composite));
}

#[test]
fn composite_keeps_order_and_every_kind_of_type() {
    let reserved = MetadataMimeType::identified(120).expect("7-bit id");
    assert_eq!(reserved, MetadataMimeType::Reserved(120));
    let composite = CompositeMetadata::new()
        .with_entry(custom("custom"), "custom metadata")
        .with_entry(reserved.clone(), "reserved metadata")
        .with_entry(WellKnownMimeType::ApplicationAvro, "avro metadata")
        .with_entry(custom("custom"), "second custom");

    let decoded = CompositeMetadata::decode(composite.encode().expect("entries fit")).expect("well formed");
    assert_eq!(decoded.entries().len(), 4);
    assert_eq!(decoded.get(&reserved), Some(&Bytes::from_static(b"reserved metadata")));
    assert!(decoded.contains(&WellKnownMimeType::ApplicationAvro.into()));
    assert!(!decoded.contains(&WellKnownMimeType::ApplicationCbor.into()));
    let customs: Vec<_> = decoded.all(&custom("custom")).cloned().collect();
    assert_eq!(
        customs,
        [Bytes::from_static(b"custom metadata"), Bytes::from_static(b"second custom")]
    );
}

#[test]
fn well_known_names_are_sent_as_identifiers() {
    assert_eq!(
        custom("application/json"),
        MetadataMimeType::WellKnown(WellKnownMimeType::ApplicationJson)
    );
    let bytes = CompositeMetadata::new()
        .with_entry(custom("text/plain"), Bytes::new())
        .encode()
        .expect("entry fits");
    assert_eq!(bytes.as_ref(), [0x80 | 0x21, 0x00, 0x00, 0x00]);
}

#[rstest]
#[case::missing_name(&[120], "type name")]
#[case::missing_length(&[0x85, 0x00], "entry length")]
#[case::short_content(&[0x85, 0x00, 0x00, 0x04, b'a'], "entry content")]
fn truncated_composite_is_rejected(#[case] bytes: &'static [u8], #[case] field: &str) {
    match CompositeMetadata::decode(Bytes::from_static(bytes)) {
        Err(MetadataError::Truncated { field: got, .. }) => assert_eq!(got, field),
        other => panic!("expected truncation in {field}, got {other:?}"),
    }
}

#[rstest]
#[case::empty(String::new())]
#[case::non_ascii("text/𠜎".to_owned())]
#[case::too_long("a".repeat(128))]
fn invalid_type_names_are_refused(#[case] name: String) {
    assert_eq!(
        MetadataMimeType::named(&name),
        Err(MetadataError::InvalidTypeName(name.clone()))
    );
    assert!(matches!(AuthType::named(&name), Err(MetadataError::InvalidTypeName(_))));
}

#[test]
fn identifiers_above_seven_bits_are_refused() {
    assert_eq!(MetadataMimeType::identified(0x80), Err(MetadataError::InvalidIdentifier(0x80)));
    let raw = AuthMetadata::Raw {
        auth_type: AuthType::Reserved(0xFF),
        content: Bytes::new(),
    };
    assert_eq!(raw.encode(), Err(MetadataError::InvalidIdentifier(0xFF)));
}

#[test]
fn composite_reads_typed_entries() {
    let route = RoutingMetadata::new(["orders.create", "v2"]).expect("valid tags");
    let auth = AuthMetadata::bearer("token-123");
    let composite = CompositeMetadata::new()
        .with_metadata(&route)
        .and_then(|composite| composite.with_metadata(&auth))
        .expect("extensions encode");

    let decoded = CompositeMetadata::decode(composite.encode().expect("entries fit")).expect("well formed");
    assert_eq!(decoded.read::<RoutingMetadata>(), Some(Ok(route)));
    assert_eq!(decoded.read::<AuthMetadata>(), Some(Ok(auth)));
    assert_eq!(decoded.read::<CompositeMetadata>(), None);
}

#[test]
fn routing_tags_are_length_prefixed() {
    let route = RoutingMetadata::new(["a", "bc"]).expect("valid tags");
    let bytes = route.encode().expect("tags fit");
    assert_eq!(bytes.as_ref(), [1, b'a', 2, b'b', b'c']);
    let decoded = RoutingMetadata::decode(bytes).expect("well formed");
    assert_eq!(decoded.route(), Some("a"));
    assert_eq!(decoded.tags(), ["a", "bc"]);
}

#[rstest]
#[case::empty(String::new(), 0)]
#[case::too_long("r".repeat(256), 256)]
fn routing_tag_lengths_are_bounded(#[case] tag: String, #[case] len: usize) {
    assert_eq!(RoutingMetadata::new([tag]), Err(MetadataError::InvalidTagLength(len)));
}

#[test]
fn routing_rejects_a_zero_length_tag_on_the_wire() {
    assert_eq!(
        RoutingMetadata::decode(Bytes::from_static(&[1, b'a', 0])),
        Err(MetadataError::InvalidTagLength(0))
    );
}

#[rstest]
#[case::ascii("user")]
#[case::astral("𠜎𠜱𠝹𠱓𠱸𠲖𠳏𠳕𠴕𠵼𠵿𠸎1234567#4? ")]
fn simple_auth_survives_encoding(#[case] username: &str) {
    let auth = AuthMetadata::simple(username, "password1234");
    let bytes = auth.encode().expect("credentials fit");
    assert_eq!(bytes[0], 0x80, "simple is well-known id 0");
    let decoded = AuthMetadata::decode(bytes).expect("well formed");
    assert_eq!(decoded, auth);
    assert_eq!(decoded.auth_type(), AuthType::Simple);
}

#[test]
fn simple_auth_layout_is_length_then_username_then_password() {
    let bytes = AuthMetadata::simple("ab", "pw").encode().expect("credentials fit");
    assert_eq!(bytes.as_ref(), [0x80, 0x00, 0x02, b'a', b'b', b'p', b'w']);
}

#[test]
fn overlong_username_is_refused() {
    let auth = AuthMetadata::simple("x".repeat(66_000), "");
    assert_eq!(auth.encode(), Err(MetadataError::UsernameTooLong(66_000)));
}

#[test]
fn custom_auth_keeps_raw_content() {
    let auth = AuthMetadata::Raw {
        auth_type: AuthType::named("custom/auth").expect("valid name"),
        content: Bytes::from_static(b"hello world auth data"),
    };
    let bytes = auth.encode().expect("content fits");
    assert_eq!(&bytes[..12], b"\x0bcustom/auth");
    assert_eq!(AuthMetadata::decode(bytes), Ok(auth));
}

#[test]
fn bearer_token_is_the_rest_of_the_buffer() {
    let bytes = AuthMetadata::bearer("abc").encode().expect("token fits");
    assert_eq!(bytes.as_ref(), [0x81, b'a', b'b', b'c']);
}

fn mime_strategy() -> impl Strategy<Value = MetadataMimeType> {
    prop_oneof![
        (0u8..0x80).prop_map(|id| MetadataMimeType::identified(id).expect("7-bit id")),
        "[a-z]{1,20}/[a-z0-9.+-]{1,40}".prop_map(|name| MetadataMimeType::named(&name).expect("ascii name")),
    ]
}

#[test]
fn composite_decodes_what_it_encodes() {
    let mut runner = deterministic_runner(128);
    let entries = collection::vec((mime_strategy(), bytes_strategy(64)), 0..8);
    runner
        .run(&entries, |entries| {
            let composite = entries
                .into_iter()
                .fold(CompositeMetadata::new(), |composite, (mime, content)| {
                    composite.with_entry(mime, content)
                });
            let bytes = composite.encode().expect("entries fit");
            prop_assert_eq!(CompositeMetadata::decode(bytes).expect("well formed"), composite);
            Ok(())
        })
        .expect("composite metadata should decode what it encodes");
}
