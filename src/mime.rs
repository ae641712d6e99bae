//! Registry of well-known mime types.
//!
//! Each well-known type has a canonical name and a 7-bit identifier used by
//! compact metadata encodings. Setup frames carry the textual form.

use std::{fmt, str::FromStr};

macro_rules! well_known_mime_types {
    ($($variant:ident => ($name:literal, $id:literal)),+ $(,)?) => {
        /// Mime types with a reserved identifier.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        pub enum WellKnownMimeType {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )+
        }

        impl WellKnownMimeType {
            /// Every well-known mime type in identifier order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Canonical textual form.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            /// Compact 7-bit identifier.
            #[must_use]
            pub const fn identifier(self) -> u8 {
                match self {
                    $(Self::$variant => $id,)+
                }
            }

            /// Look up a mime type by identifier.
            #[must_use]
            pub fn from_identifier(identifier: u8) -> Option<Self> {
                match identifier {
                    $($id => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

well_known_mime_types! {
    ApplicationAvro => ("application/avro", 0x00),
    ApplicationCbor => ("application/cbor", 0x01),
    ApplicationGraphql => ("application/graphql", 0x02),
    ApplicationGzip => ("application/gzip", 0x03),
    ApplicationJavascript => ("application/javascript", 0x04),
    ApplicationJson => ("application/json", 0x05),
    ApplicationOctetStream => ("application/octet-stream", 0x06),
    ApplicationPdf => ("application/pdf", 0x07),
    ApplicationThrift => ("application/vnd.apache.thrift.binary", 0x08),
    ApplicationProtobuf => ("application/vnd.google.protobuf", 0x09),
    ApplicationXml => ("application/xml", 0x0A),
    ApplicationZip => ("application/zip", 0x0B),
    AudioAac => ("audio/aac", 0x0C),
    AudioMp3 => ("audio/mp3", 0x0D),
    AudioMp4 => ("audio/mp4", 0x0E),
    AudioMpeg3 => ("audio/mpeg3", 0x0F),
    AudioMpeg => ("audio/mpeg", 0x10),
    AudioOgg => ("audio/ogg", 0x11),
    AudioOpus => ("audio/opus", 0x12),
    AudioVorbis => ("audio/vorbis", 0x13),
    ImageBmp => ("image/bmp", 0x14),
    ImageGif => ("image/gif", 0x15),
    ImageHeicSequence => ("image/heic-sequence", 0x16),
    ImageHeic => ("image/heic", 0x17),
    ImageHeifSequence => ("image/heif-sequence", 0x18),
    ImageHeif => ("image/heif", 0x19),
    ImageJpeg => ("image/jpeg", 0x1A),
    ImagePng => ("image/png", 0x1B),
    ImageTiff => ("image/tiff", 0x1C),
    MultipartMixed => ("multipart/mixed", 0x1D),
    TextCss => ("text/css", 0x1E),
    TextCsv => ("text/csv", 0x1F),
    TextHtml => ("text/html", 0x20),
    TextPlain => ("text/plain", 0x21),
    TextXml => ("text/xml", 0x22),
    VideoH264 => ("video/H264", 0x23),
    VideoH265 => ("video/H265", 0x24),
    VideoVp8 => ("video/VP8", 0x25),
    ApplicationHessian => ("application/x-hessian", 0x26),
    ApplicationJavaObject => ("application/x-java-object", 0x27),
    ApplicationCloudeventsJson => ("application/cloudevents+json", 0x28),
    ApplicationCapnProto => ("application/x-capnp", 0x29),
    ApplicationFlatBuffers => ("application/x-flatbuffers", 0x2A),
    MessageMimeType => ("message/x.rsocket.mime-type.v0", 0x7A),
    MessageAcceptMimeTypes => ("message/x.rsocket.accept-mime-types.v0", 0x7B),
    MessageAuthentication => ("message/x.rsocket.authentication.v0", 0x7C),
    MessageTracingZipkin => ("message/x.rsocket.tracing-zipkin.v0", 0x7D),
    MessageRouting => ("message/x.rsocket.routing.v0", 0x7E),
    MessageCompositeMetadata => ("message/x.rsocket.composite-metadata.v0", 0x7F),
}

/// Error returned when a name is not a well-known mime type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown mime type: {0}")]
pub struct UnknownMimeType(pub String);

impl FromStr for WellKnownMimeType {
    type Err = UnknownMimeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|mime| mime.as_str() == s)
            .ok_or_else(|| UnknownMimeType(s.to_owned()))
    }
}

impl fmt::Display for WellKnownMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}
