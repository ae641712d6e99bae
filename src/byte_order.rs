//! Network byte-order integer helpers for the frame codec.
//!
//! Every multi-byte field on the wire is big-endian. Keeping the conversions
//! here lets the encoder and decoder name the wire order explicitly while
//! the `big_endian_bytes` lint stays enabled elsewhere.

/// Largest value representable by a 24-bit unsigned field.
pub const U24_MAX: u32 = 0x00FF_FFFF;

macro_rules! network_int {
    ($ty:ty, $len:literal, $write:ident, $read:ident) => {
        #[doc = concat!("Serialise a `", stringify!($ty), "` in network byte order.")]
        #[must_use]
        pub fn $write(value: $ty) -> [u8; $len] {
            #[expect(clippy::big_endian_bytes, reason = "wire fields are big-endian")]
            value.to_be_bytes()
        }

        #[doc = concat!("Parse a network-order `", stringify!($ty), "`.")]
        #[must_use]
        pub fn $read(bytes: [u8; $len]) -> $ty {
            #[expect(clippy::big_endian_bytes, reason = "wire fields are big-endian")]
            <$ty>::from_be_bytes(bytes)
        }
    };
}

network_int!(u16, 2, write_network_u16, read_network_u16);
network_int!(u32, 4, write_network_u32, read_network_u32);
network_int!(u64, 8, write_network_u64, read_network_u64);

/// Serialise the low 24 bits of `value`, as used by the length prefix and
/// the metadata length field.
///
/// Returns `None` when `value` does not fit in 24 bits.
///
/// ```
/// use rsframe::byte_order::write_network_u24;
///
/// assert_eq!(write_network_u24(0x12_3456), Some([0x12, 0x34, 0x56]));
/// assert_eq!(write_network_u24(0x0100_0000), None);
/// ```
#[must_use]
pub fn write_network_u24(value: u32) -> Option<[u8; 3]> {
    if value > U24_MAX {
        return None;
    }
    let [_, hi, mid, lo] = write_network_u32(value);
    Some([hi, mid, lo])
}

/// Parse a network-order 24-bit unsigned integer.
#[must_use]
pub fn read_network_u24(bytes: [u8; 3]) -> u32 {
    let [hi, mid, lo] = bytes;
    read_network_u32([0, hi, mid, lo])
}
