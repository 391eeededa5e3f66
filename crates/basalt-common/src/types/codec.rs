//! Fixed-width encoding for on-page key/value storage.
//!
//! Disk-resident index pages store their entries as a flat array of
//! fixed-width records, so any key or value type placed on a page must
//! declare its encoded width up front and encode into / decode from an
//! exactly-sized byte slice. All encodings are little-endian.

use super::ids::{PageId, RecordId};

/// A type with a fixed-width byte encoding.
///
/// # Example
///
/// ```rust
/// use basalt_common::types::FixedCodec;
///
/// let mut buf = [0u8; 8];
/// 42u64.encode_into(&mut buf);
/// assert_eq!(u64::decode_from(&buf), 42);
/// ```
pub trait FixedCodec: Sized + Clone {
    /// Number of bytes this type occupies on a page.
    const ENCODED_LEN: usize;

    /// Encodes `self` into a buffer of exactly `ENCODED_LEN` bytes.
    fn encode_into(&self, buf: &mut [u8]);

    /// Decodes a value from a buffer of exactly `ENCODED_LEN` bytes.
    fn decode_from(buf: &[u8]) -> Self;
}

macro_rules! impl_fixed_codec_int {
    ($($ty:ty),*) => {
        $(
            impl FixedCodec for $ty {
                const ENCODED_LEN: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn encode_into(&self, buf: &mut [u8]) {
                    buf[..Self::ENCODED_LEN].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode_from(buf: &[u8]) -> Self {
                    <$ty>::from_le_bytes(buf[..Self::ENCODED_LEN].try_into().unwrap())
                }
            }
        )*
    };
}

impl_fixed_codec_int!(u16, u32, u64, i16, i32, i64);

impl FixedCodec for PageId {
    const ENCODED_LEN: usize = 8;

    #[inline]
    fn encode_into(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.to_le_bytes());
    }

    #[inline]
    fn decode_from(buf: &[u8]) -> Self {
        PageId::from_le_bytes(buf[..8].try_into().unwrap())
    }
}

impl FixedCodec for RecordId {
    const ENCODED_LEN: usize = 12;

    #[inline]
    fn encode_into(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.page_id().to_le_bytes());
        buf[8..12].copy_from_slice(&self.slot().to_le_bytes());
    }

    #[inline]
    fn decode_from(buf: &[u8]) -> Self {
        let page_id = PageId::from_le_bytes(buf[..8].try_into().unwrap());
        let slot = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        RecordId::new(page_id, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_roundtrip() {
        let mut buf = [0u8; 8];
        0xDEAD_BEEFu32.encode_into(&mut buf);
        assert_eq!(u32::decode_from(&buf), 0xDEAD_BEEF);

        (-77i64).encode_into(&mut buf);
        assert_eq!(i64::decode_from(&buf), -77);
    }

    #[test]
    fn test_record_id_roundtrip() {
        let rid = RecordId::new(PageId::new(99), 3);
        let mut buf = [0u8; RecordId::ENCODED_LEN];
        rid.encode_into(&mut buf);
        assert_eq!(RecordId::decode_from(&buf), rid);
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(<u32 as FixedCodec>::ENCODED_LEN, 4);
        assert_eq!(<u64 as FixedCodec>::ENCODED_LEN, 8);
        assert_eq!(PageId::ENCODED_LEN, 8);
        assert_eq!(RecordId::ENCODED_LEN, 12);
    }

    #[test]
    fn test_invalid_sentinel_roundtrip() {
        let mut buf = [0u8; 8];
        PageId::INVALID.encode_into(&mut buf);
        assert!(!PageId::decode_from(&buf).is_valid());
    }
}
