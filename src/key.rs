//! Deterministic encoding of heterogeneous logical keys into lexicographically ordered byte
//! strings.
//!
//! A single [`Key`] enum covers every logical key variant the cache needs: byte strings, text,
//! UUIDs, integers, and tuples of the above. Encoding is total over these variants, deterministic,
//! and stable across runs. Ordering is only meaningful *within* a single variant and width — see
//! [`Key::encode`].

// -------------------------------------------------------------------------------------------------
//
/// A heterogeneous logical key, encodable to a byte string via [`Key::encode`].
///
/// Mixing integer widths across callers is legal (the codec always picks the narrowest
/// representation that fits); callers are responsible for using a consistent width within a given
/// namespace, since lexicographic order is only meaningful within one width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key<'a> {
    /// Raw bytes, encoded as-is.
    Bytes(std::borrow::Cow<'a, [u8]>),

    /// A UTF-8 string, encoded as its UTF-8 bytes.
    Str(std::borrow::Cow<'a, str>),

    /// A 128-bit UUID, encoded as its 16 raw bytes in canonical (big-endian) order.
    Uuid(uuid::Uuid),

    /// An unsigned integer, encoded as 4 big-endian bytes if it fits in `u32`, otherwise 16
    /// big-endian bytes.
    UInt(u128),

    /// The decimal fallback for integers wider than 128 bits.
    ///
    /// Every known caller's integers fit in 128 bits, so this branch is unreachable in practice;
    /// it is kept as an explicit variant, rather than silently dropped, for byte-for-byte parity
    /// with the original key codec.
    Decimal(String),

    /// A tuple of keys, encoded as the concatenation of each element's encoding with no separator.
    Tuple(Vec<Key<'a>>),
}

impl<'a> Key<'a> {
    /// Encodes this logical key into its deterministic byte representation.
    ///
    /// `k1 < k2` (by the `Ord` of the logical value) implies `encode(k1) < encode(k2)` in
    /// lexicographic byte order, as long as `k1` and `k2` are the same variant and, for integers,
    /// the same encoded width.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes.to_vec(),
            Self::Str(s) => s.as_bytes().to_vec(),
            Self::Uuid(uuid) => uuid.as_bytes().to_vec(),
            Self::UInt(n) => encode_uint(*n),
            Self::Decimal(s) => s.as_bytes().to_vec(),
            Self::Tuple(parts) => parts.iter().flat_map(Key::encode).collect(),
        }
    }

    /// Builds a [`Key::Bytes`] variant from a byte slice.
    #[must_use]
    pub fn bytes(bytes: &'a [u8]) -> Self {
        Self::Bytes(std::borrow::Cow::Borrowed(bytes))
    }

    /// Builds a [`Key::Str`] variant from a string slice.
    #[must_use]
    pub fn str(s: &'a str) -> Self {
        Self::Str(std::borrow::Cow::Borrowed(s))
    }

    /// Builds a [`Key::Uuid`] variant.
    #[must_use]
    pub const fn uuid(uuid: uuid::Uuid) -> Self {
        Self::Uuid(uuid)
    }

    /// Builds a [`Key::UInt`] variant.
    #[must_use]
    pub const fn uint(n: u128) -> Self {
        Self::UInt(n)
    }
}

/// Encodes an unsigned integer as 4 big-endian bytes if it fits in `u32`, otherwise as 16
/// big-endian bytes.
///
/// `u128` already caps the widest width this crate supports, so the decimal fallback never
/// triggers from this constructor; it remains reachable only through [`Key::Decimal`] built
/// directly by a caller migrating literal fixtures from the original format.
fn encode_uint(n: u128) -> Vec<u8> {
    if let Ok(small) = u32::try_from(n) {
        small.to_be_bytes().to_vec()
    } else {
        n.to_be_bytes().to_vec()
    }
}

// -------------------------------------------------------------------------------------------------
//
// Trait Implementations

impl<'a> From<&'a [u8]> for Key<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::bytes(bytes)
    }
}

impl<'a> From<&'a str> for Key<'a> {
    fn from(s: &'a str) -> Self {
        Self::str(s)
    }
}

impl From<uuid::Uuid> for Key<'_> {
    fn from(uuid: uuid::Uuid) -> Self {
        Self::Uuid(uuid)
    }
}

impl From<u32> for Key<'_> {
    fn from(n: u32) -> Self {
        Self::UInt(u128::from(n))
    }
}

impl From<u128> for Key<'_> {
    fn from(n: u128) -> Self {
        Self::UInt(n)
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::Key;

    #[test]
    fn byte_string_is_identity() {
        assert_eq!(Key::bytes(b"88").encode(), b"88".to_vec());
    }

    #[test]
    fn text_string_is_utf8() {
        assert_eq!(Key::str("string").encode(), b"string".to_vec());
    }

    #[test]
    fn uuid_is_sixteen_raw_bytes() {
        let uuid = uuid::Uuid::from_bytes(*b"0123456789ABCDEF");
        assert_eq!(Key::uuid(uuid).encode(), b"0123456789ABCDEF".to_vec());
    }

    #[test]
    fn small_integers_are_four_bytes() {
        let encoded = Key::uint(217_987).encode();
        assert_eq!(encoded.len(), 4);
        assert_eq!(encoded, 217_987u32.to_be_bytes().to_vec());
    }

    #[test]
    fn large_integers_are_sixteen_bytes() {
        let n: u128 = 215_781_587_158_712_587;
        let encoded = Key::uint(n).encode();
        assert_eq!(encoded.len(), 16);
        assert_eq!(encoded, n.to_be_bytes().to_vec());
    }

    #[test]
    fn tuple_concatenates_without_separator() {
        let k = Key::Tuple(vec![Key::str("AAA"), Key::uint(3)]);
        let mut expected = b"AAA".to_vec();
        expected.extend_from_slice(&3u32.to_be_bytes());
        assert_eq!(k.encode(), expected);
    }

    #[test]
    fn four_byte_keys_preserve_numeric_order() {
        let a = Key::uint(1).encode();
        let b = Key::uint(2).encode();
        let c = Key::uint(u128::from(u32::MAX)).encode();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn sixteen_byte_keys_preserve_numeric_order() {
        let a = Key::uint(u128::from(u32::MAX) + 1).encode();
        let b = Key::uint(u128::MAX).encode();
        assert!(a < b);
    }

    #[test]
    fn uuid_encoding_matches_canonical_byte_order() {
        let uuid = uuid::Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        assert_eq!(uuid.as_bytes(), &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn encoding_is_stable_across_calls() {
        let k = Key::Tuple(vec![Key::str("x"), Key::uint(7)]);
        assert_eq!(k.encode(), k.encode());
    }

    quickcheck::quickcheck! {
        fn u32_ordering_preserved(a: u32, b: u32) -> bool {
            let ka = Key::uint(u128::from(a)).encode();
            let kb = Key::uint(u128::from(b)).encode();
            (a < b) == (ka < kb) && (a == b) == (ka == kb)
        }
    }
}
