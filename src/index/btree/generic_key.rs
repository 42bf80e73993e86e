//! Fixed-width keys and the comparators that order them.

use std::cmp::Ordering;
use std::fmt;

/// A value with a fixed-width byte encoding, storable in a tree page slot.
pub trait FixedSizeCodec: Sized {
    /// Number of bytes written by [`encode_into`](Self::encode_into).
    const ENCODED_SIZE: usize;

    /// Write the encoding into the first `ENCODED_SIZE` bytes of `buf`.
    fn encode_into(&self, buf: &mut [u8]);

    /// Decode from the first `ENCODED_SIZE` bytes of `buf`.
    fn decode_from(buf: &[u8]) -> Self;
}

/// Orders keys. Closures `Fn(&K, &K) -> Ordering` are comparators too.
pub trait KeyComparator<K> {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

impl<K, F> KeyComparator<K> for F
where
    F: Fn(&K, &K) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self(a, b)
    }
}

/// An index key of exactly `N` bytes.
///
/// Keys compare lexicographically by byte. Integer keys built with
/// [`from_integer`](Self::from_integer) use a big-endian, sign-flipped
/// encoding so that byte order equals integer order.
///
/// # Example
/// ```
/// use sharddb::index::btree::GenericKey;
///
/// let a = GenericKey::<8>::from_integer(-5);
/// let b = GenericKey::<8>::from_integer(3);
/// assert!(a < b);
/// assert_eq!(a.to_integer(), -5);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenericKey<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> GenericKey<N> {
    /// Bytes used by the integer encoding.
    const INT_WIDTH: usize = if N < 8 { N } else { 8 };

    /// Copy up to `N` bytes from `bytes`, zero-padding the rest.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = [0u8; N];
        let len = bytes.len().min(N);
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data }
    }

    /// Encode an integer key.
    ///
    /// # Panics
    /// Panics if `value` does not fit in `min(N, 8)` bytes as a signed
    /// integer, or if `N` is 0.
    pub fn from_integer(value: i64) -> Self {
        let bits = Self::INT_WIDTH * 8;
        assert!(bits > 0, "zero-width key");
        let shift = 64 - bits;
        assert!(
            ((value << shift) >> shift) == value,
            "{} does not fit in a {}-byte key",
            value,
            Self::INT_WIDTH
        );

        let biased = (value as u64) ^ (1u64 << (bits - 1));
        let be = biased.to_be_bytes();
        let mut data = [0u8; N];
        data[..Self::INT_WIDTH].copy_from_slice(&be[8 - Self::INT_WIDTH..]);
        Self { data }
    }

    /// Decode a key built by [`from_integer`](Self::from_integer).
    pub fn to_integer(&self) -> i64 {
        let bits = Self::INT_WIDTH * 8;
        let mut be = [0u8; 8];
        be[8 - Self::INT_WIDTH..].copy_from_slice(&self.data[..Self::INT_WIDTH]);
        let raw = u64::from_be_bytes(be) ^ (1u64 << (bits - 1));
        let shift = 64 - bits;
        ((raw << shift) as i64) >> shift
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl<const N: usize> FixedSizeCodec for GenericKey<N> {
    const ENCODED_SIZE: usize = N;

    fn encode_into(&self, buf: &mut [u8]) {
        buf[..N].copy_from_slice(&self.data);
    }

    fn decode_from(buf: &[u8]) -> Self {
        Self::from_bytes(&buf[..N])
    }
}

impl<const N: usize> fmt::Debug for GenericKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GenericKey<{}>(", N)?;
        for byte in &self.data {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

/// Lexicographic byte comparator for [`GenericKey`].
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericComparator<const N: usize>;

impl<const N: usize> KeyComparator<GenericKey<N>> for GenericComparator<N> {
    #[inline]
    fn compare(&self, a: &GenericKey<N>, b: &GenericKey<N>) -> Ordering {
        a.data.cmp(&b.data)
    }
}
