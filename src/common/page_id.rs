//! Page identifier type.

use std::fmt;

/// Identifies a page on disk.
///
/// Page ids are unique across the whole engine, not per shard: a parallel
/// buffer pool routes a page to its instance with `id % num_instances`.
///
/// # Example
/// ```
/// use sharddb::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(page_id.0, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Invalid/sentinel page ID.
    ///
    /// Marks "no page": the right sibling of the rightmost leaf, the parent of
    /// the root.
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Encoded width in bytes.
    pub const ENCODED_SIZE: usize = 4;

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Little-endian encoding used inside page layouts.
    #[inline]
    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Decode from the first four bytes of `bytes`.
    ///
    /// # Panics
    /// Panics if `bytes` is shorter than four bytes.
    #[inline]
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        PageId(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}
