//! Shard descriptor for page id ownership.

use std::fmt;

use super::PageId;

/// The residue class of page ids owned by one buffer pool instance.
///
/// Instance `index` of a pool with `count` instances owns exactly the page ids
/// with `id % count == index`. A standalone pool is [`Shard::SOLE`] and owns
/// every id.
///
/// # Example
/// ```
/// use sharddb::{PageId, Shard};
///
/// let shard = Shard::new(1, 4);
/// assert!(shard.owns(PageId::new(5)));
/// assert!(!shard.owns(PageId::new(6)));
/// assert_eq!(Shard::of(PageId::new(6), 4), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shard {
    pub index: u32,
    pub count: u32,
}

impl Shard {
    /// The only shard of an unsharded pool.
    pub const SOLE: Shard = Shard { index: 0, count: 1 };

    /// # Panics
    /// Panics if `count` is 0 or `index >= count`.
    pub fn new(index: u32, count: u32) -> Self {
        assert!(count > 0, "shard count must be > 0");
        assert!(index < count, "shard index {} out of range 0..{}", index, count);
        Self { index, count }
    }

    /// Index of the shard owning `page_id` among `count` shards.
    #[inline]
    pub fn of(page_id: PageId, count: u32) -> u32 {
        page_id.0 % count
    }

    /// Whether this shard owns `page_id`.
    #[inline]
    pub fn owns(&self, page_id: PageId) -> bool {
        page_id.is_valid() && Self::of(page_id, self.count) == self.index
    }
}

impl Default for Shard {
    fn default() -> Self {
        Self::SOLE
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shard({}/{})", self.index, self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sole_owns_everything() {
        for id in [0, 1, 17, 4096] {
            assert!(Shard::SOLE.owns(PageId::new(id)));
        }
        assert!(!Shard::SOLE.owns(PageId::INVALID));
    }

    #[test]
    fn test_residue_ownership() {
        let shards: Vec<Shard> = (0..3).map(|i| Shard::new(i, 3)).collect();
        for id in 0..30 {
            let owners = shards.iter().filter(|s| s.owns(PageId::new(id))).count();
            assert_eq!(owners, 1);
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_index_out_of_range() {
        Shard::new(3, 3);
    }

    #[test]
    fn test_shard_display() {
        assert_eq!(format!("{}", Shard::new(2, 4)), "Shard(2/4)");
    }
}
