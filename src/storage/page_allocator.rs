//! Page id allocation policy shared by the disk managers.

use std::collections::BTreeSet;

use crate::common::{PageId, Shard};

/// Hands out page ids, recycling deallocated ones.
///
/// Ids below `high_water` have been handed out at some point; those that are
/// currently unused sit in `free`. When a shard needs an id beyond the high
/// water mark, the ids skipped on the way to its residue class are parked in
/// `free` so the shards that own them can still claim them.
#[derive(Debug, Default)]
pub struct PageAllocator {
    high_water: u32,
    free: BTreeSet<u32>,
}

impl PageAllocator {
    /// Empty allocator: the next id is 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator over an existing store whose ids `0..page_count` are in use.
    pub fn with_page_count(page_count: u32) -> Self {
        Self {
            high_water: page_count,
            free: BTreeSet::new(),
        }
    }

    /// Lowest available id owned by `shard`, or `None` if the id space is
    /// exhausted.
    pub fn allocate(&mut self, shard: Shard) -> Option<PageId> {
        if let Some(id) = self
            .free
            .iter()
            .copied()
            .find(|&id| Shard::of(PageId(id), shard.count) == shard.index)
        {
            self.free.remove(&id);
            return Some(PageId(id));
        }

        let rem = self.high_water % shard.count;
        let skip = (shard.index + shard.count - rem) % shard.count;
        let id = self.high_water.checked_add(skip)?;
        if !PageId(id).is_valid() {
            return None;
        }

        self.free.extend(self.high_water..id);
        self.high_water = id + 1;
        Some(PageId(id))
    }

    /// Return `page_id` to the pool. Returns `false` if it was never handed out
    /// or is already free.
    pub fn deallocate(&mut self, page_id: PageId) -> bool {
        if !self.is_allocated(page_id) {
            return false;
        }
        self.free.insert(page_id.0)
    }

    /// Whether `page_id` is currently handed out.
    pub fn is_allocated(&self, page_id: PageId) -> bool {
        page_id.is_valid() && page_id.0 < self.high_water && !self.free.contains(&page_id.0)
    }

    /// One past the largest id ever handed out.
    pub fn high_water(&self) -> u32 {
        self.high_water
    }

    /// Number of ids currently handed out.
    pub fn allocated_count(&self) -> usize {
        self.high_water as usize - self.free.len()
    }
}
