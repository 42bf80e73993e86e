//! In-memory disk manager.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::{Error, PageId, Result, Shard};
use crate::storage::page::Page;
use crate::storage::{DiskManager, PageAllocator};

/// A [`DiskManager`] that keeps every page in memory.
///
/// Uses the same allocation policy as [`FileDiskManager`](super::FileDiskManager)
/// and counts the calls it serves, which makes it the collaborator of choice
/// for tests and benchmarks.
///
/// # Example
/// ```
/// use sharddb::storage::{DiskManager, MemoryDiskManager};
/// use sharddb::storage::page::Page;
/// use sharddb::Shard;
///
/// let disk = MemoryDiskManager::new();
/// let page_id = disk.allocate_page(Shard::SOLE).unwrap();
/// disk.write_page(page_id, &Page::new()).unwrap();
/// assert_eq!(disk.num_writes(), 1);
/// ```
#[derive(Default)]
pub struct MemoryDiskManager {
    inner: Mutex<MemoryState>,
    reads: AtomicU64,
    writes: AtomicU64,
    deallocations: AtomicU64,
}

#[derive(Default)]
struct MemoryState {
    pages: HashMap<PageId, Box<Page>>,
    allocator: PageAllocator,
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pages currently allocated.
    pub fn page_count(&self) -> usize {
        self.inner.lock().allocator.allocated_count()
    }

    /// Whether `page_id` is currently allocated.
    pub fn is_allocated(&self, page_id: PageId) -> bool {
        self.inner.lock().allocator.is_allocated(page_id)
    }

    pub fn num_reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn num_deallocations(&self) -> u64 {
        self.deallocations.load(Ordering::Relaxed)
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<()> {
        let state = self.inner.lock();
        if !state.allocator.is_allocated(page_id) {
            return Err(Error::PageNotFound(page_id));
        }

        match state.pages.get(&page_id) {
            Some(stored) => page.copy_from(stored),
            None => page.reset(),
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        let mut state = self.inner.lock();
        if !state.allocator.is_allocated(page_id) {
            return Err(Error::PageNotFound(page_id));
        }

        state
            .pages
            .entry(page_id)
            .or_insert_with(|| Box::new(Page::new()))
            .copy_from(page);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn allocate_page(&self, shard: Shard) -> Result<PageId> {
        let mut state = self.inner.lock();
        let page_id = state
            .allocator
            .allocate(shard)
            .ok_or(Error::InvalidPageId(PageId::INVALID))?;
        state.pages.remove(&page_id);
        Ok(page_id)
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.inner.lock();
        if state.allocator.deallocate(page_id) {
            state.pages.remove(&page_id);
            self.deallocations.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_page_reads_as_zeros() {
        let disk = MemoryDiskManager::new();
        let page_id = disk.allocate_page(Shard::SOLE).unwrap();

        let mut page = Page::new();
        page.as_mut_slice()[10] = 1;
        disk.read_page(page_id, &mut page).unwrap();
        assert!(page.is_zeroed());
        assert_eq!(disk.num_reads(), 1);
    }

    #[test]
    fn test_write_then_read() {
        let disk = MemoryDiskManager::new();
        let page_id = disk.allocate_page(Shard::SOLE).unwrap();

        let mut page = Page::new();
        page.as_mut_slice()[0] = 0x5A;
        disk.write_page(page_id, &page).unwrap();

        let mut out = Page::new();
        disk.read_page(page_id, &mut out).unwrap();
        assert_eq!(out.as_slice()[0], 0x5A);
    }

    #[test]
    fn test_unallocated_pages_are_rejected() {
        let disk = MemoryDiskManager::new();
        let mut page = Page::new();
        assert!(matches!(
            disk.read_page(PageId::new(0), &mut page),
            Err(Error::PageNotFound(_))
        ));
        assert!(disk.write_page(PageId::new(0), &page).is_err());
    }

    #[test]
    fn test_reallocated_page_starts_clean() {
        let disk = MemoryDiskManager::new();
        let page_id = disk.allocate_page(Shard::SOLE).unwrap();

        let mut page = Page::new();
        page.as_mut_slice()[0] = 0x77;
        disk.write_page(page_id, &page).unwrap();

        disk.deallocate_page(page_id).unwrap();
        disk.deallocate_page(page_id).unwrap();
        assert_eq!(disk.num_deallocations(), 1);
        assert!(!disk.is_allocated(page_id));

        assert_eq!(disk.allocate_page(Shard::SOLE).unwrap(), page_id);
        disk.read_page(page_id, &mut page).unwrap();
        assert!(page.is_zeroed());
    }
}
