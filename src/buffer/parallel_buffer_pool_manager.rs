//! Parallel buffer pool - several independent instances behind one facade.
//!
//! Each instance owns the page ids congruent to its index modulo the number
//! of instances, so operations on different shards never contend on the same
//! latch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::buffer::{BufferPoolManager, Frame, PageReadGuard, PageWriteGuard, StatsSnapshot};
use crate::common::{BufferPoolConfig, Error, PageId, Result, Shard};
use crate::storage::DiskManager;

/// A buffer pool sharded into `num_instances` [`BufferPoolManager`]s sharing
/// one disk.
///
/// # Routing
/// ```text
///                 page_id % num_instances
///                          │
///        ┌─────────────┬───┴─────────┬─────────────┐
///        ▼             ▼             ▼             ▼
///   [instance 0]  [instance 1]  [instance 2]  [instance 3]
///   ids 0,4,8..   ids 1,5,9..   ids 2,6,10..  ids 3,7,11..
/// ```
/// Page allocation instead starts at a rotating instance and falls through to
/// the next one when an instance has no free or evictable frame.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use sharddb::buffer::ParallelBufferPoolManager;
/// use sharddb::storage::MemoryDiskManager;
///
/// let pool = ParallelBufferPoolManager::new(4, 8, Arc::new(MemoryDiskManager::new()));
/// assert_eq!(pool.pool_size(), 32);
///
/// let (page_id, _frame) = pool.new_page().unwrap();
/// let owner = pool.get_buffer_pool_manager(page_id);
/// assert_eq!(owner.pin_count(page_id), Some(1));
/// pool.unpin_page(page_id, false).unwrap();
/// ```
pub struct ParallelBufferPoolManager {
    /// Instance `i` owns page ids with `id % len == i`.
    instances: Vec<BufferPoolManager>,

    /// Instance the next allocation starts at.
    next_instance: AtomicUsize,
}

impl ParallelBufferPoolManager {
    /// Create `num_instances` instances of `pool_size` frames each.
    ///
    /// # Panics
    /// Panics if either argument is 0 or `num_instances` does not fit a `u32`.
    pub fn new(num_instances: usize, pool_size: usize, disk: Arc<dyn DiskManager>) -> Self {
        assert!(num_instances > 0, "num_instances must be > 0");
        let count = u32::try_from(num_instances).expect("num_instances must fit in a u32");

        let instances = (0..count)
            .map(|index| BufferPoolManager::new_instance(pool_size, count, index, Arc::clone(&disk)))
            .collect();

        info!(num_instances, pool_size, "parallel buffer pool created");
        Self {
            instances,
            next_instance: AtomicUsize::new(0),
        }
    }

    /// Create a pool sized by `config`.
    ///
    /// # Errors
    /// `Error::Config` if the configuration does not validate.
    pub fn from_config(config: &BufferPoolConfig, disk: Arc<dyn DiskManager>) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.num_instances, config.pool_size, disk))
    }

    // ========================================================================
    // Routed operations
    // ========================================================================

    /// Fetch a page from the instance that owns it.
    pub fn fetch_page(&self, page_id: PageId) -> Result<&Frame> {
        self.get_buffer_pool_manager(page_id).fetch_page(page_id)
    }

    /// Unpin a page in the instance that owns it.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        self.get_buffer_pool_manager(page_id)
            .unpin_page(page_id, is_dirty)
    }

    /// Flush a page from the instance that owns it.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        self.get_buffer_pool_manager(page_id).flush_page(page_id)
    }

    /// Delete a page through the instance that owns it.
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        self.get_buffer_pool_manager(page_id).delete_page(page_id)
    }

    /// Fetch a page for reading from the instance that owns it.
    pub fn read_page(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        self.get_buffer_pool_manager(page_id).read_page(page_id)
    }

    /// Fetch a page for writing from the instance that owns it.
    pub fn write_page(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        self.get_buffer_pool_manager(page_id).write_page(page_id)
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Allocate a page in the first instance, starting from the rotating
    /// index, that can supply a frame.
    ///
    /// # Errors
    /// - `Error::PoolExhausted` if every instance is exhausted
    /// - any other error from the first instance that fails differently
    pub fn new_page(&self) -> Result<(PageId, &Frame)> {
        self.try_each_instance(BufferPoolManager::new_page)
    }

    /// Like [`new_page`](Self::new_page), returning a write guard.
    pub fn create_page(&self) -> Result<PageWriteGuard<'_>> {
        self.try_each_instance(BufferPoolManager::create_page)
    }

    fn try_each_instance<'a, T>(
        &'a self,
        op: impl Fn(&'a BufferPoolManager) -> Result<T>,
    ) -> Result<T> {
        let n = self.instances.len();
        let start = self.advance_start();

        for offset in 0..n {
            let index = (start + offset) % n;
            match op(&self.instances[index]) {
                Err(Error::PoolExhausted) => {
                    debug!(instance = index, "instance exhausted, trying next");
                }
                result => return result,
            }
        }
        Err(Error::PoolExhausted)
    }

    /// Returns the current start index and advances it by one.
    fn advance_start(&self) -> usize {
        let n = self.instances.len();
        // The closure never returns None, so both arms carry the old value.
        match self
            .next_instance
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| Some((i + 1) % n))
        {
            Ok(i) | Err(i) => i,
        }
    }

    // ========================================================================
    // Whole-pool operations and info
    // ========================================================================

    /// Flush every dirty page in every instance. Returns the pages written.
    pub fn flush_all_pages(&self) -> usize {
        self.instances.iter().map(BufferPoolManager::flush_all_pages).sum()
    }

    /// Total number of frames across all instances.
    pub fn pool_size(&self) -> usize {
        self.instances.iter().map(BufferPoolManager::pool_size).sum()
    }

    /// The instance responsible for `page_id`.
    pub fn get_buffer_pool_manager(&self, page_id: PageId) -> &BufferPoolManager {
        let index = Shard::of(page_id, self.instances.len() as u32);
        &self.instances[index as usize]
    }

    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }

    pub fn instances(&self) -> &[BufferPoolManager] {
        &self.instances
    }

    /// Statistics summed over all instances.
    pub fn stats(&self) -> StatsSnapshot {
        self.instances
            .iter()
            .map(|bpm| bpm.stats().snapshot())
            .fold(StatsSnapshot::default(), |acc, s| acc + s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDiskManager;

    fn create_pool(
        num_instances: usize,
        pool_size: usize,
    ) -> (ParallelBufferPoolManager, Arc<MemoryDiskManager>) {
        let disk = Arc::new(MemoryDiskManager::new());
        (
            ParallelBufferPoolManager::new(num_instances, pool_size, disk.clone()),
            disk,
        )
    }

    #[test]
    fn test_new_page_rotates_instances() {
        let (pool, _disk) = create_pool(4, 2);

        let ids: Vec<PageId> = (0..4).map(|_| pool.new_page().unwrap().0).collect();
        let shards: Vec<u32> = ids.iter().map(|id| id.0 % 4).collect();
        assert_eq!(shards, vec![0, 1, 2, 3]);

        for id in &ids {
            let owner = pool.get_buffer_pool_manager(*id);
            assert_eq!(owner.shard().index, id.0 % 4);
            assert_eq!(owner.pin_count(*id), Some(1));
        }
    }

    #[test]
    fn test_new_page_falls_through_exhausted_instances() {
        let (pool, _disk) = create_pool(2, 1);

        let (a, _) = pool.new_page().unwrap();
        let (b, _) = pool.new_page().unwrap();
        assert_ne!(a.0 % 2, b.0 % 2);

        // Every frame is pinned.
        assert!(matches!(pool.new_page(), Err(Error::PoolExhausted)));

        // Free shard 1 only; allocation finds it whatever the start index.
        let in_shard_one = if a.0 % 2 == 1 { a } else { b };
        pool.unpin_page(in_shard_one, false).unwrap();
        for _ in 0..2 {
            let (c, _) = pool.new_page().unwrap();
            assert_eq!(c.0 % 2, 1);
            pool.unpin_page(c, false).unwrap();
        }
    }

    #[test]
    fn test_routing_matches_owner() {
        let (pool, _disk) = create_pool(3, 4);
        let (pid, frame) = pool.new_page().unwrap();
        frame.page_mut().as_mut_slice()[0] = 0x11;
        pool.unpin_page(pid, true).unwrap();

        pool.flush_page(pid).unwrap();
        assert_eq!(
            pool.get_buffer_pool_manager(pid).is_dirty(pid),
            Some(false)
        );

        {
            let guard = pool.read_page(pid).unwrap();
            assert_eq!(guard.as_slice()[0], 0x11);
        }
        pool.delete_page(pid).unwrap();
        assert!(!pool.get_buffer_pool_manager(pid).is_resident(pid));
    }

    #[test]
    fn test_pool_size_and_stats_are_summed() {
        let (pool, _disk) = create_pool(3, 5);
        assert_eq!(pool.pool_size(), 15);
        assert_eq!(pool.num_instances(), 3);

        let ids: Vec<PageId> = (0..6)
            .map(|_| {
                let (pid, _) = pool.new_page().unwrap();
                pool.unpin_page(pid, true).unwrap();
                pid
            })
            .collect();
        for pid in &ids {
            pool.fetch_page(*pid).unwrap();
            pool.unpin_page(*pid, false).unwrap();
        }

        assert_eq!(pool.stats().cache_hits, 6);
        assert_eq!(pool.flush_all_pages(), 6);
        assert_eq!(pool.stats().pages_written, 6);
    }

    #[test]
    fn test_from_config() {
        let disk = Arc::new(MemoryDiskManager::new());
        let config = BufferPoolConfig::new(8).with_instances(2);
        let pool = ParallelBufferPoolManager::from_config(&config, disk.clone()).unwrap();
        assert_eq!(pool.pool_size(), config.total_frames());

        let bad = BufferPoolConfig::new(8).with_instances(0);
        assert!(matches!(
            ParallelBufferPoolManager::from_config(&bad, disk),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_create_page_guard() {
        let (pool, _disk) = create_pool(2, 2);
        let pid = {
            let mut guard = pool.create_page().unwrap();
            guard.as_mut_slice()[7] = 7;
            guard.page_id()
        };
        let owner = pool.get_buffer_pool_manager(pid);
        assert_eq!(owner.pin_count(pid), Some(0));
        assert_eq!(owner.is_dirty(pid), Some(true));
    }

    #[test]
    fn test_concurrent_allocation_across_shards() {
        use std::collections::HashSet;
        use std::thread;

        let (pool, _disk) = create_pool(4, 16);
        let pool = Arc::new(pool);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    (0..32)
                        .map(|_| {
                            let (pid, _) = pool.new_page().unwrap();
                            pool.unpin_page(pid, true).unwrap();
                            pid
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for pid in h.join().unwrap() {
                assert!(seen.insert(pid), "{pid} allocated twice");
            }
        }
        assert_eq!(seen.len(), 128);
    }
}
