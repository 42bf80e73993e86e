//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting
//! - Dirty page write-back on eviction and flush
//! - LRU eviction of unpinned frames

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::buffer::replacer::LruReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{Error, FrameId, PageId, Result, Shard};
use crate::storage::page::Page;
use crate::storage::DiskManager;

/// Manages a pool of buffer frames for caching disk pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────────────────┐  ┌────────────────────────┐   │
/// │  │ latch: Mutex<PoolState>  │  │  frames: Vec<Frame>    │   │
/// │  │  page_table PageId → Fid │─▶│ [Frame0] [Frame1] ...  │   │
/// │  │  free_list  Vec<FrameId> │  └────────────────────────┘   │
/// │  └──────────────────────────┘                               │
/// │  ┌──────────────┐  ┌─────────────────────────┐              │
/// │  │   replacer   │  │ disk: Arc<dyn DiskManager>│            │
/// │  │ LruReplacer  │  │ (shared by all shards)  │              │
/// │  └──────────────┘  └─────────────────────────┘              │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `latch`: one `Mutex` serializes every page table, free list and
///   replacer update, including victim write-back, flushes and the disk read
///   that refills a frame. No caller can observe a half-evicted frame.
/// - `replacer`: internally latched, only touched while `latch` is held
/// - `frames`: fixed size; each `Frame` latches its own payload. The pool does
///   not synchronize payload access between pinners.
/// - `stats`: atomic counters
///
/// # Invariants
/// - A page is in the page table iff it occupies a frame.
/// - A frame is on the free list iff it holds no page, and free-list frames
///   are always zeroed.
/// - A resident page has pin count 0 iff its frame is tracked by the replacer.
///
/// # Usage
/// ```
/// use std::sync::Arc;
/// use sharddb::buffer::BufferPoolManager;
/// use sharddb::storage::MemoryDiskManager;
///
/// let bpm = BufferPoolManager::new(10, Arc::new(MemoryDiskManager::new()));
///
/// let (page_id, frame) = bpm.new_page().unwrap();
/// frame.page_mut().as_mut_slice()[0] = 0xAB;
/// bpm.unpin_page(page_id, true).unwrap();
///
/// let frame = bpm.fetch_page(page_id).unwrap();
/// assert_eq!(frame.page().as_slice()[0], 0xAB);
/// bpm.unpin_page(page_id, false).unwrap();
/// ```
pub struct BufferPoolManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Residency bookkeeping.
    latch: Mutex<PoolState>,

    /// Eviction policy for selecting victim frames.
    replacer: LruReplacer,

    /// Raw page I/O and page id allocation.
    disk: Arc<dyn DiskManager>,

    /// Performance statistics.
    stats: BufferPoolStats,

    /// Number of frames in the pool (immutable after construction).
    pool_size: usize,

    /// Page ids this instance owns.
    shard: Shard,
}

struct PoolState {
    /// Maps resident page IDs to frame IDs.
    page_table: HashMap<PageId, FrameId>,

    /// Frames holding no page; popped from the back.
    free_list: Vec<FrameId>,
}

impl BufferPoolManager {
    /// Create a standalone buffer pool manager owning every page id.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk: Arc<dyn DiskManager>) -> Self {
        Self::with_shard(pool_size, Shard::SOLE, disk)
    }

    /// Create instance `instance_index` of a parallel pool with
    /// `num_instances` instances. It only allocates and serves page ids with
    /// `id % num_instances == instance_index`.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0 or `instance_index >= num_instances`.
    pub fn new_instance(
        pool_size: usize,
        num_instances: u32,
        instance_index: u32,
        disk: Arc<dyn DiskManager>,
    ) -> Self {
        Self::with_shard(pool_size, Shard::new(instance_index, num_instances), disk)
    }

    fn with_shard(pool_size: usize, shard: Shard, disk: Arc<dyn DiskManager>) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();

        // Reversed so frame 0 is handed out first.
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        Self {
            frames,
            latch: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(pool_size),
                free_list,
            }),
            replacer: LruReplacer::new(pool_size),
            disk,
            stats: BufferPoolStats::new(),
            pool_size,
            shard,
        }
    }

    // ========================================================================
    // Public API: pin-based page access
    // ========================================================================

    /// Fetch a page, pinning it.
    ///
    /// If the page is resident its pin count is incremented. Otherwise a frame
    /// is taken from the free list, or reclaimed from the replacer (writing
    /// the victim back first if dirty), and the page is read from disk.
    ///
    /// Every successful fetch must be matched by an
    /// [`unpin_page`](Self::unpin_page).
    ///
    /// # Errors
    /// - `Error::PoolExhausted` if every frame is pinned
    /// - `Error::InvalidPageId` if this instance does not own `page_id`
    /// - disk errors from reading the page or writing back the victim
    pub fn fetch_page(&self, page_id: PageId) -> Result<&Frame> {
        self.check_owned(page_id)?;
        let mut state = self.latch.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.0];
            frame.pin();
            self.replacer.pin(frame_id);
            BufferPoolStats::record(&self.stats.cache_hits);
            trace!(%page_id, %frame_id, pin_count = frame.pin_count(), "cache hit");
            return Ok(frame);
        }

        BufferPoolStats::record(&self.stats.cache_misses);
        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.0];

        let read = {
            let mut page = frame.page_mut();
            self.disk.read_page(page_id, &mut page)
        };
        if let Err(e) = read {
            frame.reset();
            state.free_list.push(frame_id);
            return Err(e);
        }
        BufferPoolStats::record(&self.stats.pages_read);

        self.install(&mut state, frame_id, page_id);
        trace!(%page_id, %frame_id, "cache miss, page loaded");
        Ok(frame)
    }

    /// Allocate a fresh page and pin it in a zeroed frame.
    ///
    /// The frame is obtained before the page id is allocated, so an exhausted
    /// pool never consumes a page id.
    ///
    /// # Errors
    /// - `Error::PoolExhausted` if every frame is pinned
    /// - disk errors from allocation or victim write-back
    pub fn new_page(&self) -> Result<(PageId, &Frame)> {
        let mut state = self.latch.lock();
        let frame_id = self.acquire_frame(&mut state)?;

        let page_id = match self.disk.allocate_page(self.shard) {
            Ok(page_id) => page_id,
            Err(e) => {
                state.free_list.push(frame_id);
                return Err(e);
            }
        };

        self.install(&mut state, frame_id, page_id);
        debug!(%page_id, %frame_id, shard = %self.shard, "new page");
        Ok((page_id, &self.frames[frame_id.0]))
    }

    /// Release one pin on a page. When the last pin is released the frame
    /// becomes evictable.
    ///
    /// `is_dirty` only ever sets the dirty flag; it is cleared by flushing.
    ///
    /// # Errors
    /// - `Error::PageNotResident` if the page is not cached
    /// - `Error::PageNotPinned` if its pin count is already 0
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let state = self.latch.lock();
        let frame_id = Self::lookup(&state, page_id)?;
        self.unpin_frame(frame_id, page_id, is_dirty)
    }

    /// Write a resident page to disk, dirty or not, and clear its dirty flag.
    ///
    /// The write happens under the pool latch, so the page can be neither
    /// evicted nor deleted meanwhile. Pin count and eviction order are left
    /// untouched. While another thread holds the page's write latch the pool
    /// latch is released and the flush retries.
    ///
    /// Must not be called while the caller holds a write guard on the page.
    ///
    /// # Errors
    /// - `Error::PageNotResident` if the page is not cached
    /// - disk errors from the write
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        loop {
            let state = self.latch.lock();
            let frame_id = Self::lookup(&state, page_id)?;
            let frame = &self.frames[frame_id.0];

            // A writer may be waiting for the pool latch to unpin.
            if let Some(page) = frame.try_page() {
                return self.write_locked(frame, &page, page_id);
            }

            drop(state);
            thread::yield_now();
        }
    }

    /// Delete a page from the buffer pool and deallocate it on disk.
    ///
    /// A page that is not resident is treated as already evicted: it is only
    /// deallocated. Any unflushed changes of a deleted page are discarded.
    ///
    /// # Errors
    /// - `Error::PagePinned` if the page is still in use
    /// - disk errors from deallocation (the frame is already freed)
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        self.check_owned(page_id)?;
        let mut state = self.latch.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.0];
            let pins = frame.pin_count();
            if pins > 0 {
                return Err(Error::PagePinned(page_id, pins));
            }

            state.page_table.remove(&page_id);
            self.replacer.pin(frame_id);
            frame.reset();
            state.free_list.push(frame_id);
            debug!(%page_id, %frame_id, "deleted resident page");
        }

        self.disk.deallocate_page(page_id)
    }

    /// Flush every resident dirty page.
    ///
    /// Best-effort: a page that fails to write is logged and skipped. Returns
    /// the number of pages written.
    pub fn flush_all_pages(&self) -> usize {
        let dirty: Vec<PageId> = {
            let state = self.latch.lock();
            state
                .page_table
                .iter()
                .filter(|(_, fid)| self.frames[fid.0].is_dirty())
                .map(|(&pid, _)| pid)
                .collect()
        };

        let mut written = 0;
        for page_id in dirty {
            match self.flush_page(page_id) {
                Ok(()) => written += 1,
                // Evicted meanwhile, which already wrote it back.
                Err(Error::PageNotResident(_)) => {}
                Err(e) => warn!(%page_id, error = %e, "flush failed, skipping page"),
            }
        }
        written
    }

    // ========================================================================
    // Public API: RAII guards
    // ========================================================================

    /// Fetch a page for reading (shared access).
    ///
    /// The guard unpins the page when dropped.
    pub fn read_page(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageReadGuard::new(self, page_id, frame.page()))
    }

    /// Fetch a page for writing (exclusive access).
    ///
    /// The guard unpins the page dirty when dropped.
    pub fn write_page(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageWriteGuard::new(self, page_id, frame.page_mut()))
    }

    /// Allocate a new page and return a write guard for it.
    pub fn create_page(&self) -> Result<PageWriteGuard<'_>> {
        let (page_id, frame) = self.new_page()?;
        Ok(PageWriteGuard::new(self, page_id, frame.page_mut()))
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Page ids this instance owns.
    pub fn shard(&self) -> Shard {
        self.shard
    }

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Pin count of a resident page, or `None` if it is not cached.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.latch.lock();
        let frame_id = state.page_table.get(&page_id)?;
        Some(self.frames[frame_id.0].pin_count())
    }

    /// Dirty flag of a resident page, or `None` if it is not cached.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.latch.lock();
        let frame_id = state.page_table.get(&page_id)?;
        Some(self.frames[frame_id.0].is_dirty())
    }

    /// Whether the page is cached.
    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.latch.lock().page_table.contains_key(&page_id)
    }

    /// Get the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.latch.lock().free_list.len()
    }

    /// Get the number of pages in the buffer pool.
    pub fn page_count(&self) -> usize {
        self.latch.lock().page_table.len()
    }

    /// Number of frames the replacer could evict right now.
    pub fn evictable_count(&self) -> usize {
        self.replacer.size()
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn check_owned(&self, page_id: PageId) -> Result<()> {
        if self.shard.owns(page_id) {
            Ok(())
        } else {
            Err(Error::InvalidPageId(page_id))
        }
    }

    fn lookup(state: &PoolState, page_id: PageId) -> Result<FrameId> {
        state
            .page_table
            .get(&page_id)
            .copied()
            .ok_or(Error::PageNotResident(page_id))
    }

    /// Put `page_id` into a reset frame with one pin. Caller holds the latch.
    fn install(&self, state: &mut PoolState, frame_id: FrameId, page_id: PageId) {
        let frame = &self.frames[frame_id.0];
        frame.set_page_id(Some(page_id));
        frame.clear_dirty();
        frame.pin();
        self.replacer.pin(frame_id);
        state.page_table.insert(page_id, frame_id);
    }

    /// Drop one pin from a resident frame. Caller holds the latch.
    fn unpin_frame(&self, frame_id: FrameId, page_id: PageId, is_dirty: bool) -> Result<()> {
        let frame = &self.frames[frame_id.0];
        let remaining = frame.unpin().ok_or(Error::PageNotPinned(page_id))?;

        if is_dirty {
            frame.mark_dirty();
        }
        if remaining == 0 {
            self.replacer.unpin(frame_id);
        }
        trace!(%page_id, pin_count = remaining, is_dirty, "unpinned");
        Ok(())
    }

    /// Get a reset frame: the free list first, then a replacer victim.
    /// Caller holds the latch.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.victim().ok_or(Error::PoolExhausted)?;
        let frame = &self.frames[frame_id.0];

        if let Some(old_page_id) = frame.page_id() {
            if frame.is_dirty() {
                if let Err(e) = self.write_back(frame_id, old_page_id) {
                    warn!(page_id = %old_page_id, %frame_id, error = %e, "write-back failed, keeping page");
                    self.replacer.unpin(frame_id);
                    return Err(e);
                }
            }
            state.page_table.remove(&old_page_id);
            debug!(page_id = %old_page_id, %frame_id, "evicted");
        }

        BufferPoolStats::record(&self.stats.evictions);
        frame.reset();
        Ok(frame_id)
    }

    /// Write the frame's page to disk and clear its dirty flag.
    ///
    /// The flag is cleared under the page read latch, before the write, so a
    /// writer that modifies the page afterwards re-dirties it on unpin.
    fn write_back(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];
        let page = frame.page();
        self.write_locked(frame, &page, page_id)
    }

    /// Write `page`, already latched by the caller, as `page_id`.
    fn write_locked(&self, frame: &Frame, page: &Page, page_id: PageId) -> Result<()> {
        let was_dirty = frame.is_dirty();
        frame.clear_dirty();

        if let Err(e) = self.disk.write_page(page_id, page) {
            if was_dirty {
                frame.mark_dirty();
            }
            return Err(e);
        }

        BufferPoolStats::record(&self.stats.pages_written);
        Ok(())
    }
}
