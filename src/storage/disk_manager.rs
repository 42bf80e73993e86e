//! Disk managers - the raw page I/O collaborators of the buffer pool.
//!
//! [`DiskManager`] is the interface the buffer pool consumes. Two
//! implementations are provided:
//! - [`FileDiskManager`] - pages in a single database file
//! - [`MemoryDiskManager`](super::MemoryDiskManager) - pages in memory

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;
use tracing::debug;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result, Shard};
use crate::storage::page::Page;
use crate::storage::PageAllocator;

/// Synchronous, fixed-page-size storage for the buffer pool.
///
/// Implementations synchronize internally so that one disk manager can be
/// shared by every instance of a parallel buffer pool.
pub trait DiskManager: Send + Sync {
    /// Read the contents of `page_id` into `page`.
    fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<()>;

    /// Write `page` as the contents of `page_id`.
    fn write_page(&self, page_id: PageId, page: &Page) -> Result<()>;

    /// Allocate the lowest free page id owned by `shard`.
    fn allocate_page(&self, shard: Shard) -> Result<PageId>;

    /// Release `page_id` for reuse. Unknown or already-free ids are ignored.
    fn deallocate_page(&self, page_id: PageId) -> Result<()>;
}

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// The database is stored as a single file with pages laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Page N is located at file offset `N × PAGE_SIZE`. Deallocated ids are kept
/// in memory only; reopening a file treats every page in it as allocated.
///
/// # Durability
/// All writes are followed by `fsync()`.
pub struct FileDiskManager {
    inner: Mutex<FileState>,
}

struct FileState {
    file: File,
    allocator: PageAllocator,
}

impl FileDiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self::from_parts(file, PageAllocator::new()))
    }

    /// Open an existing database file.
    ///
    /// Every id below the end of the file is treated as allocated. The free
    /// set is not persisted, so ids that were deallocated, or parked for
    /// another shard and never handed out, stay in use after a reopen.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        // Calculate page count from file size
        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;
        debug!(path = %path.as_ref().display(), page_count, "opened database file");

        Ok(Self::from_parts(file, PageAllocator::with_page_count(page_count)))
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    fn from_parts(file: File, allocator: PageAllocator) -> Self {
        Self {
            inner: Mutex::new(FileState { file, allocator }),
        }
    }

    /// One past the largest page id ever allocated.
    pub fn page_count(&self) -> u32 {
        self.inner.lock().allocator.high_water()
    }

    /// Size of the database file in bytes, as reported by its metadata.
    ///
    /// # Errors
    /// Returns an error if the metadata cannot be read.
    pub fn file_size(&self) -> Result<u64> {
        Ok(self.inner.lock().file.metadata()?.len())
    }
}

fn page_offset(page_id: PageId) -> u64 {
    (page_id.0 as u64) * (PAGE_SIZE as u64)
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<()> {
        let mut state = self.inner.lock();
        if !state.allocator.is_allocated(page_id) {
            return Err(Error::PageNotFound(page_id));
        }

        state.file.seek(SeekFrom::Start(page_offset(page_id)))?;
        state.file.read_exact(page.as_mut_slice())?;
        Ok(())
    }

    fn write_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        let mut state = self.inner.lock();
        if !state.allocator.is_allocated(page_id) {
            return Err(Error::PageNotFound(page_id));
        }

        state.file.seek(SeekFrom::Start(page_offset(page_id)))?;
        state.file.write_all(page.as_slice())?;
        state.file.sync_all()?; // fsync for durability
        Ok(())
    }

    fn allocate_page(&self, shard: Shard) -> Result<PageId> {
        let mut state = self.inner.lock();
        let page_id = state
            .allocator
            .allocate(shard)
            .ok_or(Error::InvalidPageId(PageId::INVALID))?;

        // Zero the page on disk, extending the file if needed.
        let zeros = [0u8; PAGE_SIZE];
        let written = state
            .file
            .seek(SeekFrom::Start(page_offset(page_id)))
            .and_then(|_| state.file.write_all(&zeros))
            .and_then(|_| state.file.sync_all());
        if let Err(e) = written {
            state.allocator.deallocate(page_id);
            return Err(e.into());
        }

        debug!(%page_id, %shard, "allocated page");
        Ok(page_id)
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        if self.inner.lock().allocator.deallocate(page_id) {
            debug!(%page_id, "deallocated page");
        }
        Ok(())
    }
}
