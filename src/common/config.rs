//! Configuration constants and buffer pool settings.

use super::{Error, Result};

/// Size of a page in bytes (4KB).
///
/// This value is chosen to match the OS page size on most systems, and it is
/// the unit of every disk read and write.
///
/// # Memory Layout
/// With 4KB pages and 32-bit PageIds:
/// - Max pages: 2^32 = 4,294,967,296 pages
/// - Max database size: 4,294,967,296 × 4KB = 16TB
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of pages with u32 PageId.
pub const MAX_PAGES: u64 = (u32::MAX as u64) + 1;

/// Maximum theoretical database size in bytes.
pub const MAX_DB_SIZE_BYTES: u64 = MAX_PAGES * PAGE_SIZE as u64;

/// Frames per buffer pool instance when nothing else is configured.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Number of shards in a parallel buffer pool when nothing else is configured.
pub const DEFAULT_NUM_INSTANCES: usize = 4;

/// Sizing of a (possibly sharded) buffer pool.
///
/// # Example
/// ```
/// use sharddb::BufferPoolConfig;
///
/// let config = BufferPoolConfig::new(16).with_instances(8);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.total_frames(), 128);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames in every instance.
    pub pool_size: usize,
    /// Number of independent instances (shards).
    pub num_instances: usize,
}

impl BufferPoolConfig {
    /// Single-instance configuration with `pool_size` frames.
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            num_instances: 1,
        }
    }

    /// Sets the number of instances.
    pub fn with_instances(mut self, num_instances: usize) -> Self {
        self.num_instances = num_instances;
        self
    }

    /// Frames across all instances.
    pub fn total_frames(&self) -> usize {
        self.pool_size * self.num_instances
    }

    /// Validates the configuration.
    ///
    /// Shard routing uses `page_id % num_instances` over `u32` page ids, so the
    /// instance count must fit in a `u32`.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::Config("pool_size must be > 0".into()));
        }
        if self.num_instances == 0 {
            return Err(Error::Config("num_instances must be > 0".into()));
        }
        if u32::try_from(self.num_instances).is_err() {
            return Err(Error::Config(format!(
                "num_instances {} exceeds the page id space",
                self.num_instances
            )));
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE).with_instances(DEFAULT_NUM_INSTANCES)
    }
}
