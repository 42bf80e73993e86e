//! Storage layer - disk I/O and raw pages.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - the page I/O interface consumed by the buffer pool
//! - [`FileDiskManager`] / [`MemoryDiskManager`] - its implementations
//! - [`PageAllocator`] - page id allocation and recycling
//! - [`page`] - the raw page buffer

mod disk_manager;
mod memory_disk_manager;
pub mod page;
mod page_allocator;

pub use disk_manager::{DiskManager, FileDiskManager};
pub use memory_disk_manager::MemoryDiskManager;
pub use page_allocator::PageAllocator;
