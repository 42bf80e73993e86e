//! ShardDB - a sharded buffer pool with B+tree leaf pages on top.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            ShardDB                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/)                        │   │
//! │  │        LeafPage views over pinned buffer pool pages      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Buffer Pool (buffer/)                       │   │
//! │  │   ParallelBufferPoolManager: page_id % N → instance      │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐    │   │
//! │  │   │ BPM 0    │ │ BPM 1    │ │ BPM 2    │ │ BPM 3    │    │   │
//! │  │   │ LRU      │ │ LRU      │ │ LRU      │ │ LRU      │    │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘    │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │     DiskManager (file or memory) + Page + allocation     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Shard, Error, config)
//! - [`buffer`] - Buffer pool instances, the parallel pool and LRU eviction
//! - [`storage`] - Disk I/O and raw pages
//! - [`index`] - B+tree leaf pages
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use sharddb::buffer::ParallelBufferPoolManager;
//! use sharddb::storage::FileDiskManager;
//! use sharddb::BufferPoolConfig;
//!
//! let disk = Arc::new(FileDiskManager::open_or_create("my_database.db").unwrap());
//! let pool = ParallelBufferPoolManager::from_config(&BufferPoolConfig::default(), disk).unwrap();
//!
//! let page_id = {
//!     let mut guard = pool.create_page().unwrap();
//!     guard.as_mut_slice()[0] = 42;
//!     guard.page_id()
//! };
//! pool.flush_page(page_id).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{BufferPoolConfig, Error, FrameId, PageId, Result, Shard};

pub use buffer::{
    BufferPoolManager, BufferPoolStats, Frame, PageReadGuard, PageWriteGuard,
    ParallelBufferPoolManager, StatsSnapshot,
};
pub use index::btree::{GenericComparator, GenericKey, LeafPage, RecordId};
pub use storage::page::Page;
pub use storage::{DiskManager, FileDiskManager, MemoryDiskManager};
