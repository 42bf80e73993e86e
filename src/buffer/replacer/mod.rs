//! Eviction policy implementations (replacers).
//!
//! A replacer tracks which frames are evictable (pin count 0) and picks the
//! next victim. Currently implements:
//! - [`LruReplacer`] - evicts the frame unpinned longest ago

mod lru;

pub use lru::LruReplacer;
