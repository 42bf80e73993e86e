//! Index structures.
//!
//! - [`btree`] - B+tree node pages (leaf level)

pub mod btree;
