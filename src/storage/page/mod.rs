//! Raw page buffers.
//!
//! A [`Page`] is an opaque 4KB byte buffer. The buffer pool never interprets
//! its contents; typed node layouts such as
//! [`LeafPage`](crate::index::btree::LeafPage) are views built on top of it.

#[allow(clippy::module_inception)]
mod page;

pub use page::Page;
