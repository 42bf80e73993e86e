//! B+tree node pages.
//!
//! Nodes are typed views over raw buffer pool pages:
//! - [`BTreePageHeader`] / [`PageType`] - the header every node starts with
//! - [`LeafPage`] - sorted `(key, value)` entries plus a right sibling link
//! - [`GenericKey`] / [`GenericComparator`] - fixed-width keys and their order
//! - [`RecordId`] - the record locator stored in leaves

mod generic_key;
mod leaf_page;
mod record_id;
mod tree_page;

pub use generic_key::{FixedSizeCodec, GenericComparator, GenericKey, KeyComparator};
pub use leaf_page::LeafPage;
pub use record_id::RecordId;
pub use tree_page::{BTreePageHeader, PageType};
