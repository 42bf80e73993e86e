//! Header shared by every B+tree node page.
//!
//! Every tree page starts with:
//! - [`PageType`] discriminator
//! - current and maximum number of entries
//! - its own page id and its parent's page id

use crate::common::PageId;

/// Kind of B+tree node stored in a page.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Uninitialized or corrupted page.
    #[default]
    Invalid = 0,
    /// Internal (non-leaf) node.
    Internal = 1,
    /// Leaf node.
    Leaf = 2,
}

impl PageType {
    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::Internal,
            2 => PageType::Leaf,
            _ => PageType::Invalid,
        }
    }
}

/// Metadata at the beginning of every tree page.
///
/// # Layout (17 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type (PageType as u8)
/// 1       4     size (entries in use, little-endian)
/// 5       4     max_size (little-endian)
/// 9       4     page_id (little-endian)
/// 13      4     parent_page_id (INVALID for the root)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreePageHeader {
    pub page_type: PageType,
    pub size: u32,
    pub max_size: u32,
    pub page_id: PageId,
    pub parent_page_id: PageId,
}

impl BTreePageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 17;

    /// Offset of each field within the header.
    pub const OFFSET_PAGE_TYPE: usize = 0;
    pub const OFFSET_SIZE: usize = 1;
    pub const OFFSET_MAX_SIZE: usize = 5;
    pub const OFFSET_PAGE_ID: usize = 9;
    pub const OFFSET_PARENT: usize = 13;

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < BTreePageHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for BTreePageHeader");

        Self {
            page_type: PageType::from_u8(data[Self::OFFSET_PAGE_TYPE]),
            size: read_u32(data, Self::OFFSET_SIZE),
            max_size: read_u32(data, Self::OFFSET_MAX_SIZE),
            page_id: PageId::from_le_bytes(&data[Self::OFFSET_PAGE_ID..]),
            parent_page_id: PageId::from_le_bytes(&data[Self::OFFSET_PARENT..]),
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < BTreePageHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for BTreePageHeader");

        data[Self::OFFSET_PAGE_TYPE] = self.page_type as u8;
        write_u32(data, Self::OFFSET_SIZE, self.size);
        write_u32(data, Self::OFFSET_MAX_SIZE, self.max_size);
        data[Self::OFFSET_PAGE_ID..Self::OFFSET_PAGE_ID + 4]
            .copy_from_slice(&self.page_id.to_le_bytes());
        data[Self::OFFSET_PARENT..Self::OFFSET_PARENT + 4]
            .copy_from_slice(&self.parent_page_id.to_le_bytes());
    }

    /// Whether the node has no parent.
    pub fn is_root(&self) -> bool {
        !self.parent_page_id.is_valid()
    }
}

#[inline]
pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[inline]
pub(crate) fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
