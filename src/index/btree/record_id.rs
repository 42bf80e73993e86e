//! Record locator stored as the value of leaf entries.

use std::fmt;

use crate::common::PageId;

use super::generic_key::FixedSizeCodec;

/// Identifies a tuple: the page holding it and its slot in that page.
///
/// # Layout (8 bytes)
/// ```text
/// 0   4   page_id (little-endian)
/// 4   4   slot (little-endian)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u32,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: u32) -> Self {
        Self { page_id, slot }
    }
}

impl FixedSizeCodec for RecordId {
    const ENCODED_SIZE: usize = 8;

    fn encode_into(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.page_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.slot.to_le_bytes());
    }

    fn decode_from(buf: &[u8]) -> Self {
        Self {
            page_id: PageId::from_le_bytes(&buf[..4]),
            slot: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page_id.0, self.slot)
    }
}
