//! B+tree leaf node.
//!
//! A [`LeafPage`] is a typed view over a raw page buffer. It never owns page
//! memory itself: wrap a `&Page` to read or a `&mut Page` (or a page write
//! guard's `&mut *guard`) to modify.

use std::marker::PhantomData;

use crate::common::config::PAGE_SIZE;
use crate::common::PageId;

use super::generic_key::{FixedSizeCodec, KeyComparator};
use super::tree_page::{read_u32, write_u32, BTreePageHeader, PageType};

/// Sorted `(key, value)` entries of one leaf, plus its right sibling link.
///
/// # Layout
/// ```text
/// ┌────────────────────┬─────────┬──────────┬──────────┬─────┬─────────────────┐
/// │ BTreePageHeader    │ next_id │ key0|v0  │ key1|v1  │ ... │ unused          │
/// │ 17 bytes           │ 4 bytes │ K+V size │ K+V size │     │                 │
/// └────────────────────┴─────────┴──────────┴──────────┴─────┴─────────────────┘
/// ```
/// Keys over `[0, size)` are strictly ascending. Entries past `size` are
/// garbage.
///
/// # Example
/// ```
/// use sharddb::index::btree::{GenericComparator, GenericKey, LeafPage, RecordId};
/// use sharddb::storage::page::Page;
/// use sharddb::PageId;
///
/// let cmp = GenericComparator::<8>;
/// let mut page = Page::new();
/// let mut leaf = LeafPage::<_, GenericKey<8>, RecordId>::new(&mut page);
/// leaf.init(PageId::new(1), PageId::INVALID, 16);
///
/// let rid = RecordId::new(PageId::new(40), 2);
/// leaf.insert(GenericKey::from_integer(7), rid, &cmp);
/// assert_eq!(leaf.lookup(&GenericKey::from_integer(7), &cmp), Some(rid));
/// assert_eq!(leaf.lookup(&GenericKey::from_integer(8), &cmp), None);
/// ```
pub struct LeafPage<B, K, V> {
    buf: B,
    _entries: PhantomData<(K, V)>,
}

impl<B, K: FixedSizeCodec, V: FixedSizeCodec> LeafPage<B, K, V> {
    const OFFSET_NEXT: usize = BTreePageHeader::SIZE;

    /// Bytes before the first entry.
    pub const HEADER_SIZE: usize = BTreePageHeader::SIZE + PageId::ENCODED_SIZE;

    /// Bytes per entry.
    pub const ENTRY_SIZE: usize = K::ENCODED_SIZE + V::ENCODED_SIZE;

    /// Largest `max_size` whose entries fit in one page.
    pub fn capacity() -> usize {
        (PAGE_SIZE - Self::HEADER_SIZE) / Self::ENTRY_SIZE
    }

    #[inline]
    fn entry_offset(index: usize) -> usize {
        Self::HEADER_SIZE + index * Self::ENTRY_SIZE
    }

    /// Give the buffer back.
    pub fn into_inner(self) -> B {
        self.buf
    }
}

// ============================================================================
// Read access
// ============================================================================

impl<B, K, V> LeafPage<B, K, V>
where
    B: AsRef<[u8]>,
    K: FixedSizeCodec,
    V: FixedSizeCodec,
{
    /// Wrap a page buffer. The contents are not checked; call
    /// [`init`](Self::init) on fresh pages.
    ///
    /// # Panics
    /// Panics if `buf` is shorter than a page.
    pub fn new(buf: B) -> Self {
        assert!(
            buf.as_ref().len() >= PAGE_SIZE,
            "leaf page needs a {}-byte buffer",
            PAGE_SIZE
        );
        Self {
            buf,
            _entries: PhantomData,
        }
    }

    #[inline]
    fn data(&self) -> &[u8] {
        self.buf.as_ref()
    }

    /// Decode the common tree header.
    pub fn header(&self) -> BTreePageHeader {
        BTreePageHeader::from_bytes(self.data())
    }

    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.data()[BTreePageHeader::OFFSET_PAGE_TYPE])
    }

    /// Number of entries in use.
    #[inline]
    pub fn size(&self) -> usize {
        read_u32(self.data(), BTreePageHeader::OFFSET_SIZE) as usize
    }

    #[inline]
    pub fn max_size(&self) -> usize {
        read_u32(self.data(), BTreePageHeader::OFFSET_MAX_SIZE) as usize
    }

    /// Fewest entries a non-root leaf may hold: `ceil(max_size / 2) - 1`.
    pub fn min_size(&self) -> usize {
        self.max_size().div_ceil(2).saturating_sub(1)
    }

    pub fn page_id(&self) -> PageId {
        PageId::from_le_bytes(&self.data()[BTreePageHeader::OFFSET_PAGE_ID..])
    }

    pub fn parent_page_id(&self) -> PageId {
        PageId::from_le_bytes(&self.data()[BTreePageHeader::OFFSET_PARENT..])
    }

    /// Right sibling, or `PageId::INVALID` for the rightmost leaf.
    pub fn next_page_id(&self) -> PageId {
        PageId::from_le_bytes(&self.data()[Self::OFFSET_NEXT..])
    }

    pub fn is_root(&self) -> bool {
        !self.parent_page_id().is_valid()
    }

    fn check_index(&self, index: usize) {
        let size = self.size();
        assert!(index < size, "index {} out of bounds for leaf of size {}", index, size);
    }

    /// # Panics
    /// Panics if `index >= size`.
    pub fn key_at(&self, index: usize) -> K {
        self.check_index(index);
        K::decode_from(&self.data()[Self::entry_offset(index)..])
    }

    /// # Panics
    /// Panics if `index >= size`.
    pub fn value_at(&self, index: usize) -> V {
        self.check_index(index);
        V::decode_from(&self.data()[Self::entry_offset(index) + K::ENCODED_SIZE..])
    }

    /// # Panics
    /// Panics if `index >= size`.
    pub fn item(&self, index: usize) -> (K, V) {
        (self.key_at(index), self.value_at(index))
    }

    /// All entries in key order.
    pub fn items(&self) -> Vec<(K, V)> {
        (0..self.size()).map(|i| self.item(i)).collect()
    }

    /// First index whose key is `>= key`, or `size` if there is none.
    pub fn key_index<C: KeyComparator<K>>(&self, key: &K, cmp: &C) -> usize {
        let (mut lo, mut hi) = (0, self.size());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if cmp.compare(&self.key_at(mid), key).is_lt() {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Value stored under `key`, if any.
    pub fn lookup<C: KeyComparator<K>>(&self, key: &K, cmp: &C) -> Option<V> {
        let index = self.key_index(key, cmp);
        if index < self.size() && cmp.compare(&self.key_at(index), key).is_eq() {
            Some(self.value_at(index))
        } else {
            None
        }
    }

    fn entry_bytes(&self, from: usize, to: usize) -> &[u8] {
        &self.data()[Self::entry_offset(from)..Self::entry_offset(to)]
    }
}

// ============================================================================
// Write access
// ============================================================================

impl<B, K, V> LeafPage<B, K, V>
where
    B: AsRef<[u8]> + AsMut<[u8]>,
    K: FixedSizeCodec,
    V: FixedSizeCodec,
{
    #[inline]
    fn data_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut()
    }

    /// Format the buffer as an empty leaf with no right sibling.
    ///
    /// # Panics
    /// Panics if `max_size` is 0 or larger than [`capacity`](Self::capacity).
    pub fn init(&mut self, page_id: PageId, parent_page_id: PageId, max_size: usize) {
        assert!(
            max_size > 0 && max_size <= Self::capacity(),
            "max_size {} outside 1..={}",
            max_size,
            Self::capacity()
        );

        let header = BTreePageHeader {
            page_type: PageType::Leaf,
            size: 0,
            max_size: max_size as u32,
            page_id,
            parent_page_id,
        };
        header.write_to(self.data_mut());
        self.set_next_page_id(PageId::INVALID);
    }

    fn set_size(&mut self, size: usize) {
        write_u32(self.data_mut(), BTreePageHeader::OFFSET_SIZE, size as u32);
    }

    pub fn set_parent_page_id(&mut self, parent_page_id: PageId) {
        let offset = BTreePageHeader::OFFSET_PARENT;
        self.data_mut()[offset..offset + 4].copy_from_slice(&parent_page_id.to_le_bytes());
    }

    pub fn set_next_page_id(&mut self, next_page_id: PageId) {
        let offset = Self::OFFSET_NEXT;
        self.data_mut()[offset..offset + 4].copy_from_slice(&next_page_id.to_le_bytes());
    }

    fn write_entry(&mut self, index: usize, key: &K, value: &V) {
        let offset = Self::entry_offset(index);
        key.encode_into(&mut self.data_mut()[offset..]);
        value.encode_into(&mut self.data_mut()[offset + K::ENCODED_SIZE..]);
    }

    /// Move entries `[index, size)` one slot right. Size is unchanged.
    fn shift_right(&mut self, index: usize) {
        let size = self.size();
        let (from, to) = (Self::entry_offset(index), Self::entry_offset(size));
        self.data_mut()
            .copy_within(from..to, from + Self::ENTRY_SIZE);
    }

    /// Close the gap at `index` by moving `(index, size)` one slot left.
    /// Size is unchanged.
    fn shift_left(&mut self, index: usize) {
        let size = self.size();
        let (from, to) = (Self::entry_offset(index + 1), Self::entry_offset(size));
        self.data_mut()
            .copy_within(from..to, Self::entry_offset(index));
    }

    fn assert_not_empty(&self) {
        assert!(self.size() > 0, "leaf {} is empty", self.page_id());
    }

    fn assert_room(&self, extra: usize) {
        assert!(
            self.size() + extra <= self.max_size(),
            "leaf {} overflow: {} + {} entries, max {}",
            self.page_id(),
            self.size(),
            extra,
            self.max_size()
        );
    }

    /// Insert `(key, value)` in key order. Returns the new size.
    ///
    /// The key must not already be present.
    ///
    /// # Panics
    /// Panics if the leaf is full.
    pub fn insert<C: KeyComparator<K>>(&mut self, key: K, value: V, cmp: &C) -> usize {
        self.assert_room(1);
        let index = self.key_index(&key, cmp);
        self.shift_right(index);
        self.write_entry(index, &key, &value);

        let size = self.size() + 1;
        self.set_size(size);
        size
    }

    /// Remove the entry for `key`. Returns the new size, which is unchanged
    /// if the key was absent.
    pub fn remove_and_delete_record<C: KeyComparator<K>>(&mut self, key: &K, cmp: &C) -> usize {
        let size = self.size();
        let index = self.key_index(key, cmp);
        if index >= size || !cmp.compare(&self.key_at(index), key).is_eq() {
            return size;
        }

        self.shift_left(index);
        self.set_size(size - 1);
        size - 1
    }

    /// Split: move the upper half of the entries into the empty `recipient`
    /// and link it in as this leaf's right sibling.
    ///
    /// This leaf keeps `size / 2` entries.
    ///
    /// # Panics
    /// Panics if `recipient` is not empty or cannot hold the upper half.
    pub fn move_half_to<R>(&mut self, recipient: &mut LeafPage<R, K, V>)
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        assert_eq!(
            recipient.size(),
            0,
            "split target leaf {} must be empty",
            recipient.page_id()
        );
        let size = self.size();
        let half = size / 2;
        let moved = size - half;
        recipient.assert_room(moved);

        let dst = LeafPage::<R, K, V>::entry_offset(0);
        recipient.data_mut()[dst..dst + moved * Self::ENTRY_SIZE]
            .copy_from_slice(self.entry_bytes(half, size));
        recipient.set_size(moved);
        self.set_size(half);

        recipient.set_next_page_id(self.next_page_id());
        self.set_next_page_id(recipient.page_id());
    }

    /// Overwrite entries `[0, items.len())` with `items`. Size is unchanged;
    /// the caller sets it.
    ///
    /// # Panics
    /// Panics if `items` exceeds [`capacity`](Self::capacity).
    pub fn copy_n_from(&mut self, items: &[(K, V)]) {
        assert!(items.len() <= Self::capacity(), "too many entries for one leaf");
        for (i, (key, value)) in items.iter().enumerate() {
            self.write_entry(i, key, value);
        }
    }

    /// Merge: append every entry to `recipient`, the left sibling, and hand
    /// it this leaf's right sibling link. This leaf is left empty.
    ///
    /// # Panics
    /// Panics if the entries do not fit in `recipient`.
    pub fn move_all_to<R>(&mut self, recipient: &mut LeafPage<R, K, V>)
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        recipient.assert_room(size);

        let start = recipient.size();
        let dst = LeafPage::<R, K, V>::entry_offset(start);
        recipient.data_mut()[dst..dst + size * Self::ENTRY_SIZE]
            .copy_from_slice(self.entry_bytes(0, size));
        recipient.set_size(start + size);

        recipient.set_next_page_id(self.next_page_id());
        self.set_size(0);
    }

    /// Redistribute: move this leaf's first entry to the end of `recipient`,
    /// its left sibling.
    ///
    /// # Panics
    /// Panics if this leaf is empty or `recipient` is full.
    pub fn move_first_to_end_of<R>(&mut self, recipient: &mut LeafPage<R, K, V>)
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        self.assert_not_empty();
        let item = self.item(0);
        recipient.copy_last_from(item);

        let size = self.size();
        self.shift_left(0);
        self.set_size(size - 1);
    }

    /// Redistribute: move this leaf's last entry to the front of `recipient`,
    /// its right sibling.
    ///
    /// # Panics
    /// Panics if this leaf is empty or `recipient` is full.
    pub fn move_last_to_front_of<R>(&mut self, recipient: &mut LeafPage<R, K, V>)
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        self.assert_not_empty();
        let size = self.size();
        let item = self.item(size - 1);
        recipient.copy_first_from(item);
        self.set_size(size - 1);
    }

    /// Append an entry whose key is greater than every key present.
    ///
    /// # Panics
    /// Panics if the leaf is full.
    pub fn copy_last_from(&mut self, item: (K, V)) {
        self.assert_room(1);
        let size = self.size();
        self.write_entry(size, &item.0, &item.1);
        self.set_size(size + 1);
    }

    /// Prepend an entry whose key is smaller than every key present.
    ///
    /// # Panics
    /// Panics if the leaf is full.
    pub fn copy_first_from(&mut self, item: (K, V)) {
        self.assert_room(1);
        self.shift_right(0);
        self.write_entry(0, &item.0, &item.1);
        let size = self.size();
        self.set_size(size + 1);
    }
}
