//! Slotted page format for variable-length records.
//!
//! A data page stores variable-length records behind two levels of
//! indirection: a directory mapping 32-bit keys to slot ids, and a
//! slot array mapping slot ids to record locations. Records can be
//! deleted by tombstoning their slot; the dead bytes are reclaimed by
//! [`DataPage::compact`].
//!
//! # Page Layout
//!
//! ```text
//! +---------------------------------+ 0x0000
//! | DataHeader (23 bytes)           |
//! |   [common header, 13 bytes]     |
//! |   free_space_offset: u16        |  start of the record region
//! |   first_slot_offset: u16        |  informational
//! |   first_free_slot:   u16        |  head of tombstone freelist
//! |   slot_count:        u16        |  slot array length
//! |   directory_count:   u16        |  directory length
//! +---------------------------------+ 0x0017
//! | SlotPair directory              |  { key: u32, slot_id: u16 }
//! +---------------------------------+ grows forward
//! | SlotEntry array                 |  { offset, length, flags: u16 }
//! +---------------------------------+ grows forward
//! |           free space            |
//! +---------------------------------+ <- free_space_offset
//! | records, each:                  |
//! |   { length: u16, type: u16 }    |  record header
//! |   [payload bytes]               |
//! +---------------------------------+ 0x1000
//! ```
//!
//! The slot array sits immediately after the directory, so appending a
//! directory pair shifts the slot array right by one pair width. A
//! tombstoned slot's `offset` field is reused as the next-pointer of
//! the free-slot chain.

use quartz_common::types::PageId;

use super::base::PageBuf;
use super::header::{PageHeader, PageHeaderRef};
use super::types::{PageType, SlotFlags};
use super::{PAGE_HEADER_SIZE, PAGE_SIZE};

// Extended header field offsets.
const FREE_SPACE_OFFSET_OFFSET: usize = 13;
const FIRST_SLOT_OFFSET_OFFSET: usize = 15;
const FIRST_FREE_SLOT_OFFSET: usize = 17;
const SLOT_COUNT_OFFSET: usize = 19;
const DIRECTORY_COUNT_OFFSET: usize = 21;

/// A key-to-slot mapping in the page directory.
///
/// Directory entries are append-ordered, not sorted. A key may appear
/// at most once per page; lookups return the first match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPair {
    /// Record key.
    pub key: u32,
    /// Slot index the key maps to.
    pub slot_id: u16,
}

impl SlotPair {
    /// Reads a pair from bytes.
    #[inline]
    fn from_bytes(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() >= DataPage::PAIR_SIZE);
        Self {
            key: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            slot_id: u16::from_le_bytes([bytes[4], bytes[5]]),
        }
    }

    /// Writes the pair to bytes.
    #[inline]
    fn to_bytes(self) -> [u8; DataPage::PAIR_SIZE] {
        let mut bytes = [0u8; DataPage::PAIR_SIZE];
        bytes[0..4].copy_from_slice(&self.key.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.slot_id.to_le_bytes());
        bytes
    }
}

/// A slot array entry pointing at one record.
///
/// For a tombstoned slot the `offset` field holds the index of the
/// next free slot instead of a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEntry {
    /// Byte offset of the record header, or the next free slot index.
    pub offset: u16,
    /// Record length in bytes, including the record header.
    pub length: u16,
    /// Status flags, see [`SlotFlags`].
    pub flags: u16,
}

impl SlotEntry {
    /// Returns true if the slot is tombstoned.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        SlotFlags::is_set(self.flags, SlotFlags::DELETED)
    }

    /// Reads a slot entry from bytes.
    #[inline]
    fn from_bytes(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() >= DataPage::SLOT_SIZE);
        Self {
            offset: u16::from_le_bytes([bytes[0], bytes[1]]),
            length: u16::from_le_bytes([bytes[2], bytes[3]]),
            flags: u16::from_le_bytes([bytes[4], bytes[5]]),
        }
    }

    /// Writes the slot entry to bytes.
    #[inline]
    fn to_bytes(self) -> [u8; DataPage::SLOT_SIZE] {
        let mut bytes = [0u8; DataPage::SLOT_SIZE];
        bytes[0..2].copy_from_slice(&self.offset.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.length.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.flags.to_le_bytes());
        bytes
    }
}

/// A slotted record page.
pub struct DataPage {
    buf: PageBuf,
}

impl DataPage {
    /// Size of the extended data header in bytes.
    pub const HEADER_SIZE: usize = PAGE_HEADER_SIZE + 10;
    /// Size of a record header in bytes.
    pub const RECORD_HEADER_SIZE: usize = 4;
    /// Size of a slot array entry in bytes.
    pub const SLOT_SIZE: usize = 6;
    /// Size of a directory pair in bytes.
    pub const PAIR_SIZE: usize = 6;
    /// Maximum free space of an empty data page.
    pub const MAX_FREE_SPACE: u16 = (PAGE_SIZE - Self::HEADER_SIZE) as u16;
    /// Sentinel slot index (end of the free-slot chain).
    pub const INVALID_SLOT: u16 = 0xFFFF;

    /// Constructs an empty data page with the given ID.
    pub fn new(page_id: PageId) -> Self {
        let mut page = Self {
            buf: PageBuf::zeroed(),
        };

        page.header_mut()
            .initialize(page_id, PageType::Data, Self::MAX_FREE_SPACE);

        page.set_free_space_offset(PAGE_SIZE as u16);
        page.write_u16(FIRST_SLOT_OFFSET_OFFSET, Self::HEADER_SIZE as u16);
        page.set_first_free_slot(Self::INVALID_SLOT);
        page.set_slot_count(0);
        page.set_directory_count(0);

        page
    }

    /// Materializes a data page from a raw disk image.
    pub(crate) fn from_image(image: &[u8; PAGE_SIZE]) -> Self {
        let mut page = Self::new(PageHeaderRef::new(image).page_id());
        page.buf.bytes_mut().copy_from_slice(image);
        page
    }

    /// Total space an insert needs for a record of `length` payload
    /// bytes, excluding the directory pair.
    #[inline]
    pub fn space_needed(length: u16) -> u16 {
        (Self::SLOT_SIZE + Self::RECORD_HEADER_SIZE) as u16 + length
    }

    // =========================================================================
    // Common header accessors
    // =========================================================================

    /// Returns the page ID.
    #[inline]
    pub fn id(&self) -> PageId {
        self.header().page_id()
    }

    /// Returns the reserved log sequence number.
    #[inline]
    pub fn lsn(&self) -> u32 {
        self.header().lsn()
    }

    /// Returns the free space left in the page.
    #[inline]
    pub fn free_space(&self) -> u16 {
        self.header().free_space()
    }

    /// Returns the number of live (non-deleted) records.
    #[inline]
    pub fn item_count(&self) -> u16 {
        self.header().item_count()
    }

    /// Returns true if at least `needed` bytes of free space remain.
    #[inline]
    pub fn has_space(&self, needed: u16) -> bool {
        self.free_space() >= needed
    }

    /// Returns the total slot array length, tombstones included.
    #[inline]
    pub fn slot_count(&self) -> u16 {
        self.read_u16(SLOT_COUNT_OFFSET)
    }

    /// Returns the number of directory entries.
    #[inline]
    pub fn directory_count(&self) -> u16 {
        self.read_u16(DIRECTORY_COUNT_OFFSET)
    }

    /// Returns the head of the free-slot chain.
    #[inline]
    pub fn first_free_slot(&self) -> u16 {
        self.read_u16(FIRST_FREE_SLOT_OFFSET)
    }

    /// Returns the full 4096-byte on-disk representation.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        self.buf.bytes()
    }

    // =========================================================================
    // Record operations
    // =========================================================================

    /// Inserts a record under `key` and returns its slot id.
    ///
    /// Fails (returning `None`) when the page cannot hold the record
    /// plus its slot and directory overhead. A failed insert leaves
    /// the page exactly as it was.
    pub fn insert_record(&mut self, key: u32, data: &[u8], record_type: u16) -> Option<u16> {
        let length = data.len();
        let total = Self::SLOT_SIZE + Self::RECORD_HEADER_SIZE + length + Self::PAIR_SIZE;

        if total > u16::MAX as usize || !self.has_space(total as u16) {
            return None;
        }

        // Obtain a slot, preferring the free chain.
        let (slot_id, reused) = self.take_free_slot()?;

        // Append the directory pair.
        if !self.insert_pair(key, slot_id) {
            self.restore_slot(slot_id, reused);
            return None;
        }

        // Reserve record bytes.
        let Some(offset) = self.allocate_space((Self::RECORD_HEADER_SIZE + length) as u16) else {
            self.remove_last_pair();
            self.restore_slot(slot_id, reused);
            return None;
        };

        // Write the record header and payload.
        let off = offset as usize;
        let bytes = self.buf.bytes_mut();
        bytes[off..off + 2].copy_from_slice(&(length as u16).to_le_bytes());
        bytes[off + 2..off + 4].copy_from_slice(&record_type.to_le_bytes());
        bytes[off + 4..off + 4 + length].copy_from_slice(data);

        self.set_slot(
            slot_id,
            SlotEntry {
                offset,
                length: (Self::RECORD_HEADER_SIZE + length) as u16,
                flags: SlotFlags::NONE,
            },
        );

        // A reused slot was charged when the slot array first grew.
        let charged = if reused { total - Self::SLOT_SIZE } else { total };
        let free_space = self.free_space() - charged as u16;
        self.header_mut().set_free_space(free_space);

        let items = self.item_count() + 1;
        self.header_mut().set_item_count(items);

        Some(slot_id)
    }

    /// Tombstones the record at `slot_id`.
    ///
    /// The slot joins the free-slot chain and the live-item count
    /// drops; the record bytes stay in place until [`Self::compact`].
    /// Fails on an out-of-range or already deleted slot.
    pub fn delete_record(&mut self, slot_id: u16) -> bool {
        if slot_id >= self.slot_count() {
            return false;
        }

        let mut slot = self.slot(slot_id);
        if slot.is_deleted() {
            return false;
        }

        slot.flags = SlotFlags::set(slot.flags, SlotFlags::DELETED);
        slot.offset = self.first_free_slot();
        self.set_slot(slot_id, slot);
        self.set_first_free_slot(slot_id);

        let items = self.item_count();
        if items > 0 {
            self.header_mut().set_item_count(items - 1);
        }

        true
    }

    /// Returns the payload of the live record at `slot_id`.
    pub fn get_record(&self, slot_id: u16) -> Option<&[u8]> {
        if slot_id >= self.slot_count() {
            return None;
        }

        let slot = self.slot(slot_id);
        if slot.is_deleted() {
            return None;
        }

        let off = slot.offset as usize;
        if off + Self::RECORD_HEADER_SIZE > PAGE_SIZE {
            return None;
        }

        let bytes = self.buf.bytes();
        let length = u16::from_le_bytes([bytes[off], bytes[off + 1]]) as usize;
        let start = off + Self::RECORD_HEADER_SIZE;
        if start + length > PAGE_SIZE {
            return None;
        }

        Some(&bytes[start..start + length])
    }

    /// Returns the type of the live record at `slot_id`.
    pub fn get_record_type(&self, slot_id: u16) -> Option<u16> {
        if slot_id >= self.slot_count() {
            return None;
        }

        let slot = self.slot(slot_id);
        if slot.is_deleted() {
            return None;
        }

        let off = slot.offset as usize;
        if off + Self::RECORD_HEADER_SIZE > PAGE_SIZE {
            return None;
        }

        let bytes = self.buf.bytes();
        Some(u16::from_le_bytes([bytes[off + 2], bytes[off + 3]]))
    }

    /// Returns the slot id mapped to `key`, first directory match wins.
    pub fn get_slot_id(&self, key: u32) -> Option<u16> {
        for i in 0..self.directory_count() {
            let pair = self.pair(i);
            if pair.key == key {
                return Some(pair.slot_id);
            }
        }

        None
    }

    // =========================================================================
    // Flag operations
    // =========================================================================

    /// Checks whether `flag` is set on the slot.
    pub fn has_flag(&self, slot_id: u16, flag: u16) -> bool {
        if slot_id >= self.slot_count() {
            return false;
        }

        SlotFlags::is_set(self.slot(slot_id).flags, flag)
    }

    /// Sets `flag` on the slot.
    ///
    /// Edits the flag word only. Setting `DELETED` here does not touch
    /// the free-slot chain or the item count; that is
    /// [`Self::delete_record`]'s job.
    pub fn set_flag(&mut self, slot_id: u16, flag: u16) -> bool {
        if slot_id >= self.slot_count() {
            return false;
        }

        let mut slot = self.slot(slot_id);
        slot.flags = SlotFlags::set(slot.flags, flag);
        self.set_slot(slot_id, slot);
        true
    }

    /// Clears `flag` on the slot.
    pub fn clear_flag(&mut self, slot_id: u16, flag: u16) -> bool {
        if slot_id >= self.slot_count() {
            return false;
        }

        let mut slot = self.slot(slot_id);
        slot.flags = SlotFlags::clear(slot.flags, flag);
        self.set_slot(slot_id, slot);
        true
    }

    // =========================================================================
    // Compaction
    // =========================================================================

    /// Moves all live records into a compact run at the high end of
    /// the page and returns the number of bytes reclaimed.
    ///
    /// Tombstoned slots keep their slot-array positions; the free-slot
    /// chain is rebuilt in ascending slot-id order. Calling this on an
    /// already compact page frees 0 bytes and changes nothing.
    pub fn compact(&mut self) -> u16 {
        let slot_count = self.slot_count();
        let mut scratch = vec![0u8; PAGE_SIZE];
        let mut write_offset = PAGE_SIZE;

        // Pass 1: copy live records to their compacted position.
        for i in 0..slot_count {
            let slot = self.slot(i);
            if slot.is_deleted() {
                continue;
            }

            let length = slot.length as usize;
            let src = slot.offset as usize;
            if src + length > PAGE_SIZE {
                continue;
            }

            write_offset -= length;
            scratch[write_offset..write_offset + length]
                .copy_from_slice(&self.buf.bytes()[src..src + length]);
            self.set_slot(
                i,
                SlotEntry {
                    offset: write_offset as u16,
                    ..slot
                },
            );
        }

        let bytes_freed = write_offset as u16 - self.free_space_offset();

        if bytes_freed > 0 {
            self.buf.bytes_mut()[write_offset..].copy_from_slice(&scratch[write_offset..]);
            self.set_free_space_offset(write_offset as u16);
            let free_space = self.free_space() + bytes_freed;
            self.header_mut().set_free_space(free_space);
        }

        // Pass 2: rebuild the free-slot chain in slot-id order.
        self.set_first_free_slot(Self::INVALID_SLOT);
        let mut last_free = Self::INVALID_SLOT;

        for i in 0..slot_count {
            if !self.slot(i).is_deleted() {
                continue;
            }

            if last_free == Self::INVALID_SLOT {
                self.set_first_free_slot(i);
            } else {
                let mut prev = self.slot(last_free);
                prev.offset = i;
                self.set_slot(last_free, prev);
            }
            last_free = i;
        }

        if last_free != Self::INVALID_SLOT {
            let mut tail = self.slot(last_free);
            tail.offset = Self::INVALID_SLOT;
            self.set_slot(last_free, tail);
        }

        bytes_freed
    }

    /// Reports whether more than a quarter of the occupied space is
    /// dead (tombstoned records and stale bytes).
    pub fn needs_compact(&self) -> bool {
        let used = PAGE_SIZE - self.free_space() as usize;
        let mut actual = self.item_count() as usize * Self::RECORD_HEADER_SIZE;

        for i in 0..self.slot_count() {
            let slot = self.slot(i);
            if !slot.is_deleted() {
                actual += slot.length as usize;
            }
        }

        used > 0 && used.saturating_sub(actual) * 4 > used
    }

    // =========================================================================
    // Private helpers
    // =========================================================================

    fn header(&self) -> PageHeaderRef<'_> {
        PageHeaderRef::new(self.buf.bytes())
    }

    fn header_mut(&mut self) -> PageHeader<'_> {
        PageHeader::new(self.buf.bytes_mut())
    }

    #[inline]
    fn read_u16(&self, offset: usize) -> u16 {
        let bytes = self.buf.bytes();
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    #[inline]
    fn write_u16(&mut self, offset: usize, value: u16) {
        self.buf.bytes_mut()[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    #[inline]
    fn free_space_offset(&self) -> u16 {
        self.read_u16(FREE_SPACE_OFFSET_OFFSET)
    }

    #[inline]
    fn set_free_space_offset(&mut self, offset: u16) {
        self.write_u16(FREE_SPACE_OFFSET_OFFSET, offset);
    }

    #[inline]
    fn set_first_free_slot(&mut self, slot_id: u16) {
        self.write_u16(FIRST_FREE_SLOT_OFFSET, slot_id);
    }

    #[inline]
    fn set_slot_count(&mut self, count: u16) {
        self.write_u16(SLOT_COUNT_OFFSET, count);
    }

    #[inline]
    fn set_directory_count(&mut self, count: u16) {
        self.write_u16(DIRECTORY_COUNT_OFFSET, count);
    }

    /// Byte offset where the slot array currently starts.
    #[inline]
    fn slot_base(&self) -> usize {
        Self::HEADER_SIZE + self.directory_count() as usize * Self::PAIR_SIZE
    }

    fn slot(&self, slot_id: u16) -> SlotEntry {
        let pos = self.slot_base() + slot_id as usize * Self::SLOT_SIZE;
        SlotEntry::from_bytes(&self.buf.bytes()[pos..pos + Self::SLOT_SIZE])
    }

    fn set_slot(&mut self, slot_id: u16, slot: SlotEntry) {
        let pos = self.slot_base() + slot_id as usize * Self::SLOT_SIZE;
        self.buf.bytes_mut()[pos..pos + Self::SLOT_SIZE].copy_from_slice(&slot.to_bytes());
    }

    fn pair(&self, index: u16) -> SlotPair {
        let pos = Self::HEADER_SIZE + index as usize * Self::PAIR_SIZE;
        SlotPair::from_bytes(&self.buf.bytes()[pos..pos + Self::PAIR_SIZE])
    }

    /// Pops the free-slot chain, else grows the slot array. The bool
    /// is true when an existing slot was reused.
    fn take_free_slot(&mut self) -> Option<(u16, bool)> {
        let head = self.first_free_slot();
        if head != Self::INVALID_SLOT {
            let next = self.slot(head).offset;
            self.set_first_free_slot(next);
            return Some((head, true));
        }

        let slot_count = self.slot_count();
        let new_end = self.slot_base() + (slot_count as usize + 1) * Self::SLOT_SIZE;
        if new_end >= self.free_space_offset() as usize {
            return None;
        }

        self.set_slot_count(slot_count + 1);
        Some((slot_count, false))
    }

    /// Undoes [`Self::take_free_slot`].
    fn restore_slot(&mut self, slot_id: u16, reused: bool) {
        if reused {
            // The slot's offset field still holds the old next pointer.
            self.set_first_free_slot(slot_id);
        } else {
            self.set_slot_count(slot_id);
        }
    }

    /// Appends a directory pair, shifting the slot array right to keep
    /// it immediately after the directory.
    fn insert_pair(&mut self, key: u32, slot_id: u16) -> bool {
        let dir_end = self.slot_base();
        let slots_len = self.slot_count() as usize * Self::SLOT_SIZE;

        if dir_end + Self::PAIR_SIZE + slots_len >= self.free_space_offset() as usize {
            return false;
        }

        self.buf
            .bytes_mut()
            .copy_within(dir_end..dir_end + slots_len, dir_end + Self::PAIR_SIZE);

        let pair = SlotPair { key, slot_id };
        self.buf.bytes_mut()[dir_end..dir_end + Self::PAIR_SIZE].copy_from_slice(&pair.to_bytes());

        let count = self.directory_count() + 1;
        self.set_directory_count(count);
        true
    }

    /// Drops the last directory pair, shifting the slot array back.
    fn remove_last_pair(&mut self) {
        let count = self.directory_count();
        if count == 0 {
            return;
        }

        self.set_directory_count(count - 1);
        let dir_end = self.slot_base();
        let slots_len = self.slot_count() as usize * Self::SLOT_SIZE;
        self.buf
            .bytes_mut()
            .copy_within(dir_end + Self::PAIR_SIZE..dir_end + Self::PAIR_SIZE + slots_len, dir_end);
    }

    /// Reserves `size` bytes at the low end of the record region.
    fn allocate_space(&mut self, size: u16) -> Option<u16> {
        let new_offset = self.free_space_offset().checked_sub(size)?;
        let slots_end = self.slot_base() + self.slot_count() as usize * Self::SLOT_SIZE;

        if (new_offset as usize) < slots_end {
            return None;
        }

        self.set_free_space_offset(new_offset);
        Some(new_offset)
    }
}

impl std::fmt::Debug for DataPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataPage")
            .field("page_id", &self.id())
            .field("item_count", &self.item_count())
            .field("slot_count", &self.slot_count())
            .field("directory_count", &self.directory_count())
            .field("free_space", &self.free_space())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Physical accounting check: free_space must equal the page size
    /// minus header, directory, slot array, and record region.
    fn assert_free_space_consistent(page: &DataPage) {
        let dir = page.directory_count() as usize * DataPage::PAIR_SIZE;
        let slots = page.slot_count() as usize * DataPage::SLOT_SIZE;
        let region = PAGE_SIZE - page.free_space_offset() as usize;
        let expected = PAGE_SIZE - DataPage::HEADER_SIZE - dir - slots - region;
        assert_eq!(page.free_space() as usize, expected);
    }

    #[test]
    fn test_constructor() {
        let page = DataPage::new(PageId::new(1));

        assert_eq!(page.id(), PageId::new(1));
        assert_eq!(page.slot_count(), 0);
        assert_eq!(page.directory_count(), 0);
        assert_eq!(page.item_count(), 0);
        assert_eq!(page.free_space(), DataPage::MAX_FREE_SPACE);
        assert_eq!(page.first_free_slot(), DataPage::INVALID_SLOT);
        assert_free_space_consistent(&page);
    }

    #[test]
    fn test_insert_and_retrieve() {
        let mut page = DataPage::new(PageId::new(1));

        let slot = page.insert_record(1, b"foo", 1).unwrap();
        assert_eq!(page.item_count(), 1);
        assert_eq!(page.slot_count(), 1);
        assert_eq!(page.directory_count(), 1);

        assert_eq!(page.get_record(slot).unwrap(), b"foo");
        assert_eq!(page.get_record_type(slot), Some(1));
        assert_free_space_consistent(&page);
    }

    #[test]
    fn test_multiple_inserts_stay_addressable() {
        let mut page = DataPage::new(PageId::new(1));

        // Each insert grows the directory, shifting the slot array;
        // every earlier record must remain retrievable.
        let mut slots = Vec::new();
        for i in 0..20u32 {
            let payload = format!("record-{i}");
            let slot = page.insert_record(i, payload.as_bytes(), 7).unwrap();
            slots.push((slot, payload));

            for (s, p) in &slots {
                assert_eq!(page.get_record(*s).unwrap(), p.as_bytes());
            }
        }

        assert_eq!(page.item_count(), 20);
        assert_free_space_consistent(&page);
    }

    #[test]
    fn test_key_lookup() {
        let mut page = DataPage::new(PageId::new(1));

        let slot = page.insert_record(42, b"bar", 1).unwrap();
        assert_eq!(page.get_slot_id(42), Some(slot));
        assert_eq!(page.get_slot_id(7), None);
    }

    #[test]
    fn test_duplicate_key_first_match_wins() {
        let mut page = DataPage::new(PageId::new(1));

        let first = page.insert_record(5, b"a", 1).unwrap();
        let _second = page.insert_record(5, b"b", 1).unwrap();
        assert_eq!(page.get_slot_id(5), Some(first));
    }

    #[test]
    fn test_delete_record() {
        let mut page = DataPage::new(PageId::new(1));

        let slot = page.insert_record(1, b"baz", 1).unwrap();
        assert!(page.delete_record(slot));

        assert_eq!(page.item_count(), 0);
        assert_eq!(page.get_record(slot), None);
        assert_eq!(page.get_record_type(slot), None);
        assert!(page.has_flag(slot, SlotFlags::DELETED));
        assert_eq!(page.first_free_slot(), slot);

        // Tombstones keep their structure around.
        assert_eq!(page.slot_count(), 1);
        assert_eq!(page.directory_count(), 1);
        assert_free_space_consistent(&page);
    }

    #[test]
    fn test_delete_invalid() {
        let mut page = DataPage::new(PageId::new(1));
        assert!(!page.delete_record(0));

        let slot = page.insert_record(1, b"x", 1).unwrap();
        assert!(page.delete_record(slot));
        assert!(!page.delete_record(slot)); // already deleted
        assert!(!page.delete_record(99)); // out of range
    }

    #[test]
    fn test_slot_reuse() {
        let mut page = DataPage::new(PageId::new(1));

        let slot1 = page.insert_record(1, b"a", 1).unwrap();
        assert!(page.delete_record(slot1));

        let slot2 = page.insert_record(2, b"b", 1).unwrap();
        assert_eq!(slot2, slot1);
        assert_eq!(page.first_free_slot(), DataPage::INVALID_SLOT);
        assert_eq!(page.get_record(slot2).unwrap(), b"b");
        assert_free_space_consistent(&page);
    }

    #[test]
    fn test_free_chain_is_lifo() {
        let mut page = DataPage::new(PageId::new(1));

        let s0 = page.insert_record(0, b"a", 1).unwrap();
        let s1 = page.insert_record(1, b"b", 1).unwrap();
        let s2 = page.insert_record(2, b"c", 1).unwrap();

        assert!(page.delete_record(s0));
        assert!(page.delete_record(s2));

        // Most recently deleted first.
        assert_eq!(page.insert_record(10, b"x", 1), Some(s2));
        assert_eq!(page.insert_record(11, b"y", 1), Some(s0));
        assert_eq!(page.insert_record(12, b"z", 1), Some(3));
        let _ = s1;
    }

    #[test]
    fn test_oversized_insert_leaves_page_unchanged() {
        let mut page = DataPage::new(PageId::new(1));
        page.insert_record(1, b"keep", 1).unwrap();

        let before = *page.as_bytes();
        let huge = vec![0u8; DataPage::MAX_FREE_SPACE as usize];
        assert_eq!(page.insert_record(2, &huge, 1), None);
        assert_eq!(*page.as_bytes(), before);
    }

    #[test]
    fn test_space_tracking() {
        let mut page = DataPage::new(PageId::new(1));
        let initial = page.free_space();

        let data = vec![b'0'; 100];
        page.insert_record(1, &data, 1).unwrap();

        let expected = initial - DataPage::space_needed(100) - DataPage::PAIR_SIZE as u16;
        assert_eq!(page.free_space(), expected);
        assert_free_space_consistent(&page);
    }

    #[test]
    fn test_reuse_does_not_recharge_slot() {
        let mut page = DataPage::new(PageId::new(1));

        let slot = page.insert_record(1, b"abcd", 1).unwrap();
        page.delete_record(slot);
        let before = page.free_space();

        page.insert_record(2, b"wxyz", 1).unwrap();

        // Only the pair and the record bytes are new; the slot entry
        // already existed.
        let charged =
            (DataPage::PAIR_SIZE + DataPage::RECORD_HEADER_SIZE + 4) as u16;
        assert_eq!(page.free_space(), before - charged);
        assert_free_space_consistent(&page);
    }

    #[test]
    fn test_flag_operations() {
        let mut page = DataPage::new(PageId::new(1));
        let slot = page.insert_record(1, b"foo", 1).unwrap();

        assert!(!page.has_flag(slot, SlotFlags::DELETED));
        assert!(page.set_flag(slot, SlotFlags::DELETED));
        assert!(page.has_flag(slot, SlotFlags::DELETED));
        assert!(page.clear_flag(slot, SlotFlags::DELETED));
        assert!(!page.has_flag(slot, SlotFlags::DELETED));

        assert!(!page.set_flag(99, SlotFlags::DELETED));
        assert!(!page.clear_flag(99, SlotFlags::DELETED));
        assert!(!page.has_flag(99, SlotFlags::DELETED));
    }

    #[test]
    fn test_set_flag_bypasses_bookkeeping() {
        let mut page = DataPage::new(PageId::new(1));
        let slot = page.insert_record(1, b"foo", 1).unwrap();

        // setFlag(DELETED) is not deleteRecord: no chain splice, no
        // item count change.
        assert!(page.set_flag(slot, SlotFlags::DELETED));
        assert_eq!(page.item_count(), 1);
        assert_eq!(page.first_free_slot(), DataPage::INVALID_SLOT);
    }

    #[test]
    fn test_needs_compact() {
        let mut page = DataPage::new(PageId::new(1));
        assert!(!page.needs_compact());

        let data = vec![b'0'; 100];
        let mut slots = Vec::new();
        for i in 0..10u32 {
            slots.push(page.insert_record(i, &data, 1).unwrap());
        }
        assert!(!page.needs_compact());

        for i in (0..slots.len()).step_by(2) {
            assert!(page.delete_record(slots[i]));
        }
        assert!(page.needs_compact());
    }

    #[test]
    fn test_compact_preserves_live_records() {
        let mut page = DataPage::new(PageId::new(1));

        let data = vec![b'7'; 100];
        let mut slots = Vec::new();
        for i in 0..10u32 {
            slots.push(page.insert_record(i, &data, 1).unwrap());
        }

        for i in (0..slots.len()).step_by(2) {
            assert!(page.delete_record(slots[i]));
        }

        let free_before = page.free_space();
        let freed = page.compact();
        assert!(freed > 0);
        assert_eq!(page.free_space(), free_before + freed);

        for i in (1..slots.len()).step_by(2) {
            let record = page.get_record(slots[i]).unwrap();
            assert_eq!(record, data.as_slice());
        }

        // Tombstoned slots stay in the array.
        assert_eq!(page.slot_count(), 10);
        assert_eq!(page.item_count(), 5);
        assert_free_space_consistent(&page);
    }

    #[test]
    fn test_compact_is_idempotent() {
        let mut page = DataPage::new(PageId::new(1));

        let data = vec![b'x'; 50];
        for i in 0..6u32 {
            page.insert_record(i, &data, 1).unwrap();
        }
        page.delete_record(1);
        page.delete_record(3);

        assert!(page.compact() > 0);
        let snapshot = *page.as_bytes();
        assert_eq!(page.compact(), 0);
        assert_eq!(*page.as_bytes(), snapshot);
    }

    #[test]
    fn test_compact_rebuilds_chain_in_slot_order() {
        let mut page = DataPage::new(PageId::new(1));

        let data = vec![b'x'; 20];
        let mut slots = Vec::new();
        for i in 0..5u32 {
            slots.push(page.insert_record(i, &data, 1).unwrap());
        }

        // Delete out of order: chain is 0 -> 4 -> 2 before compaction.
        page.delete_record(slots[2]);
        page.delete_record(slots[4]);
        page.delete_record(slots[0]);

        page.compact();

        // Afterwards the chain hands out tombstones in ascending order
        // and terminates cleanly.
        assert_eq!(page.first_free_slot(), 0);
        assert_eq!(page.insert_record(10, b"a", 1), Some(0));
        assert_eq!(page.insert_record(11, b"b", 1), Some(2));
        assert_eq!(page.insert_record(12, b"c", 1), Some(4));
        assert_eq!(page.insert_record(13, b"d", 1), Some(5));
    }

    #[test]
    fn test_empty_record() {
        let mut page = DataPage::new(PageId::new(1));

        let slot = page.insert_record(1, b"", 1).unwrap();
        assert_eq!(page.get_record(slot).unwrap(), b"");
    }

    #[test]
    fn test_fill_until_full() {
        let mut page = DataPage::new(PageId::new(1));
        let data = vec![b'0'; 200];

        let mut count = 0u32;
        while page.insert_record(count, &data, 1).is_some() {
            count += 1;
        }

        assert!(count > 0);
        assert_eq!(page.insert_record(count, &data, 1), None);
        assert_free_space_consistent(&page);
    }

    #[test]
    fn test_image_round_trip() {
        let mut page = DataPage::new(PageId::new(3));
        page.insert_record(1, b"persist me", 9).unwrap();

        let restored = DataPage::from_image(page.as_bytes());
        assert_eq!(restored.id(), PageId::new(3));
        let slot = restored.get_slot_id(1).unwrap();
        assert_eq!(restored.get_record(slot).unwrap(), b"persist me");
        assert_eq!(restored.get_record_type(slot), Some(9));
    }
}
