//! Common page header format.
//!
//! Every page starts with the same 13-byte header.
//!
//! # Header Layout (13 bytes, packed)
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//!   0       1   type
//!   1       4   page_id
//!   5       4   lsn (reserved; always 0 in this core)
//!   9       2   free_space
//!  11       2   item_count
//! ```

use quartz_common::types::PageId;

use super::types::PageType;
use super::PAGE_HEADER_SIZE;

const TYPE_OFFSET: usize = 0;
const PAGE_ID_OFFSET: usize = 1;
const LSN_OFFSET: usize = 5;
const FREE_SPACE_OFFSET: usize = 9;
const ITEM_COUNT_OFFSET: usize = 11;

/// Mutable view into the first 13 bytes of a page buffer.
///
/// Provides read/write access to the common header fields; the typed
/// page wrappers use it for everything below their extended headers.
#[derive(Debug)]
pub struct PageHeader<'a> {
    data: &'a mut [u8],
}

impl<'a> PageHeader<'a> {
    /// Creates a new PageHeader view into the given buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is smaller than PAGE_HEADER_SIZE.
    #[inline]
    pub fn new(data: &'a mut [u8]) -> Self {
        assert!(
            data.len() >= PAGE_HEADER_SIZE,
            "buffer too small for page header"
        );
        Self { data }
    }

    /// Initializes the header for a fresh page.
    pub fn initialize(&mut self, page_id: PageId, page_type: PageType, free_space: u16) {
        self.set_page_type(page_type);
        self.set_page_id(page_id);
        self.set_lsn(0);
        self.set_free_space(free_space);
        self.set_item_count(0);
    }

    /// Returns the page type byte, decoded.
    #[inline]
    pub fn page_type(&self) -> Option<PageType> {
        PageType::from_u8(self.data[TYPE_OFFSET])
    }

    /// Sets the page type.
    #[inline]
    pub fn set_page_type(&mut self, page_type: PageType) {
        self.data[TYPE_OFFSET] = page_type as u8;
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        let bytes: [u8; 4] = self.data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4]
            .try_into()
            .unwrap();
        PageId::from_le_bytes(bytes)
    }

    /// Sets the page ID.
    #[inline]
    pub fn set_page_id(&mut self, page_id: PageId) {
        self.data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4].copy_from_slice(&page_id.to_le_bytes());
    }

    /// Returns the LSN (reserved, always 0 in this core).
    #[inline]
    pub fn lsn(&self) -> u32 {
        let bytes: [u8; 4] = self.data[LSN_OFFSET..LSN_OFFSET + 4].try_into().unwrap();
        u32::from_le_bytes(bytes)
    }

    /// Sets the LSN.
    #[inline]
    pub fn set_lsn(&mut self, lsn: u32) {
        self.data[LSN_OFFSET..LSN_OFFSET + 4].copy_from_slice(&lsn.to_le_bytes());
    }

    /// Returns the free space in the payload region.
    #[inline]
    pub fn free_space(&self) -> u16 {
        let bytes: [u8; 2] = self.data[FREE_SPACE_OFFSET..FREE_SPACE_OFFSET + 2]
            .try_into()
            .unwrap();
        u16::from_le_bytes(bytes)
    }

    /// Sets the free space.
    #[inline]
    pub fn set_free_space(&mut self, free_space: u16) {
        self.data[FREE_SPACE_OFFSET..FREE_SPACE_OFFSET + 2]
            .copy_from_slice(&free_space.to_le_bytes());
    }

    /// Returns the logical live-item count.
    #[inline]
    pub fn item_count(&self) -> u16 {
        let bytes: [u8; 2] = self.data[ITEM_COUNT_OFFSET..ITEM_COUNT_OFFSET + 2]
            .try_into()
            .unwrap();
        u16::from_le_bytes(bytes)
    }

    /// Sets the item count.
    #[inline]
    pub fn set_item_count(&mut self, count: u16) {
        self.data[ITEM_COUNT_OFFSET..ITEM_COUNT_OFFSET + 2].copy_from_slice(&count.to_le_bytes());
    }
}

/// Read-only page header view.
#[derive(Debug)]
pub struct PageHeaderRef<'a> {
    data: &'a [u8],
}

impl<'a> PageHeaderRef<'a> {
    /// Creates a new read-only PageHeader view.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is smaller than PAGE_HEADER_SIZE.
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        assert!(
            data.len() >= PAGE_HEADER_SIZE,
            "buffer too small for page header"
        );
        Self { data }
    }

    /// Returns the page type byte, decoded.
    #[inline]
    pub fn page_type(&self) -> Option<PageType> {
        PageType::from_u8(self.data[TYPE_OFFSET])
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        let bytes: [u8; 4] = self.data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4]
            .try_into()
            .unwrap();
        PageId::from_le_bytes(bytes)
    }

    /// Returns the LSN.
    #[inline]
    pub fn lsn(&self) -> u32 {
        let bytes: [u8; 4] = self.data[LSN_OFFSET..LSN_OFFSET + 4].try_into().unwrap();
        u32::from_le_bytes(bytes)
    }

    /// Returns the free space.
    #[inline]
    pub fn free_space(&self) -> u16 {
        let bytes: [u8; 2] = self.data[FREE_SPACE_OFFSET..FREE_SPACE_OFFSET + 2]
            .try_into()
            .unwrap();
        u16::from_le_bytes(bytes)
    }

    /// Returns the item count.
    #[inline]
    pub fn item_count(&self) -> u16 {
        let bytes: [u8; 2] = self.data[ITEM_COUNT_OFFSET..ITEM_COUNT_OFFSET + 2]
            .try_into()
            .unwrap();
        u16::from_le_bytes(bytes)
    }
}
