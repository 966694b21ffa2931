//! Page buffer ownership and the typed page variant.
//!
//! Every page owns exactly one aligned, fixed-size byte buffer. The
//! buffer moves with the page and is released exactly once; pages are
//! never copied. The [`Page`] enum is the tagged variant keyed by the
//! type byte: fetching from disk dispatches on that byte, so no
//! run-time casting is ever needed.

use quartz_common::types::PageId;

use super::data::DataPage;
use super::index::IndexPage;
use super::types::PageType;
use super::PAGE_SIZE;

/// 64-byte-aligned backing store for one page.
#[repr(C, align(64))]
pub(crate) struct AlignedBytes(pub(crate) [u8; PAGE_SIZE]);

/// Owned, aligned, zero-initialized page buffer.
pub(crate) struct PageBuf {
    data: Box<AlignedBytes>,
}

impl PageBuf {
    /// Allocates a zero-filled page buffer.
    pub(crate) fn zeroed() -> Self {
        Self {
            data: Box::new(AlignedBytes([0u8; PAGE_SIZE])),
        }
    }

    /// Returns the buffer contents.
    #[inline]
    pub(crate) fn bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data.0
    }

    /// Returns the buffer contents mutably.
    #[inline]
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data.0
    }
}

impl std::fmt::Debug for PageBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBuf").field("len", &PAGE_SIZE).finish()
    }
}

/// A typed database page.
///
/// The variant matches the type byte at offset 0 of the buffer. Common
/// header accessors delegate to the variant; payload operations live
/// on [`DataPage`] and [`IndexPage`] directly.
#[derive(Debug)]
pub enum Page {
    /// Slotted record page.
    Data(DataPage),
    /// B+tree index node.
    Index(IndexPage),
}

impl Page {
    /// Materializes a typed page from a raw 4096-byte disk image.
    ///
    /// Dispatches on the type byte, constructs the matching variant,
    /// then overwrites the fresh page's entire buffer with the image.
    /// Returns `None` for any type that cannot live in memory
    /// (`Invalid`, `Special`, or an unrecognized byte).
    pub fn from_disk_image(image: &[u8; PAGE_SIZE]) -> Option<Self> {
        match PageType::from_u8(image[0])? {
            PageType::Data => Some(Page::Data(DataPage::from_image(image))),
            PageType::Index => Some(Page::Index(IndexPage::from_image(image))),
            _ => None,
        }
    }

    /// Returns the page type.
    #[inline]
    pub fn page_type(&self) -> PageType {
        match self {
            Page::Data(_) => PageType::Data,
            Page::Index(_) => PageType::Index,
        }
    }

    /// Returns the page ID.
    #[inline]
    pub fn id(&self) -> PageId {
        match self {
            Page::Data(p) => p.id(),
            Page::Index(p) => p.id(),
        }
    }

    /// Returns the reserved log sequence number (always 0 in this core).
    #[inline]
    pub fn lsn(&self) -> u32 {
        match self {
            Page::Data(p) => p.lsn(),
            Page::Index(p) => p.lsn(),
        }
    }

    /// Returns the free space left in the payload region.
    #[inline]
    pub fn free_space(&self) -> u16 {
        match self {
            Page::Data(p) => p.free_space(),
            Page::Index(p) => p.free_space(),
        }
    }

    /// Returns the logical live-item count.
    #[inline]
    pub fn item_count(&self) -> u16 {
        match self {
            Page::Data(p) => p.item_count(),
            Page::Index(p) => p.item_count(),
        }
    }

    /// Returns true if at least `needed` bytes of free space remain.
    #[inline]
    pub fn has_space(&self, needed: u16) -> bool {
        self.free_space() >= needed
    }

    /// Returns the full 4096-byte on-disk representation.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        match self {
            Page::Data(p) => p.as_bytes(),
            Page::Index(p) => p.as_bytes(),
        }
    }

    /// Returns the data page view, if this is a data page.
    #[inline]
    pub fn as_data(&self) -> Option<&DataPage> {
        match self {
            Page::Data(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the mutable data page view, if this is a data page.
    #[inline]
    pub fn as_data_mut(&mut self) -> Option<&mut DataPage> {
        match self {
            Page::Data(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the index page view, if this is an index page.
    #[inline]
    pub fn as_index(&self) -> Option<&IndexPage> {
        match self {
            Page::Index(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the mutable index page view, if this is an index page.
    #[inline]
    pub fn as_index_mut(&mut self) -> Option<&mut IndexPage> {
        match self {
            Page::Index(p) => Some(p),
            _ => None,
        }
    }
}

impl From<DataPage> for Page {
    fn from(page: DataPage) -> Self {
        Page::Data(page)
    }
}

impl From<IndexPage> for Page {
    fn from(page: IndexPage) -> Self {
        Page::Index(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quartz_common::constants::PAGE_ALIGN;

    #[test]
    fn test_buffer_alignment() {
        let buf = PageBuf::zeroed();
        assert_eq!(buf.bytes().as_ptr() as usize % PAGE_ALIGN, 0);
        assert_eq!(std::mem::align_of::<AlignedBytes>(), PAGE_ALIGN);
    }

    #[test]
    fn test_buffer_zero_filled() {
        let buf = PageBuf::zeroed();
        assert!(buf.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_buffer_moves() {
        let mut buf = PageBuf::zeroed();
        buf.bytes_mut()[100] = 0xAB;
        let addr = buf.bytes().as_ptr();

        // A move transfers the heap allocation, not the contents.
        let moved = buf;
        assert_eq!(moved.bytes().as_ptr(), addr);
        assert_eq!(moved.bytes()[100], 0xAB);
    }

    #[test]
    fn test_enum_delegation() {
        let page: Page = DataPage::new(PageId::new(5)).into();
        assert_eq!(page.page_type(), PageType::Data);
        assert_eq!(page.id(), PageId::new(5));
        assert_eq!(page.lsn(), 0);
        assert_eq!(page.item_count(), 0);
        assert!(page.as_data().is_some());
        assert!(page.as_index().is_none());

        let page: Page = IndexPage::new(PageId::new(6), true, 0).into();
        assert_eq!(page.page_type(), PageType::Index);
        assert!(page.as_index().is_some());
        assert!(page.as_data().is_none());
    }

    #[test]
    fn test_from_disk_image_dispatch() {
        let data_page = DataPage::new(PageId::new(9));
        let restored = Page::from_disk_image(data_page.as_bytes()).unwrap();
        assert_eq!(restored.page_type(), PageType::Data);
        assert_eq!(restored.id(), PageId::new(9));

        let index_page = IndexPage::new(PageId::new(10), false, 2);
        let restored = Page::from_disk_image(index_page.as_bytes()).unwrap();
        let node = restored.as_index().unwrap();
        assert!(!node.is_leaf());
        assert_eq!(node.level(), 2);
    }

    #[test]
    fn test_from_disk_image_rejects_unknown_types() {
        let mut image = [0u8; PAGE_SIZE];
        assert!(Page::from_disk_image(&image).is_none()); // Invalid

        image[0] = PageType::Special as u8;
        assert!(Page::from_disk_image(&image).is_none());

        image[0] = 0x42;
        assert!(Page::from_disk_image(&image).is_none());
    }

    #[test]
    fn test_has_space() {
        let page: Page = DataPage::new(PageId::new(1)).into();
        let free = page.free_space();
        assert!(page.has_space(free));
        assert!(!page.has_space(free + 1));
    }
}
