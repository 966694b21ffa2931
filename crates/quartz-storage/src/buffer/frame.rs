//! Buffer frame - a slot in the buffer pool that holds one page.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use quartz_common::types::PageId;

use crate::page::Page;

/// Frame identifier - index into the buffer pool's frame array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Creates a new frame ID.
    #[inline]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the raw index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for FrameId {
    fn from(id: usize) -> Self {
        Self::new(id)
    }
}

impl From<FrameId> for usize {
    fn from(id: FrameId) -> Self {
        id.0
    }
}

/// A buffer frame holds at most one page in memory.
///
/// Each frame carries a pin count (references preventing eviction) and
/// a dirty bit (page modified since its last flush). The pin count and
/// dirty bit are atomics so a pinned caller can inspect them without
/// taking the pool lock; all state transitions happen under it.
#[derive(Debug)]
pub struct Frame {
    /// Frame ID (index in the frame array).
    frame_id: FrameId,
    /// The resident page, if any.
    page: RwLock<Option<Page>>,
    /// Number of active references.
    pin_count: AtomicU32,
    /// Whether the page was modified since the last flush.
    dirty: AtomicBool,
}

impl Frame {
    /// Creates a new empty frame.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page: RwLock::new(None),
            pin_count: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
        }
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the resident page's ID, or `None` for an empty frame.
    pub fn page_id(&self) -> Option<PageId> {
        self.page.read().as_ref().map(|page| page.id())
    }

    /// Returns true if no page is resident.
    pub fn is_empty(&self) -> bool {
        self.page.read().is_none()
    }

    /// Installs a page into the frame, clearing pin count and dirty bit.
    pub fn install(&self, page: Page) {
        *self.page.write() = Some(page);
        self.pin_count.store(0, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
    }

    /// Returns the frame to the empty state.
    pub fn reset(&self) {
        *self.page.write() = None;
        self.pin_count.store(0, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
    }

    /// Returns the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the new value.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count, saturating at zero, and returns the
    /// new value.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let previous = self
            .pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            });

        match previous {
            Ok(count) => count - 1,
            Err(_) => 0,
        }
    }

    /// Returns true if the frame is pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Returns true if the frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Marks the frame dirty.
    #[inline]
    pub fn mark(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clears the dirty bit.
    #[inline]
    pub fn unmark(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// Returns a read lock on the page slot.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, Option<Page>> {
        self.page.read()
    }

    /// Returns a write lock on the page slot.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, Option<Page>> {
        self.page.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::DataPage;

    #[test]
    fn test_new_frame_is_empty() {
        let frame = Frame::new(FrameId::new(0));
        assert_eq!(frame.frame_id().index(), 0);
        assert!(frame.is_empty());
        assert_eq!(frame.page_id(), None);
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_pin_unpin() {
        let frame = Frame::new(FrameId::new(0));

        assert_eq!(frame.pin(), 1);
        assert_eq!(frame.pin(), 2);
        assert!(frame.is_pinned());

        assert_eq!(frame.unpin(), 1);
        assert_eq!(frame.unpin(), 0);
        assert!(!frame.is_pinned());
    }

    #[test]
    fn test_unpin_saturates_at_zero() {
        let frame = Frame::new(FrameId::new(0));
        assert_eq!(frame.unpin(), 0);
        assert_eq!(frame.unpin(), 0);
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_dirty_flag() {
        let frame = Frame::new(FrameId::new(0));

        frame.mark();
        assert!(frame.is_dirty());
        frame.unmark();
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_install_and_reset() {
        let frame = Frame::new(FrameId::new(0));
        frame.pin();
        frame.mark();

        frame.install(Page::Data(DataPage::new(PageId::new(42))));
        assert!(!frame.is_empty());
        assert_eq!(frame.page_id(), Some(PageId::new(42)));
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());

        frame.pin();
        frame.mark();
        frame.reset();
        assert!(frame.is_empty());
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_page_access() {
        let frame = Frame::new(FrameId::new(0));
        frame.install(Page::Data(DataPage::new(PageId::new(1))));

        {
            let mut guard = frame.write();
            let page = guard.as_mut().unwrap().as_data_mut().unwrap();
            page.insert_record(1, b"hello", 1).unwrap();
        }

        let guard = frame.read();
        let page = guard.as_ref().unwrap().as_data().unwrap();
        let slot = page.get_slot_id(1).unwrap();
        assert_eq!(page.get_record(slot).unwrap(), b"hello");
    }

    #[test]
    fn test_frame_id_conversions() {
        assert_eq!(FrameId::from(7usize).index(), 7);
        assert_eq!(usize::from(FrameId::new(9)), 9);
    }
}
