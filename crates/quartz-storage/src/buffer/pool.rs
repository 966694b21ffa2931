//! Buffer pool implementation.
//!
//! The pool owns the disk manager and a fixed array of frames. One
//! mutex guards the page table, the replacer, and all disk I/O for the
//! entire duration of every public operation; the frames themselves
//! are shared so pinned callers keep their pages addressable outside
//! the lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLockReadGuard, RwLockWriteGuard};
use quartz_common::types::PageId;
use tracing::{debug, error, warn};

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::eviction::{LruReplacer, Replacer};
use super::frame::{Frame, FrameId};
use super::BufferPoolStats;
use crate::disk::DiskManager;
use crate::page::{DataPage, IndexPage, Page, PageType};

/// Re-exported mapped guard type for page reads.
pub type PageReadGuard<'a> = parking_lot::MappedRwLockReadGuard<'a, Page>;
/// Re-exported mapped guard type for page writes.
pub type PageWriteGuard<'a> = parking_lot::MappedRwLockWriteGuard<'a, Page>;

/// A reference to a page resident in the buffer pool.
///
/// The handle stays valid while the caller holds the pin it was issued
/// with; every `fetch_page`/`create_page` must be paired with exactly
/// one [`BufferPool::unpin_page`]. Dropping the handle does not unpin.
pub struct PageHandle {
    frame: Arc<Frame>,
    page_id: PageId,
}

impl PageHandle {
    /// Returns the page ID this handle refers to.
    #[inline]
    pub fn id(&self) -> PageId {
        self.page_id
    }

    /// Locks the page for reading.
    ///
    /// # Panics
    ///
    /// Panics if the page was evicted, which can only happen after the
    /// caller released its pin.
    pub fn read(&self) -> PageReadGuard<'_> {
        RwLockReadGuard::map(self.frame.read(), |slot| {
            slot.as_ref().expect("page handle used after unpin and eviction")
        })
    }

    /// Locks the page for writing.
    ///
    /// Callers report modifications through the `is_dirty` argument of
    /// [`BufferPool::unpin_page`].
    ///
    /// # Panics
    ///
    /// Panics if the page was evicted, which can only happen after the
    /// caller released its pin.
    pub fn write(&self) -> PageWriteGuard<'_> {
        RwLockWriteGuard::map(self.frame.write(), |slot| {
            slot.as_mut().expect("page handle used after unpin and eviction")
        })
    }
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("page_id", &self.page_id)
            .finish()
    }
}

/// State behind the pool mutex.
struct PoolState {
    /// Page table: maps resident page IDs to frame indices.
    page_table: HashMap<PageId, FrameId>,
    /// Replacement policy tracking unpinned resident frames.
    replacer: Box<dyn Replacer>,
    /// Owned disk manager; all I/O happens under the pool lock.
    disk: DiskManager,
}

/// The buffer pool: a bounded cache of disk pages with pin/unpin
/// semantics.
pub struct BufferPool {
    /// Fixed array of frames, shared with outstanding handles.
    frames: Vec<Arc<Frame>>,
    /// Everything the single pool mutex protects.
    state: Mutex<PoolState>,
    /// Fetch counter for statistics.
    fetch_count: AtomicU64,
    /// Hit counter for statistics.
    hit_count: AtomicU64,
    /// Miss counter for statistics.
    miss_count: AtomicU64,
    /// Eviction counter for statistics.
    eviction_count: AtomicU64,
    /// Flush counter for statistics.
    flush_count: AtomicU64,
}

impl BufferPool {
    /// Creates a buffer pool over `disk` with the LRU policy.
    pub fn new(disk: DiskManager, config: BufferPoolConfig) -> BufferResult<Self> {
        Self::with_replacer(disk, config, Box::new(LruReplacer::new()))
    }

    /// Creates a buffer pool with a caller-provided replacement policy.
    pub fn with_replacer(
        disk: DiskManager,
        config: BufferPoolConfig,
        replacer: Box<dyn Replacer>,
    ) -> BufferResult<Self> {
        config.validate().map_err(BufferError::config)?;

        let frames = (0..config.pool_size)
            .map(|i| Arc::new(Frame::new(FrameId::new(i))))
            .collect();

        debug!("initialized buffer pool with {} frames", config.pool_size);
        Ok(Self {
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(config.pool_size),
                replacer,
                disk,
            }),
            fetch_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        })
    }

    /// Fetches a page by ID, reading it from disk on a miss.
    ///
    /// The returned handle carries one pin attributed to the caller.
    pub fn fetch_page(&self, page_id: PageId) -> BufferResult<PageHandle> {
        let mut state = self.state.lock();
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        // Resident: pin and remove from eviction candidacy.
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            self.frames[frame_id.index()].pin();
            state.replacer.pin(frame_id);

            debug!("hit on page {page_id} in frame {}", frame_id.index());
            return Ok(self.handle(frame_id, page_id));
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);

        let frame_id = self
            .find_victim(&mut state)
            .ok_or(BufferError::NoFreeFrames)?;

        // Materialize before evicting: a failed read leaves the pool
        // untouched.
        let page = match state.disk.fetch_page(page_id) {
            Ok(page) => page,
            Err(e) => {
                self.restore_candidate(&mut state, frame_id);
                return Err(e.into());
            }
        };

        if let Err(e) = self.evict_frame(&mut state, frame_id) {
            self.restore_candidate(&mut state, frame_id);
            return Err(e);
        }

        let frame = &self.frames[frame_id.index()];
        frame.install(page);
        frame.pin();

        state.page_table.insert(page_id, frame_id);
        state.replacer.pin(frame_id);

        debug!("loaded page {page_id} into frame {}", frame_id.index());
        Ok(self.handle(frame_id, page_id))
    }

    /// Creates a new typed page, pinned and marked dirty.
    ///
    /// `is_leaf` and `level` only apply to index pages. Only `Data`
    /// and `Index` pages can be created.
    pub fn create_page(
        &self,
        page_type: PageType,
        is_leaf: bool,
        level: u16,
    ) -> BufferResult<PageHandle> {
        if !page_type.is_materializable() {
            warn!("cannot create page of type {page_type}");
            return Err(BufferError::InvalidPageType { page_type });
        }

        let mut state = self.state.lock();

        let page_id = state.disk.allocate_page();
        if !page_id.is_valid() {
            error!("page allocation returned the invalid sentinel");
            return Err(BufferError::AllocationFailed);
        }

        let Some(frame_id) = self.find_victim(&mut state) else {
            warn!("no frames available for new page {page_id}");
            let _ = state.disk.deallocate_page(page_id);
            return Err(BufferError::NoFreeFrames);
        };

        if let Err(e) = self.evict_frame(&mut state, frame_id) {
            self.restore_candidate(&mut state, frame_id);
            let _ = state.disk.deallocate_page(page_id);
            return Err(e);
        }

        let page = match page_type {
            PageType::Data => Page::Data(DataPage::new(page_id)),
            PageType::Index => Page::Index(IndexPage::new(page_id, is_leaf, level)),
            _ => unreachable!("validated above"),
        };

        let frame = &self.frames[frame_id.index()];
        frame.install(page);
        frame.pin();
        // A new page has never been written; it must flush on eviction.
        frame.mark();

        state.page_table.insert(page_id, frame_id);
        state.replacer.pin(frame_id);

        debug!(
            "created new {page_type} page {page_id} in frame {}",
            frame_id.index()
        );
        Ok(self.handle(frame_id, page_id))
    }

    /// Deletes a page from the pool and the disk.
    ///
    /// Fails if the page is resident and pinned, or if the disk
    /// manager rejects the deallocation.
    pub fn delete_page(&self, page_id: PageId) -> BufferResult<()> {
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.index()];

            if frame.is_pinned() {
                warn!("cannot delete pinned page {page_id}");
                return Err(BufferError::PagePinned { page_id });
            }

            frame.reset();
            state.page_table.remove(&page_id);
            state.replacer.pin(frame_id);
        }

        state.disk.deallocate_page(page_id)?;

        debug!("deleted page {page_id}");
        Ok(())
    }

    /// Releases one pin on a resident page.
    ///
    /// `is_dirty` only ever sets the frame's dirty bit, never clears
    /// it. The pin count saturates at zero; once it reaches zero the
    /// frame becomes an eviction candidate.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> BufferResult<()> {
        let mut state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            warn!("cannot unpin page {page_id}, not resident");
            return Err(BufferError::PageNotFound { page_id });
        };

        let frame = &self.frames[frame_id.index()];
        frame.unpin();
        if is_dirty {
            frame.mark();
        }

        if !frame.is_pinned() {
            state.replacer.unpin(frame_id);
        }

        debug!("unpinned page {page_id} (dirty: {is_dirty})");
        Ok(())
    }

    /// Writes a resident page back to disk if it is dirty.
    ///
    /// A clean page is a no-op success. The dirty bit is cleared only
    /// after a successful write, so a failed flush retries next time.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<()> {
        let mut state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            warn!("cannot flush page {page_id}, not resident");
            return Err(BufferError::PageNotFound { page_id });
        };

        let frame = &self.frames[frame_id.index()];
        if frame.is_dirty() {
            {
                let guard = frame.read();
                if let Some(page) = guard.as_ref() {
                    state.disk.flush_page(page)?;
                }
            }
            frame.unmark();
            self.flush_count.fetch_add(1, Ordering::Relaxed);
        }

        debug!("flushed page {page_id}");
        Ok(())
    }

    /// Flushes every dirty resident page, tolerating individual
    /// failures.
    pub fn flush_all(&self) {
        let mut state = self.state.lock();
        let PoolState {
            page_table, disk, ..
        } = &mut *state;

        for (&page_id, &frame_id) in page_table.iter() {
            let frame = &self.frames[frame_id.index()];
            if !frame.is_dirty() {
                continue;
            }

            let flushed = {
                let guard = frame.read();
                match guard.as_ref() {
                    Some(page) => match disk.flush_page(page) {
                        Ok(()) => true,
                        Err(e) => {
                            error!("failed to flush page {page_id}: {e}");
                            false
                        }
                    },
                    None => false,
                }
            };

            if flushed {
                frame.unmark();
                self.flush_count.fetch_add(1, Ordering::Relaxed);
            }
        }

        debug!("flushed all pages");
    }

    /// Returns the number of resident pages.
    pub fn size(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Returns true if the page is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Returns the number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Returns a snapshot of the pool counters.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned = 0;
        let mut dirty = 0;

        for frame in &self.frames {
            if frame.is_pinned() {
                pinned += 1;
            }
            if frame.is_dirty() {
                dirty += 1;
            }
        }

        BufferPoolStats {
            fetches: self.fetch_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
            pinned_frames: pinned,
            dirty_frames: dirty,
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    fn handle(&self, frame_id: FrameId, page_id: PageId) -> PageHandle {
        PageHandle {
            frame: Arc::clone(&self.frames[frame_id.index()]),
            page_id,
        }
    }

    /// Puts a victim back into the replacer after a failed miss, so a
    /// resident unpinned frame never drops out of candidacy.
    fn restore_candidate(&self, state: &mut PoolState, frame_id: FrameId) {
        let frame = &self.frames[frame_id.index()];
        if !frame.is_empty() && !frame.is_pinned() {
            state.replacer.unpin(frame_id);
        }
    }

    /// Prefers an empty frame, else asks the replacer for its oldest
    /// candidate.
    fn find_victim(&self, state: &mut PoolState) -> Option<FrameId> {
        for frame in &self.frames {
            if frame.is_empty() {
                return Some(frame.frame_id());
            }
        }

        state.replacer.victim()
    }

    /// Clears a frame for reuse, flushing its page first if dirty.
    ///
    /// An empty frame is a success. A pinned frame is an error. If the
    /// flush fails the dirty bit stays set and the frame is untouched.
    fn evict_frame(&self, state: &mut PoolState, frame_id: FrameId) -> BufferResult<()> {
        let frame = &self.frames[frame_id.index()];

        let Some(old_page_id) = frame.page_id() else {
            return Ok(());
        };

        if frame.is_pinned() {
            return Err(BufferError::PagePinned {
                page_id: old_page_id,
            });
        }

        if frame.is_dirty() {
            {
                let guard = frame.read();
                if let Some(page) = guard.as_ref() {
                    state.disk.flush_page(page)?;
                }
            }
            frame.unmark();
            self.flush_count.fetch_add(1, Ordering::Relaxed);
        }

        state.page_table.remove(&old_page_id);
        frame.reset();
        self.eviction_count.fetch_add(1, Ordering::Relaxed);

        debug!("evicted page {old_page_id} from frame {}", frame_id.index());
        Ok(())
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        // Best effort write-back of whatever is still dirty.
        self.flush_all();
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("pool_size", &self.frames.len())
            .field("resident", &self.size())
            .field("stats", &self.stats())
            .finish()
    }
}
