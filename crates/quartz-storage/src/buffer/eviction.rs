//! Page replacement policies.
//!
//! The buffer pool selects eviction victims through the [`Replacer`]
//! trait, so the policy can be swapped without touching the pool. The
//! provided [`LruReplacer`] evicts the frame that was unpinned least
//! recently, using a doubly-linked list indexed by a hash map for O(1)
//! insertion, deletion by id, and victim extraction.

use std::collections::HashMap;
use std::ptr::NonNull;

use parking_lot::Mutex;

use super::frame::FrameId;

/// Tracks which frames are eviction candidates.
///
/// Implementations are internally synchronized: the pool calls them
/// under its own lock today, but their invariants must not depend on
/// that.
pub trait Replacer: Send {
    /// Removes a frame from candidacy. Idempotent.
    fn pin(&self, frame_id: FrameId);

    /// Records that a frame became unpinned, making it the
    /// most-recently-used candidate. Any stale entry is replaced.
    fn unpin(&self, frame_id: FrameId);

    /// Pops and returns the best eviction candidate, or `None` when
    /// there are no candidates.
    fn victim(&self) -> Option<FrameId>;

    /// Returns the number of current candidates.
    fn len(&self) -> usize;

    /// Returns true if there are no candidates.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A node in the LRU linked list.
struct Node {
    frame_id: FrameId,
    prev: Option<NonNull<Node>>,
    next: Option<NonNull<Node>>,
}

/// List and index, guarded together by the replacer's mutex.
struct LruInner {
    /// Map from frame id to its node.
    map: HashMap<FrameId, NonNull<Node>>,
    /// Most recently unpinned end.
    head: Option<NonNull<Node>>,
    /// Least recently unpinned end - the next victim.
    tail: Option<NonNull<Node>>,
}

/// LRU replacement policy.
///
/// `victim()` returns frames in the order they were last unpinned,
/// oldest first.
pub struct LruReplacer {
    inner: Mutex<LruInner>,
}

// Safety: the raw node pointers are owned exclusively by LruInner and
// only ever dereferenced under the mutex.
unsafe impl Send for LruReplacer {}
unsafe impl Sync for LruReplacer {}

impl LruReplacer {
    /// Creates an empty LRU replacer.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LruInner {
                map: HashMap::new(),
                head: None,
                tail: None,
            }),
        }
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Replacer for LruReplacer {
    fn pin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();

        if let Some(node) = inner.map.remove(&frame_id) {
            inner.unlink(node);
            // Safety: removed from the map, so we hold the only pointer.
            drop(unsafe { Box::from_raw(node.as_ptr()) });
        }
    }

    fn unpin(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();

        // Re-unpinning moves the frame to the most-recently-used end.
        if let Some(node) = inner.map.remove(&frame_id) {
            inner.unlink(node);
            drop(unsafe { Box::from_raw(node.as_ptr()) });
        }

        let node = Box::new(Node {
            frame_id,
            prev: None,
            next: None,
        });
        let node = NonNull::from(Box::leak(node));

        inner.push_front(node);
        inner.map.insert(frame_id, node);
    }

    fn victim(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock();

        let tail = inner.tail?;
        inner.unlink(tail);
        // Safety: unlinked and about to be removed from the map.
        let node = unsafe { Box::from_raw(tail.as_ptr()) };
        inner.map.remove(&node.frame_id);

        Some(node.frame_id)
    }

    fn len(&self) -> usize {
        self.inner.lock().map.len()
    }
}

impl LruInner {
    /// Pushes a node to the most-recently-used end.
    fn push_front(&mut self, mut node: NonNull<Node>) {
        unsafe {
            node.as_mut().prev = None;
            node.as_mut().next = self.head;

            if let Some(mut head) = self.head {
                head.as_mut().prev = Some(node);
            }

            self.head = Some(node);

            if self.tail.is_none() {
                self.tail = Some(node);
            }
        }
    }

    /// Unlinks a node from the list without freeing it.
    fn unlink(&mut self, node: NonNull<Node>) {
        unsafe {
            let prev = node.as_ref().prev;
            let next = node.as_ref().next;

            match prev {
                Some(mut prev) => prev.as_mut().next = next,
                None => self.head = next,
            }

            match next {
                Some(mut next) => next.as_mut().prev = prev,
                None => self.tail = prev,
            }
        }
    }
}

impl Drop for LruReplacer {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        let mut current = inner.head.take();
        inner.tail = None;
        inner.map.clear();

        while let Some(node) = current {
            unsafe {
                current = node.as_ref().next;
                drop(Box::from_raw(node.as_ptr()));
            }
        }
    }
}

impl std::fmt::Debug for LruReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruReplacer")
            .field("candidates", &self.len())
            .finish()
    }
}
