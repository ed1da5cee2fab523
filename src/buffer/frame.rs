//! Frame - a physical slot in a pool instance.
//!
//! A [`Frame`] holds a [`Page`] plus the metadata the pool needs:
//! - Which page is loaded ([`PageId::INVALID`] if none)
//! - Pin count
//! - Dirty flag

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::Page;

/// A frame in the buffer pool.
///
/// Frames are allocated once when the instance is built and never move;
/// only the page they hold changes. A `&Frame` returned by the pool is the
/// caller's handle to a pinned page.
///
/// # Thread Safety
/// - `page`: `RwLock`, the latch callers take to read or write bytes
/// - `page_id`, `pin_count`, `is_dirty`: atomics, written only by the pool
///   while it holds the instance lock, readable by anyone
pub struct Frame {
    page: RwLock<Page>,
    page_id: AtomicI32,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
}

impl Frame {
    /// Create a new empty frame.
    pub(crate) fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            page_id: AtomicI32::new(PageId::INVALID.0),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Page access
    // ========================================================================

    /// Acquire the shared latch on the page bytes.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire the exclusive latch on the page bytes.
    ///
    /// Writers must report the change by unpinning with `is_dirty = true`.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    // ========================================================================
    // Metadata (read side is public)
    // ========================================================================

    /// Page held by this frame, or [`PageId::INVALID`].
    #[inline]
    pub fn page_id(&self) -> PageId {
        PageId(self.page_id.load(Ordering::Acquire))
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    /// No page loaded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.page_id().is_valid()
    }

    // ========================================================================
    // Mutation (pool only)
    // ========================================================================

    #[inline]
    pub(crate) fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id.0, Ordering::Release);
    }

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub(crate) fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the pin count, floored at zero.
    ///
    /// Returns the new count, or `None` if the count was already zero.
    #[inline]
    pub(crate) fn unpin(&self) -> Option<u32> {
        self.pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            })
            .ok()
            .map(|old| old - 1)
    }

    /// OR `dirty` into the dirty flag.
    #[inline]
    pub(crate) fn mark_dirty(&self, dirty: bool) {
        if dirty {
            self.is_dirty.store(true, Ordering::Release);
        }
    }

    #[inline]
    pub(crate) fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Release);
    }

    /// Install a freshly loaded page: pinned once, clean.
    pub(crate) fn install(&self, page_id: PageId) {
        self.set_page_id(page_id);
        self.pin_count.store(1, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
    }

    /// Zero the bytes and forget the page. Back to the free state.
    pub(crate) fn reset(&self) {
        self.page_mut().reset();
        self.set_page_id(PageId::INVALID);
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("page_id", &self.page_id())
            .field("pin_count", &self.pin_count())
            .field("is_dirty", &self.is_dirty())
            .finish()
    }
}
