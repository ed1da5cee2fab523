//! RAII guards over pinned, latched pages.
//!
//! - [`PageReadGuard`] - shared latch, unpins clean on drop
//! - [`PageWriteGuard`] - exclusive latch, unpins dirty on drop
//!
//! On drop the latch is released before the pin, so a frame is never
//! unpinned to zero while still latched. The holder of a guard may fetch
//! other pages; flushes wait for the latch without holding the pool lock.

use std::ops::{Deref, DerefMut};

use log::warn;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::buffer_pool_instance::BufferPoolInstance;
use crate::common::PageId;
use crate::storage::{DiskManager, Page};

/// Returns one pin to the pool when dropped.
struct PinRelease<'a, D: DiskManager> {
    pool: &'a BufferPoolInstance<D>,
    page_id: PageId,
    dirty: bool,
}

impl<D: DiskManager> Drop for PinRelease<'_, D> {
    fn drop(&mut self) {
        if let Err(err) = self.pool.unpin_page(self.page_id, self.dirty) {
            warn!("page guard failed to unpin {}: {}", self.page_id, err);
        }
    }
}

/// Shared access to a pinned page.
///
/// # Example
/// ```
/// use shardpool::{BufferPoolInstance, MemoryDiskManager};
///
/// let pool = BufferPoolInstance::new(4, MemoryDiskManager::new());
/// let page_id = pool.new_page_guarded().unwrap().page_id();
///
/// let guard = pool.fetch_page_read(page_id).unwrap();
/// assert_eq!(guard.as_slice()[0], 0);
/// assert_eq!(pool.get_pin_count(page_id), Some(1));
/// drop(guard);
/// assert_eq!(pool.get_pin_count(page_id), Some(0));
/// ```
pub struct PageReadGuard<'a, D: DiskManager> {
    // Declared before `pin`: fields drop in order, latch first.
    latch: RwLockReadGuard<'a, Page>,
    pin: PinRelease<'a, D>,
}

impl<'a, D: DiskManager> PageReadGuard<'a, D> {
    pub(crate) fn new(
        pool: &'a BufferPoolInstance<D>,
        page_id: PageId,
        latch: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            latch,
            pin: PinRelease {
                pool,
                page_id,
                dirty: false,
            },
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }
}

impl<D: DiskManager> Deref for PageReadGuard<'_, D> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.latch
    }
}

/// Exclusive access to a pinned page. The page is reported dirty when the
/// guard drops.
pub struct PageWriteGuard<'a, D: DiskManager> {
    latch: RwLockWriteGuard<'a, Page>,
    pin: PinRelease<'a, D>,
}

impl<'a, D: DiskManager> PageWriteGuard<'a, D> {
    pub(crate) fn new(
        pool: &'a BufferPoolInstance<D>,
        page_id: PageId,
        latch: RwLockWriteGuard<'a, Page>,
    ) -> Self {
        Self {
            latch,
            pin: PinRelease {
                pool,
                page_id,
                dirty: true,
            },
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }
}

impl<D: DiskManager> Deref for PageWriteGuard<'_, D> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.latch
    }
}

impl<D: DiskManager> DerefMut for PageWriteGuard<'_, D> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.latch
    }
}
