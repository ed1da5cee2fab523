//! Buffer pool instance - one shard of the page cache.
//!
//! The [`BufferPoolInstance`] provides:
//! - Page caching between storage and a fixed set of frames
//! - Pin-count based lifetime of resident pages
//! - Lazy write-back of dirty pages on eviction or explicit flush
//! - LRU eviction of unpinned pages
//! - Page-id allocation striped across sibling shards

use std::collections::HashMap;

use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::buffer::replacer::{LruReplacer, Replacer};
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{BufferPoolConfig, Error, FrameId, PageId, Result};
use crate::storage::{DiskManager, FileDiskManager};

/// Tables guarded by the instance lock.
struct PoolState {
    /// Resident pages.
    page_table: HashMap<PageId, FrameId>,
    /// Frames holding no page, zeroed. Popped from the back.
    free_list: Vec<FrameId>,
    /// Next id to hand out; advances by `num_instances`.
    next_page_id: i64,
}

/// One shard of the buffer pool.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolInstance                       │
/// │  ┌──────────────────────────┐  ┌────────────────────────┐   │
/// │  │ state: Mutex<PoolState>  │  │   frames: Vec<Frame>   │   │
/// │  │  page_table PageId → Fid │─▶│ [F0] [F1] [F2] ...     │   │
/// │  │  free_list  Vec<FrameId> │  └────────────────────────┘   │
/// │  │  next_page_id            │  ┌────────────┐ ┌──────────┐  │
/// │  └──────────────────────────┘  │  replacer  │ │   disk   │  │
/// │                                │ LruReplacer│ │ Mutex<D> │  │
/// │                                └────────────┘ └──────────┘  │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// Fetch, new, unpin, delete and allocate hold the instance lock (`state`)
/// from start to finish, storage I/O included, and are linearizable with
/// each other. Flushes pin the frame under `state`, then release it before
/// taking the page latch, so a flush never waits on a latch while holding
/// the instance lock. The disk manager is a leaf lock.
///
/// Under `state` the pool only latches frames nobody can be holding: free
/// frames, eviction victims and pages being deleted, all of which have a pin
/// count of zero.
///
/// # Latching
/// The `&Frame` handed out by `fetch_page`/`new_page` stays valid while the
/// page is pinned. Callers latch the bytes with [`Frame::page`] or
/// [`Frame::page_mut`] only while holding a pin, and release the latch
/// before their last unpin. While latched they may call back into the pool,
/// including fetching other pages. The guard API
/// ([`fetch_page_read`](Self::fetch_page_read) and friends) does this for you.
///
/// # Sharding
/// With `num_instances = n` and `instance_index = i`, every id produced by
/// `new_page` is `≡ i (mod n)`. Shards share nothing, so they never
/// coordinate; a router only needs [`PageId::shard`].
///
/// # Usage
/// ```
/// use shardpool::{BufferPoolInstance, MemoryDiskManager};
///
/// let pool = BufferPoolInstance::new(2, MemoryDiskManager::new());
///
/// let (page_id, frame) = pool.new_page().unwrap();
/// frame.page_mut().as_mut_slice()[0] = 0xAB;
/// pool.unpin_page(page_id, true).unwrap();
///
/// let frame = pool.fetch_page(page_id).unwrap();
/// assert_eq!(frame.page().as_slice()[0], 0xAB);
/// pool.unpin_page(page_id, false).unwrap();
/// ```
pub struct BufferPoolInstance<D: DiskManager = FileDiskManager> {
    /// Fixed pool of frames allocated at construction.
    frames: Vec<Frame>,

    state: Mutex<PoolState>,

    /// Resident frames with pin count 0, in LRU order.
    replacer: LruReplacer,

    disk_manager: Mutex<D>,

    stats: BufferPoolStats,

    pool_size: usize,
    num_instances: u32,
    instance_index: u32,
}

impl<D: DiskManager> BufferPoolInstance<D> {
    /// Create a standalone instance (a single shard).
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: D) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");
        Self::build(BufferPoolConfig::new(pool_size), disk_manager)
    }

    /// Create one shard of a striped pool.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if the config fails
    /// [`BufferPoolConfig::validate`].
    pub fn with_config(config: BufferPoolConfig, disk_manager: D) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, disk_manager))
    }

    fn build(config: BufferPoolConfig, disk_manager: D) -> Self {
        let pool_size = config.pool_size;
        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();

        // Reversed so that frames are handed out 0, 1, 2, ...
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        debug!(
            "buffer pool instance {}/{} created with {} frames",
            config.instance_index, config.num_instances, pool_size
        );

        Self {
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(pool_size),
                free_list,
                next_page_id: i64::from(config.instance_index),
            }),
            replacer: LruReplacer::new(pool_size),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            pool_size,
            num_instances: config.num_instances,
            instance_index: config.instance_index,
        }
    }

    // ========================================================================
    // Public API: fetch and create
    // ========================================================================

    /// Pin `page_id` in memory, reading it from storage on a miss.
    ///
    /// The returned frame stays resident until the matching `unpin_page`.
    ///
    /// # Errors
    /// - `Error::PoolExhausted` if every frame is pinned
    /// - `Error::InvalidPageId` for the sentinel or negative ids
    /// - storage errors from the read or from writing back a dirty victim
    pub fn fetch_page(&self, page_id: PageId) -> Result<&Frame> {
        let mut state = self.state.lock();
        let frame_id = self.fetch_locked(&mut state, page_id)?;
        Ok(&self.frames[frame_id.0])
    }

    /// Create a zeroed page under a fresh id and pin it.
    ///
    /// Storage is not touched unless a dirty victim has to be written back.
    ///
    /// # Errors
    /// - `Error::PoolExhausted` if every frame is pinned; no id is consumed
    /// - `Error::PageIdsExhausted` once the next id would overflow `i32`
    /// - storage errors from writing back a dirty victim
    pub fn new_page(&self) -> Result<(PageId, &Frame)> {
        let mut state = self.state.lock();

        // Check the id space before touching any frame.
        self.peek_page_id(&state)?;
        let frame_id = self.acquire_frame(&mut state)?;
        let page_id = self.allocate_locked(&mut state)?;

        let frame = &self.frames[frame_id.0];
        frame.install(page_id);
        state.page_table.insert(page_id, frame_id);

        trace!("new {} in {}", page_id, frame_id);
        Ok((page_id, frame))
    }

    // ========================================================================
    // Public API: unpin, flush, delete
    // ========================================================================

    /// Drop one pin on `page_id`, OR-ing `is_dirty` into its dirty flag.
    ///
    /// When the pin count reaches zero the page becomes evictable. Unpinning
    /// a page whose count is already zero is logged and counted, and still
    /// succeeds.
    ///
    /// # Errors
    /// `Error::NotResident` if the page is not in this instance.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let state = self.state.lock();
        let frame_id = Self::lookup(&state, page_id)?;
        let frame = &self.frames[frame_id.0];

        frame.mark_dirty(is_dirty);
        match frame.unpin() {
            Some(0) => self.replacer.unpin(frame_id),
            Some(_) => {}
            None => {
                warn!("unpin of {} with pin count already 0", page_id);
                BufferPoolStats::bump(&self.stats.pin_underflows);
            }
        }
        Ok(())
    }

    /// Write `page_id` to storage whether or not it is dirty, then mark it
    /// clean. Pin state and residency are unchanged once it returns.
    ///
    /// The page is pinned for the duration of the write and waits for its
    /// shared latch without holding the instance lock. A concurrent
    /// `delete_page` of the same page sees it as busy.
    ///
    /// # Errors
    /// - `Error::NotResident` if the page is not in this instance
    /// - storage errors from the write
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = {
            let state = self.state.lock();
            let frame_id = Self::lookup(&state, page_id)?;
            self.pin_frame(frame_id);
            frame_id
        };
        self.flush_pinned(frame_id, page_id)
    }

    /// Flush every page resident when the call starts, pinned or not.
    ///
    /// Pages evicted or deleted before their turn are skipped: eviction
    /// already wrote them back if dirty.
    ///
    /// # Errors
    /// Stops at the first storage error.
    pub fn flush_all_pages(&self) -> Result<()> {
        let resident: Vec<PageId> = self.state.lock().page_table.keys().copied().collect();

        let mut flushed = 0usize;
        for page_id in resident {
            let frame_id = {
                let state = self.state.lock();
                let Some(&frame_id) = state.page_table.get(&page_id) else {
                    continue;
                };
                self.pin_frame(frame_id);
                frame_id
            };
            self.flush_pinned(frame_id, page_id)?;
            flushed += 1;
        }
        debug!("flushed {} pages", flushed);
        Ok(())
    }

    /// Drop `page_id` from the pool and tell storage it may be reclaimed.
    ///
    /// Deleting a page that is not resident succeeds without touching
    /// storage: the id may belong to a sibling shard. The frame goes back on
    /// the free list; the id itself is never handed out again.
    ///
    /// # Errors
    /// - `Error::PageBusy` if the page is pinned
    /// - storage errors from the deallocation
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            trace!("delete of non-resident {} ignored", page_id);
            return Ok(());
        };

        let frame = &self.frames[frame_id.0];
        if frame.is_pinned() {
            return Err(Error::PageBusy(page_id, frame.pin_count()));
        }

        self.disk_manager.lock().deallocate_page(page_id)?;

        state.page_table.remove(&page_id);
        self.replacer.remove(frame_id);
        frame.reset();
        state.free_list.push(frame_id);

        BufferPoolStats::bump(&self.stats.pages_deleted);
        debug!("deleted {} from {}", page_id, frame_id);
        Ok(())
    }

    /// Reserve the next page id of this shard without creating a page.
    ///
    /// The id can later be brought in with `fetch_page`, which reads it
    /// from storage (zeros if it was never written).
    ///
    /// # Errors
    /// `Error::PageIdsExhausted` once the next id would overflow `i32`.
    pub fn allocate_page(&self) -> Result<PageId> {
        let mut state = self.state.lock();
        self.allocate_locked(&mut state)
    }

    // ========================================================================
    // Public API: guarded access
    // ========================================================================

    /// Fetch a page and take its shared latch.
    ///
    /// The guard releases the latch and then unpins (clean) on drop.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_, D>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageReadGuard::new(self, page_id, frame.page()))
    }

    /// Fetch a page and take its exclusive latch.
    ///
    /// The guard releases the latch and then unpins (dirty) on drop.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_, D>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageWriteGuard::new(self, page_id, frame.page_mut()))
    }

    /// Create a page and take its exclusive latch.
    pub fn new_page_guarded(&self) -> Result<PageWriteGuard<'_, D>> {
        let (page_id, frame) = self.new_page()?;
        Ok(PageWriteGuard::new(self, page_id, frame.page_mut()))
    }

    // ========================================================================
    // Public API: introspection
    // ========================================================================

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn num_instances(&self) -> u32 {
        self.num_instances
    }

    pub fn instance_index(&self) -> u32 {
        self.instance_index
    }

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Number of resident pages.
    pub fn page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Number of evictable frames.
    pub fn replacer_size(&self) -> usize {
        self.replacer.size()
    }

    /// Pin count of a resident page, `None` if not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        self.with_resident(page_id, |frame| frame.pin_count())
    }

    /// Dirty flag of a resident page, `None` if not resident.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        self.with_resident(page_id, |frame| frame.is_dirty())
    }

    /// Frame holding a resident page.
    pub fn frame_id_of(&self, page_id: PageId) -> Option<FrameId> {
        self.state.lock().page_table.get(&page_id).copied()
    }

    /// Run `f` against the storage backend, under the instance lock.
    pub fn with_disk<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        let _state = self.state.lock();
        let mut disk = self.disk_manager.lock();
        f(&mut disk)
    }

    /// Assert the structural invariants of the instance.
    ///
    /// - page table and free list partition the frames
    /// - free frames are empty and zeroed
    /// - resident frames hold the page the table says they do
    /// - exactly the unpinned resident frames are in the replacer
    ///
    /// # Panics
    /// Panics on the first violation. A violation is a bug in the pool.
    pub fn check_invariants(&self) {
        let state = self.state.lock();
        let mut owner = vec![None; self.pool_size];

        for (&page_id, &frame_id) in state.page_table.iter() {
            assert!(
                owner[frame_id.0].replace(page_id).is_none(),
                "{} mapped by two pages",
                frame_id
            );
            let frame = &self.frames[frame_id.0];
            assert_eq!(frame.page_id(), page_id, "{} holds the wrong page", frame_id);
            assert_eq!(
                self.replacer.contains(frame_id),
                !frame.is_pinned(),
                "{} replacer membership disagrees with pin count {}",
                frame_id,
                frame.pin_count()
            );
        }

        for &frame_id in state.free_list.iter() {
            assert!(
                owner[frame_id.0].replace(PageId::INVALID).is_none(),
                "{} is both free and resident (or free twice)",
                frame_id
            );
            let frame = &self.frames[frame_id.0];
            assert!(frame.is_empty() && !frame.is_pinned() && !frame.is_dirty());
            assert!(!self.replacer.contains(frame_id), "free {} in replacer", frame_id);
        }

        assert!(
            owner.iter().all(Option::is_some),
            "frames lost from both page table and free list"
        );
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn lookup(state: &PoolState, page_id: PageId) -> Result<FrameId> {
        state
            .page_table
            .get(&page_id)
            .copied()
            .ok_or(Error::NotResident(page_id))
    }

    fn with_resident<R>(&self, page_id: PageId, f: impl FnOnce(&Frame) -> R) -> Option<R> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| f(&self.frames[frame_id.0]))
    }

    /// Take a pin on a resident frame. Caller holds `state`.
    fn pin_frame(&self, frame_id: FrameId) {
        if self.frames[frame_id.0].pin() == 1 {
            self.replacer.pin(frame_id);
        }
    }

    /// Write back a frame pinned by `pin_frame`, then return the pin.
    fn flush_pinned(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let result = self.write_back(frame_id, page_id);

        let _state = self.state.lock();
        if self.frames[frame_id.0].unpin() == Some(0) {
            self.replacer.unpin(frame_id);
        }
        result
    }

    fn fetch_locked(&self, state: &mut PoolState, page_id: PageId) -> Result<FrameId> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id));
        }

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.pin_frame(frame_id);
            BufferPoolStats::bump(&self.stats.cache_hits);
            trace!("hit {} in {}", page_id, frame_id);
            return Ok(frame_id);
        }

        BufferPoolStats::bump(&self.stats.cache_misses);
        let frame_id = self.acquire_frame(state)?;
        let frame = &self.frames[frame_id.0];

        let read = {
            let mut page = frame.page_mut();
            self.disk_manager
                .lock()
                .read_page(page_id, page.as_mut_slice())
        };
        if let Err(err) = read {
            warn!("read of {} failed: {}", page_id, err);
            frame.reset();
            state.free_list.push(frame_id);
            return Err(err);
        }
        BufferPoolStats::bump(&self.stats.pages_read);

        frame.install(page_id);
        state.page_table.insert(page_id, frame_id);
        trace!("loaded {} into {}", page_id, frame_id);
        Ok(frame_id)
    }

    /// Take a frame from the free list, or evict the LRU victim.
    ///
    /// The returned frame is empty, zeroed, and in neither the page table,
    /// the free list, nor the replacer. On error nothing has changed.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            assert!(
                self.frames[frame_id.0].is_empty(),
                "free {} still holds a page",
                frame_id
            );
            return Ok(frame_id);
        }

        let frame_id = self.replacer.victim().ok_or(Error::PoolExhausted)?;
        let frame = &self.frames[frame_id.0];
        let victim = frame.page_id();
        assert!(
            !frame.is_pinned() && state.page_table.get(&victim) == Some(&frame_id),
            "replacer offered {} which is pinned or not resident",
            frame_id
        );

        if frame.is_dirty() {
            debug!("writing back dirty {} before evicting {}", victim, frame_id);
            if let Err(err) = self.write_back(frame_id, victim) {
                // Still resident and unpinned: keep it evictable.
                self.replacer.unpin(frame_id);
                return Err(err);
            }
        }

        state.page_table.remove(&victim);
        frame.reset();
        BufferPoolStats::bump(&self.stats.evictions);
        debug!("evicted {} from {}", victim, frame_id);
        Ok(frame_id)
    }

    /// Write a frame's bytes to storage and clear its dirty flag.
    ///
    /// The flag is cleared before the shared latch is released, so a writer
    /// that latches afterwards always leaves the page dirty again.
    fn write_back(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];
        let page = frame.page();
        self.disk_manager
            .lock()
            .write_page(page_id, page.as_slice())?;
        frame.clear_dirty();
        drop(page);

        BufferPoolStats::bump(&self.stats.pages_written);
        Ok(())
    }

    fn peek_page_id(&self, state: &PoolState) -> Result<PageId> {
        i32::try_from(state.next_page_id)
            .map(PageId::new)
            .map_err(|_| Error::PageIdsExhausted)
    }

    fn allocate_locked(&self, state: &mut PoolState) -> Result<PageId> {
        let page_id = self.peek_page_id(state)?;
        state.next_page_id += i64::from(self.num_instances);
        debug_assert_eq!(
            page_id.shard(self.num_instances),
            self.instance_index,
            "allocated {} outside shard {}",
            page_id,
            self.instance_index
        );
        Ok(page_id)
    }
}
