//! In-memory disk manager.
//!
//! Handles are cheap to clone and share one store, so a test can hand one
//! handle to a pool and keep another to inspect what reached "disk" or to
//! inject I/O failures.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::disk_manager::{check_io_args, DiskManager};
use super::page::Page;
use crate::common::{Error, PageId, Result};

#[derive(Default)]
struct MemoryStore {
    pages: HashMap<PageId, Box<Page>>,
    fail_reads: bool,
    fail_writes: bool,
    num_reads: u64,
    num_writes: u64,
    num_deallocations: u64,
}

/// Page storage held in a `HashMap`, for tests and embedding.
///
/// Pages never written read as zeros, like holes in a database file.
///
/// # Example
/// ```
/// use shardpool::{DiskManager, MemoryDiskManager, PageId, PAGE_SIZE};
///
/// let mut disk = MemoryDiskManager::new();
/// let inspector = disk.clone();
///
/// disk.write_page(PageId::new(0), &[7u8; PAGE_SIZE]).unwrap();
/// assert_eq!(inspector.page_bytes(PageId::new(0)).unwrap()[0], 7);
/// ```
#[derive(Clone, Default)]
pub struct MemoryDiskManager {
    store: Arc<Mutex<MemoryStore>>,
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following read fail until reset.
    pub fn set_fail_reads(&self, fail: bool) {
        self.store.lock().fail_reads = fail;
    }

    /// Make every following write fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.store.lock().fail_writes = fail;
    }

    /// Copy of the stored bytes of `page_id`, if it was ever written.
    pub fn page_bytes(&self, page_id: PageId) -> Option<Vec<u8>> {
        self.store
            .lock()
            .pages
            .get(&page_id)
            .map(|page| page.as_slice().to_vec())
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.store.lock().pages.contains_key(&page_id)
    }

    pub fn num_reads(&self) -> u64 {
        self.store.lock().num_reads
    }

    pub fn num_writes(&self) -> u64 {
        self.store.lock().num_writes
    }

    pub fn num_deallocations(&self) -> u64 {
        self.store.lock().num_deallocations
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        check_io_args(page_id, buf.len())?;
        let mut store = self.store.lock();
        if store.fail_reads {
            return Err(Error::InjectedFailure("read"));
        }
        store.num_reads += 1;

        match store.pages.get(&page_id) {
            Some(page) => buf.copy_from_slice(page.as_slice()),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, buf: &[u8]) -> Result<()> {
        check_io_args(page_id, buf.len())?;
        let mut store = self.store.lock();
        if store.fail_writes {
            return Err(Error::InjectedFailure("write"));
        }
        store.num_writes += 1;

        let page = store
            .pages
            .entry(page_id)
            .or_insert_with(|| Box::new(Page::new()));
        page.as_mut_slice().copy_from_slice(buf);
        Ok(())
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id));
        }
        let mut store = self.store.lock();
        store.num_deallocations += 1;
        store.pages.remove(&page_id);
        Ok(())
    }
}
