//! Disk managers - synchronous page I/O underneath the buffer pool.
//!
//! [`DiskManager`] is the narrow interface the pool consumes. Two backends:
//! - [`FileDiskManager`] - one database file, pages laid out by id
//! - [`MemoryDiskManager`](super::MemoryDiskManager) - in-memory, for tests

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, trace};

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};

/// Page storage consumed by a buffer pool instance.
///
/// Calls are blocking. The pool serializes access, so implementations only
/// need to be `Send`.
pub trait DiskManager: Send {
    /// Fill `buf` with the durable content of `page_id`.
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()>;

    /// Persist `buf` as the content of `page_id`.
    fn write_page(&mut self, page_id: PageId, buf: &[u8]) -> Result<()>;

    /// Tell storage that `page_id` was deleted and its space may be reclaimed.
    fn deallocate_page(&mut self, page_id: PageId) -> Result<()>;
}

/// Reject ids and buffers no backend can serve.
pub(crate) fn check_io_args(page_id: PageId, len: usize) -> Result<()> {
    if !page_id.is_valid() {
        return Err(Error::InvalidPageId(page_id));
    }
    if len != PAGE_SIZE {
        return Err(Error::InvalidBufferSize {
            expected: PAGE_SIZE,
            actual: len,
        });
    }
    Ok(())
}

/// Disk manager over a single database file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Page ids come from the pool's striped allocator, so the file may have
/// holes: pages of other shards, or pages created but never written back.
/// Reading such a page returns zeros.
///
/// # Durability
/// Every write is followed by `sync_all()`.
pub struct FileDiskManager {
    file: File,
    /// Ids handed back by `deallocate_page`.
    deallocated: HashSet<PageId>,
    num_reads: u64,
    num_writes: u64,
}

impl FileDiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self::from_file(file))
    }

    /// Open an existing database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self::from_file(file))
    }

    /// Open an existing database file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    fn from_file(file: File) -> Self {
        Self {
            file,
            deallocated: HashSet::new(),
            num_reads: 0,
            num_writes: 0,
        }
    }

    /// Current size of the database file in bytes.
    pub fn file_size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Number of page reads served so far.
    pub fn num_reads(&self) -> u64 {
        self.num_reads
    }

    /// Number of page writes performed so far.
    pub fn num_writes(&self) -> u64 {
        self.num_writes
    }

    /// Number of distinct pages reported as deleted.
    pub fn deallocated_count(&self) -> usize {
        self.deallocated.len()
    }

    /// Whether `page_id` was deallocated and not written since.
    pub fn is_deallocated(&self, page_id: PageId) -> bool {
        self.deallocated.contains(&page_id)
    }

    fn offset(page_id: PageId) -> u64 {
        page_id.0 as u64 * PAGE_SIZE as u64
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        check_io_args(page_id, buf.len())?;
        self.num_reads += 1;

        let offset = Self::offset(page_id);
        let file_size = self.file_size()?;
        if offset >= file_size {
            debug!("read of {} past end of file, returning zeros", page_id);
            buf.fill(0);
            return Ok(());
        }

        self.file.seek(SeekFrom::Start(offset))?;
        let available = ((file_size - offset) as usize).min(PAGE_SIZE);
        self.file.read_exact(&mut buf[..available])?;
        // A torn tail page reads as zero-padded.
        buf[available..].fill(0);

        trace!("read {} from disk", page_id);
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, buf: &[u8]) -> Result<()> {
        check_io_args(page_id, buf.len())?;

        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.write_all(buf)?;
        self.file.sync_all()?;

        self.num_writes += 1;
        self.deallocated.remove(&page_id);
        trace!("wrote {} to disk", page_id);
        Ok(())
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id));
        }
        debug!("deallocated {}", page_id);
        self.deallocated.insert(page_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn page_with(byte: u8) -> Vec<u8> {
        let mut buf = vec![0u8; PAGE_SIZE];
        buf[0] = byte;
        buf[PAGE_SIZE - 1] = byte;
        buf
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        FileDiskManager::create(&path).unwrap();
        assert!(FileDiskManager::create(&path).is_err());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        assert!(FileDiskManager::open(dir.path().join("missing.db")).is_err());
    }

    #[test]
    fn test_write_and_read_page() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();

        dm.write_page(PageId::new(0), &page_with(0xAB)).unwrap();

        let mut buf = vec![0u8; PAGE_SIZE];
        dm.read_page(PageId::new(0), &mut buf).unwrap();
        assert_eq!(buf[0], 0xAB);
        assert_eq!(buf[PAGE_SIZE - 1], 0xAB);
        assert_eq!(dm.num_writes(), 1);
        assert_eq!(dm.num_reads(), 1);
    }

    #[test]
    fn test_read_unwritten_page_is_zeroed() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();

        let mut buf = vec![0xFFu8; PAGE_SIZE];
        dm.read_page(PageId::new(7), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_sparse_writes_leave_zeroed_holes() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();

        // Shard 1 of 2 only ever writes odd pages.
        dm.write_page(PageId::new(3), &page_with(3)).unwrap();
        assert_eq!(dm.file_size().unwrap(), 4 * PAGE_SIZE as u64);

        let mut buf = vec![0xFFu8; PAGE_SIZE];
        dm.read_page(PageId::new(1), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));

        dm.read_page(PageId::new(3), &mut buf).unwrap();
        assert_eq!(buf[0], 3);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = FileDiskManager::open_or_create(&path).unwrap();
            dm.write_page(PageId::new(2), &page_with(0x42)).unwrap();
        }

        {
            let mut dm = FileDiskManager::open_or_create(&path).unwrap();
            let mut buf = vec![0u8; PAGE_SIZE];
            dm.read_page(PageId::new(2), &mut buf).unwrap();
            assert_eq!(buf[0], 0x42);
        }
    }

    #[test]
    fn test_rejects_invalid_arguments() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();

        let mut short = vec![0u8; 16];
        assert!(matches!(
            dm.read_page(PageId::new(0), &mut short),
            Err(Error::InvalidBufferSize { expected: PAGE_SIZE, actual: 16 })
        ));
        assert!(matches!(
            dm.write_page(PageId::INVALID, &page_with(1)),
            Err(Error::InvalidPageId(_))
        ));
        assert!(dm.deallocate_page(PageId::INVALID).is_err());
    }

    #[test]
    fn test_deallocate_tracks_until_rewritten() {
        let dir = tempdir().unwrap();
        let mut dm = FileDiskManager::create(dir.path().join("test.db")).unwrap();

        dm.write_page(PageId::new(0), &page_with(1)).unwrap();
        dm.deallocate_page(PageId::new(0)).unwrap();
        dm.deallocate_page(PageId::new(0)).unwrap();
        assert!(dm.is_deallocated(PageId::new(0)));
        assert_eq!(dm.deallocated_count(), 1);

        dm.write_page(PageId::new(0), &page_with(2)).unwrap();
        assert!(!dm.is_deallocated(PageId::new(0)));
    }
}
