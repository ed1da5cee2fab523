//! shardpool - the in-memory paging layer of a disk-backed storage engine.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │        (access methods / router across shards - external)       │
//! └─────────────────────────────────────────────────────────────────┘
//!          │ fetch / new / unpin / flush / delete
//!          ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  BufferPoolInstance (buffer/)         one per shard             │
//! │   ┌────────────┐  ┌────────────┐  ┌────────────┐                │
//! │   │ page table │  │ free list  │  │ LruReplacer│                │
//! │   └────────────┘  └────────────┘  └────────────┘                │
//! │   frames: [Frame 0] [Frame 1] ... [Frame pool_size-1]           │
//! └─────────────────────────────────────────────────────────────────┘
//!          │ read_page / write_page / deallocate_page
//!          ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  DiskManager (storage/)   FileDiskManager | MemoryDiskManager   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`buffer`] - Pool instance, frames, LRU replacer
//! - [`storage`] - Disk managers and the page buffer
//!
//! # Quick Start
//! ```
//! use shardpool::{BufferPoolInstance, MemoryDiskManager};
//!
//! let pool = BufferPoolInstance::new(8, MemoryDiskManager::new());
//!
//! let mut guard = pool.new_page_guarded().unwrap();
//! guard.as_mut_slice()[..5].copy_from_slice(b"hello");
//! let page_id = guard.page_id();
//! drop(guard);
//!
//! pool.flush_page(page_id).unwrap();
//! assert_eq!(pool.is_dirty(page_id), Some(false));
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

pub use common::config::{BufferPoolConfig, PAGE_SIZE};
pub use common::{Error, FrameId, PageId, Result};

pub use buffer::{
    BufferPoolInstance, BufferPoolStats, Frame, LruReplacer, PageReadGuard, PageWriteGuard,
    Replacer, StatsSnapshot,
};
pub use storage::{DiskManager, FileDiskManager, MemoryDiskManager, Page};
