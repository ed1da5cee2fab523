//! Buffer pool management.
//!
//! A pool instance caches fixed-size pages in a fixed set of frames and
//! evicts unpinned pages in LRU order when it runs out of free frames.
//!
//! # Components
//! - [`BufferPoolInstance`] - one shard of the page cache
//! - [`Frame`] - a slot holding a page plus pin count and dirty flag
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII pinned page access
//! - [`BufferPoolStats`] - counters
//! - [`replacer`] - the LRU replacement policy

mod buffer_pool_instance;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool_instance::BufferPoolInstance;
pub use frame::Frame;
pub use page_guard::{PageReadGuard, PageWriteGuard};
pub use replacer::{LruReplacer, Replacer};
pub use stats::{BufferPoolStats, StatsSnapshot};
