//! Storage layer - the disk collaborator of the buffer pool.
//!
//! - [`DiskManager`] - the page I/O interface the pool consumes
//! - [`FileDiskManager`] / [`MemoryDiskManager`] - backends
//! - [`Page`] - the raw page buffer

mod disk_manager;
mod memory;
mod page;

pub use disk_manager::{DiskManager, FileDiskManager};
pub use memory::MemoryDiskManager;
pub use page::Page;
