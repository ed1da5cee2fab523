//! Common types shared across the paging layer.
//!
//! - Configuration ([`BufferPoolConfig`], [`PAGE_SIZE`])
//! - Error types
//! - Identifiers (PageId, FrameId)

pub mod config;
pub mod error;
mod frame_id;
mod page_id;

pub use config::{BufferPoolConfig, PAGE_SIZE};
pub use error::{Error, Result};
pub use frame_id::FrameId;
pub use page_id::PageId;
