//! Replacement policy for the buffer pool.
//!
//! [`LruReplacer`] is the only policy: the victim is the frame that has
//! gone longest without being re-pinned.

mod lru;

pub use lru::LruReplacer;

use crate::common::FrameId;

/// Tracks which resident, unpinned frames may be evicted.
///
/// A replacer knows nothing about page ids. The pool calls
/// - `pin(frame)` when a frame's pin count goes from 0 to 1
/// - `unpin(frame)` when it drops back to 0
///
/// Both are idempotent. Implementations carry their own lock, so methods
/// take `&self`.
pub trait Replacer: Send + Sync {
    /// Remove and return the next frame to evict, or `None` if nothing is
    /// eligible. The frame is no longer tracked afterwards.
    fn victim(&self) -> Option<FrameId>;

    /// Make `frame_id` ineligible. No-op if it is not tracked.
    fn pin(&self, frame_id: FrameId);

    /// Make `frame_id` eligible as the most recent entry. No-op if it is
    /// already tracked.
    fn unpin(&self, frame_id: FrameId);

    /// Stop tracking `frame_id`, e.g. because its page was deleted.
    fn remove(&self, frame_id: FrameId);

    /// Number of eligible frames.
    fn size(&self) -> usize;

    /// Number of frames this replacer can track.
    fn capacity(&self) -> usize;
}
