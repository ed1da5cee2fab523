//! Page identifier type.

use std::fmt;

/// Identifies a page in durable storage.
///
/// Page ids are signed so that `-1` can serve as the "no page" sentinel.
/// Ids are handed out by a pool instance in a residue class modulo the
/// shard count, so two shards never produce the same id.
///
/// # Example
/// ```
/// use shardpool::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(page_id.0, 42);
/// assert!(!PageId::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub i32);

impl PageId {
    /// Sentinel for an unassigned frame.
    pub const INVALID: PageId = PageId(-1);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: i32) -> Self {
        PageId(id)
    }

    /// A page id is valid when it is non-negative.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }

    /// Index of the shard owning this page among `num_instances` shards.
    #[inline]
    pub fn shard(&self, num_instances: u32) -> u32 {
        self.0.rem_euclid(num_instances as i32) as u32
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "Page({})", self.0)
        } else {
            write!(f, "Page(INVALID)")
        }
    }
}
