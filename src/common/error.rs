//! Error types for the buffer pool and its storage collaborators.

use super::PageId;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors surfaced by the paging layer.
///
/// Every pool operation reports failure through one of these values rather
/// than panicking. Only broken structural invariants (a frame in both the
/// page table and the free list, for instance) abort.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from the storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The page id is the sentinel or otherwise unusable for I/O.
    #[error("invalid page id: {0}")]
    InvalidPageId(PageId),

    /// A page buffer handed to storage was not exactly one page long.
    #[error("invalid buffer size: expected {expected} bytes, got {actual}")]
    InvalidBufferSize { expected: usize, actual: usize },

    /// No free frame and nothing evictable: every resident page is pinned.
    ///
    /// Recoverable by retrying after another caller unpins a page.
    #[error("buffer pool exhausted: all frames are pinned")]
    PoolExhausted,

    /// The page is not resident in this pool instance.
    #[error("{0} is not resident in the buffer pool")]
    NotResident(PageId),

    /// The page is pinned and cannot be deleted.
    #[error("{0} is pinned (pin count {1})")]
    PageBusy(PageId, u32),

    /// The shard has handed out every page id that fits in an `i32`.
    #[error("page id space exhausted")]
    PageIdsExhausted,

    /// The pool configuration is unusable.
    #[error("invalid buffer pool config: {0}")]
    InvalidConfig(String),

    /// A failure injected by a test storage backend.
    #[error("injected storage failure: {0}")]
    InjectedFailure(&'static str),
}

impl Error {
    /// Whether this error came from the storage collaborator.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::InvalidBufferSize { .. } | Error::InjectedFailure(_)
        )
    }
}
