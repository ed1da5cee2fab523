//! LRU (Least Recently Used) replacement policy.
//!
//! The eligible set is a doubly-linked list threaded through a `Vec` of
//! per-frame links. Because frame ids are dense in `[0, capacity)`, the
//! vector doubles as the frame → list position index, so pin, unpin and
//! victim are all O(1) with no hashing and no scans.
//!
//! ```text
//!   head (LRU)                                 tail (MRU)
//!      │                                           │
//!      ▼                                           ▼
//!   Frame 3 ⇄ Frame 0 ⇄ Frame 5 ⇄ ... ⇄ Frame 1
//!
//!   links: [ {prev,next,linked} ; capacity ]  indexed by FrameId
//! ```

use log::warn;
use parking_lot::Mutex;

use super::Replacer;
use crate::common::FrameId;

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<usize>,
    next: Option<usize>,
    linked: bool,
}

#[derive(Debug)]
struct LruList {
    links: Vec<Link>,
    /// Least recently unpinned frame.
    head: Option<usize>,
    /// Most recently unpinned frame.
    tail: Option<usize>,
    len: usize,
}

impl LruList {
    fn new(capacity: usize) -> Self {
        Self {
            links: vec![Link::default(); capacity],
            head: None,
            tail: None,
            len: 0,
        }
    }

    fn contains(&self, idx: usize) -> bool {
        self.links[idx].linked
    }

    fn push_back(&mut self, idx: usize) {
        debug_assert!(!self.links[idx].linked);
        self.links[idx] = Link {
            prev: self.tail,
            next: None,
            linked: true,
        };
        match self.tail {
            Some(tail) => self.links[tail].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;
    }

    fn unlink(&mut self, idx: usize) {
        let Link { prev, next, linked } = self.links[idx];
        debug_assert!(linked);

        match prev {
            Some(p) => self.links[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.links[n].prev = prev,
            None => self.tail = prev,
        }
        self.links[idx] = Link::default();
        self.len -= 1;
    }

    fn pop_front(&mut self) -> Option<usize> {
        let head = self.head?;
        self.unlink(head);
        Some(head)
    }

    fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.head, move |&idx| self.links[idx].next)
    }
}

/// LRU replacer over the frames of one pool instance.
///
/// Tracks only frames that are resident with a pin count of zero. The
/// victim is the frame that has been eligible the longest. The list sits
/// behind its own lock so the replacer can be shared and tested on its own.
///
/// # Example
/// ```
/// use shardpool::buffer::replacer::{LruReplacer, Replacer};
/// use shardpool::FrameId;
///
/// let replacer = LruReplacer::new(4);
/// replacer.unpin(FrameId::new(2));
/// replacer.unpin(FrameId::new(0));
/// replacer.pin(FrameId::new(2));
///
/// assert_eq!(replacer.victim(), Some(FrameId::new(0)));
/// assert_eq!(replacer.victim(), None);
/// ```
#[derive(Debug)]
pub struct LruReplacer {
    inner: Mutex<LruList>,
    capacity: usize,
}

impl LruReplacer {
    /// Create a replacer for frames `0..capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruList::new(capacity)),
            capacity,
        }
    }

    /// Eligible frames, least recently unpinned first.
    pub fn eviction_order(&self) -> Vec<FrameId> {
        self.inner.lock().iter().map(FrameId::new).collect()
    }

    /// Whether `frame_id` is currently eligible for eviction.
    pub fn contains(&self, frame_id: FrameId) -> bool {
        frame_id.0 < self.capacity && self.inner.lock().contains(frame_id.0)
    }

    fn in_range(&self, frame_id: FrameId, op: &str) -> bool {
        if frame_id.0 < self.capacity {
            true
        } else {
            warn!(
                "lru replacer: {} of {} ignored, capacity is {}",
                op, frame_id, self.capacity
            );
            false
        }
    }
}

impl Replacer for LruReplacer {
    fn victim(&self) -> Option<FrameId> {
        self.inner.lock().pop_front().map(FrameId::new)
    }

    fn pin(&self, frame_id: FrameId) {
        if !self.in_range(frame_id, "pin") {
            return;
        }
        let mut list = self.inner.lock();
        if list.contains(frame_id.0) {
            list.unlink(frame_id.0);
        }
    }

    fn unpin(&self, frame_id: FrameId) {
        if !self.in_range(frame_id, "unpin") {
            return;
        }
        let mut list = self.inner.lock();
        if !list.contains(frame_id.0) {
            list.push_back(frame_id.0);
        }
    }

    fn remove(&self, frame_id: FrameId) {
        self.pin(frame_id);
    }

    fn size(&self) -> usize {
        self.inner.lock().len
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(id: usize) -> FrameId {
        FrameId::new(id)
    }

    #[test]
    fn test_lru_sample() {
        let replacer = LruReplacer::new(7);

        // Unpin six frames; unpinning 1 again is a no-op.
        for id in [1, 2, 3, 4, 5, 6, 1] {
            replacer.unpin(fid(id));
        }
        assert_eq!(replacer.size(), 6);

        assert_eq!(replacer.victim(), Some(fid(1)));
        assert_eq!(replacer.victim(), Some(fid(2)));
        assert_eq!(replacer.victim(), Some(fid(3)));

        // Pin a frame that was already evicted, and one that is eligible.
        replacer.pin(fid(3));
        replacer.pin(fid(4));
        assert_eq!(replacer.size(), 2);

        replacer.unpin(fid(4));

        assert_eq!(replacer.victim(), Some(fid(5)));
        assert_eq!(replacer.victim(), Some(fid(6)));
        assert_eq!(replacer.victim(), Some(fid(4)));
        assert_eq!(replacer.victim(), None);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_lru_pin_absent_is_noop() {
        let replacer = LruReplacer::new(3);
        replacer.pin(fid(0));
        assert_eq!(replacer.size(), 0);

        replacer.unpin(fid(0));
        replacer.pin(fid(1));
        assert_eq!(replacer.eviction_order(), vec![fid(0)]);
    }

    #[test]
    fn test_lru_unlink_middle_head_tail() {
        let replacer = LruReplacer::new(5);
        for id in 0..5 {
            replacer.unpin(fid(id));
        }

        replacer.pin(fid(2)); // middle
        replacer.pin(fid(0)); // head
        replacer.pin(fid(4)); // tail
        assert_eq!(replacer.eviction_order(), vec![fid(1), fid(3)]);

        replacer.unpin(fid(0));
        assert_eq!(replacer.eviction_order(), vec![fid(1), fid(3), fid(0)]);
        assert!(replacer.contains(fid(0)));
        assert!(!replacer.contains(fid(2)));
    }

    #[test]
    fn test_lru_reunpin_moves_to_back_only_after_pin() {
        let replacer = LruReplacer::new(3);
        replacer.unpin(fid(0));
        replacer.unpin(fid(1));

        // Already present: stays where it is.
        replacer.unpin(fid(0));
        assert_eq!(replacer.eviction_order(), vec![fid(0), fid(1)]);

        // Pin then unpin: becomes most recent.
        replacer.pin(fid(0));
        replacer.unpin(fid(0));
        assert_eq!(replacer.eviction_order(), vec![fid(1), fid(0)]);
    }

    #[test]
    fn test_lru_out_of_range_ignored() {
        let replacer = LruReplacer::new(2);
        replacer.unpin(fid(2));
        replacer.pin(fid(9));
        assert_eq!(replacer.size(), 0);
        assert!(!replacer.contains(fid(2)));
        assert_eq!(replacer.capacity(), 2);
    }

    #[test]
    fn test_lru_single_frame_cycle() {
        let replacer = LruReplacer::new(1);
        for _ in 0..3 {
            replacer.unpin(fid(0));
            assert_eq!(replacer.size(), 1);
            assert_eq!(replacer.victim(), Some(fid(0)));
            assert_eq!(replacer.victim(), None);
        }
    }

    #[test]
    fn test_lru_concurrent_unpin() {
        use std::sync::Arc;
        use std::thread;

        let replacer = Arc::new(LruReplacer::new(64));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let replacer = Arc::clone(&replacer);
                thread::spawn(move || {
                    for i in 0..16 {
                        replacer.unpin(fid(t * 16 + i));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(replacer.size(), 64);
        let mut seen: Vec<_> = std::iter::from_fn(|| replacer.victim()).collect();
        seen.sort();
        assert_eq!(seen, (0..64).map(fid).collect::<Vec<_>>());
    }
}
