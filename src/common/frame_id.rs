//! Frame identifier type.

use std::fmt;

/// Identifies a physical slot in a pool instance, in `[0, pool_size)`.
///
/// Frames live in one `Vec<Frame>`, so a `FrameId` is used directly as an
/// index: `frames[frame_id.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Create a new FrameId.
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_ordering() {
        assert!(FrameId::new(1) < FrameId::new(2));
        assert_eq!(FrameId::new(5), FrameId(5));
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(FrameId::new(42).to_string(), "Frame(42)");
    }
}
