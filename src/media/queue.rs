//! Timestamp-ordered frame queue

use super::frame::TimedFrame;
use std::collections::VecDeque;
use tracing::debug;

/// Double-ended queue of frames kept in presentation order.
///
/// Frames normally arrive in order and are appended; a late frame is slotted
/// in by scanning back from the tail.
#[derive(Debug)]
pub struct FrameBuffer<F> {
    frames: VecDeque<F>,
}

impl<F: TimedFrame> FrameBuffer<F> {
    pub fn new() -> Self {
        FrameBuffer {
            frames: VecDeque::new(),
        }
    }

    /// Insert keeping timestamps non-decreasing; equal timestamps keep
    /// arrival order.
    pub fn insert(&mut self, frame: F) {
        let ts = frame.timestamp();
        let mut idx = self.frames.len();
        while idx > 0 && self.frames[idx - 1].timestamp() > ts {
            idx -= 1;
        }
        if idx < self.frames.len() {
            debug!(
                "out of order frame at {}ms inserted before {} newer frames",
                ts,
                self.frames.len() - idx
            );
        }
        self.frames.insert(idx, frame);
    }

    pub fn pop_front(&mut self) -> Option<F> {
        self.frames.pop_front()
    }

    pub fn front(&self) -> Option<&F> {
        self.frames.front()
    }

    pub fn back(&self) -> Option<&F> {
        self.frames.back()
    }

    /// Timestamp of the oldest frame
    pub fn front_timestamp(&self) -> Option<u32> {
        self.front().map(TimedFrame::timestamp)
    }

    /// Presentation time covered: newest minus oldest timestamp, 0 if empty
    pub fn span(&self) -> u64 {
        match (self.frames.front(), self.frames.back()) {
            (Some(first), Some(last)) => {
                u64::from(last.timestamp()).saturating_sub(u64::from(first.timestamp()))
            }
            _ => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop every frame, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let n = self.frames.len();
        self.frames.clear();
        n
    }

    pub fn iter(&self) -> impl Iterator<Item = &F> {
        self.frames.iter()
    }
}

impl<F: TimedFrame> Default for FrameBuffer<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ts(u32, &'static str);

    impl TimedFrame for Ts {
        fn timestamp(&self) -> u32 {
            self.0
        }
    }

    fn drain(buf: &mut FrameBuffer<Ts>) -> Vec<u32> {
        std::iter::from_fn(|| buf.pop_front()).map(|f| f.0).collect()
    }

    #[test]
    fn test_in_order_append() {
        let mut buf = FrameBuffer::new();
        for ts in [0, 40, 80, 120] {
            buf.insert(Ts(ts, ""));
        }
        assert_eq!(buf.span(), 120);
        assert_eq!(buf.front_timestamp(), Some(0));
        assert_eq!(drain(&mut buf), vec![0, 40, 80, 120]);
    }

    #[test]
    fn test_out_of_order_insert() {
        let mut buf = FrameBuffer::new();
        for ts in [100, 20, 60, 60, 0, 200, 150] {
            buf.insert(Ts(ts, ""));
        }
        assert_eq!(buf.len(), 7);
        assert_eq!(drain(&mut buf), vec![0, 20, 60, 60, 100, 150, 200]);
    }

    #[test]
    fn test_equal_timestamps_keep_arrival_order() {
        let mut buf = FrameBuffer::new();
        buf.insert(Ts(10, "a"));
        buf.insert(Ts(10, "b"));
        buf.insert(Ts(5, "c"));
        let order: Vec<_> = buf.iter().map(|f| f.1).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_span_and_clear() {
        let mut buf = FrameBuffer::new();
        assert_eq!(buf.span(), 0);
        buf.insert(Ts(70, ""));
        assert_eq!(buf.span(), 0);
        buf.insert(Ts(30, ""));
        assert_eq!(buf.span(), 40);
        assert_eq!(buf.clear(), 2);
        assert!(buf.is_empty());
    }
}
