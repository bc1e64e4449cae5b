use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex},
    time::Duration,
};

use crate::frame::Frame;

/// Default capacity: large enough to absorb brief sink stalls, small enough
/// that staleness under sustained backpressure stays within a few frame
/// intervals (at 30 fps, <= 100 ms).
pub const DEFAULT_CAPACITY: usize = 3;

/// Bounded, thread-safe FIFO of frames between the network receive path and
/// the presentation sink.
///
/// `push` never blocks: at capacity it evicts the single oldest entry before
/// appending, so the sink always sees the freshest window of the stream.
/// `pop` blocks until a frame arrives or the caller's timeout elapses.
pub struct FrameBuffer {
    frames: Mutex<VecDeque<Frame>>,
    available: Condvar,
    capacity: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl FrameBuffer {
    /// Creates a buffer with a fixed capacity (clamped to at least 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            available: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Appends a frame, evicting the oldest entry first when full. O(1),
    /// never blocks beyond the short critical section.
    pub fn push(&self, frame: Frame) {
        let Ok(mut frames) = self.frames.lock() else {
            return;
        };
        while frames.len() >= self.capacity {
            frames.pop_front();
        }
        frames.push_back(frame);
        self.available.notify_one();
    }

    /// Removes and returns the oldest frame, waiting up to `timeout` for one
    /// to arrive. Returns `None` on timeout (or a poisoned lock).
    #[must_use]
    pub fn pop(&self, timeout: Duration) -> Option<Frame> {
        let frames = self.frames.lock().ok()?;
        let (mut frames, _result) = self
            .available
            .wait_timeout_while(frames, timeout, |q| q.is_empty())
            .ok()?;
        frames.pop_front()
    }

    /// Returns a copy of the newest frame without removing anything.
    #[must_use]
    pub fn peek_latest(&self) -> Option<Frame> {
        self.frames.lock().ok()?.back().cloned()
    }

    /// Empties the buffer (used on session stop).
    pub fn clear(&self) {
        if let Ok(mut frames) = self.frames.lock() {
            frames.clear();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.lock().map(|q| q.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use bytes::Bytes;
    use std::{sync::Arc, thread};

    fn frame(seq: u64) -> Frame {
        Frame::new(seq, Bytes::from(vec![seq as u8; 8]))
    }

    #[test]
    fn pop_returns_frames_in_push_order_under_capacity() {
        let buf = FrameBuffer::new(3);
        buf.push(frame(1));
        buf.push(frame(2));
        buf.push(frame(3));

        for expected in 1..=3 {
            let f = buf.pop(Duration::from_millis(10)).expect("frame available");
            assert_eq!(f.seq, expected);
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn never_exceeds_capacity_and_drops_oldest() {
        let buf = FrameBuffer::new(3);
        for seq in 1..=10 {
            buf.push(frame(seq));
            assert!(buf.len() <= buf.capacity());
        }

        // Survivors are the newest three, still in order.
        let seqs: Vec<u64> = std::iter::from_fn(|| buf.pop(Duration::from_millis(10)))
            .map(|f| f.seq)
            .collect();
        assert_eq!(seqs, vec![8, 9, 10]);
    }

    #[test]
    fn pop_times_out_when_empty() {
        let buf = FrameBuffer::new(3);
        assert!(buf.pop(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn pop_wakes_when_a_frame_arrives() {
        let buf = Arc::new(FrameBuffer::new(3));
        let producer = Arc::clone(&buf);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            producer.push(frame(7));
        });

        let f = buf
            .pop(Duration::from_secs(2))
            .expect("push should wake the waiter");
        assert_eq!(f.seq, 7);
        handle.join().expect("producer thread");
    }

    #[test]
    fn clear_empties_the_buffer() {
        let buf = FrameBuffer::new(3);
        buf.push(frame(1));
        buf.push(frame(2));
        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.pop(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn peek_latest_does_not_remove() {
        let buf = FrameBuffer::new(3);
        buf.push(frame(1));
        buf.push(frame(2));
        assert_eq!(buf.peek_latest().expect("has frames").seq, 2);
        assert_eq!(buf.len(), 2);
    }
}
