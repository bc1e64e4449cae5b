use std::{
    io::{Read, Write},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::Bytes;

use crate::{
    frame::Frame,
    frame_buffer::FrameBuffer,
    protocol::{FrameError, framing},
    relay::stats::RelayStats,
};

/// Single-permit token marking a frame send in progress.
///
/// `try_acquire` fails fast when the permit is held, which is how the busy-
/// drop policy is enforced: a frame offered while the previous one is still
/// on the wire is discarded instead of queued, bounding end-to-end latency.
#[derive(Debug, Clone, Default)]
pub struct InFlightToken {
    held: Arc<AtomicBool>,
}

impl InFlightToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the permit if free. The returned guard releases it on drop.
    #[must_use]
    pub fn try_acquire(&self) -> Option<InFlightGuard> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                held: Arc::clone(&self.held),
            })
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    held: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

/// Producer half of the frame transport: writes length-prefixed frames under
/// a single writer lock, so only one frame is ever on the wire at a time.
pub struct FrameSender<W: Write> {
    writer: Mutex<W>,
}

impl<W: Write> FrameSender<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Serializes the frame and writes it out. Any failure means the
    /// connection is lost; the write is never retried.
    pub fn send(&self, frame: &Frame) -> Result<(), FrameError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| FrameError::Io(std::io::Error::other("writer lock poisoned")))?;
        framing::write_frame(&mut *writer, &frame.payload)?;
        Ok(())
    }
}

/// Consumer half: reads frames until the connection errors or `run_flag`
/// clears, pushing each one into the buffer (drop-oldest beyond capacity).
///
/// Returns the error that ended the loop; a stop-requested exit reports the
/// interrupted read, which callers ignore when `run_flag` is already false.
pub fn pump_frames<R: Read>(
    reader: &mut R,
    buffer: &FrameBuffer,
    run_flag: &AtomicBool,
    stats: &RelayStats,
) -> FrameError {
    let mut next_seq: u64 = 0;

    loop {
        let payload = match framing::read_frame(reader) {
            Ok(p) => p,
            Err(e) => return e,
        };
        if !run_flag.load(Ordering::SeqCst) {
            return FrameError::Io(std::io::Error::other("stopped"));
        }

        next_seq += 1;
        buffer.push(Frame::new(next_seq, Bytes::from(payload)));
        stats.record_received();
    }
}
