use std::time::SystemTime;

use bytes::Bytes;

/// One opaque, already-compressed unit of video data.
///
/// The payload format is the capture side's business (typically JPEG); the
/// relay only ever length-prefixes it on the wire. Ownership passes from the
/// producer to the transport to the buffer to the sink, never shared.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonically increasing per-session sequence number.
    pub seq: u64,
    /// Capture (or arrival) timestamp in milliseconds since the UNIX epoch.
    pub timestamp_ms: u128,
    /// The compressed frame bytes.
    pub payload: Bytes,
}

impl Frame {
    pub fn new(seq: u64, payload: Bytes) -> Self {
        Self {
            seq,
            timestamp_ms: now_millis(),
            payload,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

pub fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
