use std::{fmt, io};

/// Errors from session lifecycle operations.
#[derive(Debug)]
pub enum RelayError {
    /// `start` was called on a session that is already running.
    AlreadyRunning,
    Io(io::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::AlreadyRunning => write!(f, "session is already running"),
            RelayError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<io::Error> for RelayError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Why an offered frame was not put on the wire.
///
/// None of these are fatal: dropping under backpressure is the designed
/// behavior, so callers typically just count these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferError {
    /// The session is not in the `Streaming` state.
    NotStreaming,
    /// The previous frame is still in flight; this one was dropped to bound
    /// latency rather than queued.
    Busy,
    /// Empty payloads are never sent (the decoder side rejects length 0).
    EmptyFrame,
    /// The payload exceeds the wire-format ceiling.
    TooLarge { max: usize, actual: usize },
}

impl fmt::Display for OfferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferError::NotStreaming => write!(f, "no active stream connection"),
            OfferError::Busy => write!(f, "previous frame still in flight"),
            OfferError::EmptyFrame => write!(f, "refusing to send an empty frame"),
            OfferError::TooLarge { max, actual } => {
                write!(f, "frame of {actual} bytes exceeds maximum {max}")
            }
        }
    }
}

impl std::error::Error for OfferError {}
