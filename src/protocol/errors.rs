use std::{fmt, io};

/// Protocol-level errors (frame length/format issues).
#[derive(Debug)]
pub enum ProtoError {
    /// The length header declared an empty payload.
    EmptyFrame,
    /// The length header exceeded the hard ceiling; nothing was allocated.
    TooLarge { max: usize, actual: usize },
}

impl fmt::Display for ProtoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtoError::EmptyFrame => write!(f, "frame length header declared 0 bytes"),
            ProtoError::TooLarge { max, actual } => {
                write!(f, "frame length {actual} exceeds maximum {max}")
            }
        }
    }
}

impl std::error::Error for ProtoError {}

/// Frame-level error wrapper: IO vs protocol.
#[derive(Debug)]
pub enum FrameError {
    Io(io::Error),
    Proto(ProtoError),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Io(e) => write!(f, "io error: {e}"),
            FrameError::Proto(e) => write!(f, "protocol error: {e}"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ProtoError> for FrameError {
    fn from(e: ProtoError) -> Self {
        Self::Proto(e)
    }
}
