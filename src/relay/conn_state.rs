use std::fmt;

/// Why a session ended up in [`ConnState::Disconnected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The owner stopped the session. Transport failures never land here;
    /// they return the session to `Discovering`.
    Stopped,
}

/// Connectivity state of a relay session. Exactly one instance per logical
/// session, mutated only by the session itself in response to its own events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// No session activity yet (or restarted).
    Idle,
    /// Looking for a peer (producer: probing; consumer: answering/accepting).
    Discovering,
    /// A stream connection attempt is in progress.
    Connecting,
    /// Frames are flowing; discovery is suppressed.
    Streaming,
    /// Terminal until the session is restarted.
    Disconnected(DisconnectReason),
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnState::Idle => write!(f, "idle"),
            ConnState::Discovering => write!(f, "discovering"),
            ConnState::Connecting => write!(f, "connecting"),
            ConnState::Streaming => write!(f, "streaming"),
            ConnState::Disconnected(DisconnectReason::Stopped) => write!(f, "stopped"),
        }
    }
}
