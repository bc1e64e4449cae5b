use super::conn_state::{ConnState, DisconnectReason};

/// Events a session feeds into its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session start requested by the owner.
    Start,
    /// Discovery yielded an endpoint (producer role).
    PeerFound,
    /// The stream socket connected within the timeout.
    ConnectOk,
    /// The connect attempt failed or timed out.
    ConnectFailed,
    /// The listener accepted a client (consumer role, no Connecting phase).
    Accepted,
    /// A transport read/write failed or the remote closed the connection.
    TransportError,
    /// Session stop requested by the owner.
    Stop,
}

/// The connection state machine, kept free of any I/O so transitions can be
/// exercised directly.
///
/// Invariant: at most one of `Discovering`/`Connecting`/`Streaming` is active,
/// and entering `Streaming` suppresses discovery until the state leaves it
/// again. Events that make no sense in the current state are ignored.
#[derive(Debug)]
pub struct ConnStateMachine {
    state: ConnState,
}

impl Default for ConnStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ConnState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Applies an event. Returns the new state when it changed, `None` when
    /// the event was ignored.
    pub fn apply(&mut self, event: SessionEvent) -> Option<ConnState> {
        use ConnState::*;
        use SessionEvent::*;

        let next = match (self.state, event) {
            (Idle | Disconnected(_), Start) => Discovering,
            (Discovering, PeerFound) => Connecting,
            (Connecting, ConnectOk) => Streaming,
            (Connecting, ConnectFailed) => Discovering,
            (Discovering, Accepted) => Streaming,
            (Streaming, TransportError) => Discovering,
            (Disconnected(_), Stop) => return None,
            (_, Stop) => Disconnected(DisconnectReason::Stopped),
            _ => return None,
        };

        if next == self.state {
            return None;
        }
        self.state = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_moves_idle_to_discovering() {
        let mut sm = ConnStateMachine::new();
        assert_eq!(sm.state(), ConnState::Idle);
        assert_eq!(sm.apply(SessionEvent::Start), Some(ConnState::Discovering));
    }

    #[test]
    fn discovery_timeout_keeps_discovering() {
        // A silent round produces no event at all; the state must not move.
        let mut sm = ConnStateMachine::new();
        sm.apply(SessionEvent::Start);
        assert_eq!(sm.state(), ConnState::Discovering);
        // Irrelevant events while discovering are ignored too.
        assert_eq!(sm.apply(SessionEvent::ConnectOk), None);
        assert_eq!(sm.apply(SessionEvent::TransportError), None);
        assert_eq!(sm.state(), ConnState::Discovering);
    }

    #[test]
    fn connect_then_socket_error_cycles_back_to_discovering() {
        let mut sm = ConnStateMachine::new();
        sm.apply(SessionEvent::Start);
        assert_eq!(sm.apply(SessionEvent::PeerFound), Some(ConnState::Connecting));
        assert_eq!(sm.apply(SessionEvent::ConnectOk), Some(ConnState::Streaming));
        assert_eq!(
            sm.apply(SessionEvent::TransportError),
            Some(ConnState::Discovering)
        );
    }

    #[test]
    fn connect_failure_retries_discovery() {
        let mut sm = ConnStateMachine::new();
        sm.apply(SessionEvent::Start);
        sm.apply(SessionEvent::PeerFound);
        assert_eq!(
            sm.apply(SessionEvent::ConnectFailed),
            Some(ConnState::Discovering)
        );
    }

    #[test]
    fn accept_streams_without_connecting_phase() {
        let mut sm = ConnStateMachine::new();
        sm.apply(SessionEvent::Start);
        assert_eq!(sm.apply(SessionEvent::Accepted), Some(ConnState::Streaming));
    }

    #[test]
    fn streaming_ignores_discovery_results() {
        // Guards the mutual exclusion: a stray endpoint while paired must not
        // restart the connect path.
        let mut sm = ConnStateMachine::new();
        sm.apply(SessionEvent::Start);
        sm.apply(SessionEvent::PeerFound);
        sm.apply(SessionEvent::ConnectOk);
        assert_eq!(sm.apply(SessionEvent::PeerFound), None);
        assert_eq!(sm.state(), ConnState::Streaming);
    }

    #[test]
    fn stop_is_terminal_until_restart() {
        let mut sm = ConnStateMachine::new();
        sm.apply(SessionEvent::Start);
        sm.apply(SessionEvent::PeerFound);
        assert_eq!(
            sm.apply(SessionEvent::Stop),
            Some(ConnState::Disconnected(DisconnectReason::Stopped))
        );
        assert_eq!(sm.apply(SessionEvent::PeerFound), None);
        assert_eq!(sm.apply(SessionEvent::TransportError), None);
        // A fresh start leaves the terminal state.
        assert_eq!(sm.apply(SessionEvent::Start), Some(ConnState::Discovering));
    }
}
