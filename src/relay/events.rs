use std::net::SocketAddr;

use crate::{discovery::Endpoint, relay::conn_state::ConnState};

/// Events a session publishes on its mpsc channel.
///
/// This replaces ad hoc state-change callbacks: callers drain the channel (or
/// query `state()`) at their own pace, and the session never runs foreign
/// code on its worker threads.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    StateChanged(ConnState),
    PeerFound(Endpoint),
    PeerConnected(SocketAddr),
    PeerDisconnected,
    Error(String),
}
