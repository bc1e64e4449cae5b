use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Resolved (address, port) pair the stream connection is opened against.
///
/// Created from a discovery response: the address comes from the datagram
/// envelope, the port from the response payload. Consumed once by the
/// connection attempt and discarded whatever the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub addr: IpAddr,
    pub port: u16,
}

impl Endpoint {
    #[must_use]
    pub fn new(addr: IpAddr, port: u16) -> Self {
        Self { addr, port }
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}
