use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket},
    sync::{Arc, atomic::AtomicBool, atomic::Ordering},
    time::{Duration, Instant},
};

use crate::{
    config::Config,
    discovery::endpoint::Endpoint,
    log::{log_level::LogLevel, log_sink::LogSink},
    protocol::{self, constants::DEFAULT_DISCOVERY_PORT},
    sink_debug, sink_log, sink_trace, sink_warn,
};

const PROBE_TARGET_IP: &str = "8.8.8.8";
const PROBE_TARGET_PORT: u16 = 80;

/// How long to wait between run-flag checks while idling out a round.
const STOP_POLL_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// UDP port the probes are broadcast to.
    pub discovery_port: u16,
    /// Probe period; one request per period.
    pub period: Duration,
    /// How long to wait for a response each round. Shorter than the period so
    /// a silent network never stalls the loop.
    pub recv_timeout: Duration,
    /// Netmask used to derive the subnet broadcast address from the local IP.
    pub netmask: Ipv4Addr,
    /// When set, probes go to this address instead of the derived subnet
    /// broadcast (directed broadcast on odd topologies, loopback in tests).
    pub broadcast_addr: Option<Ipv4Addr>,
    /// When set, responses whose name field differs are ignored.
    pub peer_name: Option<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            discovery_port: DEFAULT_DISCOVERY_PORT,
            period: Duration::from_millis(500),
            recv_timeout: Duration::from_millis(400),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            broadcast_addr: None,
            peer_name: None,
        }
    }
}

impl DiscoveryConfig {
    /// Reads the `[Discovery]` section, keeping defaults for missing keys.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            discovery_port: config.get_u16("Discovery", "port", defaults.discovery_port),
            period: config.get_duration_ms("Discovery", "period_ms", defaults.period),
            recv_timeout: config.get_duration_ms(
                "Discovery",
                "recv_timeout_ms",
                defaults.recv_timeout,
            ),
            netmask: config
                .get("Discovery", "netmask")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.netmask),
            broadcast_addr: config
                .get("Discovery", "broadcast")
                .and_then(|s| s.parse().ok()),
            peer_name: config
                .get_non_empty("Discovery", "peer_name")
                .map(str::to_owned),
        }
    }
}

/// Broadcasts discovery probes and waits for the consumer's announcement.
///
/// Runs only while the session is not streaming; the first well-formed
/// response wins (this system pairs with exactly one peer).
pub struct DiscoveryAgent {
    cfg: DiscoveryConfig,
    logger: Arc<dyn LogSink>,
}

impl DiscoveryAgent {
    pub fn new(cfg: DiscoveryConfig, logger: Arc<dyn LogSink>) -> Self {
        Self { cfg, logger }
    }

    /// Runs probe rounds until an endpoint is found or `run_flag` clears.
    ///
    /// Transient socket errors are logged and treated as "no response this
    /// round"; the loop itself never fails.
    pub fn run(&self, run_flag: &AtomicBool) -> Option<Endpoint> {
        while run_flag.load(Ordering::SeqCst) {
            let round_start = Instant::now();
            let target = SocketAddr::new(self.broadcast_ip(), self.cfg.discovery_port);

            if let Some(endpoint) = self.probe_round(target) {
                return Some(endpoint);
            }

            // Idle out the rest of the period, still honoring stop.
            while round_start.elapsed() < self.cfg.period {
                if !run_flag.load(Ordering::SeqCst) {
                    return None;
                }
                let remaining = self.cfg.period.saturating_sub(round_start.elapsed());
                std::thread::sleep(remaining.min(STOP_POLL_SLICE));
            }
        }
        None
    }

    /// One probe exchange: send a request to `target`, wait up to the receive
    /// timeout for a single response, parse it.
    pub fn probe_round(&self, target: SocketAddr) -> Option<Endpoint> {
        let sock = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)) {
            Ok(s) => s,
            Err(e) => {
                sink_warn!(&self.logger, "discovery socket bind failed: {e}");
                return None;
            }
        };
        if let Err(e) = sock.set_broadcast(true) {
            sink_warn!(&self.logger, "set_broadcast failed: {e}");
            return None;
        }
        if let Err(e) = sock.set_read_timeout(Some(self.cfg.recv_timeout)) {
            sink_warn!(&self.logger, "set_read_timeout failed: {e}");
            return None;
        }

        if let Err(e) = sock.send_to(protocol::discovery::encode_request(), target) {
            // No route / network down: skip this round, retry next period.
            sink_warn!(&self.logger, "discovery probe to {target} failed: {e}");
            return None;
        }
        sink_trace!(&self.logger, "discovery probe sent to {target}");

        let mut buf = [0u8; 256];
        match sock.recv_from(&mut buf) {
            Ok((n, src)) => self.accept_response(&buf[..n], src),
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                None
            }
            Err(e) => {
                sink_warn!(&self.logger, "discovery recv error: {e}");
                None
            }
        }
    }

    fn accept_response(&self, datagram: &[u8], src: SocketAddr) -> Option<Endpoint> {
        let resp = protocol::discovery::parse_response(datagram)?;

        if let Some(expected) = &self.cfg.peer_name {
            if resp.name != *expected {
                sink_debug!(
                    &self.logger,
                    "ignoring response from '{}' (expecting '{expected}')",
                    resp.name
                );
                return None;
            }
        }

        sink_log!(
            &self.logger,
            LogLevel::Info,
            "peer '{}' found at {}:{}",
            resp.name,
            src.ip(),
            resp.port
        );
        Some(Endpoint::new(src.ip(), resp.port))
    }

    /// Configured broadcast override if set; otherwise the subnet broadcast
    /// derived from the current IP configuration, or the limited broadcast
    /// when no local IPv4 can be determined.
    fn broadcast_ip(&self) -> IpAddr {
        if let Some(addr) = self.cfg.broadcast_addr {
            return IpAddr::V4(addr);
        }
        match local_ipv4() {
            Some(ip) => IpAddr::V4(subnet_broadcast(ip, self.cfg.netmask)),
            None => IpAddr::V4(Ipv4Addr::BROADCAST),
        }
    }
}

/// Discovers the primary local IPv4 via a temporary probe socket. No packets
/// are sent; `connect` on UDP only selects the egress interface.
#[must_use]
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let probe = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    probe.connect((PROBE_TARGET_IP, PROBE_TARGET_PORT)).ok()?;
    match probe.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// Address OR'd with the inverted netmask.
#[must_use]
pub fn subnet_broadcast(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(netmask))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subnet_broadcast_ors_inverted_mask() {
        assert_eq!(
            subnet_broadcast(
                Ipv4Addr::new(192, 168, 1, 37),
                Ipv4Addr::new(255, 255, 255, 0)
            ),
            Ipv4Addr::new(192, 168, 1, 255)
        );
        assert_eq!(
            subnet_broadcast(
                Ipv4Addr::new(10, 0, 5, 9),
                Ipv4Addr::new(255, 255, 0, 0)
            ),
            Ipv4Addr::new(10, 0, 255, 255)
        );
    }
}
