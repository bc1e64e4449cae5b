use super::{DEFAULT_STREAM_PORT, DISCOVERY_REQUEST, DISCOVERY_RESPONSE_PREFIX};

/// Parsed body of a discovery response datagram.
///
/// Carries only what the peer said about itself; the peer's address comes
/// from the datagram envelope, never from the payload, so a spoofed address
/// field is never trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryResponse {
    /// Peer identity string (display name of the responding PC).
    pub name: String,
    /// TCP port the peer accepts the frame stream on.
    pub port: u16,
}

/// True if the datagram is a discovery probe.
#[must_use]
pub fn is_discovery_request(datagram: &[u8]) -> bool {
    match std::str::from_utf8(datagram) {
        Ok(s) => s.trim() == DISCOVERY_REQUEST,
        Err(_) => false,
    }
}

#[must_use]
pub fn encode_request() -> &'static [u8] {
    DISCOVERY_REQUEST.as_bytes()
}

/// `WEBCAMO_PC|<name>|<port>`, pipe-delimited ASCII.
#[must_use]
pub fn encode_response(name: &str, stream_port: u16) -> String {
    format!("{DISCOVERY_RESPONSE_PREFIX}|{name}|{stream_port}")
}

/// Parse a discovery response datagram.
///
/// Split on `|`, require the `WEBCAMO_PC` prefix and a name field; a missing
/// or malformed port field falls back to the well-known stream port.
/// Anything else yields `None` and is ignored for the round.
#[must_use]
pub fn parse_response(datagram: &[u8]) -> Option<DiscoveryResponse> {
    let text = std::str::from_utf8(datagram).ok()?;
    let mut parts = text.trim().split('|');

    if parts.next()? != DISCOVERY_RESPONSE_PREFIX {
        return None;
    }
    let name = parts.next()?.to_owned();
    let port = parts
        .next()
        .map_or(DEFAULT_STREAM_PORT, |p| p.parse().unwrap_or(DEFAULT_STREAM_PORT));

    Some(DiscoveryResponse { name, port })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn request_round_trip() {
        assert!(is_discovery_request(encode_request()));
        assert!(is_discovery_request(b"WEBCAMO_DISCOVER\n"));
        assert!(!is_discovery_request(b"WEBCAMO_PC|x|1"));
        assert!(!is_discovery_request(&[0xFF, 0xFE]));
    }

    #[test]
    fn parses_well_formed_response() {
        let resp = parse_response(b"WEBCAMO_PC|MyPC|9000").unwrap();
        assert_eq!(resp.name, "MyPC");
        assert_eq!(resp.port, 9000);
    }

    #[test]
    fn malformed_port_falls_back_to_default() {
        let resp = parse_response(b"WEBCAMO_PC|MyPC|notanumber").unwrap();
        assert_eq!(resp.port, DEFAULT_STREAM_PORT);
    }

    #[test]
    fn missing_prefix_is_ignored() {
        assert_eq!(parse_response(b"SOMETHING_ELSE|MyPC|9000"), None);
        assert_eq!(parse_response(b""), None);
        assert_eq!(parse_response(&[0x80, 0x81]), None);
    }

    #[test]
    fn encode_matches_parse() {
        let wire = encode_response("desk-pc", 9010);
        let resp = parse_response(wire.as_bytes()).unwrap();
        assert_eq!(resp.name, "desk-pc");
        assert_eq!(resp.port, 9010);
    }
}
