/// Discovery request token, broadcast as-is by the producer side.
pub const DISCOVERY_REQUEST: &str = "WEBCAMO_DISCOVER";

/// Prefix of the pipe-delimited discovery response:
/// `WEBCAMO_PC|<name>|<stream_port>`.
pub const DISCOVERY_RESPONSE_PREFIX: &str = "WEBCAMO_PC";

/// UDP port the discovery exchange runs on.
pub const DEFAULT_DISCOVERY_PORT: u16 = 9001;

/// TCP port the frame stream runs on, advertised in the discovery response.
pub const DEFAULT_STREAM_PORT: u16 = 9000;

/// Hard ceiling on a single frame payload (guards against a corrupted or
/// adversarial length header causing unbounded allocation).
pub const MAX_FRAME_LEN: usize = 10 * 1024 * 1024; // 10 MiB

/// Size of the stream frame length prefix: u32, little-endian.
pub const FRAME_HEADER_LEN: usize = 4;
