//! The wire formats of the relay: the UDP discovery exchange and the
//! length-prefixed TCP stream frame. Pure encode/decode, no state.
pub mod constants;
pub mod discovery;
pub mod errors;
pub mod framing;

pub use constants::{
    DEFAULT_DISCOVERY_PORT, DEFAULT_STREAM_PORT, DISCOVERY_REQUEST, DISCOVERY_RESPONSE_PREFIX,
    FRAME_HEADER_LEN, MAX_FRAME_LEN,
};
pub use discovery::DiscoveryResponse;
pub use errors::{FrameError, ProtoError};
