//! LAN peer discovery: the producer broadcasts `WEBCAMO_DISCOVER` probes and
//! the consumer answers with its name and stream port. One well-formed answer
//! resolves the [`Endpoint`] the stream connection is opened against.
mod agent;
mod endpoint;
mod responder;

pub use agent::{DiscoveryAgent, DiscoveryConfig, local_ipv4, subnet_broadcast};
pub use endpoint::Endpoint;
pub use responder::DiscoveryResponder;
