//! The relay core: connection state machine, frame transport and the two
//! session types (producer and consumer) that tie discovery, the stream
//! socket and the frame buffer together.
pub mod conn_state;
pub mod errors;
pub mod events;
pub mod receiver_session;
pub mod sender_session;
pub mod state_machine;
pub mod stats;
pub mod transport;

pub use conn_state::{ConnState, DisconnectReason};
pub use errors::{OfferError, RelayError};
pub use events::RelayEvent;
pub use receiver_session::{ReceiverConfig, ReceiverSession};
pub use sender_session::{SenderConfig, SenderSession};
pub use state_machine::{ConnStateMachine, SessionEvent};
pub use stats::{RelayStats, StatsSnapshot};
pub use transport::{FrameSender, InFlightToken};
