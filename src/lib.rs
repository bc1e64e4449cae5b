//! camrelay relays a live video feed from a mobile capture device to a
//! PC-side sink over a local network.
//!
//! It provides two main binaries:
//! - `sender`: the producer side, which discovers a peer on the LAN and
//!   streams compressed frames to it over TCP.
//! - `receiver`: the consumer side, which answers discovery probes, accepts
//!   the stream and hands frames to a presentation sink.
//!
//! Frames are opaque, already-compressed byte payloads; capture, encoding,
//! decoding and display belong to the callers. The crate owns peer discovery,
//! the connection state machine, the length-prefixed wire transport and the
//! bounded frame buffering between network and sink.

/// Handles configuration loading and management.
pub mod config;
/// UDP broadcast discovery: probe loop and announcement responder.
pub mod discovery;
/// Opaque compressed frame payloads with sequence numbers and timestamps.
pub mod frame;
/// Bounded, thread-safe frame queue between network and sink.
pub mod frame_buffer;
/// Logging utilities for the application.
pub mod log;
/// Wire formats: discovery datagrams and length-prefixed stream frames.
pub mod protocol;
/// Sessions, connection state machine and the frame transport.
pub mod relay;
