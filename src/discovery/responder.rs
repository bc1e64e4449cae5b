use std::{
    io,
    net::{Ipv4Addr, UdpSocket},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crate::{
    log::log_sink::LogSink,
    protocol,
    sink_debug, sink_info, sink_warn,
};

/// Consumer-side half of the discovery exchange.
///
/// Listens on the discovery port and answers each probe with
/// `WEBCAMO_PC|<name>|<stream_port>`, unicast back to the requester. While
/// paused (a client is streaming) probes are read and dropped, so a paired
/// receiver does not invite a second producer.
pub struct DiscoveryResponder {
    run_flag: Arc<AtomicBool>,
    port: u16,
    handle: Option<thread::JoinHandle<()>>,
}

impl DiscoveryResponder {
    /// Binds the discovery port and spawns the responder thread.
    ///
    /// # Errors
    /// Returns the bind error when the discovery port is taken; the caller
    /// may still accept direct connections without a responder.
    pub fn start(
        discovery_port: u16,
        name: String,
        stream_port: u16,
        paused: Arc<AtomicBool>,
        logger: Arc<dyn LogSink>,
    ) -> io::Result<Self> {
        let sock = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, discovery_port))?;
        sock.set_read_timeout(Some(Duration::from_millis(500)))?;
        let port = sock.local_addr()?.port();

        let run_flag = Arc::new(AtomicBool::new(true));
        let run = Arc::clone(&run_flag);

        let handle = thread::Builder::new()
            .name("discovery-responder".into())
            .spawn(move || {
                sink_info!(&logger, "answering discovery probes on udp/{port}");
                let reply = protocol::discovery::encode_response(&name, stream_port);
                let mut buf = [0u8; 256];

                while run.load(Ordering::SeqCst) {
                    match sock.recv_from(&mut buf) {
                        Ok((n, src)) => {
                            if !protocol::discovery::is_discovery_request(&buf[..n]) {
                                continue;
                            }
                            if paused.load(Ordering::SeqCst) {
                                sink_debug!(&logger, "probe from {src} ignored while paired");
                                continue;
                            }
                            if let Err(e) = sock.send_to(reply.as_bytes(), src) {
                                sink_warn!(&logger, "discovery reply to {src} failed: {e}");
                            } else {
                                sink_debug!(&logger, "answered discovery probe from {src}");
                            }
                        }
                        Err(ref e)
                            if e.kind() == io::ErrorKind::WouldBlock
                                || e.kind() == io::ErrorKind::TimedOut => {}
                        Err(e) => {
                            // Transient by policy: log and keep listening.
                            sink_warn!(&logger, "discovery responder recv error: {e}");
                        }
                    }
                }
            })?;

        Ok(Self {
            run_flag,
            port,
            handle: Some(handle),
        })
    }

    /// The UDP port actually bound (resolves port 0).
    #[must_use]
    pub fn local_port(&self) -> u16 {
        self.port
    }

    /// Stops the responder and joins its thread. The socket read timeout
    /// bounds how long the join can take.
    pub fn stop(&mut self) {
        self.run_flag.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DiscoveryResponder {
    fn drop(&mut self) {
        self.stop();
    }
}
