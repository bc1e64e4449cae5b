use std::{
    io,
    net::{Ipv4Addr, Shutdown, TcpListener, TcpStream},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender},
    },
    thread,
    time::Duration,
};

use crate::{
    config::Config,
    discovery::DiscoveryResponder,
    frame_buffer::{DEFAULT_CAPACITY, FrameBuffer},
    log::log_sink::LogSink,
    protocol::constants::{DEFAULT_DISCOVERY_PORT, DEFAULT_STREAM_PORT},
    relay::{
        conn_state::ConnState,
        errors::RelayError,
        events::RelayEvent,
        state_machine::{ConnStateMachine, SessionEvent},
        stats::{RelayStats, StatsSnapshot},
        transport,
    },
    sink_info, sink_warn,
};

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// UDP port to answer discovery probes on.
    pub discovery_port: u16,
    /// TCP port to accept the frame stream on. Port 0 binds an ephemeral
    /// port, which is then what the discovery responder advertises.
    pub stream_port: u16,
    /// Identity string sent in discovery responses.
    pub name: String,
    /// Capacity of the frame buffer between network and sink.
    pub buffer_capacity: usize,
    /// How often the accept loop polls for a client (and the run flag).
    pub accept_poll: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            discovery_port: DEFAULT_DISCOVERY_PORT,
            stream_port: DEFAULT_STREAM_PORT,
            name: "camrelay-pc".to_owned(),
            buffer_capacity: DEFAULT_CAPACITY,
            accept_poll: Duration::from_millis(100),
        }
    }
}

impl ReceiverConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            discovery_port: config.get_u16("Discovery", "port", defaults.discovery_port),
            stream_port: config.get_u16("Stream", "port", defaults.stream_port),
            name: config
                .get_non_empty("Discovery", "name")
                .unwrap_or(&defaults.name)
                .to_owned(),
            buffer_capacity: config.get_usize("Buffer", "capacity", defaults.buffer_capacity),
            accept_poll: defaults.accept_poll,
        }
    }
}

/// Consumer-side session: answers discovery probes, accepts one stream
/// client at a time and pumps its frames into the shared [`FrameBuffer`].
///
/// The presentation collaborator drains [`buffer`](Self::buffer) from its own
/// thread; a `pop` timeout is its cue to show a placeholder.
pub struct ReceiverSession {
    cfg: ReceiverConfig,
    logger: Arc<dyn LogSink>,
    event_tx: Sender<RelayEvent>,
    event_rx: Receiver<RelayEvent>,
    state: Arc<Mutex<ConnStateMachine>>,
    run_flag: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    buffer: Arc<FrameBuffer>,
    active_client: Arc<Mutex<Option<TcpStream>>>,
    stats: Arc<RelayStats>,
    stream_port: u16,
    responder: Option<DiscoveryResponder>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ReceiverSession {
    pub fn new(cfg: ReceiverConfig, logger: Arc<dyn LogSink>) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        let buffer = Arc::new(FrameBuffer::new(cfg.buffer_capacity));
        Self {
            cfg,
            logger,
            event_tx,
            event_rx,
            state: Arc::new(Mutex::new(ConnStateMachine::new())),
            run_flag: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            buffer,
            active_client: Arc::new(Mutex::new(None)),
            stats: Arc::new(RelayStats::default()),
            stream_port: 0,
            responder: None,
            worker: None,
        }
    }

    /// Binds the stream listener, starts the discovery responder and the
    /// accept loop.
    ///
    /// # Errors
    /// `RelayError::AlreadyRunning` when already started; `RelayError::Io`
    /// when the stream port cannot be bound. A taken discovery port is only
    /// logged: direct connections still work without a responder.
    pub fn start(&mut self) -> Result<(), RelayError> {
        if self.worker.is_some() {
            return Err(RelayError::AlreadyRunning);
        }

        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, self.cfg.stream_port))?;
        listener.set_nonblocking(true)?;
        self.stream_port = listener.local_addr()?.port();
        sink_info!(&self.logger, "listening for frames on tcp/{}", self.stream_port);

        self.paused.store(false, Ordering::SeqCst);
        match DiscoveryResponder::start(
            self.cfg.discovery_port,
            self.cfg.name.clone(),
            self.stream_port,
            Arc::clone(&self.paused),
            Arc::clone(&self.logger),
        ) {
            Ok(responder) => self.responder = Some(responder),
            Err(e) => {
                sink_warn!(
                    &self.logger,
                    "discovery responder unavailable on udp/{}: {e}",
                    self.cfg.discovery_port
                );
            }
        }

        self.run_flag.store(true, Ordering::SeqCst);
        transition(&self.state, &self.event_tx, &self.logger, SessionEvent::Start);

        let worker = ReceiverWorker {
            logger: Arc::clone(&self.logger),
            event_tx: self.event_tx.clone(),
            state: Arc::clone(&self.state),
            run_flag: Arc::clone(&self.run_flag),
            paused: Arc::clone(&self.paused),
            buffer: Arc::clone(&self.buffer),
            active_client: Arc::clone(&self.active_client),
            stats: Arc::clone(&self.stats),
            accept_poll: self.cfg.accept_poll,
        };
        let handle = thread::Builder::new()
            .name("receiver-accept".into())
            .spawn(move || worker.run(listener))?;
        self.worker = Some(handle);
        Ok(())
    }

    /// Stops the session: flags all loops down, shuts the active client
    /// socket to unblock its reader, joins everything, clears the buffer.
    pub fn stop(&mut self) {
        self.run_flag.store(false, Ordering::SeqCst);

        if let Some(mut responder) = self.responder.take() {
            responder.stop();
        }
        // Close before join: a blocked read_exact returns once the socket
        // is shut down from here.
        if let Ok(guard) = self.active_client.lock() {
            if let Some(stream) = guard.as_ref() {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        self.buffer.clear();
        transition(&self.state, &self.event_tx, &self.logger, SessionEvent::Stop);
    }

    /// The buffer the presentation sink drains.
    #[must_use]
    pub fn buffer(&self) -> Arc<FrameBuffer> {
        Arc::clone(&self.buffer)
    }

    /// The port the listener actually bound (resolves port 0).
    #[must_use]
    pub fn stream_port(&self) -> u16 {
        self.stream_port
    }

    #[must_use]
    pub fn state(&self) -> ConnState {
        self.state
            .lock()
            .map(|sm| sm.state())
            .unwrap_or(ConnState::Idle)
    }

    /// Drains pending session events without blocking.
    #[must_use]
    pub fn poll(&self) -> Vec<RelayEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = self.event_rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for ReceiverSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn transition(
    state: &Mutex<ConnStateMachine>,
    event_tx: &Sender<RelayEvent>,
    logger: &Arc<dyn LogSink>,
    event: SessionEvent,
) {
    let changed = state.lock().ok().and_then(|mut sm| sm.apply(event));
    if let Some(new_state) = changed {
        sink_info!(logger, "state -> {new_state}");
        let _ = event_tx.send(RelayEvent::StateChanged(new_state));
    }
}

struct ReceiverWorker {
    logger: Arc<dyn LogSink>,
    event_tx: Sender<RelayEvent>,
    state: Arc<Mutex<ConnStateMachine>>,
    run_flag: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    buffer: Arc<FrameBuffer>,
    active_client: Arc<Mutex<Option<TcpStream>>>,
    stats: Arc<RelayStats>,
    accept_poll: Duration,
}

impl ReceiverWorker {
    /// Accept loop: one client at a time; the listener is not polled again
    /// until the current client is gone.
    fn run(&self, listener: TcpListener) {
        while self.running() {
            match listener.accept() {
                Ok((stream, peer)) => {
                    sink_info!(&self.logger, "client connected from {peer}");
                    self.serve_client(stream);
                    let _ = self.event_tx.send(RelayEvent::PeerDisconnected);
                    if self.running() {
                        transition(
                            &self.state,
                            &self.event_tx,
                            &self.logger,
                            SessionEvent::TransportError,
                        );
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(self.accept_poll);
                }
                Err(e) => {
                    sink_warn!(&self.logger, "accept error: {e}");
                    thread::sleep(self.accept_poll);
                }
            }
        }
    }

    fn serve_client(&self, mut stream: TcpStream) {
        // The listener is non-blocking; the accepted socket must not be.
        if let Err(e) = stream.set_nonblocking(false) {
            sink_warn!(&self.logger, "set_nonblocking(false) failed: {e}");
            return;
        }
        let _ = stream.set_nodelay(true);

        let peer = match stream.peer_addr() {
            Ok(p) => p,
            Err(e) => {
                sink_warn!(&self.logger, "peer_addr failed: {e}");
                return;
            }
        };

        // Register a clone so stop() can shut the socket under our feet.
        match stream.try_clone() {
            Ok(clone) => {
                if let Ok(mut guard) = self.active_client.lock() {
                    *guard = Some(clone);
                }
            }
            Err(e) => {
                sink_warn!(&self.logger, "try_clone failed: {e}");
                return;
            }
        }

        // stop() may have taken its shutdown snapshot before the clone
        // landed; never enter the read loop with a dead run flag.
        if !self.running() {
            let _ = stream.shutdown(Shutdown::Both);
            if let Ok(mut guard) = self.active_client.lock() {
                *guard = None;
            }
            return;
        }

        // Paired: stop inviting other producers until this client drops.
        self.paused.store(true, Ordering::SeqCst);
        transition(
            &self.state,
            &self.event_tx,
            &self.logger,
            SessionEvent::Accepted,
        );
        let _ = self.event_tx.send(RelayEvent::PeerConnected(peer));

        let err = transport::pump_frames(&mut stream, &self.buffer, &self.run_flag, &self.stats);
        if self.running() {
            sink_info!(&self.logger, "client {peer} disconnected: {err}");
        }

        self.paused.store(false, Ordering::SeqCst);
        if let Ok(mut guard) = self.active_client.lock() {
            *guard = None;
        }
    }

    fn running(&self) -> bool {
        self.run_flag.load(Ordering::SeqCst)
    }
}
