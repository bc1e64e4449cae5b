use std::{
    net::{Shutdown, TcpStream},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{self, Receiver, Sender, SyncSender, TrySendError},
    },
    thread,
    time::Duration,
};

use bytes::Bytes;

use crate::{
    config::Config,
    discovery::{DiscoveryAgent, DiscoveryConfig},
    frame::Frame,
    log::log_sink::LogSink,
    protocol::MAX_FRAME_LEN,
    relay::{
        conn_state::ConnState,
        errors::{OfferError, RelayError},
        events::RelayEvent,
        state_machine::{ConnStateMachine, SessionEvent},
        stats::{RelayStats, StatsSnapshot},
        transport::{FrameSender, InFlightGuard, InFlightToken},
    },
    sink_error, sink_info, sink_warn,
};

/// How often the stream loop wakes to check the run flag when no frame is
/// pending.
const PENDING_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub discovery: DiscoveryConfig,
    /// Bound on one stream connect attempt.
    pub connect_timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            connect_timeout: Duration::from_secs(3),
        }
    }
}

impl SenderConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            discovery: DiscoveryConfig::from_config(config),
            connect_timeout: config.get_duration_ms(
                "Stream",
                "connect_timeout_ms",
                defaults.connect_timeout,
            ),
        }
    }
}

/// A frame handed to the connection thread; the in-flight guard travels with
/// it and releases the permit once the write (or the drop) is done.
struct Pending {
    frame: Frame,
    _guard: InFlightGuard,
}

/// Producer-side session: alternates between discovery and an established
/// stream connection, reconnecting after any failure until stopped.
///
/// The capture collaborator calls [`offer_frame`](Self::offer_frame) from its
/// own thread; the actual socket write happens on the connection thread, so
/// capture never blocks on network I/O.
pub struct SenderSession {
    cfg: SenderConfig,
    logger: Arc<dyn LogSink>,
    event_tx: Sender<RelayEvent>,
    event_rx: Receiver<RelayEvent>,
    state: Arc<Mutex<ConnStateMachine>>,
    run_flag: Arc<AtomicBool>,
    in_flight: InFlightToken,
    pending_tx: Arc<Mutex<Option<SyncSender<Pending>>>>,
    active_stream: Arc<Mutex<Option<TcpStream>>>,
    stats: Arc<RelayStats>,
    next_seq: AtomicU64,
    worker: Option<thread::JoinHandle<()>>,
}

impl SenderSession {
    pub fn new(cfg: SenderConfig, logger: Arc<dyn LogSink>) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        Self {
            cfg,
            logger,
            event_tx,
            event_rx,
            state: Arc::new(Mutex::new(ConnStateMachine::new())),
            run_flag: Arc::new(AtomicBool::new(false)),
            in_flight: InFlightToken::new(),
            pending_tx: Arc::new(Mutex::new(None)),
            active_stream: Arc::new(Mutex::new(None)),
            stats: Arc::new(RelayStats::default()),
            next_seq: AtomicU64::new(0),
            worker: None,
        }
    }

    /// Starts the discovery/connect/stream loop on its own thread.
    ///
    /// # Errors
    /// `RelayError::AlreadyRunning` if the session was started and not
    /// stopped; `RelayError::Io` if the worker thread cannot be spawned.
    pub fn start(&mut self) -> Result<(), RelayError> {
        if self.worker.is_some() {
            return Err(RelayError::AlreadyRunning);
        }

        self.run_flag.store(true, Ordering::SeqCst);
        transition(&self.state, &self.event_tx, &self.logger, SessionEvent::Start);

        let worker = SenderWorker {
            cfg: self.cfg.clone(),
            logger: Arc::clone(&self.logger),
            event_tx: self.event_tx.clone(),
            state: Arc::clone(&self.state),
            run_flag: Arc::clone(&self.run_flag),
            pending_tx: Arc::clone(&self.pending_tx),
            active_stream: Arc::clone(&self.active_stream),
            stats: Arc::clone(&self.stats),
        };
        let handle = thread::Builder::new()
            .name("sender-conn".into())
            .spawn(move || worker.run())?;
        self.worker = Some(handle);
        Ok(())
    }

    /// Stops the session: clears the run flag, shuts down the stream socket
    /// to unblock any in-progress frame write, joins the connection thread
    /// and lands the state in `Disconnected(Stopped)`.
    pub fn stop(&mut self) {
        self.run_flag.store(false, Ordering::SeqCst);
        // Close before join: a frame write stalled on a full TCP buffer
        // returns once the socket is shut down from here.
        if let Ok(guard) = self.active_stream.lock() {
            if let Some(stream) = guard.as_ref() {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        if let Ok(mut slot) = self.active_stream.lock() {
            *slot = None;
        }
        transition(&self.state, &self.event_tx, &self.logger, SessionEvent::Stop);
    }

    /// Offers one compressed frame for transmission.
    ///
    /// Non-blocking: when the previous frame is still in flight, or no stream
    /// connection is active, the frame is discarded and counted as dropped.
    ///
    /// # Errors
    /// See [`OfferError`]; none of these are fatal.
    pub fn offer_frame(&self, payload: Bytes) -> Result<(), OfferError> {
        if payload.is_empty() {
            return Err(OfferError::EmptyFrame);
        }
        if payload.len() > MAX_FRAME_LEN {
            return Err(OfferError::TooLarge {
                max: MAX_FRAME_LEN,
                actual: payload.len(),
            });
        }

        let pending = self.pending_tx.lock().ok();
        let Some(tx) = pending.as_ref().and_then(|slot| slot.as_ref().cloned()) else {
            self.stats.record_dropped();
            return Err(OfferError::NotStreaming);
        };
        drop(pending);

        let Some(guard) = self.in_flight.try_acquire() else {
            self.stats.record_dropped();
            return Err(OfferError::Busy);
        };

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = Frame::new(seq, payload);
        match tx.try_send(Pending {
            frame,
            _guard: guard,
        }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.stats.record_dropped();
                Err(OfferError::Busy)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.stats.record_dropped();
                Err(OfferError::NotStreaming)
            }
        }
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

impl Drop for SenderSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Applies a state machine event under the lock; on an actual change, logs it
/// and publishes `RelayEvent::StateChanged`.
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

/// Everything the connection thread needs, cloned out of the session.
struct SenderWorker {
    cfg: SenderConfig,
    logger: Arc<dyn LogSink>,
    event_tx: Sender<RelayEvent>,
    state: Arc<Mutex<ConnStateMachine>>,
    run_flag: Arc<AtomicBool>,
    pending_tx: Arc<Mutex<Option<SyncSender<Pending>>>>,
    active_stream: Arc<Mutex<Option<TcpStream>>>,
    stats: Arc<RelayStats>,
}

impl SenderWorker {
    fn run(&self) {
        let agent = DiscoveryAgent::new(self.cfg.discovery.clone(), Arc::clone(&self.logger));

        while self.running() {
            // Discovery runs only outside Streaming by construction: this
            // loop does not reach it again until the stream is gone.
            let Some(endpoint) = agent.run(&self.run_flag) else {
                break; // stop requested
            };
            let _ = self.event_tx.send(RelayEvent::PeerFound(endpoint));
            self.transition(SessionEvent::PeerFound);

            let stream = match TcpStream::connect_timeout(
                &endpoint.socket_addr(),
                self.cfg.connect_timeout,
            ) {
                Ok(s) => s,
                Err(e) => {
                    sink_warn!(&self.logger, "connect to {endpoint} failed: {e}");
                    self.transition(SessionEvent::ConnectFailed);
                    continue;
                }
            };
            // Low latency beats throughput here: no send coalescing delay.
            if let Err(e) = stream.set_nodelay(true) {
                sink_warn!(&self.logger, "set_nodelay failed: {e}");
            }
            let peer = stream
                .peer_addr()
                .unwrap_or_else(|_| endpoint.socket_addr());

            // Register a clone so stop() can shut the socket under our feet.
            match stream.try_clone() {
                Ok(clone) => {
                    if let Ok(mut slot) = self.active_stream.lock() {
                        *slot = Some(clone);
                    }
                }
                Err(e) => {
                    sink_warn!(&self.logger, "try_clone failed: {e}");
                    self.transition(SessionEvent::ConnectFailed);
                    continue;
                }
            }
            // stop() may have taken its shutdown snapshot before the clone
            // landed; never enter the send loop with a dead run flag.
            if !self.running() {
                let _ = stream.shutdown(Shutdown::Both);
                break;
            }

            self.transition(SessionEvent::ConnectOk);
            let _ = self.event_tx.send(RelayEvent::PeerConnected(peer));
            sink_info!(&self.logger, "streaming to {peer}");

            self.stream_frames(stream);

            let _ = self.event_tx.send(RelayEvent::PeerDisconnected);
            if self.running() {
                self.transition(SessionEvent::TransportError);
            }
        }
    }

    /// Owns the established connection: takes pending frames from the
    /// capture side and writes them out until a write fails or stop is
    /// requested.
    fn stream_frames(&self, stream: TcpStream) {
        let (tx, rx) = mpsc::sync_channel::<Pending>(1);
        if let Ok(mut slot) = self.pending_tx.lock() {
            *slot = Some(tx);
        }
        let sender = FrameSender::new(stream);

        while self.running() {
            match rx.recv_timeout(PENDING_POLL) {
                Ok(pending) => {
                    if let Err(e) = sender.send(&pending.frame) {
                        sink_error!(&self.logger, "frame write failed: {e}");
                        let _ = self
                            .event_tx
                            .send(RelayEvent::Error(format!("frame write failed: {e}")));
                        break;
                    }
                    self.stats.record_sent();
                    // pending drops here, releasing the in-flight permit
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        if let Ok(mut slot) = self.pending_tx.lock() {
            *slot = None;
        }
        if let Ok(mut slot) = self.active_stream.lock() {
            *slot = None;
        }
        // The stream (inside FrameSender) drops here, closing the socket.
    }

    fn running(&self) -> bool {
        self.run_flag.load(Ordering::SeqCst)
    }

    fn transition(&self, event: SessionEvent) {
        transition(&self.state, &self.event_tx, &self.logger, event);
    }
}
