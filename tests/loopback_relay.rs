//! End-to-end checks over loopback: a real listener, a real TCP client and
//! a real UDP discovery exchange, all on ephemeral ports.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream},
    sync::{Arc, atomic::AtomicBool, mpsc},
    thread,
    time::{Duration, Instant},
};

use bytes::Bytes;

use camrelay::{
    discovery::{DiscoveryAgent, DiscoveryConfig, DiscoveryResponder},
    log::NoopLogSink,
    protocol::framing,
    relay::{
        ConnState, DisconnectReason, OfferError, ReceiverConfig, ReceiverSession, SenderConfig,
        SenderSession,
    },
};

fn test_receiver_config() -> ReceiverConfig {
    ReceiverConfig {
        // Port 0 everywhere so parallel test runs never collide.
        discovery_port: 0,
        stream_port: 0,
        name: "loopback-pc".to_owned(),
        buffer_capacity: 8,
        accept_poll: Duration::from_millis(10),
    }
}

fn wait_for_state(session: &ReceiverSession, wanted: ConnState) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while session.state() != wanted {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {wanted}, still {}",
            session.state()
        );
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn receiver_buffers_streamed_frames_in_order() {
    let mut session = ReceiverSession::new(test_receiver_config(), Arc::new(NoopLogSink));
    session.start().unwrap();
    wait_for_state(&session, ConnState::Discovering);

    let mut client =
        TcpStream::connect(("127.0.0.1", session.stream_port())).unwrap();
    wait_for_state(&session, ConnState::Streaming);

    for payload in [&b"alpha"[..], b"beta", b"gamma"] {
        framing::write_frame(&mut client, payload).unwrap();
    }

    let buffer = session.buffer();
    let mut got = Vec::new();
    for _ in 0..3 {
        let frame = buffer.pop(Duration::from_secs(2)).expect("frame arrives");
        got.push((frame.seq, frame.payload.clone()));
    }
    assert_eq!(got, vec![
        (1, Bytes::from_static(b"alpha")),
        (2, Bytes::from_static(b"beta")),
        (3, Bytes::from_static(b"gamma")),
    ]);
    assert_eq!(session.stats().frames_received, 3);

    // Client gone: the session goes back to inviting producers.
    drop(client);
    wait_for_state(&session, ConnState::Discovering);

    session.stop();
    assert_eq!(
        session.state(),
        ConnState::Disconnected(DisconnectReason::Stopped)
    );
    assert!(session.buffer().is_empty(), "stop clears the buffer");
}

#[test]
fn zero_length_frame_disconnects_the_client() {
    let mut session = ReceiverSession::new(test_receiver_config(), Arc::new(NoopLogSink));
    session.start().unwrap();

    let mut client =
        TcpStream::connect(("127.0.0.1", session.stream_port())).unwrap();
    wait_for_state(&session, ConnState::Streaming);

    framing::write_frame(&mut client, b"ok").unwrap();
    // A zero length header is malformed; the receiver must drop us.
    std::io::Write::write_all(&mut client, &[0u8, 0, 0, 0]).unwrap();

    // Only the valid frame before the bad header survives.
    let buffer = session.buffer();
    let frame = buffer.pop(Duration::from_secs(2)).expect("first frame");
    assert_eq!(frame.payload, Bytes::from_static(b"ok"));
    wait_for_state(&session, ConnState::Discovering);
    assert!(buffer.pop(Duration::from_millis(50)).is_none());

    session.stop();
}

#[test]
fn stop_unblocks_an_idle_client_connection() {
    let mut session = ReceiverSession::new(test_receiver_config(), Arc::new(NoopLogSink));
    session.start().unwrap();

    // Connect and then send nothing: the session blocks in a frame read.
    let _client = TcpStream::connect(("127.0.0.1", session.stream_port())).unwrap();
    wait_for_state(&session, ConnState::Streaming);

    // stop() must shut the socket down and come back promptly.
    let start = Instant::now();
    session.stop();
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "stop took {:?}",
        start.elapsed()
    );
    assert_eq!(
        session.state(),
        ConnState::Disconnected(DisconnectReason::Stopped)
    );
}

#[test]
fn stop_unblocks_a_stalled_sender_write() {
    // A peer that accepts the stream connection and then never reads from
    // it, so the sender's TCP buffers fill and a frame write stalls.
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let stream_port = listener.local_addr().unwrap().port();
    let hold_client = thread::spawn(move || listener.accept());

    let paused = Arc::new(AtomicBool::new(false));
    let mut responder = DiscoveryResponder::start(
        0,
        "stall-pc".to_owned(),
        stream_port,
        Arc::clone(&paused),
        Arc::new(NoopLogSink),
    )
    .unwrap();

    let cfg = SenderConfig {
        discovery: DiscoveryConfig {
            discovery_port: responder.local_port(),
            broadcast_addr: Some(Ipv4Addr::LOCALHOST),
            ..DiscoveryConfig::default()
        },
        ..SenderConfig::default()
    };
    let mut session = SenderSession::new(cfg, Arc::new(NoopLogSink));
    session.start().unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while session.state() != ConnState::Streaming {
        assert!(Instant::now() < deadline, "no stream connection");
        thread::sleep(Duration::from_millis(10));
    }

    // Offer large frames until the in-flight permit stays held: the write
    // is now blocked inside the socket and only a shutdown can free it.
    let payload = Bytes::from(vec![0u8; 8 * 1024 * 1024]);
    let stall_deadline = Instant::now() + Duration::from_secs(10);
    let mut busy_streak = 0;
    while busy_streak < 10 {
        assert!(Instant::now() < stall_deadline, "write never stalled");
        match session.offer_frame(payload.clone()) {
            Err(OfferError::Busy) => busy_streak += 1,
            _ => busy_streak = 0,
        }
        thread::sleep(Duration::from_millis(50));
    }

    // stop() must come back despite the stalled write.
    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        session.stop();
        let _ = done_tx.send(session);
    });
    let session = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("stop() returns once the stalled socket is shut down");
    assert_eq!(
        session.state(),
        ConnState::Disconnected(DisconnectReason::Stopped)
    );

    responder.stop();
    drop(hold_client);
}

#[test]
fn stop_right_after_connect_never_hangs() {
    // Exercises the window between accept() returning and the worker
    // registering the client socket for shutdown.
    for _ in 0..20 {
        let mut session =
            ReceiverSession::new(test_receiver_config(), Arc::new(NoopLogSink));
        session.start().unwrap();

        let client = TcpStream::connect(("127.0.0.1", session.stream_port())).unwrap();
        let start = Instant::now();
        session.stop();
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "stop took {:?}",
            start.elapsed()
        );
        drop(client);
    }
}

#[test]
fn discovery_probe_round_trip_over_loopback() {
    let paused = Arc::new(AtomicBool::new(false));
    let mut responder = DiscoveryResponder::start(
        0,
        "loopback-pc".to_owned(),
        4321,
        Arc::clone(&paused),
        Arc::new(NoopLogSink),
    )
    .unwrap();

    let agent = DiscoveryAgent::new(DiscoveryConfig::default(), Arc::new(NoopLogSink));
    let target: SocketAddr = ([127, 0, 0, 1], responder.local_port()).into();

    let endpoint = agent.probe_round(target).expect("responder answers");
    assert_eq!(endpoint.port, 4321);
    assert!(endpoint.addr.is_loopback());

    responder.stop();
}

#[test]
fn paused_responder_ignores_probes() {
    let paused = Arc::new(AtomicBool::new(true));
    let mut responder = DiscoveryResponder::start(
        0,
        "loopback-pc".to_owned(),
        4321,
        Arc::clone(&paused),
        Arc::new(NoopLogSink),
    )
    .unwrap();

    let cfg = DiscoveryConfig {
        recv_timeout: Duration::from_millis(200),
        ..DiscoveryConfig::default()
    };
    let agent = DiscoveryAgent::new(cfg, Arc::new(NoopLogSink));
    let target: SocketAddr = ([127, 0, 0, 1], responder.local_port()).into();

    assert!(
        agent.probe_round(target).is_none(),
        "paired receiver must not answer"
    );

    responder.stop();
}
