//! Producer-side demo: discovers a receiver on the LAN and streams synthetic
//! frames to it at roughly camera rate. A real deployment feeds
//! `offer_frame` from a capture pipeline instead.

use std::{
    env, io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use bytes::Bytes;

use camrelay::{
    config::Config,
    log::{log_sink::LogSink, logger::Logger},
    relay::{SenderConfig, SenderSession},
};

/// ~30 fps.
const FRAME_PERIOD: Duration = Duration::from_millis(33);
const LOG_QUEUE_CAP: usize = 1024;

fn main() {
    let args: Vec<String> = env::args().collect();
    let config_path = args.get(1).map_or("camrelay.conf", String::as_str);
    let config = Arc::new(Config::load(config_path).unwrap_or_else(|e| {
        eprintln!("{e}; continuing with defaults");
        Config::empty()
    }));

    let logger = Logger::start_from_config(LOG_QUEUE_CAP, &config);
    println!("logging to {}", logger.file_path().display());
    let sink: Arc<dyn LogSink> = Arc::new(logger.handle());

    let mut session = SenderSession::new(SenderConfig::from_config(&config), sink);
    if let Err(e) = session.start() {
        eprintln!("could not start sender session: {e}");
        return;
    }

    let stop = Arc::new(AtomicBool::new(false));
    spawn_stdin_watcher(&stop);
    println!("offering synthetic frames; press Enter to stop");

    let mut tick: u64 = 0;
    while !stop.load(Ordering::SeqCst) {
        // Stand-in for one compressed capture frame.
        let payload = Bytes::from(format!("synthetic frame {tick}").into_bytes());
        let _ = session.offer_frame(payload);
        tick += 1;

        for event in session.poll() {
            println!("{event:?}");
        }
        thread::sleep(FRAME_PERIOD);
    }

    session.stop();
    let stats = session.stats();
    println!(
        "sent {} frames, dropped {}",
        stats.frames_sent, stats.frames_dropped
    );
}

fn spawn_stdin_watcher(stop: &Arc<AtomicBool>) {
    let stop = Arc::clone(stop);
    let _ = thread::Builder::new()
        .name("stdin-watcher".into())
        .spawn(move || {
            let mut line = String::new();
            let _ = io::stdin().read_line(&mut line);
            stop.store(true, Ordering::SeqCst);
        });
}
