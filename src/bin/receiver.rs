//! Consumer-side demo: answers discovery probes, accepts the stream and
//! drains the frame buffer the way a presentation sink would, printing a
//! placeholder note whenever no frame arrives in time.

use std::{
    env, io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use camrelay::{
    config::Config,
    log::{log_sink::LogSink, logger::Logger},
    relay::{ReceiverConfig, ReceiverSession},
};

/// How long the sink waits for a frame before showing its placeholder.
const POP_TIMEOUT: Duration = Duration::from_millis(500);
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

    let mut session = ReceiverSession::new(ReceiverConfig::from_config(&config), sink);
    if let Err(e) = session.start() {
        eprintln!("could not start receiver session: {e}");
        return;
    }
    println!("accepting frames on tcp/{}", session.stream_port());

    let stop = Arc::new(AtomicBool::new(false));
    spawn_stdin_watcher(&stop);
    println!("press Enter to stop");

    let buffer = session.buffer();
    while !stop.load(Ordering::SeqCst) {
        match buffer.pop(POP_TIMEOUT) {
            Some(frame) => {
                println!(
                    "frame {} ({} bytes, captured at {} ms)",
                    frame.seq,
                    frame.len(),
                    frame.timestamp_ms
                );
            }
            None => println!("no frame (placeholder)"),
        }
        for event in session.poll() {
            println!("{event:?}");
        }
    }

    session.stop();
    let stats = session.stats();
    println!("received {} frames", stats.frames_received);
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
