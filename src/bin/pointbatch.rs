#![allow(unknown_lints)]

extern crate chan_signal;
extern crate chrono;
extern crate fern;
extern crate pointbatch;

#[macro_use]
extern crate log;

use chrono::Utc;
use pointbatch::config::{Args, SinkConfig};
use pointbatch::flush::FlushScheduler;
use pointbatch::protocols::statsd::parse_statsd;
use pointbatch::sink::{Console, Null, Sink};
use std::io::{self, BufRead};
use std::process;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// How long the main loop waits for input before checking the flush timer.
const POLL_INTERVAL_MS: u64 = 250;

enum Event {
    Line(String),
    Shutdown,
}

fn run<S>(args: &Args, sink: S, recv: &mpsc::Receiver<Event>)
where
    S: Sink,
{
    let mut scheduler =
        match FlushScheduler::new(args.bucket_width, args.flush_interval, sink, Utc::now()) {
            Ok(scheduler) => scheduler,
            Err(e) => {
                error!("unable to start batching: {}", e);
                process::exit(1);
            }
        };

    let poll = Duration::from_millis(POLL_INTERVAL_MS);
    let mut points = Vec::new();
    loop {
        match recv.recv_timeout(poll) {
            Ok(Event::Line(line)) => {
                let now = Utc::now();
                if !parse_statsd(&line, now.timestamp(), &mut points) && !line.trim().is_empty() {
                    warn!("unable to parse line: {:?}", line);
                }
                for point in points.drain(..) {
                    let point = point.overlay_tags(&args.tags);
                    let point = match args.host {
                        Some(ref host) => point.host(host.as_str()),
                        None => point,
                    };
                    scheduler.ingest(now, point);
                }
            }
            Ok(Event::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                info!("shutting down, flushing {} buckets", scheduler.batcher().len());
                scheduler.flush(Utc::now());
                return;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
        scheduler.tick(Utc::now());
    }
}

fn main() {
    let args = match pointbatch::config::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("pointbatch: {}", e);
            process::exit(1);
        }
    };

    let level = match args.verbose {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    // Must happen before any thread is spawned.
    let signal = chan_signal::notify(&[chan_signal::Signal::INT, chan_signal::Signal::TERM]);

    // Records go to stdout, so logs go to stderr.
    if let Err(e) = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}][{}] {}",
                record.target(),
                record.line().unwrap_or(0),
                Utc::now().to_rfc3339(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(io::stderr())
        .apply()
    {
        eprintln!("pointbatch: could not set up logging: {}", e);
        process::exit(1);
    }

    info!("pointbatch - {}", args.version);

    let (snd, recv) = mpsc::channel();

    let stdin_snd = snd.clone();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if stdin_snd.send(Event::Line(line)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    error!("unable to read stdin: {}", e);
                    break;
                }
            }
        }
        debug!("stdin closed");
        let _ = stdin_snd.send(Event::Shutdown);
    });

    thread::spawn(move || {
        if let Some(sig) = signal.recv() {
            info!("received {:?}", sig);
            let _ = snd.send(Event::Shutdown);
        }
    });

    match args.sink {
        SinkConfig::Console(ref config) => run(&args, Console::new(config), &recv),
        SinkConfig::Null(ref config) => run(&args, Null::new(config), &recv),
    }
}
