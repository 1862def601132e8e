//! Live progress line fed by the stats signal.
//!
//! Runs on its own thread and only ever reads counters, so a slow terminal
//! never holds up the walk.

use crate::stats::Stats;
use std::io::{IsTerminal, Write, stderr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const MIN_REDRAW_INTERVAL: Duration = Duration::from_millis(250);

pub struct Progress {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    stats: Arc<Stats>,
}

impl Progress {
    pub fn start(stats: Arc<Stats>, signal: Receiver<()>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let terminal = stderr().is_terminal();

        let handle = {
            let stop = Arc::clone(&stop);
            let stats = Arc::clone(&stats);
            std::thread::spawn(move || run(&stats, &signal, &stop, terminal))
        };

        Progress {
            stop,
            handle: Some(handle),
            stats,
        }
    }

    /// Stop the thread and leave the final counters on screen.
    pub fn finish(mut self) {
        self.shutdown();
        if stderr().is_terminal() {
            eprintln!("\r{}", format_line(&self.stats));
        }
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            // A panicking progress thread is not worth failing the run over.
            let _ = handle.join();
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(stats: &Stats, signal: &Receiver<()>, stop: &AtomicBool, terminal: bool) {
    let mut last_draw: Option<Instant> = None;

    while !stop.load(Ordering::Relaxed) {
        match signal.recv_timeout(POLL_INTERVAL) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_draw.is_some_and(|t| t.elapsed() < MIN_REDRAW_INTERVAL) {
            continue;
        }
        last_draw = Some(Instant::now());

        let line = format_line(stats);
        if terminal {
            let mut err = stderr().lock();
            let _ = write!(err, "\r{}", line);
            let _ = err.flush();
        } else {
            debug!("{}", line);
        }
    }
}

pub fn format_line(stats: &Stats) -> String {
    format!(
        "dirs: {}  files: {}  special: {}  digested: {} (skipped {})  written: {}/{}  errors: {}",
        Stats::load(&stats.found_dirs),
        Stats::load(&stats.found_files),
        Stats::load(&stats.found_special),
        Stats::load(&stats.digested_files),
        Stats::load(&stats.digest_skipped),
        Stats::load(&stats.write_done),
        Stats::load(&stats.write_todo),
        stats.error_count(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line() {
        let stats = Stats::new();
        stats.incr(&stats.found_dirs);
        stats.incr(&stats.found_files);
        stats.incr(&stats.found_files);
        stats.incr(&stats.write_todo);
        stats.incr(&stats.digest_errors);

        assert_eq!(
            format_line(&stats),
            "dirs: 1  files: 2  special: 0  digested: 0 (skipped 0)  written: 0/1  errors: 1"
        );
    }

    #[test]
    fn test_finish_stops_thread() {
        let (stats, rx) = Stats::with_live_updates();
        let stats = Arc::new(stats);
        let progress = Progress::start(Arc::clone(&stats), rx);

        for _ in 0..10 {
            stats.incr(&stats.found_files);
        }

        progress.finish();
        // Sending after the consumer is gone must not block.
        stats.incr(&stats.found_files);
        assert_eq!(Stats::load(&stats.found_files), 11);
    }
}
