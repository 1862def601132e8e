//! Counters shared between the walk and progress consumers.
//!
//! All counters are atomics so they can be read from another thread while a
//! phase is running. With live updates enabled, every mutation also pushes a
//! signal into a channel of capacity one. If the slot is already taken the
//! signal is dropped, so the walk never blocks on a slow consumer.

use crate::change::Change;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

#[derive(Debug, Default)]
pub struct ChangeSet {
    pub removed: AtomicU64,
    pub added: AtomicU64,
    pub changed: AtomicU64,
    pub timestamp_changed: AtomicU64,
    pub no_change: AtomicU64,
    pub failed: AtomicU64,
}

impl ChangeSet {
    fn counter(&self, change: Change) -> &AtomicU64 {
        match change {
            Change::Removed => &self.removed,
            Change::Added => &self.added,
            Change::Changed => &self.changed,
            Change::TimestampChanged => &self.timestamp_changed,
            Change::NoChange => &self.no_change,
            Change::Failed => &self.failed,
        }
    }

    pub fn record(&self, change: Change) {
        self.counter(change).fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self, change: Change) -> u64 {
        self.counter(change).load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        for change in Change::ALL {
            self.counter(change).store(0, Ordering::Relaxed);
        }
    }

    /// Number of entries with any classification other than `NoChange`.
    pub fn interesting(&self) -> u64 {
        Change::ALL
            .into_iter()
            .filter(|c| *c != Change::NoChange)
            .map(|c| self.count(c))
            .sum()
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    pub found_dirs: AtomicU64,
    pub found_files: AtomicU64,
    pub found_special: AtomicU64,
    pub found_manifests: AtomicU64,
    pub scan_errors: AtomicU64,

    pub digested_files: AtomicU64,
    pub digest_skipped: AtomicU64,
    pub digest_errors: AtomicU64,

    pub files: ChangeSet,
    pub dirs: ChangeSet,
    pub special: ChangeSet,
    pub total: ChangeSet,

    pub write_todo: AtomicU64,
    pub write_done: AtomicU64,
    pub write_errors: AtomicU64,

    signal: Option<SyncSender<()>>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats that signal the returned receiver whenever a counter moves.
    pub fn with_live_updates() -> (Self, Receiver<()>) {
        let (tx, rx) = sync_channel(1);
        let stats = Stats {
            signal: Some(tx),
            ..Self::default()
        };
        (stats, rx)
    }

    pub fn incr(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
        self.notify();
    }

    pub(crate) fn notify(&self) {
        if let Some(signal) = &self.signal {
            // Full or disconnected: a signal is already pending or nobody listens.
            let _ = signal.try_send(());
        }
    }

    pub fn load(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        Self::load(&self.scan_errors)
            + Self::load(&self.digest_errors)
            + Self::load(&self.write_errors)
    }

    /// True if the last aggregation saw anything other than unchanged entries.
    pub fn has_changes(&self) -> bool {
        self.total.interesting() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc::TryRecvError;

    #[test]
    fn test_change_set_counts_per_classification() {
        let set = ChangeSet::default();
        set.record(Change::Added);
        set.record(Change::Added);
        set.record(Change::TimestampChanged);
        set.record(Change::NoChange);

        assert_eq!(set.count(Change::Added), 2);
        assert_eq!(set.count(Change::TimestampChanged), 1);
        assert_eq!(set.count(Change::Changed), 0);
        assert_eq!(set.interesting(), 3);
    }

    #[test]
    fn test_signal_coalesces_bursts() {
        let (stats, rx) = Stats::with_live_updates();

        for _ in 0..100 {
            stats.incr(&stats.found_files);
        }

        assert_eq!(rx.try_recv(), Ok(()));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(Stats::load(&stats.found_files), 100);

        stats.incr(&stats.found_dirs);
        assert_eq!(rx.try_recv(), Ok(()));
    }

    #[test]
    fn test_notify_without_consumer_does_not_block() {
        let (stats, rx) = Stats::with_live_updates();
        drop(rx);
        stats.incr(&stats.scan_errors);
        assert_eq!(stats.error_count(), 1);

        let quiet = Stats::new();
        quiet.incr(&quiet.write_errors);
        assert_eq!(quiet.error_count(), 1);
    }

    #[test]
    fn test_counters_readable_from_other_thread() {
        let (stats, rx) = Stats::with_live_updates();
        let stats = Arc::new(stats);

        let reader = {
            let stats = Arc::clone(&stats);
            std::thread::spawn(move || {
                rx.recv().unwrap();
                Stats::load(&stats.digested_files) > 0
            })
        };

        stats.incr(&stats.digested_files);
        assert!(reader.join().unwrap());
    }
}
