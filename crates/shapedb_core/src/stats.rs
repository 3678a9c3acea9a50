//! Per-connection operation counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters for one connection.
///
/// All counters are atomic and can be read while operations are in progress.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    clears: AtomicU64,
    scans: AtomicU64,
    validation_failures: AtomicU64,
    engine_errors: AtomicU64,
}

impl ConnectionStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_engine_error(&self) {
        self.engine_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            scans: self.scans.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            engine_errors: self.engine_errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`ConnectionStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Successful `get`/`get_optional` calls.
    pub reads: u64,
    /// Successful `insert`/`put` calls.
    pub writes: u64,
    /// Successful `remove` calls.
    pub deletes: u64,
    /// Successful `clear_collection` calls.
    pub clears: u64,
    /// Successful `get_all`/`count` calls.
    pub scans: u64,
    /// Values rejected by a codec, in either direction.
    pub validation_failures: u64,
    /// Requests the engine failed.
    pub engine_errors: u64,
}
