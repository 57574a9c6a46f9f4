//! Orchestrator-wide request statistics.
//!
//! Counters are updated from pipeline futures on any runtime worker and read
//! for periodic logging.

use crate::ports::CacheTier;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Thread-safe request counters.
#[derive(Debug, Default)]
pub struct LoadStats {
    /// Requests accepted by `request()`
    requests: AtomicU64,
    /// Lookups answered from memory
    memory_hits: AtomicU64,
    /// Lookups answered from disk
    disk_hits: AtomicU64,
    /// Lookups that missed
    misses: AtomicU64,
    /// Calls made to the fetch port
    fetches: AtomicU64,
    /// Editor invocations
    edits: AtomicU64,
    /// Completions delivered with an image
    succeeded: AtomicU64,
    /// Completions delivered with an error
    failed: AtomicU64,
    /// Requests cancelled before completing
    cancelled: AtomicU64,
    /// Best-effort cache stores that failed
    store_failures: AtomicU64,
}

/// Snapshot of [`LoadStats`] at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStatsSnapshot {
    pub requests: u64,
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub edits: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub store_failures: u64,
}

impl LoadStatsSnapshot {
    /// Fraction of lookups served from either cache tier.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.disk_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

impl LoadStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lookup(&self, tier: CacheTier) {
        let counter = match tier {
            CacheTier::MemoryHit => &self.memory_hits,
            CacheTier::DiskHit => &self.disk_hits,
            CacheTier::None => &self.misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_edit(&self) {
        self.edits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completion(&self, success: bool) {
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LoadStatsSnapshot {
        LoadStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            edits: self.edits.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }

    /// Logs the current counters at info level.
    pub fn log(&self) {
        let s = self.snapshot();
        info!(
            requests = s.requests,
            memory_hits = s.memory_hits,
            disk_hits = s.disk_hits,
            misses = s.misses,
            fetches = s.fetches,
            edits = s.edits,
            succeeded = s.succeeded,
            failed = s.failed,
            cancelled = s.cancelled,
            store_failures = s.store_failures,
            "Image load stats: {:.1}% cache hit rate",
            s.hit_rate() * 100.0
        );
    }
}
