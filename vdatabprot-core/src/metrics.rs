//! # Metrics and Monitoring
//!
//! Counters for the access layer and the auditor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Metrics collector
#[derive(Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    // Write metrics
    writes: AtomicU64,
    bytes_written: AtomicU64,
    bytes_stored: AtomicU64,

    // Read metrics
    reads: AtomicU64,
    cache_hits: AtomicU64,
    not_found: AtomicU64,
    integrity_failures: AtomicU64,

    // Prefetch metrics
    prefetch_staged: AtomicU64,
    prefetch_failures: AtomicU64,

    // Auditor metrics
    patrols: AtomicU64,
    records_verified: AtomicU64,
    records_corrupted: AtomicU64,
    links_derived: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write of `original` bytes stored as `stored` bytes
    pub fn record_write(&self, original: u64, stored: u64) {
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_written.fetch_add(original, Ordering::Relaxed);
        self.inner.bytes_stored.fetch_add(stored, Ordering::Relaxed);
    }

    /// Record a successful read
    pub fn record_read(&self, from_cache: bool) {
        self.inner.reads.fetch_add(1, Ordering::Relaxed);
        if from_cache {
            self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_not_found(&self) {
        self.inner.not_found.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a corrupt or mismatching payload seen on the read path
    pub fn record_integrity_failure(&self) {
        self.inner.integrity_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_prefetch(&self, staged: u64, failed: u64) {
        self.inner.prefetch_staged.fetch_add(staged, Ordering::Relaxed);
        self.inner.prefetch_failures.fetch_add(failed, Ordering::Relaxed);
    }

    /// Record a completed integrity patrol
    pub fn record_patrol(&self, verified: u64, corrupted: u64) {
        self.inner.patrols.fetch_add(1, Ordering::Relaxed);
        self.inner.records_verified.fetch_add(verified, Ordering::Relaxed);
        self.inner.records_corrupted.fetch_add(corrupted, Ordering::Relaxed);
    }

    pub fn record_links_derived(&self, count: u64) {
        self.inner.links_derived.fetch_add(count, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            writes: self.inner.writes.load(Ordering::Relaxed),
            bytes_written: self.inner.bytes_written.load(Ordering::Relaxed),
            bytes_stored: self.inner.bytes_stored.load(Ordering::Relaxed),
            reads: self.inner.reads.load(Ordering::Relaxed),
            cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
            not_found: self.inner.not_found.load(Ordering::Relaxed),
            integrity_failures: self.inner.integrity_failures.load(Ordering::Relaxed),
            prefetch_staged: self.inner.prefetch_staged.load(Ordering::Relaxed),
            prefetch_failures: self.inner.prefetch_failures.load(Ordering::Relaxed),
            patrols: self.inner.patrols.load(Ordering::Relaxed),
            records_verified: self.inner.records_verified.load(Ordering::Relaxed),
            records_corrupted: self.inner.records_corrupted.load(Ordering::Relaxed),
            links_derived: self.inner.links_derived.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub writes: u64,
    pub bytes_written: u64,
    pub bytes_stored: u64,
    pub reads: u64,
    pub cache_hits: u64,
    pub not_found: u64,
    pub integrity_failures: u64,
    pub prefetch_staged: u64,
    pub prefetch_failures: u64,
    pub patrols: u64,
    pub records_verified: u64,
    pub records_corrupted: u64,
    pub links_derived: u64,
}

impl MetricsSnapshot {
    /// Stored bytes per original byte; 1.0 when nothing was written
    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_written == 0 {
            1.0
        } else {
            self.bytes_stored as f64 / self.bytes_written as f64
        }
    }
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    /// Start new timer
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timer and log duration
    pub fn stop(self) -> Duration {
        let duration = self.elapsed();
        tracing::debug!(
            name = self.name,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_across_clones() {
        let metrics = Metrics::new();
        let clone = metrics.clone();

        metrics.record_write(1000, 250);
        clone.record_write(1000, 250);
        metrics.record_read(true);
        metrics.record_read(false);
        clone.record_prefetch(3, 1);
        clone.record_patrol(9, 1);

        let snap = metrics.snapshot();
        assert_eq!(snap.writes, 2);
        assert_eq!(snap.reads, 2);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.prefetch_staged, 3);
        assert_eq!(snap.prefetch_failures, 1);
        assert_eq!(snap.records_verified, 9);
        assert_eq!(snap.records_corrupted, 1);
        assert!((snap.compression_ratio() - 0.25).abs() < 1e-9);
    }
}
