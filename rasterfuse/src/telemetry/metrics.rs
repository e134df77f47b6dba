//! Lock-free atomic metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::TelemetrySnapshot;
use crate::cache::CacheStats;

/// Counters for one build run.
///
/// All updates use `Relaxed` ordering; the counters are independent and
/// only read as a whole through [`snapshot`](Self::snapshot).
#[derive(Debug)]
pub struct PipelineMetrics {
    start_time: Instant,

    // === Prep ===
    /// Tiles loaded by the prep stage and queued for work
    tiles_prepped: AtomicU64,
    /// Tiles dropped as transparent before reaching the work stage
    tiles_skipped: AtomicU64,

    // === Work ===
    /// Work items processed
    tiles_worked: AtomicU64,
    /// Output tiles with no source data, filled with zeros
    coverage_gaps: AtomicU64,

    // === Write ===
    /// Records handed to the packet writer
    tiles_written: AtomicU64,
    /// Encoded bytes handed to the packet writer
    bytes_written: AtomicU64,

    // === Cache ===
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            tiles_prepped: AtomicU64::new(0),
            tiles_skipped: AtomicU64::new(0),
            tiles_worked: AtomicU64::new(0),
            coverage_gaps: AtomicU64::new(0),
            tiles_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    pub fn tile_prepped(&self) {
        self.tiles_prepped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_skipped(&self) {
        self.tiles_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_worked(&self) {
        self.tiles_worked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn coverage_gap(&self) {
        self.coverage_gaps.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one record of `bytes` written.
    pub fn tile_written(&self, bytes: u64) {
        self.tiles_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Fold in the counters of a loader's caches at the end of a stage.
    pub fn record_cache_stats(&self, stats: CacheStats) {
        self.cache_hits.fetch_add(stats.hits, Ordering::Relaxed);
        self.cache_misses.fetch_add(stats.misses, Ordering::Relaxed);
    }

    pub fn coverage_gaps(&self) -> u64 {
        self.coverage_gaps.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = cache_hits + cache_misses;
        let uptime = self.start_time.elapsed();
        let tiles_written = self.tiles_written.load(Ordering::Relaxed);
        let secs = uptime.as_secs_f64();

        TelemetrySnapshot {
            uptime,
            tiles_prepped: self.tiles_prepped.load(Ordering::Relaxed),
            tiles_skipped: self.tiles_skipped.load(Ordering::Relaxed),
            tiles_worked: self.tiles_worked.load(Ordering::Relaxed),
            coverage_gaps: self.coverage_gaps.load(Ordering::Relaxed),
            tiles_written,
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cache_hit_rate: if lookups == 0 {
                0.0
            } else {
                cache_hits as f64 / lookups as f64
            },
            tiles_per_second: if secs > 0.0 {
                tiles_written as f64 / secs
            } else {
                0.0
            },
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
