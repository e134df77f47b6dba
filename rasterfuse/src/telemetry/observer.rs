//! Build progress observer.
//!
//! The pipeline reports milestones through an `Arc<dyn BuildObserver>`
//! handed to it at construction. Callbacks may run on any pipeline thread.

use std::fmt;

use tracing::{info, warn};

/// Receiver for per-level build progress.
pub trait BuildObserver: Send + Sync {
    /// A level build is starting with `total` candidate tiles.
    fn level_started(&self, level: u32, total: u64);

    /// `n` more records reached the packet writer.
    fn tiles_written(&self, n: u64);

    /// `n` more tiles were dropped as transparent.
    fn tiles_skipped(&self, n: u64);

    /// Emitted once per level when some output tiles had no source data.
    fn coverage_gap_summary(&self, level: u32, count: u64);

    fn level_finished(&self, level: u32);
}

/// Observer that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl BuildObserver for TracingObserver {
    fn level_started(&self, level: u32, total: u64) {
        info!(level, total, "level build started");
    }

    fn tiles_written(&self, _n: u64) {}

    fn tiles_skipped(&self, _n: u64) {}

    fn coverage_gap_summary(&self, level: u32, count: u64) {
        warn!(
            level,
            count, "tiles not covered by any source were filled with 0 elevation"
        );
    }

    fn level_finished(&self, level: u32) {
        info!(level, "level build finished");
    }
}

/// Observer that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl BuildObserver for NoOpObserver {
    #[inline]
    fn level_started(&self, _level: u32, _total: u64) {}

    #[inline]
    fn tiles_written(&self, _n: u64) {}

    #[inline]
    fn tiles_skipped(&self, _n: u64) {}

    #[inline]
    fn coverage_gap_summary(&self, _level: u32, _count: u64) {}

    #[inline]
    fn level_finished(&self, _level: u32) {}
}

impl fmt::Debug for dyn BuildObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BuildObserver")
    }
}
