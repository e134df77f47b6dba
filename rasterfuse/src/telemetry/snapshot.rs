//! Point-in-time telemetry snapshot.

use std::fmt;
use std::time::Duration;

/// Immutable copy of [`PipelineMetrics`](super::PipelineMetrics) counters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelemetrySnapshot {
    /// Time since the metrics were created
    pub uptime: Duration,
    pub tiles_prepped: u64,
    pub tiles_skipped: u64,
    pub tiles_worked: u64,
    pub coverage_gaps: u64,
    pub tiles_written: u64,
    pub bytes_written: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Ancestor cache hit rate (0.0 - 1.0)
    pub cache_hit_rate: f64,
    pub tiles_per_second: f64,
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} written ({} bytes), {} skipped, {} gaps, cache {:.1}% in {:.1}s",
            self.tiles_written,
            self.bytes_written,
            self.tiles_skipped,
            self.coverage_gaps,
            self.cache_hit_rate * 100.0,
            self.uptime.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_summary() {
        let snapshot = TelemetrySnapshot {
            uptime: Duration::from_millis(2500),
            tiles_written: 10,
            bytes_written: 2048,
            tiles_skipped: 3,
            cache_hit_rate: 0.5,
            ..Default::default()
        };
        assert_eq!(
            snapshot.to_string(),
            "10 written (2048 bytes), 3 skipped, 0 gaps, cache 50.0% in 2.5s"
        );
    }
}
