//! Pipeline telemetry for observability and progress reporting.
//!
//! Counters are lock-free atomics updated from every pipeline stage.
//! Progress milestones go to an injected [`BuildObserver`] rather than any
//! process-wide state, so embedders decide where they surface.
//!
//! # Architecture
//!
//! ```text
//! Prep / Work / Write ──► PipelineMetrics ──► TelemetrySnapshot ──► views
//!                         (atomic counters)   (point-in-time copy)
//!         │
//!         └──────────────► Arc<dyn BuildObserver>
//!                          level_started / tiles_written / ...
//! ```
//!
//! # Example
//!
//! ```
//! use rasterfuse::telemetry::{PipelineMetrics, TelemetrySnapshot};
//!
//! let metrics = PipelineMetrics::new();
//! metrics.tile_prepped();
//! metrics.tile_written(1024);
//!
//! let snapshot: TelemetrySnapshot = metrics.snapshot();
//! assert_eq!(snapshot.tiles_written, 1);
//! assert_eq!(snapshot.bytes_written, 1024);
//! ```

mod metrics;
mod observer;
mod snapshot;

pub use metrics::PipelineMetrics;
pub use observer::{BuildObserver, NoOpObserver, TracingObserver};
pub use snapshot::TelemetrySnapshot;
