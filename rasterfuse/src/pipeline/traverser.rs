//! Three-stage Prep / Work / Write orchestration.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use super::queue::BoundedQueue;
use super::writer::PacketWriter;
use crate::cache::CacheStats;
use crate::config::BuildConfig;
use crate::coord::TileAddress;
use crate::error::{PipelineError, PipelineResult};
use crate::telemetry::{BuildObserver, NoOpObserver, PipelineMetrics};

/// Outcome of preparing one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepStatus {
    /// Item is filled and goes to the work stage.
    Ready,
    /// Item is filled, but no source covered it; it is written anyway and
    /// counted as a coverage gap.
    Uncovered,
    /// Nothing to write for this tile.
    Skipped,
    /// Traversal is exhausted; the item was not filled.
    Done,
}

/// Single-threaded producer that walks a level and loads source tiles.
pub trait Preparer {
    type Item: Send;

    fn level(&self) -> u32;

    /// Upper bound on the tiles this preparer will visit.
    fn total(&self) -> u64;

    /// Allocate one pooled item.
    fn new_item(&self) -> Self::Item;

    /// Fill `item` with the next tile of the traversal.
    fn prepare(&mut self, item: &mut Self::Item) -> PipelineResult<PrepStatus>;

    fn cache_stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Stateless per-item transform run on every work thread.
pub trait Worker<I>: Sync {
    /// Turn a prepared item into zero or more encoded records.
    fn work(&self, item: &I, out: &mut Vec<EncodedTile>) -> PipelineResult<()>;
}

/// One record ready for the packet writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTile {
    pub addr: TileAddress,
    pub data: Vec<u8>,
    pub attribution_id: u32,
}

struct Prepped<I> {
    seq: u64,
    item: I,
}

struct Worked {
    seq: u64,
    records: Vec<EncodedTile>,
}

/// First error of a run plus a flag every stage polls.
#[derive(Default)]
struct FailFast {
    failed: AtomicBool,
    first: Mutex<Option<PipelineError>>,
}

impl FailFast {
    fn record(&self, stage: &'static str, err: PipelineError) {
        error!(stage, error = %err, "pipeline stage failed, draining");
        let mut first = self.first.lock();
        if first.is_none() {
            *first = Some(err);
        }
        self.failed.store(true, Ordering::Release);
    }

    fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    fn take(&self) -> Option<PipelineError> {
        self.first.lock().take()
    }
}

struct Shared<I> {
    prep_pool: BoundedQueue<I>,
    work_pool: BoundedQueue<Vec<EncodedTile>>,
    work_queue: BoundedQueue<Option<Prepped<I>>>,
    write_queue: BoundedQueue<Option<Worked>>,
    failure: FailFast,
}

/// Runs one level build through Prep, Work and Write stages.
///
/// # Architecture
///
/// ```text
///            prep pool (2N)                  work pool (2N)
///          ┌──────────────┐                ┌──────────────┐
///          ▼              │                ▼              │
///   ┌────────────┐   ┌────┴─────┐ × N ┌──────────┐        │
///   │ Prep (1)   │──►│ Work     │────►│ Write (1)│────────┘
///   │ caller thd │   │ threads  │     │ thread   │──► PacketWriter
///   └────────────┘   └──────────┘     └──────────┘
///        N sentinels ─────►   one sentinel ─────►
/// ```
///
/// Memory is bounded by the pools: Prep blocks when every prep item is in
/// flight, Work blocks when every work item is waiting to be written.
///
/// Records reach the writer exactly once. Their order is unspecified unless
/// `ordered_writes` is set, in which case the writer reorders them by
/// traversal sequence.
///
/// The first error from any stage aborts the run. Stages keep draining
/// their queues (without doing further work) so every thread joins before
/// `traverse` returns the error.
pub struct PackgenTraverser {
    work_threads: usize,
    pool_size: usize,
    ordered_writes: bool,
    observer: Arc<dyn BuildObserver>,
    metrics: Arc<PipelineMetrics>,
}

impl PackgenTraverser {
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            work_threads: config.work_threads,
            pool_size: config.pool_size(),
            ordered_writes: config.ordered_writes,
            observer: Arc::new(NoOpObserver),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BuildObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Share counters across several runs.
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Build one level: `preparer` runs on the calling thread, `worker` on
    /// `work_threads` threads, and `writer` on a dedicated write thread.
    pub fn traverse<P, W, PW>(
        &self,
        preparer: &mut P,
        worker: &W,
        writer: &mut PW,
    ) -> PipelineResult<()>
    where
        P: Preparer,
        W: Worker<P::Item>,
        PW: PacketWriter,
    {
        if self.work_threads == 0 {
            return Err(PipelineError::NoWorkThreads);
        }

        let level = preparer.level();
        let total = preparer.total();
        let gaps_before = self.metrics.coverage_gaps();
        self.observer.level_started(level, total);
        info!(
            level,
            total,
            work_threads = self.work_threads,
            pool_size = self.pool_size,
            ordered = self.ordered_writes,
            "traversal started"
        );

        let shared = Shared {
            prep_pool: BoundedQueue::filled_with(self.pool_size, || preparer.new_item()),
            work_pool: BoundedQueue::filled_with(self.pool_size, Vec::new),
            work_queue: BoundedQueue::new(self.pool_size + self.work_threads),
            write_queue: BoundedQueue::new(self.pool_size + 1),
            failure: FailFast::default(),
        };
        let shared = &shared;

        thread::scope(|scope| {
            let write_handle = thread::Builder::new()
                .name("packgen-write".to_string())
                .spawn_scoped(scope, move || self.write_stage(shared, writer))
                .map_err(|source| {
                    shared
                        .failure
                        .record("write", PipelineError::Spawn { stage: "write", source })
                })
                .ok();

            let mut work_handles = Vec::with_capacity(self.work_threads);
            for i in 0..self.work_threads {
                match thread::Builder::new()
                    .name(format!("packgen-work-{i}"))
                    .spawn_scoped(scope, move || self.work_stage(shared, worker))
                {
                    Ok(handle) => work_handles.push(handle),
                    Err(source) => {
                        shared
                            .failure
                            .record("work", PipelineError::Spawn { stage: "work", source });
                        break;
                    }
                }
            }

            if !work_handles.is_empty() {
                self.prep_stage(shared, preparer);
            }

            for _ in 0..work_handles.len() {
                shared.work_queue.push(None);
            }
            for handle in work_handles {
                if handle.join().is_err() {
                    shared
                        .failure
                        .record("work", PipelineError::ThreadPanicked { stage: "work" });
                }
            }

            if let Some(handle) = write_handle {
                shared.write_queue.push(None);
                if handle.join().is_err() {
                    shared
                        .failure
                        .record("write", PipelineError::ThreadPanicked { stage: "write" });
                }
            }
        });

        let gaps = self.metrics.coverage_gaps() - gaps_before;
        if gaps > 0 {
            self.observer.coverage_gap_summary(level, gaps);
        }
        self.observer.level_finished(level);

        match shared.failure.take() {
            Some(err) => Err(err),
            None => {
                info!(level, "traversal finished");
                Ok(())
            }
        }
    }

    fn prep_stage<P: Preparer>(&self, shared: &Shared<P::Item>, preparer: &mut P) {
        let mut seq = 0u64;
        while !shared.failure.is_failed() {
            let mut item = shared.prep_pool.pop();
            let status = catch_unwind(AssertUnwindSafe(|| preparer.prepare(&mut item)))
                .unwrap_or(Err(PipelineError::ThreadPanicked { stage: "prep" }));
            match status {
                Ok(status @ (PrepStatus::Ready | PrepStatus::Uncovered)) => {
                    if status == PrepStatus::Uncovered {
                        self.metrics.coverage_gap();
                    }
                    self.metrics.tile_prepped();
                    shared.work_queue.push(Some(Prepped { seq, item }));
                    seq += 1;
                }
                Ok(PrepStatus::Skipped) => {
                    self.metrics.tile_skipped();
                    self.observer.tiles_skipped(1);
                    shared.prep_pool.push(item);
                }
                Ok(PrepStatus::Done) => {
                    shared.prep_pool.push(item);
                    break;
                }
                Err(err) => {
                    shared.prep_pool.push(item);
                    shared.failure.record("prep", err);
                    break;
                }
            }
        }
        debug!(prepped = seq, "prep stage done");
        self.metrics.record_cache_stats(preparer.cache_stats());
    }

    fn work_stage<I: Send, W: Worker<I>>(&self, shared: &Shared<I>, worker: &W) {
        loop {
            // Take the output buffer before the input so that whoever holds
            // the oldest unwritten sequence can always finish it.
            let mut records = shared.work_pool.pop();
            let Some(Prepped { seq, item }) = shared.work_queue.pop() else {
                shared.work_pool.push(records);
                break;
            };
            records.clear();

            if !shared.failure.is_failed() {
                let result = catch_unwind(AssertUnwindSafe(|| worker.work(&item, &mut records)))
                    .unwrap_or(Err(PipelineError::ThreadPanicked { stage: "work" }));
                match result {
                    Ok(()) => self.metrics.tile_worked(),
                    Err(err) => {
                        records.clear();
                        shared.failure.record("work", err);
                    }
                }
            }

            shared.prep_pool.push(item);
            // Failed items still travel on as empty so sequence numbers stay
            // contiguous for the ordered writer.
            shared.write_queue.push(Some(Worked { seq, records }));
        }
    }

    fn write_stage<I, PW: PacketWriter>(&self, shared: &Shared<I>, writer: &mut PW) {
        let mut pending: BTreeMap<u64, Vec<EncodedTile>> = BTreeMap::new();
        let mut next = 0u64;
        while let Some(Worked { seq, records }) = shared.write_queue.pop() {
            if !self.ordered_writes {
                self.write_records(shared, writer, records);
                continue;
            }
            pending.insert(seq, records);
            while let Some(records) = pending.remove(&next) {
                self.write_records(shared, writer, records);
                next += 1;
            }
        }
        for (_, records) in pending {
            shared.work_pool.push(records);
        }
    }

    fn write_records<I, PW: PacketWriter>(
        &self,
        shared: &Shared<I>,
        writer: &mut PW,
        mut records: Vec<EncodedTile>,
    ) {
        if !shared.failure.is_failed() {
            let mut written = 0;
            for record in &records {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    writer.write_append_crc(record.addr, &record.data, record.attribution_id)
                }));
                match result {
                    Ok(Ok(_offset)) => {
                        self.metrics.tile_written(record.data.len() as u64);
                        written += 1;
                    }
                    Ok(Err(err)) => {
                        shared.failure.record("write", err.into());
                        break;
                    }
                    Err(_) => {
                        shared
                            .failure
                            .record("write", PipelineError::ThreadPanicked { stage: "write" });
                        break;
                    }
                }
            }
            if written > 0 {
                self.observer.tiles_written(written);
            }
        }
        records.clear();
        shared.work_pool.push(records);
    }
}
