//! Bounded-queue level build pipeline.
//!
//! A level build walks every product tile of a coverage, composites it with
//! a [`TileLoader`](crate::blend::TileLoader), encodes the target tiles it
//! splits into, and appends them to a [`PacketWriter`].
//!
//! # Architecture
//!
//! ```text
//! ImageryPreparer / ElevationPreparer   (Prep, caller thread)
//!        │  RasterBlender | RasterMerger ::load
//!        ▼
//! ImageryWorker / ElevationWorker       (Work, N threads)
//!        │  SubtileLayout + codec
//!        ▼
//! PacketWriter::write_append_crc        (Write, one thread)
//! ```
//!
//! [`PackgenTraverser`] owns the threads, queues and pools and is agnostic
//! of tile kind; the imagery and elevation modules plug in through the
//! [`Preparer`] and [`Worker`] traits.

mod attribution;
mod elevation;
mod imagery;
mod queue;
mod traverser;
mod writer;

pub use attribution::AttributionByExtents;
pub use elevation::{ElevationPrepItem, ElevationPreparer, ElevationWorker, ExtraPixelsCache};
pub use imagery::{ImageryPrepItem, ImageryPreparer, ImageryWorker};
pub use queue::BoundedQueue;
pub use traverser::{EncodedTile, PackgenTraverser, PrepStatus, Preparer, Worker};
pub use writer::{MemoryPacketWriter, PacketRecord, PacketWriter};
