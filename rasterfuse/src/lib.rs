//! RasterFuse - raster tile-pyramid compositing
//!
//! This library composites overlapping imagery and elevation insets into a
//! quadtree tile pyramid and streams the results through a bounded
//! Prep / Work / Write pipeline to a packet writer.
//!
//! # Architecture
//!
//! ```text
//! RasterProduct<K> + OpacityMask        (external pyramid readers)
//!        │
//!        ▼
//! CachingProductTileReader<K>           cache    (moka LRU, magnify)
//!        │
//!        ▼
//! RasterBlender<K> / RasterMerger<K>    blend    (compositing, minify)
//!        │
//!        ▼
//! PackgenTraverser                      pipeline (Prep ─► Work × N ─► Write)
//!        │
//!        ▼
//! PacketWriter                          (external packet sink)
//! ```
//!
//! The library never installs a `tracing` subscriber; embedders own that.

pub mod blend;
pub mod cache;
pub mod codec;
pub mod config;
pub mod coord;
pub mod error;
pub mod opacity;
pub mod pipeline;
pub mod product;
pub mod resample;
pub mod telemetry;
pub mod tile;

pub use blend::{BlendInset, MergeInset, RasterBlender, RasterMerger, TileLoader};
pub use config::BuildConfig;
pub use coord::{LevelCoverage, TileAddress, TileExtents};
pub use error::{InsetError, PipelineError, TileReadError};
pub use opacity::{BlendStatus, Opacity, OpacityMask};
pub use pipeline::{PackgenTraverser, PacketWriter};
pub use tile::{AlphaTile, RasterTile};
