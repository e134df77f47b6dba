//! Inset compositing.
//!
//! Two ways of producing one output tile from a stack of products:
//!
//! # Architecture
//!
//! ```text
//!                      TileLoader<K>::load(addr)
//!                     ┌───────────┴────────────┐
//!                     ▼                        ▼
//!             RasterBlender<K>          RasterMerger<K>
//!       same level, stack walk      level n from four n+1 tiles
//!       blend_* compositors          minify_into_quadrant
//!                     │                        │
//!                     └──── (Opacity, BlendStatus) ────┘
//! ```
//!
//! Insets are ordered top first. Products are validated when insets are
//! built, so a misconfigured stack fails before any tile is read.

mod blender;
mod compose;
mod inset;
mod merger;

pub use blender::{RasterBlender, DEFAULT_TILE_CACHE_SIZE};
pub use compose::{apply_alpha, blend_terminal_tile, blend_tile_and_saturate_alpha};
pub use inset::{BlendInset, MergeInset};
pub use merger::RasterMerger;

use crate::cache::CacheStats;
use crate::coord::TileAddress;
use crate::error::ReadResult;
use crate::opacity::{BlendStatus, Opacity};
use crate::tile::{AlphaTile, RasterTile, TileKind};

/// Source of composited tiles for the pipeline's prep stage.
///
/// Implementations hold read buffers and caches and are driven from one
/// thread at a time.
pub trait TileLoader<K: TileKind>: Send {
    /// Fill `dst` and `dst_alpha` for `addr`.
    ///
    /// When the result is `Transparent` with `BlendStatus::NonBlended` and
    /// skipping is enabled, the buffers may be left untouched.
    fn load(
        &mut self,
        addr: TileAddress,
        dst: &mut RasterTile<K>,
        dst_alpha: &mut AlphaTile,
    ) -> ReadResult<(Opacity, BlendStatus)>;

    /// Counters of the loader's ancestor caches.
    fn cache_stats(&self) -> CacheStats {
        CacheStats::default()
    }
}
