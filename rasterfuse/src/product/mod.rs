//! Raster product abstraction.
//!
//! A product is one pyramid of tiles on disk: imagery, elevation or an
//! alpha mask. The storage format is somebody else's concern; the engine
//! only needs tile reads, per-level extents and the precomputed
//! [`OpacityMask`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────┐
//! │  RasterProduct<K> trait │  ◄── implemented by storage backends
//! └───────────┬─────────────┘
//!             │
//!   ┌─────────┴──────────┐
//!   │  ProductLevel<K>   │  product handle pinned to one level;
//!   └────────────────────┘  identity key for the tile cache
//! ```
//!
//! [`MemoryProduct`] is an in-memory implementation that counts reads, for
//! tests and for feeding one level's output into the next.

mod memory;

pub use memory::MemoryProduct;

use std::fmt;
use std::sync::Arc;

use crate::coord::{LevelCoverage, TileAddress};
use crate::error::ReadResult;
use crate::opacity::OpacityMask;
use crate::tile::{RasterTile, TileKind};

/// What a product's pixels mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductKind {
    Imagery,
    Heightmap,
    AlphaMask,
}

impl ProductKind {
    /// True for products that carry composited data bands.
    pub fn is_data(&self) -> bool {
        matches!(self, ProductKind::Imagery | ProductKind::Heightmap)
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductKind::Imagery => write!(f, "imagery"),
            ProductKind::Heightmap => write!(f, "heightmap"),
            ProductKind::AlphaMask => write!(f, "alpha mask"),
        }
    }
}

/// A readable tile pyramid.
///
/// Implementations must be safe to read from several threads at once.
pub trait RasterProduct<K: TileKind>: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> ProductKind;

    /// Pixels per tile side.
    fn tile_size(&self) -> usize;

    fn min_level(&self) -> u32;

    fn max_level(&self) -> u32;

    /// Tiles present at `level`, or `None` outside `min_level..=max_level`.
    fn level_coverage(&self, level: u32) -> Option<LevelCoverage>;

    /// Read one tile into `dst`.
    fn read_tile(&self, addr: TileAddress, dst: &mut RasterTile<K>) -> ReadResult<()>;

    fn opacity_mask(&self) -> &OpacityMask;

    fn valid_level(&self, level: u32) -> bool {
        level >= self.min_level() && level <= self.max_level()
    }
}

/// Shared product handle.
pub type SharedProduct<K> = Arc<dyn RasterProduct<K>>;

/// A product pinned to one of its levels.
pub struct ProductLevel<K: TileKind> {
    product: SharedProduct<K>,
    level: u32,
    coverage: LevelCoverage,
}

impl<K: TileKind> ProductLevel<K> {
    /// Returns `None` if the product has no such level.
    pub fn new(product: SharedProduct<K>, level: u32) -> Option<Self> {
        let coverage = product.level_coverage(level)?;
        Some(Self {
            product,
            level,
            coverage,
        })
    }

    pub fn product(&self) -> &SharedProduct<K> {
        &self.product
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Tiles present at this level.
    pub fn coverage(&self) -> &LevelCoverage {
        &self.coverage
    }

    pub fn contains(&self, addr: &TileAddress) -> bool {
        self.coverage.contains(addr)
    }

    /// Stable key for caches: product allocation plus level.
    pub fn identity(&self) -> (usize, u32) {
        (
            Arc::as_ptr(&self.product) as *const () as usize,
            self.level,
        )
    }

    pub fn name(&self) -> &str {
        self.product.name()
    }
}

impl<K: TileKind> Clone for ProductLevel<K> {
    fn clone(&self) -> Self {
        Self {
            product: Arc::clone(&self.product),
            level: self.level,
            coverage: self.coverage,
        }
    }
}

impl<K: TileKind> fmt::Debug for ProductLevel<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductLevel")
            .field("product", &self.product.name())
            .field("level", &self.level)
            .finish()
    }
}
