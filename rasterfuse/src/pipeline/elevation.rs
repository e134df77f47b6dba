//! Elevation level build with seam-sharing extra pixels.
//!
//! Each output elevation tile carries one extra row on top and one extra
//! column on the right, equal to the first row/column of its upper and
//! right neighbors, so adjacent meshes share their edge vertices.
//!
//! Product tiles are visited with [`DiagonalTraversal`]: by the time a tile
//! is prepared, its upper, right and upper-right neighbors inside the
//! coverage have been read and their edge strips sit in the
//! [`ExtraPixelsCache`]. Neighbors outside the coverage, or evicted from the
//! cache, are loaded on demand. Only a neighbor across the world edge is
//! missing: the top row is then zero and the right column repeats the
//! tile's own last column.
//!
//! ```text
//!         ┌──────────┬───┐
//!   row N │ upper's  │ ◄─┼── upper-right's (0,0)
//!         │ row 0    │   │
//!         ├──────────┼───┤
//!         │  tile    │ r │ ◄── right's column 0
//!         │  N × N   │   │
//!         └──────────┴───┘
//! ```

use std::sync::Arc;

use moka::sync::Cache;
use tracing::{debug, trace};

use super::attribution::AttributionByExtents;
use super::traverser::{EncodedTile, PrepStatus, Preparer, Worker};
use crate::blend::TileLoader;
use crate::cache::CacheStats;
use crate::codec::{encode_elevation, SubtileLayout};
use crate::config::BuildConfig;
use crate::coord::{tiles_per_axis, DiagonalTraversal, LevelCoverage, TileAddress, TileExtents};
use crate::error::{PipelineResult, ReadResult};
use crate::opacity::{BlendStatus, Opacity};
use crate::tile::{AlphaTile, RasterTile, Sample, TileKind};

/// Bottom row and left column of one product tile.
#[derive(Debug)]
struct EdgeStrips<S> {
    bottom_row: Vec<S>,
    left_col: Vec<S>,
}

/// Edge strips of recently prepared product tiles, keyed by address.
pub struct ExtraPixelsCache<K: TileKind> {
    cache: Cache<TileAddress, Arc<EdgeStrips<K::Sample>>>,
}

impl<K: TileKind> ExtraPixelsCache<K> {
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: Cache::new(capacity.max(1)),
        }
    }

    /// Capacity enough for two diagonal fronts of `coverage`.
    pub fn for_coverage(coverage: &LevelCoverage) -> Self {
        let e = &coverage.extents;
        Self::new(2 * u64::from(e.num_rows() + e.num_cols()) + 4)
    }

    pub fn store(&self, addr: TileAddress, tile: &RasterTile<K>) {
        self.insert(addr, tile);
    }

    fn insert(&self, addr: TileAddress, tile: &RasterTile<K>) -> Arc<EdgeStrips<K::Sample>> {
        let n = tile.size();
        let strips = Arc::new(EdgeStrips {
            bottom_row: (0..n).map(|col| tile.get(0, 0, col)).collect(),
            left_col: (0..n).map(|row| tile.get(0, row, 0)).collect(),
        });
        self.cache.insert(addr, Arc::clone(&strips));
        strips
    }

    fn get(&self, addr: TileAddress) -> Option<Arc<EdgeStrips<K::Sample>>> {
        self.cache.get(&addr)
    }

    pub fn contains(&self, addr: TileAddress) -> bool {
        self.cache.contains_key(&addr)
    }

    pub fn remove(&self, addr: TileAddress) {
        self.cache.invalidate(&addr);
    }
}

/// An expanded `(N+1)²` elevation tile.
pub struct ElevationPrepItem<K: TileKind> {
    pub addr: TileAddress,
    pub tile: RasterTile<K>,
}

/// Walks product tiles diagonally, composites each and attaches the
/// neighbor edge pixels.
pub struct ElevationPreparer<K: TileKind, L> {
    loader: L,
    traversal: DiagonalTraversal,
    coverage: LevelCoverage,
    tile_size: usize,
    loaded: RasterTile<K>,
    alpha: AlphaTile,
    neighbor: RasterTile<K>,
    neighbor_alpha: AlphaTile,
    extra: ExtraPixelsCache<K>,
}

impl<K: TileKind, L: TileLoader<K>> ElevationPreparer<K, L> {
    /// `coverage` is at the loader's (product) level.
    pub fn new(loader: L, coverage: LevelCoverage, tile_size: usize) -> Self {
        Self {
            loader,
            traversal: DiagonalTraversal::new(coverage),
            coverage,
            tile_size,
            loaded: RasterTile::new(tile_size),
            alpha: AlphaTile::new(tile_size),
            neighbor: RasterTile::new(tile_size),
            neighbor_alpha: AlphaTile::new(tile_size),
            extra: ExtraPixelsCache::for_coverage(&coverage),
        }
    }

    /// Edge strips of `addr`, loading the tile if the cache lacks it.
    fn neighbor_strips(&mut self, addr: TileAddress) -> ReadResult<Arc<EdgeStrips<K::Sample>>> {
        if let Some(strips) = self.extra.get(addr) {
            return Ok(strips);
        }
        let (opacity, _) = self
            .loader
            .load(addr, &mut self.neighbor, &mut self.neighbor_alpha)?;
        if opacity == Opacity::Transparent {
            self.neighbor.fill_with_zeros();
        }
        trace!(tile = %addr, %opacity, "neighbor loaded for extra pixels");
        Ok(self.extra.insert(addr, &self.neighbor))
    }

    fn expand(&mut self, addr: TileAddress, dst: &mut RasterTile<K>) -> ReadResult<()> {
        let n = self.tile_size;
        let max = tiles_per_axis(addr.level) - 1;
        let top_wraps = addr.row == max;
        let right_wraps = addr.col == max;

        let upper = match top_wraps {
            true => None,
            false => Some(self.neighbor_strips(addr.upper())?),
        };
        let right = match right_wraps {
            true => None,
            false => Some(self.neighbor_strips(addr.right())?),
        };
        let upper_right = match top_wraps || right_wraps {
            true => None,
            false => Some(self.neighbor_strips(addr.upper_right())?),
        };

        let full = TileExtents::new(0, n as u32, 0, n as u32);
        dst.copy_subtile(0, 0, &self.loaded, full);
        for col in 0..n {
            let v = match &upper {
                Some(strips) => strips.bottom_row[col],
                None => K::Sample::ZERO,
            };
            dst.set(0, n, col, v);
        }
        for row in 0..n {
            let v = match &right {
                Some(strips) => strips.left_col[row],
                None => self.loaded.get(0, row, n - 1),
            };
            dst.set(0, row, n, v);
        }
        let corner = match &upper_right {
            Some(strips) => strips.bottom_row[0],
            None if top_wraps => K::Sample::ZERO,
            None => dst.get(0, n, n - 1),
        };
        dst.set(0, n, n, corner);
        Ok(())
    }
}

impl<K: TileKind, L: TileLoader<K>> Preparer for ElevationPreparer<K, L> {
    type Item = ElevationPrepItem<K>;

    fn level(&self) -> u32 {
        self.coverage.level
    }

    fn total(&self) -> u64 {
        self.coverage.extents.len()
    }

    fn new_item(&self) -> ElevationPrepItem<K> {
        ElevationPrepItem {
            addr: TileAddress::new(self.coverage.level, 0, 0),
            tile: RasterTile::new(self.tile_size + 1),
        }
    }

    fn prepare(&mut self, item: &mut ElevationPrepItem<K>) -> PipelineResult<PrepStatus> {
        let Some(addr) = self.traversal.next() else {
            return Ok(PrepStatus::Done);
        };
        let (opacity, status) = self.loader.load(addr, &mut self.loaded, &mut self.alpha)?;
        if opacity == Opacity::Transparent {
            self.loaded.fill_with_zeros();
        }
        let uncovered = opacity == Opacity::Transparent || status == BlendStatus::NoDataBlended;
        trace!(tile = %addr, %opacity, ?status, uncovered, "elevation tile loaded");

        self.extra.store(addr, &self.loaded);
        self.expand(addr, &mut item.tile)?;
        // This tile is the last in diagonal order to need its upper-right
        // neighbor's strips.
        self.extra.remove(addr.upper_right());

        item.addr = addr;
        Ok(if uncovered {
            PrepStatus::Uncovered
        } else {
            PrepStatus::Ready
        })
    }

    fn cache_stats(&self) -> CacheStats {
        self.loader.cache_stats()
    }
}

/// Splits an expanded product tile into expanded target tiles and
/// compresses each.
pub struct ElevationWorker {
    layout: SubtileLayout,
    target_coverage: LevelCoverage,
    attribution: AttributionByExtents,
}

impl ElevationWorker {
    pub fn new(config: &BuildConfig, target_coverage: LevelCoverage) -> PipelineResult<Self> {
        let layout = SubtileLayout::new(config.product_tile_size, config.target_tile_size)?;
        debug!(
            level = target_coverage.level,
            per_axis = layout.per_axis(),
            "elevation worker ready"
        );
        Ok(Self {
            layout,
            target_coverage,
            attribution: AttributionByExtents::new(),
        })
    }

    pub fn with_attribution(mut self, attribution: AttributionByExtents) -> Self {
        self.attribution = attribution;
        self
    }

    pub fn product_coverage(&self) -> LevelCoverage {
        self.target_coverage
            .translated_to(self.layout.product_level(self.target_coverage.level))
    }
}

impl<K: TileKind> Worker<ElevationPrepItem<K>> for ElevationWorker {
    fn work(&self, item: &ElevationPrepItem<K>, out: &mut Vec<EncodedTile>) -> PipelineResult<()> {
        let targets = self.layout.subtiles(item.addr, &self.target_coverage);
        let mut sub = (self.layout.level_offset() > 0)
            .then(|| RasterTile::<K>::new(self.layout.target_tile_size() + 1));
        for addr in targets {
            let data = match sub.as_mut() {
                Some(sub) => {
                    self.layout.extract(&item.tile, addr, sub);
                    encode_elevation(sub)?
                }
                None => encode_elevation(&item.tile)?,
            };
            out.push(EncodedTile {
                addr,
                data,
                attribution_id: self.attribution.attribution_id(addr),
            });
        }
        Ok(())
    }
}
