//! Source tile reads at any level at or below a product's resolution.

use std::sync::Arc;

use tracing::trace;

use super::{CacheStats, TileCache, TileCacheKey};
use crate::coord::{TileAddress, TileExtents};
use crate::error::ReadResult;
use crate::product::ProductLevel;
use crate::resample::{magnify_expanded_quadrant, magnify_quadrant};
use crate::tile::{RasterTile, TileKind};

/// How a reader magnifies ancestor tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagnifyMode {
    /// 9:3:3:1 weighted magnify, edges clamped within the tile.
    Weighted,
    /// Corner-sampled magnify over a tile expanded by one row and column
    /// borrowed from the upper and right neighbors. Keeps elevation
    /// continuous across tile seams.
    Expanded,
}

/// Reads target-level tiles from a product level, magnifying when the
/// target is finer than the product.
///
/// ```text
/// target level ─────► num_magnify == 0 ──► direct read
///               └───► num_magnify  > 0 ──► ancestor (cached) ──► magnify × n
/// ```
///
/// Each reader owns its cache and scratch buffers and is used from one
/// thread at a time.
pub struct CachingProductTileReader<K: TileKind> {
    tile_size: usize,
    mode: MagnifyMode,
    cache: TileCache<K>,
    scratch: Option<RasterTile<K>>,
    expanded: Option<(RasterTile<K>, RasterTile<K>)>,
}

impl<K: TileKind> CachingProductTileReader<K> {
    pub fn new(tile_size: usize, cache_capacity: usize) -> Self {
        Self {
            tile_size,
            mode: MagnifyMode::Weighted,
            cache: TileCache::new(cache_capacity),
            scratch: None,
            expanded: None,
        }
    }

    /// Use expanded corner-sampled magnification.
    pub fn with_mode(mut self, mode: MagnifyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> MagnifyMode {
        self.mode
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Read `target` from `level` into `dst`.
    ///
    /// `target.level` must not be coarser than `level`; a coarser target is
    /// read directly.
    pub fn read_tile(
        &mut self,
        level: &ProductLevel<K>,
        target: TileAddress,
        dst: &mut RasterTile<K>,
    ) -> ReadResult<()> {
        let num_magnify = target.level.saturating_sub(level.level());
        if num_magnify == 0 {
            return level.product().read_tile(target, dst);
        }

        let ancestor_addr = target.minified_to(level.level());
        let ancestor = self.fetch(level, ancestor_addr)?;
        trace!(
            product = level.name(),
            target = %target,
            ancestor = %ancestor_addr,
            num_magnify,
            "magnifying ancestor tile"
        );

        match self.mode {
            MagnifyMode::Weighted => {
                self.magnify_weighted(&ancestor, level.level(), target, dst);
                Ok(())
            }
            MagnifyMode::Expanded => self.magnify_expanded(level, &ancestor, ancestor_addr, target, dst),
        }
    }

    /// Like [`read_tile`](Self::read_tile), but a tile the product does not
    /// have is returned as all zeros instead of an error.
    pub fn read_tile_or_zero(
        &mut self,
        level: &ProductLevel<K>,
        target: TileAddress,
        dst: &mut RasterTile<K>,
    ) -> ReadResult<()> {
        match self.read_tile(level, target, dst) {
            Err(e) if e.is_missing() => {
                dst.fill_with_zeros();
                Ok(())
            }
            other => other,
        }
    }

    fn fetch(&mut self, level: &ProductLevel<K>, addr: TileAddress) -> ReadResult<Arc<RasterTile<K>>> {
        let key = TileCacheKey::new(level, addr);
        if let Some(tile) = self.cache.get(&key) {
            return Ok(tile);
        }
        let mut tile = RasterTile::new(self.tile_size);
        level.product().read_tile(addr, &mut tile)?;
        let tile = Arc::new(tile);
        self.cache.insert(key, Arc::clone(&tile));
        Ok(tile)
    }

    fn magnify_weighted(
        &mut self,
        ancestor: &RasterTile<K>,
        from_level: u32,
        target: TileAddress,
        dst: &mut RasterTile<K>,
    ) {
        let mut scratch = self
            .scratch
            .take()
            .unwrap_or_else(|| RasterTile::new(self.tile_size));

        magnify_quadrant(dst, ancestor, target.minified_to(from_level + 1).quadrant());
        for level in from_level + 2..=target.level {
            std::mem::swap(dst, &mut scratch);
            magnify_quadrant(dst, &scratch, target.minified_to(level).quadrant());
        }

        self.scratch = Some(scratch);
    }

    fn magnify_expanded(
        &mut self,
        level: &ProductLevel<K>,
        ancestor: &RasterTile<K>,
        ancestor_addr: TileAddress,
        target: TileAddress,
        dst: &mut RasterTile<K>,
    ) -> ReadResult<()> {
        let n = self.tile_size;
        let (mut src, mut out) = self
            .expanded
            .take()
            .unwrap_or_else(|| (RasterTile::new(n + 1), RasterTile::new(n + 1)));

        src.copy_subtile(0, 0, ancestor, TileExtents::new(0, n as u32, 0, n as u32));

        // Only targets on the top or right edge of the ancestor's span ever
        // sample the extra row or column.
        let span = ancestor_addr.magnified_to(target.level).extents;
        let need_top = target.row + 1 == span.end_row;
        let need_right = target.col + 1 == span.end_col;

        let upper = self.neighbor(level, ancestor_addr, ancestor_addr.upper(), need_top)?;
        let right = self.neighbor(level, ancestor_addr, ancestor_addr.right(), need_right)?;
        let corner = self.neighbor(
            level,
            ancestor_addr,
            ancestor_addr.upper_right(),
            need_top && need_right,
        )?;
        fill_extra_pixels(&mut src, upper.as_deref(), right.as_deref(), corner.as_deref());

        for lvl in ancestor_addr.level + 1..=target.level {
            magnify_expanded_quadrant(&mut out, &src, target.minified_to(lvl).quadrant());
            std::mem::swap(&mut src, &mut out);
        }
        dst.copy_subtile(0, 0, &src, TileExtents::new(0, n as u32, 0, n as u32));

        self.expanded = Some((src, out));
        Ok(())
    }

    /// The neighbor tile to borrow edge pixels from, if it is wanted, inside
    /// the product, and not a wrap around the world edge.
    fn neighbor(
        &mut self,
        level: &ProductLevel<K>,
        origin: TileAddress,
        neighbor: TileAddress,
        wanted: bool,
    ) -> ReadResult<Option<Arc<RasterTile<K>>>> {
        let wrapped = neighbor.row < origin.row || neighbor.col < origin.col;
        if !wanted || wrapped || !level.contains(&neighbor) {
            return Ok(None);
        }
        self.fetch(level, neighbor).map(Some)
    }
}

/// Fill row `n` and column `n` of an expanded tile from neighbor tiles,
/// replicating the tile's own edge where a neighbor is absent.
fn fill_extra_pixels<K: TileKind>(
    tile: &mut RasterTile<K>,
    upper: Option<&RasterTile<K>>,
    right: Option<&RasterTile<K>>,
    corner: Option<&RasterTile<K>>,
) {
    let n = tile.size() - 1;
    for band in 0..K::BANDS {
        for i in 0..n {
            let top = match upper {
                Some(t) => t.get(band, 0, i),
                None => tile.get(band, n - 1, i),
            };
            tile.set(band, n, i, top);

            let side = match right {
                Some(t) => t.get(band, i, 0),
                None => tile.get(band, i, n - 1),
            };
            tile.set(band, i, n, side);
        }
        let c = match corner {
            Some(t) => t.get(band, 0, 0),
            None => tile.get(band, n - 1, n - 1),
        };
        tile.set(band, n, n, c);
    }
}
