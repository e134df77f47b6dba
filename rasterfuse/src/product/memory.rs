//! In-memory raster product.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ProductKind, RasterProduct};
use crate::coord::{LevelCoverage, TileAddress, TileExtents};
use crate::error::{ReadResult, TileReadError};
use crate::opacity::OpacityMask;
use crate::tile::{RasterTile, TileKind};

struct MemoryLevel<K: TileKind> {
    coverage: LevelCoverage,
    tiles: HashMap<(u32, u32), RasterTile<K>>,
}

/// A product held entirely in memory.
///
/// Every successful or failed [`read_tile`](RasterProduct::read_tile) call
/// is counted, which makes it easy to assert that a source was never
/// touched.
pub struct MemoryProduct<K: TileKind> {
    name: String,
    kind: ProductKind,
    tile_size: usize,
    levels: BTreeMap<u32, MemoryLevel<K>>,
    mask: OpacityMask,
    corrupt: HashSet<TileAddress>,
    reads: AtomicUsize,
}

impl<K: TileKind> MemoryProduct<K> {
    pub fn new(name: impl Into<String>, kind: ProductKind, tile_size: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            tile_size,
            levels: BTreeMap::new(),
            mask: OpacityMask::empty(),
            corrupt: HashSet::new(),
            reads: AtomicUsize::new(0),
        }
    }

    /// Declare the extents of a level without storing tiles.
    pub fn with_level(mut self, coverage: LevelCoverage) -> Self {
        self.levels
            .entry(coverage.level)
            .and_modify(|l| l.coverage = coverage)
            .or_insert_with(|| MemoryLevel {
                coverage,
                tiles: HashMap::new(),
            });
        self
    }

    /// Store one tile, growing the level's extents to include it.
    pub fn with_tile(mut self, addr: TileAddress, tile: RasterTile<K>) -> Self {
        self.insert_tile(addr, tile);
        self
    }

    /// Store a copy of `tile` at every address of `coverage`.
    pub fn with_uniform_tiles(mut self, coverage: LevelCoverage, tile: &RasterTile<K>) -> Self {
        self = self.with_level(coverage);
        for addr in coverage.addresses() {
            self.insert_tile(addr, tile.clone());
        }
        self
    }

    pub fn with_mask(mut self, mask: OpacityMask) -> Self {
        self.mask = mask;
        self
    }

    /// Make reads of `addr` fail as corrupt data.
    pub fn with_corrupt_tile(mut self, addr: TileAddress) -> Self {
        self.corrupt.insert(addr);
        self
    }

    pub fn insert_tile(&mut self, addr: TileAddress, tile: RasterTile<K>) {
        let cell = TileExtents::new(addr.row, addr.row + 1, addr.col, addr.col + 1);
        let level = self.levels.entry(addr.level).or_insert_with(|| MemoryLevel {
            coverage: LevelCoverage::new(addr.level, cell),
            tiles: HashMap::new(),
        });
        let e = &mut level.coverage.extents;
        if !e.contains(&cell) {
            *e = TileExtents::new(
                e.begin_row.min(cell.begin_row),
                e.end_row.max(cell.end_row),
                e.begin_col.min(cell.begin_col),
                e.end_col.max(cell.end_col),
            );
        }
        level.tiles.insert((addr.row, addr.col), tile);
    }

    /// Number of `read_tile` calls so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn reset_reads(&self) {
        self.reads.store(0, Ordering::Relaxed);
    }
}

impl<K: TileKind> RasterProduct<K> for MemoryProduct<K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProductKind {
        self.kind
    }

    fn tile_size(&self) -> usize {
        self.tile_size
    }

    fn min_level(&self) -> u32 {
        self.levels.keys().next().copied().unwrap_or(1)
    }

    fn max_level(&self) -> u32 {
        self.levels.keys().next_back().copied().unwrap_or(0)
    }

    fn level_coverage(&self, level: u32) -> Option<LevelCoverage> {
        self.levels.get(&level).map(|l| l.coverage)
    }

    fn read_tile(&self, addr: TileAddress, dst: &mut RasterTile<K>) -> ReadResult<()> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        if self.corrupt.contains(&addr) {
            return Err(TileReadError::Corrupt {
                product: self.name.clone(),
                addr,
                reason: "injected corruption".to_string(),
            });
        }
        let tile = self
            .levels
            .get(&addr.level)
            .and_then(|l| l.tiles.get(&(addr.row, addr.col)))
            .ok_or_else(|| TileReadError::Missing {
                product: self.name.clone(),
                addr,
            })?;
        if tile.size() != dst.size() {
            return Err(TileReadError::SizeMismatch {
                product: self.name.clone(),
                addr,
                expected: dst.size(),
                actual: tile.size(),
            });
        }
        dst.copy_from(tile);
        Ok(())
    }

    fn opacity_mask(&self) -> &OpacityMask {
        &self.mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{Alpha, AlphaTile, Imagery};

    #[test]
    fn test_read_tile_counts_reads() {
        let mut tile = RasterTile::<Imagery>::new(4);
        tile.fill(42);
        let product = MemoryProduct::new("ortho", ProductKind::Imagery, 4)
            .with_tile(TileAddress::new(2, 1, 1), tile);

        let mut dst = RasterTile::<Imagery>::new(4);
        product.read_tile(TileAddress::new(2, 1, 1), &mut dst).unwrap();
        assert!(dst.is_uniform(42));
        assert_eq!(product.read_count(), 1);

        let err = product
            .read_tile(TileAddress::new(2, 0, 0), &mut dst)
            .unwrap_err();
        assert!(err.is_missing());
        assert_eq!(product.read_count(), 2);
    }

    #[test]
    fn test_with_tile_grows_extents() {
        let product = MemoryProduct::<Alpha>::new("mask", ProductKind::AlphaMask, 2)
            .with_tile(TileAddress::new(3, 2, 5), AlphaTile::new(2))
            .with_tile(TileAddress::new(3, 4, 1), AlphaTile::new(2));
        let cov = product.level_coverage(3).unwrap();
        assert_eq!(cov.extents, TileExtents::new(2, 5, 1, 6));
        assert_eq!(product.min_level(), 3);
        assert_eq!(product.max_level(), 3);
        assert!(product.level_coverage(2).is_none());
    }

    #[test]
    fn test_size_mismatch() {
        let product = MemoryProduct::new("ortho", ProductKind::Imagery, 4)
            .with_tile(TileAddress::new(1, 0, 0), RasterTile::<Imagery>::new(4));
        let mut dst = RasterTile::<Imagery>::new(8);
        let err = product
            .read_tile(TileAddress::new(1, 0, 0), &mut dst)
            .unwrap_err();
        assert!(matches!(err, TileReadError::SizeMismatch { .. }));
    }

    #[test]
    fn test_corrupt_tile() {
        let addr = TileAddress::new(1, 0, 0);
        let product = MemoryProduct::new("ortho", ProductKind::Imagery, 4)
            .with_tile(addr, RasterTile::<Imagery>::new(4))
            .with_corrupt_tile(addr);
        let mut dst = RasterTile::<Imagery>::new(4);
        assert!(matches!(
            product.read_tile(addr, &mut dst),
            Err(TileReadError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_empty_product_has_no_valid_level() {
        let product = MemoryProduct::<Imagery>::new("empty", ProductKind::Imagery, 4);
        assert!(!product.valid_level(0));
        assert!(!product.valid_level(1));
    }
}
