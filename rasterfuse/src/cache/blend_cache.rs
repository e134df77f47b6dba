//! Pre-blended tiles handed from one level's build to the next coarser one.
//!
//! Building level `n` composites every inset stack down to one tile per
//! address. Merging level `n - 1` from scratch would redo that work, so
//! the blended results can be stored here and read back by the merger.
//! Opaque results are stored without alpha; a missing alpha tile means
//! "fully opaque".

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::coord::{LevelCoverage, TileAddress, TileExtents};
use crate::error::{ReadResult, TileReadError, WriteError};
use crate::tile::{AlphaTile, RasterTile, TileKind};

/// Storage for blended tiles and their optional alpha.
pub trait BlendCache<K: TileKind>: Send + Sync {
    fn name(&self) -> &str;

    /// Extents of the cached blend at `level`, if that level was produced.
    fn level_coverage(&self, level: u32) -> Option<LevelCoverage>;

    fn has_tile(&self, addr: TileAddress) -> bool;

    fn read_tile(&self, addr: TileAddress, dst: &mut RasterTile<K>) -> ReadResult<()>;

    /// Read cached alpha into `dst`. Returns `false` when no alpha was
    /// stored, meaning the tile is fully opaque.
    fn read_alpha(&self, addr: TileAddress, dst: &mut AlphaTile) -> ReadResult<bool>;

    fn store(
        &self,
        addr: TileAddress,
        data: &RasterTile<K>,
        alpha: Option<&AlphaTile>,
    ) -> Result<(), WriteError>;

    /// Record that a level was built over `coverage`, whether or not every
    /// tile ended up stored.
    fn declare_coverage(&self, coverage: LevelCoverage);
}

struct CachedBlend<K: TileKind> {
    data: Arc<RasterTile<K>>,
    alpha: Option<Arc<AlphaTile>>,
}

/// [`BlendCache`] held in memory.
pub struct MemoryBlendCache<K: TileKind> {
    name: String,
    coverage: RwLock<HashMap<u32, TileExtents>>,
    tiles: RwLock<HashMap<TileAddress, CachedBlend<K>>>,
}

impl<K: TileKind> MemoryBlendCache<K> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            coverage: RwLock::new(HashMap::new()),
            tiles: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.read().is_empty()
    }

    fn missing(&self, addr: TileAddress) -> TileReadError {
        TileReadError::Missing {
            product: self.name.clone(),
            addr,
        }
    }
}

fn union(a: &TileExtents, b: &TileExtents) -> TileExtents {
    if a.is_empty() {
        return *b;
    }
    if b.is_empty() {
        return *a;
    }
    TileExtents::new(
        a.begin_row.min(b.begin_row),
        a.end_row.max(b.end_row),
        a.begin_col.min(b.begin_col),
        a.end_col.max(b.end_col),
    )
}

impl<K: TileKind> BlendCache<K> for MemoryBlendCache<K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn level_coverage(&self, level: u32) -> Option<LevelCoverage> {
        self.coverage
            .read()
            .get(&level)
            .map(|e| LevelCoverage::new(level, *e))
    }

    fn has_tile(&self, addr: TileAddress) -> bool {
        self.tiles.read().contains_key(&addr)
    }

    fn read_tile(&self, addr: TileAddress, dst: &mut RasterTile<K>) -> ReadResult<()> {
        let tiles = self.tiles.read();
        let entry = tiles.get(&addr).ok_or_else(|| self.missing(addr))?;
        if entry.data.size() != dst.size() {
            return Err(TileReadError::SizeMismatch {
                product: self.name.clone(),
                addr,
                expected: dst.size(),
                actual: entry.data.size(),
            });
        }
        dst.copy_from(&entry.data);
        Ok(())
    }

    fn read_alpha(&self, addr: TileAddress, dst: &mut AlphaTile) -> ReadResult<bool> {
        let tiles = self.tiles.read();
        let entry = tiles.get(&addr).ok_or_else(|| self.missing(addr))?;
        match &entry.alpha {
            Some(alpha) => {
                dst.copy_from(alpha);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn store(
        &self,
        addr: TileAddress,
        data: &RasterTile<K>,
        alpha: Option<&AlphaTile>,
    ) -> Result<(), WriteError> {
        let entry = CachedBlend {
            data: Arc::new(data.clone()),
            alpha: alpha.map(|a| Arc::new(a.clone())),
        };
        self.tiles.write().insert(addr, entry);
        self.declare_coverage(LevelCoverage::from_address(addr));
        Ok(())
    }

    fn declare_coverage(&self, coverage: LevelCoverage) {
        let mut levels = self.coverage.write();
        let e = levels.entry(coverage.level).or_insert(coverage.extents);
        let merged = union(e, &coverage.extents);
        *e = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::Imagery;

    #[test]
    fn test_store_and_read_back() {
        let cache = MemoryBlendCache::<Imagery>::new("blend");
        let addr = TileAddress::new(4, 3, 3);
        let mut data = RasterTile::<Imagery>::new(2);
        data.fill(40);
        let mut alpha = AlphaTile::new(2);
        alpha.fill(128);
        cache.store(addr, &data, Some(&alpha)).unwrap();

        assert!(cache.has_tile(addr));
        let mut out = RasterTile::<Imagery>::new(2);
        cache.read_tile(addr, &mut out).unwrap();
        assert!(out.is_uniform(40));
        let mut out_alpha = AlphaTile::new(2);
        assert!(cache.read_alpha(addr, &mut out_alpha).unwrap());
        assert!(out_alpha.is_uniform(128));
    }

    #[test]
    fn test_opaque_tiles_have_no_alpha() {
        let cache = MemoryBlendCache::<Imagery>::new("blend");
        let addr = TileAddress::new(4, 0, 0);
        cache
            .store(addr, &RasterTile::<Imagery>::new(2), None)
            .unwrap();
        let mut out_alpha = AlphaTile::new(2);
        assert!(!cache.read_alpha(addr, &mut out_alpha).unwrap());
    }

    #[test]
    fn test_missing_tile() {
        let cache = MemoryBlendCache::<Imagery>::new("blend");
        let mut out = RasterTile::<Imagery>::new(2);
        let err = cache
            .read_tile(TileAddress::new(1, 0, 0), &mut out)
            .unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn test_coverage_grows_with_declarations_and_stores() {
        let cache = MemoryBlendCache::<Imagery>::new("blend");
        cache.declare_coverage(LevelCoverage::new(3, TileExtents::new(0, 2, 0, 2)));
        cache
            .store(TileAddress::new(3, 5, 1), &RasterTile::<Imagery>::new(2), None)
            .unwrap();
        assert_eq!(
            cache.level_coverage(3).unwrap().extents,
            TileExtents::new(0, 6, 0, 2)
        );
        assert!(cache.level_coverage(2).is_none());
        assert_eq!(cache.len(), 1);
    }
}
