//! Bounded LRU cache of decoded source tiles, backed by moka.
//!
//! Reading and magnifying an ancestor tile is the most expensive step of
//! building a level below a product's native resolution. Neighboring target
//! tiles share ancestors, so the decoded ancestor is kept around and
//! handed out as an `Arc`.
//!
//! Entries are keyed by product level identity plus tile id, so two
//! products (or two levels of one product) never collide.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;

use crate::coord::TileAddress;
use crate::product::ProductLevel;
use crate::tile::{RasterTile, TileKind};

/// Cache key: which product level, which tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    product: usize,
    level: u32,
    tile_id: u64,
}

impl TileCacheKey {
    pub fn new<K: TileKind>(level: &ProductLevel<K>, addr: TileAddress) -> Self {
        let (product, level) = level.identity();
        Self {
            product,
            level,
            tile_id: addr.tile_id(),
        }
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

impl std::ops::Add for CacheStats {
    type Output = CacheStats;

    fn add(self, other: CacheStats) -> CacheStats {
        CacheStats {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            entries: self.entries + other.entries,
        }
    }
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache of shared tiles.
///
/// A capacity of zero disables caching entirely; every lookup misses.
pub struct TileCache<K: TileKind> {
    cache: Option<Cache<TileCacheKey, Arc<RasterTile<K>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: TileKind> TileCache<K> {
    /// Create a cache holding at most `capacity` tiles.
    pub fn new(capacity: usize) -> Self {
        let cache = (capacity > 0).then(|| {
            Cache::builder()
                .max_capacity(capacity as u64)
                .eviction_policy(EvictionPolicy::lru())
                .build()
        });
        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub fn get(&self, key: &TileCacheKey) -> Option<Arc<RasterTile<K>>> {
        match self.cache.as_ref().and_then(|c| c.get(key)) {
            Some(tile) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(tile)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: TileCacheKey, tile: Arc<RasterTile<K>>) {
        if let Some(cache) = &self.cache {
            cache.insert(key, tile);
        }
    }

    pub fn remove(&self, key: &TileCacheKey) {
        if let Some(cache) = &self.cache {
            cache.invalidate(key);
        }
    }

    pub fn stats(&self) -> CacheStats {
        let entries = match &self.cache {
            Some(cache) => {
                cache.run_pending_tasks();
                cache.entry_count()
            }
            None => 0,
        };
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::LevelCoverage;
    use crate::product::{MemoryProduct, ProductKind};
    use crate::tile::Imagery;

    fn level() -> ProductLevel<Imagery> {
        let product = MemoryProduct::<Imagery>::new("ortho", ProductKind::Imagery, 2)
            .with_level(LevelCoverage::world(2));
        ProductLevel::new(Arc::new(product), 2).unwrap()
    }

    #[test]
    fn test_hit_and_miss_counting() {
        let level = level();
        let cache = TileCache::<Imagery>::new(4);
        let key = TileCacheKey::new(&level, TileAddress::new(2, 1, 1));

        assert!(cache.get(&key).is_none());
        cache.insert(key, Arc::new(RasterTile::new(2)));
        assert!(cache.get(&key).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let level = level();
        let cache = TileCache::<Imagery>::new(0);
        let key = TileCacheKey::new(&level, TileAddress::new(2, 0, 0));
        cache.insert(key, Arc::new(RasterTile::new(2)));
        assert!(!cache.is_enabled());
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_keys_distinguish_products() {
        let a = level();
        let b = level();
        let addr = TileAddress::new(2, 0, 0);
        assert_ne!(TileCacheKey::new(&a, addr), TileCacheKey::new(&b, addr));
        assert_eq!(TileCacheKey::new(&a, addr), TileCacheKey::new(&a.clone(), addr));
    }

    #[test]
    fn test_remove() {
        let level = level();
        let cache = TileCache::<Imagery>::new(4);
        let key = TileCacheKey::new(&level, TileAddress::new(2, 0, 0));
        cache.insert(key, Arc::new(RasterTile::new(2)));
        cache.remove(&key);
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_capacity_bounds_entries() {
        let level = level();
        let cache = TileCache::<Imagery>::new(2);
        for col in 0..4 {
            let key = TileCacheKey::new(&level, TileAddress::new(2, 0, col));
            cache.insert(key, Arc::new(RasterTile::new(2)));
        }
        assert!(cache.stats().entries <= 2);
    }
}
