//! Tile caching.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ CachingProductTileReader<K>  │  one per blender/merger, one thread
//! │   ├── TileCache<K> (moka LRU)│  decoded ancestor tiles
//! │   └── scratch buffers        │  magnify ping-pong
//! └──────────────┬───────────────┘
//!                │ read_tile
//!                ▼
//!        RasterProduct<K>
//!
//! BlendCache<K>  ◄── store (level n build)
//!                ──► read  (level n-1 merge)
//! ```

mod blend_cache;
mod memory;
mod reader;

pub use blend_cache::{BlendCache, MemoryBlendCache};
pub use memory::{CacheStats, TileCache, TileCacheKey};
pub use reader::{CachingProductTileReader, MagnifyMode};
