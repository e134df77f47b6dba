//! Tile data model.
//!
//! Tiles are square, band-major pixel buffers whose sample type and band
//! count come from a [`TileKind`]. The same generic code paths handle
//! imagery (3 x `u8`), elevation (`f32` or `i16`) and alpha (`u8`).
//!
//! ```text
//! RasterTile<Imagery>          RasterTile<Alpha>
//! ┌──────────────┐             ┌──────────────┐
//! │ band 0 (R)   │             │ band 0 (A)   │
//! ├──────────────┤             └──────────────┘
//! │ band 1 (G)   │
//! ├──────────────┤
//! │ band 2 (B)   │
//! └──────────────┘
//! ```

mod raster;
mod sample;

pub use raster::{Alpha, AlphaTile, Heightmap, Heightmap16, Imagery, RasterTile, TileKind};
pub use sample::Sample;
