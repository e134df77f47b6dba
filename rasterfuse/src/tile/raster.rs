//! Band-major raster tile buffers.

use std::fmt;
use std::marker::PhantomData;

use super::Sample;
use crate::coord::TileExtents;

/// Compile-time description of a tile flavor: sample type and band count.
pub trait TileKind: Send + Sync + 'static {
    type Sample: Sample;
    const BANDS: usize;
    const NAME: &'static str;
}

/// 8-bit RGB imagery.
#[derive(Debug)]
pub enum Imagery {}

/// 32-bit float elevation.
#[derive(Debug)]
pub enum Heightmap {}

/// 16-bit integer elevation.
#[derive(Debug)]
pub enum Heightmap16 {}

/// 8-bit single-band opacity.
#[derive(Debug)]
pub enum Alpha {}

impl TileKind for Imagery {
    type Sample = u8;
    const BANDS: usize = 3;
    const NAME: &'static str = "imagery";
}

impl TileKind for Heightmap {
    type Sample = f32;
    const BANDS: usize = 1;
    const NAME: &'static str = "heightmap";
}

impl TileKind for Heightmap16 {
    type Sample = i16;
    const BANDS: usize = 1;
    const NAME: &'static str = "heightmap16";
}

impl TileKind for Alpha {
    type Sample = u8;
    const BANDS: usize = 1;
    const NAME: &'static str = "alpha";
}

/// A square tile of `size * size` pixels stored band by band.
///
/// Pixel `(row, col)` of band `b` lives at `b * size * size + row * size + col`,
/// with row 0 at the bottom of the tile.
pub struct RasterTile<K: TileKind> {
    size: usize,
    data: Vec<K::Sample>,
    _kind: PhantomData<K>,
}

/// Single-band opacity tile.
pub type AlphaTile = RasterTile<Alpha>;

impl<K: TileKind> RasterTile<K> {
    /// Create a zero-filled tile.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            data: vec![K::Sample::ZERO; size * size * K::BANDS],
            _kind: PhantomData,
        }
    }

    /// Wrap an existing band-major buffer. Returns `None` if the length
    /// does not match `size * size * BANDS`.
    pub fn from_samples(size: usize, data: Vec<K::Sample>) -> Option<Self> {
        if data.len() != size * size * K::BANDS {
            return None;
        }
        Some(Self {
            size,
            data,
            _kind: PhantomData,
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn band_pixel_count(&self) -> usize {
        self.size * self.size
    }

    #[inline]
    pub fn band(&self, band: usize) -> &[K::Sample] {
        let n = self.band_pixel_count();
        &self.data[band * n..(band + 1) * n]
    }

    #[inline]
    pub fn band_mut(&mut self, band: usize) -> &mut [K::Sample] {
        let n = self.band_pixel_count();
        &mut self.data[band * n..(band + 1) * n]
    }

    pub fn samples(&self) -> &[K::Sample] {
        &self.data
    }

    #[inline]
    pub fn get(&self, band: usize, row: usize, col: usize) -> K::Sample {
        self.data[band * self.band_pixel_count() + row * self.size + col]
    }

    #[inline]
    pub fn set(&mut self, band: usize, row: usize, col: usize, value: K::Sample) {
        let n = self.band_pixel_count();
        self.data[band * n + row * self.size + col] = value;
    }

    pub fn fill(&mut self, value: K::Sample) {
        self.data.fill(value);
    }

    pub fn fill_with_zeros(&mut self) {
        self.data.fill(K::Sample::ZERO);
    }

    /// Zero one quarter of every band. Quadrant numbering follows
    /// [`TileAddress::children`](crate::coord::TileAddress::children).
    pub fn fill_quad_with_zeros(&mut self, quad: usize) {
        let half = self.size / 2;
        let row0 = (quad >> 1) * half;
        let col0 = (quad & 1) * half;
        let size = self.size;
        for band in 0..K::BANDS {
            let buf = self.band_mut(band);
            for row in row0..row0 + half {
                let start = row * size + col0;
                buf[start..start + half].fill(K::Sample::ZERO);
            }
        }
    }

    /// Overwrite this tile with `other`. Sizes must match.
    pub fn copy_from(&mut self, other: &RasterTile<K>) {
        debug_assert_eq!(self.size, other.size);
        self.data.copy_from_slice(&other.data);
    }

    /// Copy `extents` of `src` so that its lower-left corner lands at
    /// `(dst_row, dst_col)` in this tile. Extents are in pixels.
    pub fn copy_subtile(
        &mut self,
        dst_row: usize,
        dst_col: usize,
        src: &RasterTile<K>,
        extents: TileExtents,
    ) {
        let width = extents.num_cols() as usize;
        let src_col = extents.begin_col as usize;
        for band in 0..K::BANDS {
            for (i, src_row) in (extents.begin_row..extents.end_row).enumerate() {
                let src_start = src_row as usize * src.size + src_col;
                let dst_start = (dst_row + i) * self.size + dst_col;
                let n = self.band_pixel_count();
                let sn = src.band_pixel_count();
                self.data[band * n + dst_start..band * n + dst_start + width].copy_from_slice(
                    &src.data[band * sn + src_start..band * sn + src_start + width],
                );
            }
        }
    }

    /// True if every sample of every band equals `value`.
    pub fn is_uniform(&self, value: K::Sample) -> bool {
        self.data.iter().all(|&s| s == value)
    }
}

impl<K: TileKind> Clone for RasterTile<K> {
    fn clone(&self) -> Self {
        Self {
            size: self.size,
            data: self.data.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: TileKind> PartialEq for RasterTile<K> {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.data == other.data
    }
}

impl<K: TileKind> fmt::Debug for RasterTile<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterTile")
            .field("kind", &K::NAME)
            .field("size", &self.size)
            .field("bands", &K::BANDS)
            .finish()
    }
}
