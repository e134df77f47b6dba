//! Wire encoding of finished tiles.
//!
//! # Architecture
//!
//! ```text
//! RasterTile<Imagery> + alpha ──► Opaque?  ── yes ──► JPEG (RGB)
//!                                          └─ no ───► PNG  (RGBA)
//!
//! RasterTile<Heightmap*>      ──► little-endian samples ──► zlib
//! ```
//!
//! Tiles store row 0 at the southern edge; images are written north-up,
//! so rows are flipped on the way out. Elevation keeps tile row order.
//!
//! Product tiles can be larger than target tiles. [`SubtileLayout`] maps a
//! product tile onto the target tiles it splits into.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::coord::{LevelCoverage, TileAddress, TileExtents};
use crate::error::CodecError;
use crate::opacity::Opacity;
use crate::tile::{AlphaTile, Imagery, RasterTile, Sample, TileKind};

/// Encode an imagery tile. Opaque tiles become JPEG at `quality`;
/// anything else keeps its alpha as PNG RGBA.
pub fn encode_imagery(
    tile: &RasterTile<Imagery>,
    alpha: &AlphaTile,
    opacity: Opacity,
    quality: u8,
) -> Result<Vec<u8>, CodecError> {
    let size = tile.size();
    let mut buf = Vec::new();
    if opacity == Opacity::Opaque {
        let pixels = interleave(tile, None);
        JpegEncoder::new_with_quality(&mut buf, quality).write_image(
            &pixels,
            size as u32,
            size as u32,
            ExtendedColorType::Rgb8,
        )?;
    } else {
        let pixels = interleave(tile, Some(alpha));
        PngEncoder::new(&mut buf).write_image(
            &pixels,
            size as u32,
            size as u32,
            ExtendedColorType::Rgba8,
        )?;
    }
    Ok(buf)
}

/// Band-major south-up to interleaved north-up pixels.
fn interleave(tile: &RasterTile<Imagery>, alpha: Option<&AlphaTile>) -> Vec<u8> {
    let size = tile.size();
    let channels = if alpha.is_some() { 4 } else { 3 };
    let mut out = Vec::with_capacity(size * size * channels);
    for row in (0..size).rev() {
        for col in 0..size {
            out.push(tile.get(0, row, col));
            out.push(tile.get(1, row, col));
            out.push(tile.get(2, row, col));
            if let Some(alpha) = alpha {
                out.push(alpha.get(0, row, col));
            }
        }
    }
    out
}

/// Zlib-compress the tile's samples, little-endian, row 0 first.
pub fn encode_elevation<K: TileKind>(tile: &RasterTile<K>) -> Result<Vec<u8>, CodecError> {
    let mut raw = Vec::with_capacity(tile.samples().len() * K::Sample::WIDTH);
    for &s in tile.samples() {
        s.write_le(&mut raw);
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

/// How a product tile splits into target tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtileLayout {
    target_tile_size: usize,
    /// Levels between the product tile and its target tiles.
    level_offset: u32,
}

impl SubtileLayout {
    pub fn new(product_tile_size: usize, target_tile_size: usize) -> Result<Self, CodecError> {
        let uneven = CodecError::UnevenSubtiles {
            product: product_tile_size,
            target: target_tile_size,
        };
        if target_tile_size == 0 || product_tile_size % target_tile_size != 0 {
            return Err(uneven);
        }
        let ratio = product_tile_size / target_tile_size;
        if !ratio.is_power_of_two() {
            return Err(uneven);
        }
        Ok(Self {
            target_tile_size,
            level_offset: ratio.trailing_zeros(),
        })
    }

    pub fn level_offset(&self) -> u32 {
        self.level_offset
    }

    /// Target tiles per product tile along one axis.
    pub fn per_axis(&self) -> u32 {
        1 << self.level_offset
    }

    /// Product level whose tiles split into tiles at `target_level`.
    pub fn product_level(&self, target_level: u32) -> u32 {
        target_level.saturating_sub(self.level_offset)
    }

    /// Target tiles of `product_addr` inside `coverage`, row-major from
    /// the bottom.
    pub fn subtiles(
        &self,
        product_addr: TileAddress,
        coverage: &LevelCoverage,
    ) -> Vec<TileAddress> {
        let level = product_addr.level + self.level_offset;
        let span = product_addr.magnified_to(level);
        let extents = if coverage.level == level {
            span.extents.intersection(&coverage.extents)
        } else {
            TileExtents::default()
        };
        extents
            .iter()
            .map(|(row, col)| TileAddress::new(level, row, col))
            .collect()
    }

    /// Copy the pixels of target tile `target` out of `product_tile`.
    ///
    /// `dst` may be one pixel larger than a target tile, in which case the
    /// extra row and column are taken from the expanded product tile.
    pub fn extract<K: TileKind>(
        &self,
        product_tile: &RasterTile<K>,
        target: TileAddress,
        dst: &mut RasterTile<K>,
    ) {
        let mask = self.per_axis() - 1;
        let n = self.target_tile_size as u32;
        let w = dst.size() as u32;
        let row0 = (target.row & mask) * n;
        let col0 = (target.col & mask) * n;
        dst.copy_subtile(
            0,
            0,
            product_tile,
            TileExtents::new(row0, row0 + w, col0, col0 + w),
        );
    }

    pub fn target_tile_size(&self) -> usize {
        self.target_tile_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    use crate::tile::Heightmap;

    fn red_tile(size: usize) -> RasterTile<Imagery> {
        let mut tile = RasterTile::new(size);
        tile.band_mut(0).fill(200);
        tile
    }

    #[test]
    fn test_opaque_imagery_is_jpeg() {
        let mut alpha = AlphaTile::new(8);
        alpha.fill(255);
        let buf = encode_imagery(&red_tile(8), &alpha, Opacity::Opaque, 75).unwrap();
        assert_eq!(&buf[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_amalgam_imagery_is_png() {
        let mut alpha = AlphaTile::new(8);
        alpha.fill(128);
        let buf = encode_imagery(&red_tile(8), &alpha, Opacity::Amalgam, 75).unwrap();
        assert_eq!(&buf[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_interleave_flips_rows() {
        let mut tile = RasterTile::<Imagery>::new(2);
        tile.set(0, 0, 0, 10);
        tile.set(0, 1, 0, 20);
        let mut alpha = AlphaTile::new(2);
        alpha.fill(255);
        let px = interleave(&tile, Some(&alpha));
        assert_eq!(px[0], 20);
        assert_eq!(px[8], 10);
    }

    #[test]
    fn test_elevation_roundtrips_through_zlib() {
        let mut tile = RasterTile::<Heightmap>::new(3);
        tile.set(0, 0, 1, 12.5);
        let buf = encode_elevation(&tile).unwrap();
        let mut raw = Vec::new();
        ZlibDecoder::new(&buf[..]).read_to_end(&mut raw).unwrap();
        assert_eq!(raw.len(), 9 * 4);
        assert_eq!(&raw[4..8], &12.5f32.to_le_bytes());
    }

    #[test]
    fn test_layout_rejects_uneven_sizes() {
        assert!(matches!(
            SubtileLayout::new(256, 96),
            Err(CodecError::UnevenSubtiles { .. })
        ));
        assert!(SubtileLayout::new(256, 512).is_err());
        assert!(SubtileLayout::new(768, 256).is_err());
    }

    #[test]
    fn test_layout_subtiles_clipped_to_coverage() {
        let layout = SubtileLayout::new(512, 256).unwrap();
        assert_eq!(layout.level_offset(), 1);
        assert_eq!(layout.product_level(5), 4);

        let coverage = LevelCoverage::new(5, TileExtents::new(0, 3, 0, 3));
        let subs = layout.subtiles(TileAddress::new(4, 1, 1), &coverage);
        assert_eq!(subs, vec![TileAddress::new(5, 2, 2)]);

        let subs = layout.subtiles(TileAddress::new(4, 0, 0), &coverage);
        assert_eq!(subs.len(), 4);
    }

    #[test]
    fn test_extract_picks_quadrant_pixels() {
        let layout = SubtileLayout::new(4, 2).unwrap();
        let mut product = RasterTile::<Heightmap>::new(4);
        product.set(0, 2, 3, 7.0);
        let mut dst = RasterTile::<Heightmap>::new(2);
        layout.extract(&product, TileAddress::new(3, 1, 1), &mut dst);
        assert_eq!(dst.get(0, 0, 1), 7.0);
    }

    #[test]
    fn test_extract_expanded_includes_shared_edge() {
        let layout = SubtileLayout::new(4, 2).unwrap();
        let mut product = RasterTile::<Heightmap>::new(5);
        product.set(0, 2, 2, 3.0);
        let mut dst = RasterTile::<Heightmap>::new(3);
        layout.extract(&product, TileAddress::new(3, 0, 0), &mut dst);
        assert_eq!(dst.get(0, 2, 2), 3.0);
    }
}
