//! Per-pixel alpha compositing with edge bleeding.
//!
//! All three operations accumulate into a destination data tile and its
//! alpha tile:
//!
//! ```text
//! balance  = (255 - accumAlpha) / 255
//! accumData  += scale(srcData, srcAlpha / 255 * balance)
//! accumAlpha  = min(255, 0.5 + srcAlpha * balance + accumAlpha)
//! ```
//!
//! Minifying alpha with `zero_or_average` erodes opaque regions by a pixel
//! at every boundary. To hide the resulting seams, a source pixel with
//! alpha exactly 0 borrows the average alpha and data of its non-zero
//! 8-neighbors within the same source tile.

use crate::tile::{AlphaTile, RasterTile, Sample, TileKind};

const MAX_BANDS: usize = 4;

/// Alpha and data a source pixel contributes after edge bleeding.
struct Effective<S> {
    alpha: u8,
    data: [S; MAX_BANDS],
}

/// Contribution of `(row, col)`, or `None` if it contributes nothing.
#[inline]
fn effective_pixel<K: TileKind>(
    src: &RasterTile<K>,
    src_alpha: &AlphaTile,
    row: usize,
    col: usize,
) -> Option<Effective<K::Sample>> {
    debug_assert!(K::BANDS <= MAX_BANDS);
    let size = src.size();
    let alpha = src_alpha.get(0, row, col);
    let mut data = [K::Sample::ZERO; MAX_BANDS];

    if alpha != 0 {
        for (band, slot) in data.iter_mut().enumerate().take(K::BANDS) {
            *slot = src.get(band, row, col);
        }
        return Some(Effective { alpha, data });
    }

    let mut alpha_sum = 0u32;
    let mut data_sum = [0f64; MAX_BANDS];
    let mut count = 0u32;
    for r in row.saturating_sub(1)..=(row + 1).min(size - 1) {
        for c in col.saturating_sub(1)..=(col + 1).min(size - 1) {
            let a = src_alpha.get(0, r, c);
            if a == 0 {
                continue;
            }
            alpha_sum += u32::from(a);
            for (band, sum) in data_sum.iter_mut().enumerate().take(K::BANDS) {
                *sum += src.get(band, r, c).to_f64();
            }
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    let alpha = u8::mean(f64::from(alpha_sum), count);
    if alpha == 0 {
        return None;
    }
    for (slot, sum) in data.iter_mut().zip(data_sum.iter()).take(K::BANDS) {
        *slot = K::Sample::mean(*sum, count);
    }
    Some(Effective { alpha, data })
}

/// Overwrite `dst` with `src` premultiplied by its alpha.
///
/// Used for the topmost partially transparent source, where there is
/// nothing underneath to accumulate against.
pub fn apply_alpha<K: TileKind>(
    dst: &mut RasterTile<K>,
    dst_alpha: &mut AlphaTile,
    src: &RasterTile<K>,
    src_alpha: &AlphaTile,
) {
    let size = src.size();
    for row in 0..size {
        for col in 0..size {
            match effective_pixel(src, src_alpha, row, col) {
                Some(px) => {
                    let factor = f32::from(px.alpha) / 255.0;
                    for band in 0..K::BANDS {
                        dst.set(band, row, col, px.data[band].scale(factor));
                    }
                    dst_alpha.set(0, row, col, px.alpha);
                }
                None => {
                    for band in 0..K::BANDS {
                        dst.set(band, row, col, K::Sample::ZERO);
                    }
                    dst_alpha.set(0, row, col, 0);
                }
            }
        }
    }
}

/// Composite `src` under the accumulated result in `dst`.
///
/// Pixels whose accumulated alpha is already saturated are left alone.
pub fn blend_tile_and_saturate_alpha<K: TileKind>(
    dst: &mut RasterTile<K>,
    dst_alpha: &mut AlphaTile,
    src: &RasterTile<K>,
    src_alpha: &AlphaTile,
) {
    let size = src.size();
    for row in 0..size {
        for col in 0..size {
            let accum = dst_alpha.get(0, row, col);
            if accum == u8::MAX {
                continue;
            }
            let Some(px) = effective_pixel(src, src_alpha, row, col) else {
                continue;
            };
            let balance = f32::from(u8::MAX - accum) / 255.0;
            let src_alpha_f = f32::from(px.alpha);
            let new_accum = (0.5 + src_alpha_f * balance + f32::from(accum)).min(255.0);
            dst_alpha.set(0, row, col, new_accum as u8);

            let factor = src_alpha_f / 255.0 * balance;
            for band in 0..K::BANDS {
                let current = dst.get(band, row, col);
                dst.set(band, row, col, current.accumulate(px.data[band].scale(factor)));
            }
        }
    }
}

/// Composite a fully opaque `src` under `dst` and saturate alpha.
///
/// An opaque source has no zero-alpha pixels, so no edge bleeding is
/// needed and the remaining balance is applied in one step.
pub fn blend_terminal_tile<K: TileKind>(
    dst: &mut RasterTile<K>,
    dst_alpha: &mut AlphaTile,
    src: &RasterTile<K>,
) {
    let size = src.size();
    let pixels = size * size;
    for band in 0..K::BANDS {
        let alpha = dst_alpha.band(0);
        let s = src.band(band);
        let d = dst.band_mut(band);
        for p in 0..pixels {
            let accum = alpha[p];
            if accum == u8::MAX {
                continue;
            }
            let balance = f32::from(u8::MAX - accum) / 255.0;
            d[p] = d[p].accumulate(s[p].scale(balance));
        }
    }
    dst_alpha.fill(u8::MAX);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{Heightmap, Imagery};

    fn rgb_tile(size: usize, rgb: [u8; 3]) -> RasterTile<Imagery> {
        let mut tile = RasterTile::<Imagery>::new(size);
        for (band, &v) in rgb.iter().enumerate() {
            tile.band_mut(band).fill(v);
        }
        tile
    }

    fn alpha_tile(size: usize, value: u8) -> AlphaTile {
        let mut alpha = AlphaTile::new(size);
        alpha.fill(value);
        alpha
    }

    #[test]
    fn test_apply_alpha_premultiplies() {
        let src = rgb_tile(4, [200, 0, 100]);
        let src_alpha = alpha_tile(4, 128);
        let mut dst = rgb_tile(4, [7, 7, 7]);
        let mut dst_alpha = alpha_tile(4, 9);
        apply_alpha(&mut dst, &mut dst_alpha, &src, &src_alpha);
        assert_eq!(dst.get(0, 1, 1), 100);
        assert_eq!(dst.get(1, 1, 1), 0);
        assert_eq!(dst.get(2, 1, 1), 50);
        assert!(dst_alpha.is_uniform(128));
    }

    #[test]
    fn test_apply_alpha_fully_transparent_clears() {
        let src = rgb_tile(4, [200, 200, 200]);
        let src_alpha = alpha_tile(4, 0);
        let mut dst = rgb_tile(4, [7, 7, 7]);
        let mut dst_alpha = alpha_tile(4, 9);
        apply_alpha(&mut dst, &mut dst_alpha, &src, &src_alpha);
        assert!(dst.is_uniform(0));
        assert!(dst_alpha.is_uniform(0));
    }

    #[test]
    fn test_half_alpha_over_opaque_blue() {
        let red = rgb_tile(4, [200, 0, 0]);
        let blue = rgb_tile(4, [0, 0, 200]);
        let mut dst = RasterTile::<Imagery>::new(4);
        let mut dst_alpha = AlphaTile::new(4);

        apply_alpha(&mut dst, &mut dst_alpha, &red, &alpha_tile(4, 128));
        blend_terminal_tile(&mut dst, &mut dst_alpha, &blue);

        assert!(dst_alpha.is_uniform(255));
        assert_eq!(dst.get(0, 2, 2), 100);
        assert_eq!(dst.get(1, 2, 2), 0);
        assert_eq!(dst.get(2, 2, 2), 100);
    }

    #[test]
    fn test_blend_skips_saturated_pixels() {
        let src = rgb_tile(2, [50, 50, 50]);
        let mut dst = rgb_tile(2, [10, 10, 10]);
        let mut dst_alpha = alpha_tile(2, 255);
        blend_tile_and_saturate_alpha(&mut dst, &mut dst_alpha, &src, &alpha_tile(2, 255));
        assert!(dst.is_uniform(10));
    }

    #[test]
    fn test_blend_accumulates_alpha() {
        let src = rgb_tile(2, [100, 100, 100]);
        let mut dst = RasterTile::<Imagery>::new(2);
        let mut dst_alpha = alpha_tile(2, 100);
        blend_tile_and_saturate_alpha(&mut dst, &mut dst_alpha, &src, &alpha_tile(2, 100));
        // 0.5 + 100 * 155/255 + 100 = 161.28
        assert!(dst_alpha.is_uniform(161));
        // scale(100, 100/255 * 155/255) = 0.5 + 23.83
        assert_eq!(dst.get(0, 0, 0), 24);
    }

    #[test]
    fn test_edge_bleed_uses_neighbor_average() {
        let mut src = rgb_tile(3, [0, 0, 0]);
        let mut src_alpha = AlphaTile::new(3);
        // Center pixel transparent; two opaque neighbors.
        src_alpha.set(0, 0, 0, 200);
        src.set(0, 0, 0, 100);
        src_alpha.set(0, 2, 2, 100);
        src.set(0, 2, 2, 51);

        for prior in [0u8, 40] {
            let mut dst = rgb_tile(3, [prior, prior, prior]);
            let mut dst_alpha = AlphaTile::new(3);
            blend_tile_and_saturate_alpha(&mut dst, &mut dst_alpha, &src, &src_alpha);
            // Neighbor average: alpha 150, red (100 + 51) / 2 -> 76.
            assert_eq!(dst_alpha.get(0, 1, 1), 150);
            let expected = prior.accumulate(76u8.scale(150.0 / 255.0));
            assert_eq!(dst.get(0, 1, 1), expected);
        }
    }

    #[test]
    fn test_isolated_transparent_pixel_contributes_nothing() {
        let src = rgb_tile(3, [90, 90, 90]);
        let src_alpha = AlphaTile::new(3);
        let mut dst = rgb_tile(3, [5, 5, 5]);
        let mut dst_alpha = alpha_tile(3, 20);
        blend_tile_and_saturate_alpha(&mut dst, &mut dst_alpha, &src, &src_alpha);
        assert!(dst.is_uniform(5));
        assert!(dst_alpha.is_uniform(20));
    }

    #[test]
    fn test_terminal_blend_float_samples() {
        let mut src = RasterTile::<Heightmap>::new(2);
        src.fill(100.0);
        let mut dst = RasterTile::<Heightmap>::new(2);
        dst.fill(10.0);
        let mut dst_alpha = alpha_tile(2, 51);
        blend_terminal_tile(&mut dst, &mut dst_alpha, &src);
        assert!((dst.get(0, 0, 0) - 90.0).abs() < 1e-3);
        assert!(dst_alpha.is_uniform(255));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn accumulated_alpha_never_decreases(
                start in proptest::collection::vec(any::<u8>(), 16),
                layers in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 16), 1..5),
            ) {
                let src = rgb_tile(4, [120, 60, 30]);
                let mut dst = RasterTile::<Imagery>::new(4);
                let mut dst_alpha = AlphaTile::from_samples(4, start).unwrap();
                for layer in layers {
                    let before = dst_alpha.clone();
                    let layer_alpha = AlphaTile::from_samples(4, layer).unwrap();
                    blend_tile_and_saturate_alpha(&mut dst, &mut dst_alpha, &src, &layer_alpha);
                    for (b, a) in before.band(0).iter().zip(dst_alpha.band(0)) {
                        prop_assert!(a >= b);
                    }
                }
            }
        }
    }
}
