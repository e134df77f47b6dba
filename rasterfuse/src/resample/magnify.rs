//! 1:4 magnification of one quadrant into a full tile.

use crate::tile::{RasterTile, Sample, TileKind};

// Weights per output sub-pixel, applied to the 2x2 source neighborhood
// ordered (lower-left, lower-right, upper-left, upper-right). The nearest
// source pixel always gets 9.
const LOWER_LEFT: [u32; 4] = [1, 3, 3, 9];
const LOWER_RIGHT: [u32; 4] = [3, 1, 9, 3];
const UPPER_LEFT: [u32; 4] = [3, 9, 1, 3];
const UPPER_RIGHT: [u32; 4] = [9, 3, 3, 1];

/// Expand quadrant `quad` of `src` to fill all of `dst`.
///
/// Every source pixel becomes a 2x2 block; each output pixel is a 9:3:3:1
/// weighted blend of the four nearest source pixels. Neighbors past the
/// tile edge are clamped to the edge pixel, so only `src` is consulted.
pub fn magnify_quadrant<K: TileKind>(dst: &mut RasterTile<K>, src: &RasterTile<K>, quad: usize) {
    debug_assert_eq!(dst.size(), src.size());
    let size = src.size();
    let half = size / 2;
    let row0 = (quad >> 1) * half;
    let col0 = (quad & 1) * half;
    let last = size - 1;

    for band in 0..K::BANDS {
        let s = src.band(band);
        let d = dst.band_mut(band);
        let px = |row: usize, col: usize| s[row * size + col];

        for j in 0..half {
            let y = row0 + j;
            let prev_y = y.saturating_sub(1);
            let next_y = (y + 1).min(last);
            let out_lo = 2 * j * size;
            let out_hi = out_lo + size;

            for i in 0..half {
                let x = col0 + i;
                let prev_x = x.saturating_sub(1);
                let next_x = (x + 1).min(last);

                let ll = [px(prev_y, prev_x), px(prev_y, x), px(y, prev_x), px(y, x)];
                let lr = [px(prev_y, x), px(prev_y, next_x), px(y, x), px(y, next_x)];
                let ul = [px(y, prev_x), px(y, x), px(next_y, prev_x), px(next_y, x)];
                let ur = [px(y, x), px(y, next_x), px(next_y, x), px(next_y, next_x)];

                d[out_lo + 2 * i] = K::Sample::weighted_16(ll, LOWER_LEFT);
                d[out_lo + 2 * i + 1] = K::Sample::weighted_16(lr, LOWER_RIGHT);
                d[out_hi + 2 * i] = K::Sample::weighted_16(ul, UPPER_LEFT);
                d[out_hi + 2 * i + 1] = K::Sample::weighted_16(ur, UPPER_RIGHT);
            }
        }
    }
}

/// Magnify an expanded, corner-sampled tile.
///
/// Both tiles are `n + 1` pixels on a side: the last row and column hold
/// samples borrowed from the upper and right neighbors. Source pixels are
/// copied to even positions and the odd positions are midpoints, so the
/// shared edge of two adjacent tiles stays identical after magnification.
pub fn magnify_expanded_quadrant<K: TileKind>(
    dst: &mut RasterTile<K>,
    src: &RasterTile<K>,
    quad: usize,
) {
    debug_assert_eq!(dst.size(), src.size());
    let size = src.size();
    let half = (size - 1) / 2;
    let row0 = (quad >> 1) * half;
    let col0 = (quad & 1) * half;
    let avg2 = <K::Sample as Sample>::average_of_2;

    for band in 0..K::BANDS {
        let s = src.band(band);
        let d = dst.band_mut(band);
        let px = |row: usize, col: usize| s[row * size + col];

        // j == half and i == half emit the shared top row and right column.
        for j in 0..=half {
            let y = row0 + j;
            let out_lo = 2 * j * size;
            for i in 0..=half {
                let x = col0 + i;
                let this = px(y, x);
                d[out_lo + 2 * i] = this;
                if i < half {
                    d[out_lo + 2 * i + 1] = avg2(this, px(y, x + 1));
                }
                if j < half {
                    let out_hi = out_lo + size;
                    d[out_hi + 2 * i] = avg2(this, px(y + 1, x));
                    if i < half {
                        d[out_hi + 2 * i + 1] = avg2(this, px(y + 1, x + 1));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{Heightmap, Heightmap16, Imagery};

    #[test]
    fn test_magnify_uniform_tile_stays_uniform() {
        let mut src = RasterTile::<Imagery>::new(8);
        src.fill(123);
        let mut dst = RasterTile::<Imagery>::new(8);
        for quad in 0..4 {
            magnify_quadrant(&mut dst, &src, quad);
            assert!(dst.is_uniform(123));
        }
    }

    #[test]
    fn test_magnify_biases_toward_nearest_pixel() {
        let mut src = RasterTile::<Heightmap16>::new(4);
        // Quadrant 0 source pixels: (0,0)=0 (0,1)=160 (1,0)=0 (1,1)=160
        src.set(0, 0, 1, 160);
        src.set(0, 1, 1, 160);
        let mut dst = RasterTile::<Heightmap16>::new(4);
        magnify_quadrant(&mut dst, &src, 0);
        // Output (0,1) lower-right of src (0,0): 3*0 + 1*160 + 9*0 + 3*160 / 16
        assert_eq!(dst.get(0, 0, 1), (160 + 3 * 160) / 16);
        // Output (0,2) lower-left of src (0,1): 1*0 + 3*160 + 3*0 + 9*160 / 16
        assert_eq!(dst.get(0, 0, 2), (3 * 160 + 9 * 160) / 16);
    }

    #[test]
    fn test_magnify_picks_requested_quadrant() {
        let mut src = RasterTile::<Imagery>::new(4);
        for row in 2..4 {
            for col in 2..4 {
                for band in 0..3 {
                    src.set(band, row, col, 90);
                }
            }
        }
        let mut dst = RasterTile::<Imagery>::new(4);
        magnify_quadrant(&mut dst, &src, 3);
        // Interior of quadrant 3 is uniform; the far corner is unaffected by
        // the zero neighbors.
        assert_eq!(dst.get(0, 3, 3), 90);
        magnify_quadrant(&mut dst, &src, 0);
        assert_eq!(dst.get(0, 0, 0), 0);
    }

    #[test]
    fn test_magnify_expanded_interpolates_midpoints() {
        // 2x2 tile plus one extra row/col.
        let mut src = RasterTile::<Heightmap>::new(3);
        for row in 0..3 {
            for col in 0..3 {
                src.set(0, row, col, (row * 10 + col) as f32);
            }
        }
        let mut dst = RasterTile::<Heightmap>::new(3);
        magnify_expanded_quadrant(&mut dst, &src, 0);
        assert_eq!(dst.get(0, 0, 0), 0.0);
        assert_eq!(dst.get(0, 0, 1), 0.5);
        assert_eq!(dst.get(0, 1, 0), 5.0);
        assert_eq!(dst.get(0, 1, 1), 5.5);
        assert_eq!(dst.get(0, 2, 2), 11.0);
    }

    #[test]
    fn test_magnify_expanded_shares_edges_between_quadrants() {
        let mut src = RasterTile::<Heightmap>::new(5);
        for row in 0..5 {
            for col in 0..5 {
                src.set(0, row, col, (row * 7 + col * 3) as f32);
            }
        }
        let mut left = RasterTile::<Heightmap>::new(5);
        let mut right = RasterTile::<Heightmap>::new(5);
        magnify_expanded_quadrant(&mut left, &src, 0);
        magnify_expanded_quadrant(&mut right, &src, 1);
        for row in 0..5 {
            assert_eq!(left.get(0, row, 4), right.get(0, row, 0));
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn magnify_uniform_u8_is_fixed_point(value in any::<u8>(), quad in 0usize..4, rounds in 1usize..5) {
                let mut a = RasterTile::<Imagery>::new(8);
                a.fill(value);
                let mut b = RasterTile::<Imagery>::new(8);
                for _ in 0..rounds {
                    magnify_quadrant(&mut b, &a, quad);
                    std::mem::swap(&mut a, &mut b);
                }
                prop_assert!(a.is_uniform(value));
            }

            #[test]
            fn magnify_uniform_i16_is_fixed_point(value in any::<i16>(), quad in 0usize..4) {
                let mut src = RasterTile::<Heightmap16>::new(8);
                src.fill(value);
                let mut dst = RasterTile::<Heightmap16>::new(8);
                magnify_quadrant(&mut dst, &src, quad);
                prop_assert!(dst.is_uniform(value));
            }

            #[test]
            fn magnify_stays_within_source_range(
                samples in proptest::collection::vec(any::<u8>(), 16),
                quad in 0usize..4,
            ) {
                let src = RasterTile::<crate::tile::Alpha>::from_samples(4, samples.clone()).unwrap();
                let mut dst = RasterTile::<crate::tile::Alpha>::new(4);
                magnify_quadrant(&mut dst, &src, quad);
                let lo = *samples.iter().min().unwrap();
                let hi = *samples.iter().max().unwrap();
                prop_assert!(dst.band(0).iter().all(|&s| s >= lo && s <= hi));
            }
        }
    }
}
