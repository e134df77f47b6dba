//! 4:1 minification into one quadrant of a coarser tile.

use crate::tile::{RasterTile, Sample, TileKind};

/// Combines the four source pixels that collapse into one output pixel.
pub type Reducer<S> = fn(S, S, S, S) -> S;

/// Shrink `src` by half in each direction and write it into quadrant
/// `quad` of `dst`.
///
/// Each output pixel is `reducer` applied to the 2x2 block it replaces.
/// Use [`Sample::average_of_4`] for data bands and
/// [`Sample::zero_or_average`] for alpha bands.
pub fn minify_into_quadrant<K: TileKind>(
    dst: &mut RasterTile<K>,
    quad: usize,
    src: &RasterTile<K>,
    reducer: Reducer<K::Sample>,
) {
    debug_assert_eq!(dst.size(), src.size());
    let size = src.size();
    let half = size / 2;
    let row0 = (quad >> 1) * half;
    let col0 = (quad & 1) * half;

    for band in 0..K::BANDS {
        let s = src.band(band);
        let d = dst.band_mut(band);
        for r in 0..half {
            let lo = 2 * r * size;
            let hi = lo + size;
            let out = (row0 + r) * size + col0;
            for c in 0..half {
                let x = 2 * c;
                d[out + c] = reducer(s[lo + x], s[lo + x + 1], s[hi + x], s[hi + x + 1]);
            }
        }
    }
}

/// Data-band reducer for `K`.
pub fn average_reducer<K: TileKind>() -> Reducer<K::Sample> {
    <K::Sample as Sample>::average_of_4
}

/// Alpha-band reducer for `K`.
pub fn zero_or_average_reducer<K: TileKind>() -> Reducer<K::Sample> {
    <K::Sample as Sample>::zero_or_average
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{Alpha, AlphaTile, Heightmap16, Imagery};

    #[test]
    fn test_minify_averages_blocks() {
        let mut src = RasterTile::<Imagery>::new(4);
        for band in 0..3 {
            for row in 0..4 {
                for col in 0..4 {
                    src.set(band, row, col, (row * 4 + col) as u8 * 10);
                }
            }
        }
        let mut dst = RasterTile::<Imagery>::new(4);
        minify_into_quadrant(&mut dst, 0, &src, average_reducer::<Imagery>());
        // Block (0,0),(0,1),(1,0),(1,1) = 0,10,40,50 -> 25
        assert_eq!(dst.get(0, 0, 0), 25);
        assert_eq!(dst.get(2, 1, 1), u8::average_of_4(100, 110, 140, 150));
        // Other quadrants untouched.
        assert_eq!(dst.get(0, 3, 3), 0);
    }

    #[test]
    fn test_minify_into_upper_right_quadrant() {
        let mut src = AlphaTile::new(4);
        src.fill(200);
        let mut dst = AlphaTile::new(4);
        minify_into_quadrant(&mut dst, 3, &src, average_reducer::<Alpha>());
        assert_eq!(dst.get(0, 2, 2), 200);
        assert_eq!(dst.get(0, 3, 3), 200);
        assert_eq!(dst.get(0, 1, 1), 0);
        assert_eq!(dst.get(0, 2, 1), 0);
    }

    #[test]
    fn test_alpha_minify_erodes_edges() {
        let mut src = AlphaTile::new(4);
        src.fill(255);
        src.set(0, 0, 0, 0);
        let mut dst = AlphaTile::new(4);
        minify_into_quadrant(&mut dst, 0, &src, zero_or_average_reducer::<Alpha>());
        assert_eq!(dst.get(0, 0, 0), 0);
        assert_eq!(dst.get(0, 0, 1), 255);
    }

    #[test]
    fn test_minify_keeps_negative_elevations() {
        let mut src = RasterTile::<Heightmap16>::new(4);
        src.fill(-2);
        let mut dst = RasterTile::<Heightmap16>::new(4);
        minify_into_quadrant(&mut dst, 1, &src, average_reducer::<Heightmap16>());
        assert_eq!(dst.get(0, 0, 2), -2);
        assert_eq!(dst.get(0, 1, 3), -2);
    }
}
