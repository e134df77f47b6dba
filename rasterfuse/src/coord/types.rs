//! Tile address and extent types for the quadtree tile grid.

use std::fmt;

/// Deepest pyramid level an address may carry.
///
/// Row and column indices are `u32`, so a level holds at most `2^31` tiles
/// per axis.
pub const MAX_LEVEL: u32 = 31;

/// Number of tiles along one axis at the given level.
#[inline]
pub fn tiles_per_axis(level: u32) -> u32 {
    1u32 << level.min(MAX_LEVEL)
}

/// A node in the quadtree tile grid.
///
/// Rows count upward from the southern edge of the world (row 0 is the
/// bottom row) and columns count eastward from the western edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileAddress {
    pub level: u32,
    pub row: u32,
    pub col: u32,
}

impl TileAddress {
    pub const fn new(level: u32, row: u32, col: u32) -> Self {
        Self { level, row, col }
    }

    /// Packed identifier, unique across levels.
    ///
    /// Used as the cache key for per-level tile caches.
    #[inline]
    pub fn tile_id(&self) -> u64 {
        (u64::from(self.level) << 58) | (u64::from(self.row) << 29) | u64::from(self.col)
    }

    /// The address one level coarser that covers this one.
    pub fn parent(&self) -> Option<TileAddress> {
        if self.level == 0 {
            None
        } else {
            Some(TileAddress::new(self.level - 1, self.row >> 1, self.col >> 1))
        }
    }

    /// The ancestor at `level`. Returns `self` if `level` is not coarser.
    pub fn minified_to(&self, level: u32) -> TileAddress {
        if level >= self.level {
            return *self;
        }
        let shift = self.level - level;
        TileAddress::new(level, self.row >> shift, self.col >> shift)
    }

    /// The span of tiles this address covers at a finer `level`.
    pub fn magnified_to(&self, level: u32) -> LevelCoverage {
        if level <= self.level {
            return LevelCoverage::from_address(*self);
        }
        let shift = level - self.level;
        let begin_row = self.row << shift;
        let begin_col = self.col << shift;
        let span = 1u32 << shift;
        LevelCoverage::new(
            level,
            TileExtents::new(begin_row, begin_row + span, begin_col, begin_col + span),
        )
    }

    /// The four children at `level + 1`, in quadrant order.
    ///
    /// Quadrant 0 is the lower-left child, 1 lower-right, 2 upper-left and
    /// 3 upper-right.
    pub fn children(&self) -> [TileAddress; 4] {
        let level = self.level + 1;
        let row = self.row << 1;
        let col = self.col << 1;
        [
            TileAddress::new(level, row, col),
            TileAddress::new(level, row, col + 1),
            TileAddress::new(level, row + 1, col),
            TileAddress::new(level, row + 1, col + 1),
        ]
    }

    /// Which quadrant of its parent this address occupies.
    #[inline]
    pub fn quadrant(&self) -> usize {
        (((self.row & 1) << 1) | (self.col & 1)) as usize
    }

    /// The neighbor one row up, wrapping to row 0 past the top of the world.
    pub fn upper(&self) -> TileAddress {
        let rows = tiles_per_axis(self.level);
        TileAddress::new(self.level, (self.row + 1) % rows, self.col)
    }

    /// The neighbor one column right, wrapping to column 0 past the east edge.
    pub fn right(&self) -> TileAddress {
        let cols = tiles_per_axis(self.level);
        TileAddress::new(self.level, self.row, (self.col + 1) % cols)
    }

    pub fn upper_right(&self) -> TileAddress {
        self.upper().right()
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.row, self.col)
    }
}

/// Half-open rectangle of rows and columns: `[begin, end)` on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileExtents {
    pub begin_row: u32,
    pub end_row: u32,
    pub begin_col: u32,
    pub end_col: u32,
}

impl TileExtents {
    pub const fn new(begin_row: u32, end_row: u32, begin_col: u32, end_col: u32) -> Self {
        Self {
            begin_row,
            end_row,
            begin_col,
            end_col,
        }
    }

    pub fn num_rows(&self) -> u32 {
        self.end_row.saturating_sub(self.begin_row)
    }

    pub fn num_cols(&self) -> u32 {
        self.end_col.saturating_sub(self.begin_col)
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0 || self.num_cols() == 0
    }

    /// Total cells in the rectangle.
    pub fn len(&self) -> u64 {
        u64::from(self.num_rows()) * u64::from(self.num_cols())
    }

    #[inline]
    pub fn contains_row_col(&self, row: u32, col: u32) -> bool {
        row >= self.begin_row && row < self.end_row && col >= self.begin_col && col < self.end_col
    }

    /// True if `other` lies entirely inside `self`.
    pub fn contains(&self, other: &TileExtents) -> bool {
        !other.is_empty()
            && other.begin_row >= self.begin_row
            && other.end_row <= self.end_row
            && other.begin_col >= self.begin_col
            && other.end_col <= self.end_col
    }

    pub fn intersects(&self, other: &TileExtents) -> bool {
        !self.intersection(other).is_empty()
    }

    /// Overlap of the two rectangles; empty if they are disjoint.
    pub fn intersection(&self, other: &TileExtents) -> TileExtents {
        let begin_row = self.begin_row.max(other.begin_row);
        let end_row = self.end_row.min(other.end_row).max(begin_row);
        let begin_col = self.begin_col.max(other.begin_col);
        let end_col = self.end_col.min(other.end_col).max(begin_col);
        TileExtents::new(begin_row, end_row, begin_col, end_col)
    }

    /// Row-major iteration, bottom row first.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let cols = self.begin_col..self.end_col;
        (self.begin_row..self.end_row).flat_map(move |row| cols.clone().map(move |col| (row, col)))
    }
}

/// Extents anchored at a pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelCoverage {
    pub level: u32,
    pub extents: TileExtents,
}

impl LevelCoverage {
    pub const fn new(level: u32, extents: TileExtents) -> Self {
        Self { level, extents }
    }

    pub fn from_address(addr: TileAddress) -> Self {
        Self::new(
            addr.level,
            TileExtents::new(addr.row, addr.row + 1, addr.col, addr.col + 1),
        )
    }

    /// Whole-world coverage at `level`.
    pub fn world(level: u32) -> Self {
        let n = tiles_per_axis(level);
        Self::new(level, TileExtents::new(0, n, 0, n))
    }

    /// True if `addr` sits at this level inside the extents.
    pub fn contains(&self, addr: &TileAddress) -> bool {
        addr.level == self.level && self.extents.contains_row_col(addr.row, addr.col)
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    /// Translate to another level.
    ///
    /// Going finer multiplies the extents; going coarser divides them,
    /// rounding the end outward so any partially covered tile is included.
    pub fn translated_to(&self, level: u32) -> LevelCoverage {
        let e = self.extents;
        if level >= self.level {
            let shift = level - self.level;
            LevelCoverage::new(
                level,
                TileExtents::new(
                    e.begin_row << shift,
                    e.end_row << shift,
                    e.begin_col << shift,
                    e.end_col << shift,
                ),
            )
        } else {
            let shift = self.level - level;
            let round_up = |v: u32| -> u32 {
                let q = v >> shift;
                if (q << shift) < v {
                    q + 1
                } else {
                    q
                }
            };
            LevelCoverage::new(
                level,
                TileExtents::new(
                    e.begin_row >> shift,
                    round_up(e.end_row),
                    e.begin_col >> shift,
                    round_up(e.end_col),
                ),
            )
        }
    }

    pub fn intersection(&self, other: &LevelCoverage) -> LevelCoverage {
        let other = other.translated_to(self.level);
        LevelCoverage::new(self.level, self.extents.intersection(&other.extents))
    }

    pub fn addresses(&self) -> impl Iterator<Item = TileAddress> + '_ {
        let level = self.level;
        self.extents
            .iter()
            .map(move |(row, col)| TileAddress::new(level, row, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_and_children_round_trip() {
        let addr = TileAddress::new(5, 13, 22);
        let parent = addr.parent().unwrap();
        assert_eq!(parent, TileAddress::new(4, 6, 11));
        assert!(parent.children().contains(&addr));
        assert_eq!(parent.children()[addr.quadrant()], addr);
    }

    #[test]
    fn test_level_zero_has_no_parent() {
        assert!(TileAddress::new(0, 0, 0).parent().is_none());
    }

    #[test]
    fn test_quadrant_ordering() {
        let children = TileAddress::new(2, 1, 1).children();
        assert_eq!(children[0], TileAddress::new(3, 2, 2));
        assert_eq!(children[1], TileAddress::new(3, 2, 3));
        assert_eq!(children[2], TileAddress::new(3, 3, 2));
        assert_eq!(children[3], TileAddress::new(3, 3, 3));
        for (q, child) in children.iter().enumerate() {
            assert_eq!(child.quadrant(), q);
        }
    }

    #[test]
    fn test_neighbors_wrap_at_world_edge() {
        let addr = TileAddress::new(2, 3, 3);
        assert_eq!(addr.upper(), TileAddress::new(2, 0, 3));
        assert_eq!(addr.right(), TileAddress::new(2, 3, 0));
        assert_eq!(addr.upper_right(), TileAddress::new(2, 0, 0));

        let inner = TileAddress::new(2, 1, 1);
        assert_eq!(inner.upper(), TileAddress::new(2, 2, 1));
        assert_eq!(inner.right(), TileAddress::new(2, 1, 2));
    }

    #[test]
    fn test_minified_to() {
        let addr = TileAddress::new(6, 45, 17);
        assert_eq!(addr.minified_to(3), TileAddress::new(3, 5, 2));
        assert_eq!(addr.minified_to(6), addr);
        assert_eq!(addr.minified_to(9), addr);
    }

    #[test]
    fn test_magnified_to() {
        let cov = TileAddress::new(1, 1, 0).magnified_to(3);
        assert_eq!(cov.level, 3);
        assert_eq!(cov.extents, TileExtents::new(4, 8, 0, 4));
    }

    #[test]
    fn test_tile_id_unique_across_levels() {
        let a = TileAddress::new(1, 0, 0);
        let b = TileAddress::new(2, 0, 0);
        assert_ne!(a.tile_id(), b.tile_id());
    }

    #[test]
    fn test_extents_intersection() {
        let a = TileExtents::new(0, 4, 0, 4);
        let b = TileExtents::new(2, 6, 3, 8);
        assert_eq!(a.intersection(&b), TileExtents::new(2, 4, 3, 4));
        assert!(a.intersects(&b));

        let c = TileExtents::new(10, 12, 10, 12);
        assert!(a.intersection(&c).is_empty());
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_extents_contains() {
        let outer = TileExtents::new(0, 8, 0, 8);
        assert!(outer.contains(&TileExtents::new(2, 4, 2, 4)));
        assert!(!outer.contains(&TileExtents::new(6, 9, 2, 4)));
        assert!(!outer.contains(&TileExtents::default()));
    }

    #[test]
    fn test_coverage_translate_coarser_rounds_outward() {
        let cov = LevelCoverage::new(4, TileExtents::new(3, 9, 0, 4));
        let coarse = cov.translated_to(2);
        assert_eq!(coarse.extents, TileExtents::new(0, 3, 0, 1));
    }

    #[test]
    fn test_coverage_translate_finer() {
        let cov = LevelCoverage::new(1, TileExtents::new(0, 1, 1, 2));
        assert_eq!(
            cov.translated_to(3).extents,
            TileExtents::new(0, 4, 4, 8)
        );
    }

    #[test]
    fn test_extents_iter_row_major() {
        let e = TileExtents::new(1, 3, 5, 7);
        let cells: Vec<_> = e.iter().collect();
        assert_eq!(cells, vec![(1, 5), (1, 6), (2, 5), (2, 6)]);
        assert_eq!(e.len(), 4);
    }
}
