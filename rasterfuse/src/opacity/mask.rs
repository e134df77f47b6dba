//! Per-level 2-bit opacity bitmaps.

use thiserror::Error;

use super::Opacity;
use crate::coord::{LevelCoverage, TileAddress};

/// Errors raised while assembling or populating a mask.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OpacityMaskError {
    #[error("mask levels must be consecutive: expected level {expected}, got {actual}")]
    NonConsecutiveLevels { expected: u32, actual: u32 },

    #[error("tile {0} is outside the mask")]
    OutOfRange(TileAddress),
}

/// Opacity codes for every tile of one level's extents, four per byte.
#[derive(Debug, Clone)]
pub struct MaskLevel {
    coverage: LevelCoverage,
    bits: Vec<u8>,
}

impl MaskLevel {
    /// A level with every tile `Unknown`.
    pub fn new(coverage: LevelCoverage) -> Self {
        let cells = coverage.extents.len() as usize;
        Self {
            coverage,
            bits: vec![0; cells.div_ceil(4)],
        }
    }

    pub fn coverage(&self) -> &LevelCoverage {
        &self.coverage
    }

    #[inline]
    fn slot(&self, row: u32, col: u32) -> Option<(usize, u32)> {
        let e = &self.coverage.extents;
        if !e.contains_row_col(row, col) {
            return None;
        }
        let pos = (row - e.begin_row) as usize * e.num_cols() as usize + (col - e.begin_col) as usize;
        Some((pos / 4, ((pos % 4) * 2) as u32))
    }

    /// Stored code for `(row, col)`; `Unknown` outside the extents.
    pub fn get(&self, row: u32, col: u32) -> Opacity {
        match self.slot(row, col) {
            Some((byte, shift)) => Opacity::from_bits(self.bits[byte] >> shift),
            None => Opacity::Unknown,
        }
    }

    /// Returns `false` if `(row, col)` is outside the extents.
    pub fn set(&mut self, row: u32, col: u32, opacity: Opacity) -> bool {
        match self.slot(row, col) {
            Some((byte, shift)) => {
                self.bits[byte] = (self.bits[byte] & !(0x3 << shift)) | ((opacity as u8) << shift);
                true
            }
            None => false,
        }
    }
}

/// Read-only opacity lookup for one product across a range of levels.
///
/// Queries outside the stored range are answered by inference where the
/// stored data allows it:
///
/// - Coarser than the first stored level: if every tile the address covers
///   at the first level is stored and they agree, that value; if they
///   disagree, `Amalgam`; otherwise `Unknown`.
/// - Finer than the last stored level: the ancestor's value if it is
///   `Transparent` or `Opaque` (both are inherited exactly), otherwise
///   `Unknown`.
#[derive(Debug, Clone, Default)]
pub struct OpacityMask {
    begin_level: u32,
    levels: Vec<MaskLevel>,
}

impl OpacityMask {
    /// A mask with no levels; every query answers `Unknown`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a mask from consecutive levels, coarsest first.
    pub fn new(levels: Vec<MaskLevel>) -> Result<Self, OpacityMaskError> {
        let begin_level = levels.first().map(|l| l.coverage.level).unwrap_or(0);
        for (i, level) in levels.iter().enumerate() {
            let expected = begin_level + i as u32;
            if level.coverage.level != expected {
                return Err(OpacityMaskError::NonConsecutiveLevels {
                    expected,
                    actual: level.coverage.level,
                });
            }
        }
        Ok(Self {
            begin_level,
            levels,
        })
    }

    /// Allocate every level from `coverages`, all tiles `Unknown`.
    pub fn with_coverages(
        coverages: impl IntoIterator<Item = LevelCoverage>,
    ) -> Result<Self, OpacityMaskError> {
        Self::new(coverages.into_iter().map(MaskLevel::new).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn begin_level(&self) -> u32 {
        self.begin_level
    }

    /// One past the finest stored level.
    pub fn end_level(&self) -> u32 {
        self.begin_level + self.levels.len() as u32
    }

    fn level(&self, level: u32) -> Option<&MaskLevel> {
        level
            .checked_sub(self.begin_level)
            .and_then(|i| self.levels.get(i as usize))
    }

    pub fn set_opacity(
        &mut self,
        addr: TileAddress,
        opacity: Opacity,
    ) -> Result<(), OpacityMaskError> {
        let slot = addr
            .level
            .checked_sub(self.begin_level)
            .and_then(|i| self.levels.get_mut(i as usize));
        match slot.map(|level| level.set(addr.row, addr.col, opacity)) {
            Some(true) => Ok(()),
            _ => Err(OpacityMaskError::OutOfRange(addr)),
        }
    }

    pub fn get_opacity(&self, addr: TileAddress) -> Opacity {
        if self.levels.is_empty() {
            return Opacity::Unknown;
        }
        if let Some(level) = self.level(addr.level) {
            return level.get(addr.row, addr.col);
        }
        if addr.level < self.begin_level {
            self.aggregate_from_finer(addr)
        } else {
            let ancestor = addr.minified_to(self.end_level() - 1);
            match self.level(ancestor.level).map(|l| l.get(ancestor.row, ancestor.col)) {
                Some(op @ (Opacity::Transparent | Opacity::Opaque)) => op,
                _ => Opacity::Unknown,
            }
        }
    }

    fn aggregate_from_finer(&self, addr: TileAddress) -> Opacity {
        let Some(first) = self.levels.first() else {
            return Opacity::Unknown;
        };
        let span = addr.magnified_to(self.begin_level);
        if !first.coverage.extents.contains(&span.extents) {
            return Opacity::Unknown;
        }
        let mut cells = span.extents.iter();
        let Some((row, col)) = cells.next() else {
            return Opacity::Unknown;
        };
        let baseline = first.get(row, col);
        if baseline == Opacity::Amalgam {
            return Opacity::Amalgam;
        }
        if cells.all(|(r, c)| first.get(r, c) == baseline) {
            baseline
        } else {
            Opacity::Amalgam
        }
    }
}
