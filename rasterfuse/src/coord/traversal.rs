//! Traversal orders over a level's coverage.
//!
//! The Prep stage walks addresses in one of two deterministic orders:
//!
//! - [`QuadtreeTraversal`] visits tiles in quadtree preorder so that
//!   consecutive addresses share ancestors (and therefore cached ancestor
//!   tiles when magnifying).
//! - [`DiagonalTraversal`] starts at the top-right corner and sweeps
//!   anti-diagonals toward the bottom-left. Every tile is visited after its
//!   upper, right and upper-right neighbors, which lets elevation tiles
//!   borrow edge pixels from neighbors that were already read.

use super::{LevelCoverage, TileAddress};

/// Quadtree preorder walk restricted to a coverage.
pub struct QuadtreeTraversal {
    coverage: LevelCoverage,
    stack: Vec<TileAddress>,
}

impl QuadtreeTraversal {
    pub fn new(coverage: LevelCoverage) -> Self {
        let stack = if coverage.is_empty() {
            Vec::new()
        } else {
            vec![TileAddress::new(0, 0, 0)]
        };
        Self { coverage, stack }
    }
}

impl Iterator for QuadtreeTraversal {
    type Item = TileAddress;

    fn next(&mut self) -> Option<TileAddress> {
        while let Some(addr) = self.stack.pop() {
            if addr.level == self.coverage.level {
                if self.coverage.contains(&addr) {
                    return Some(addr);
                }
                continue;
            }
            let span = addr.magnified_to(self.coverage.level);
            if !span.extents.intersects(&self.coverage.extents) {
                continue;
            }
            // Reverse so quadrant 0 is popped first.
            self.stack.extend(addr.children().iter().rev());
        }
        None
    }
}

/// Anti-diagonal sweep from the top-right corner to the bottom-left.
pub struct DiagonalTraversal {
    coverage: LevelCoverage,
    diagonal: u32,
    step: u32,
}

impl DiagonalTraversal {
    pub fn new(coverage: LevelCoverage) -> Self {
        Self {
            coverage,
            diagonal: 0,
            step: 0,
        }
    }

    fn num_diagonals(&self) -> u32 {
        let e = &self.coverage.extents;
        if e.is_empty() {
            0
        } else {
            e.num_rows() + e.num_cols() - 1
        }
    }
}

impl Iterator for DiagonalTraversal {
    type Item = TileAddress;

    fn next(&mut self) -> Option<TileAddress> {
        let e = self.coverage.extents;
        while self.diagonal < self.num_diagonals() {
            // Offsets from the top-right corner: dr rows down, dc cols left,
            // with dr + dc == diagonal. Walk dr upward from its minimum.
            let min_dr = self.diagonal.saturating_sub(e.num_cols() - 1);
            let max_dr = self.diagonal.min(e.num_rows() - 1);
            let dr = min_dr + self.step;
            if dr > max_dr {
                self.diagonal += 1;
                self.step = 0;
                continue;
            }
            self.step += 1;
            let dc = self.diagonal - dr;
            return Some(TileAddress::new(
                self.coverage.level,
                e.end_row - 1 - dr,
                e.end_col - 1 - dc,
            ));
        }
        None
    }
}
