//! Quadtree tile addressing.
//!
//! Provides the address, extent and coverage types shared by every stage
//! of the compositing engine, plus the traversal orders the pipeline uses
//! to walk a level.
//!
//! # Layout
//!
//! ```text
//! level 1             level 2
//! ┌─────┬─────┐       ┌──┬──┬──┬──┐
//! │ 1,0 │ 1,1 │  row  │  │  │  │  │ 3
//! ├─────┼─────┤   ▲   ├──┼──┼──┼──┤ 2
//! │ 0,0 │ 0,1 │   │   │  │  │  │  │ ...
//! └─────┴─────┘   │   └──┴──┴──┴──┘ 0
//!                 └────► col
//! ```
//!
//! Row 0 is the southern edge. A tile's four children at the next level
//! are numbered 0 (lower-left), 1 (lower-right), 2 (upper-left) and
//! 3 (upper-right).

mod traversal;
mod types;

pub use traversal::{DiagonalTraversal, QuadtreeTraversal};
pub use types::{tiles_per_axis, LevelCoverage, TileAddress, TileExtents, MAX_LEVEL};
