//! Resampling between adjacent pyramid levels.
//!
//! ```text
//!  minify (4:1)                    magnify (1:4)
//! ┌────┬────┐ level n+1          ┌─────────┐ level n
//! │ q2 │ q3 │                    │  q2 q3  │
//! ├────┼────┤  ──► one quadrant  │  q0 q1  │ ──► one quadrant
//! │ q0 │ q1 │      of level n    └─────────┘     expanded to a
//! └────┴────┘                                    full level n+1 tile
//! ```
//!
//! Both directions are purely tile-local.

mod magnify;
mod minify;

pub use magnify::{magnify_expanded_quadrant, magnify_quadrant};
pub use minify::{average_reducer, minify_into_quadrant, zero_or_average_reducer, Reducer};
