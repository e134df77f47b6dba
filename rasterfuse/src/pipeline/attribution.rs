//! Per-tile source attribution.

use crate::coord::{LevelCoverage, TileAddress};

/// Maps a target tile to the id of the topmost inset covering it.
///
/// Insets are added top first. Coverage is compared at the address's level,
/// so one table serves every level of a build.
#[derive(Debug, Clone, Default)]
pub struct AttributionByExtents {
    entries: Vec<(u32, LevelCoverage)>,
}

impl AttributionByExtents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the next (lower priority) inset.
    pub fn with_inset(mut self, id: u32, coverage: LevelCoverage) -> Self {
        self.entries.push((id, coverage));
        self
    }

    /// Id of the first inset containing `addr`, or 0.
    pub fn attribution_id(&self, addr: TileAddress) -> u32 {
        self.entries
            .iter()
            .find(|(_, coverage)| coverage.translated_to(addr.level).contains(&addr))
            .map_or(0, |(id, _)| *id)
    }
}
