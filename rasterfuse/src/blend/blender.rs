//! Same-level compositing of an ordered inset stack.

use tracing::{debug, trace};

use super::compose::{apply_alpha, blend_terminal_tile, blend_tile_and_saturate_alpha};
use super::{BlendInset, TileLoader};
use crate::cache::{CacheStats, CachingProductTileReader, MagnifyMode};
use crate::coord::TileAddress;
use crate::error::{InsetError, InsetResult, ReadResult};
use crate::opacity::{compute_opacity, BlendStatus, Opacity};
use crate::product::ProductKind;
use crate::tile::{Alpha, AlphaTile, RasterTile, TileKind};

/// Default number of decoded ancestor tiles each reader keeps.
pub const DEFAULT_TILE_CACHE_SIZE: usize = 100;

/// Composites a stack of insets at one target level.
///
/// Index 0 is the top of the stack and has the final say: the first
/// opaque hit wins and nothing beneath it is read.
///
/// ```text
/// inset 0 ─┐  opaque?      ──► copy, done
///          │  amalgam?     ──► apply_alpha
///          ▼
/// inset 1 ─┐  opaque?      ──► blend_terminal_tile, done
///          │  amalgam?     ──► blend_tile_and_saturate_alpha
///          ▼                   saturated? done
///   ...
/// ```
pub struct RasterBlender<K: TileKind> {
    target_level: u32,
    insets: Vec<BlendInset<K>>,
    skip_transparent: bool,
    data_reader: CachingProductTileReader<K>,
    alpha_reader: CachingProductTileReader<Alpha>,
    read_data: RasterTile<K>,
    read_alpha: AlphaTile,
}

impl<K: TileKind> RasterBlender<K> {
    /// Build a blender for `target_level` over `insets`, top first.
    pub fn new(target_level: u32, insets: Vec<BlendInset<K>>, tile_size: usize) -> InsetResult<Self> {
        let Some(top) = insets.first() else {
            return Err(InsetError::EmptyStack);
        };
        for inset in &insets {
            let actual = inset.data_level().product().tile_size();
            if actual != tile_size {
                return Err(InsetError::TileSizeMismatch {
                    name: inset.name().to_string(),
                    expected: tile_size,
                    actual,
                });
            }
        }

        let mode = if top.kind() == ProductKind::Heightmap {
            MagnifyMode::Expanded
        } else {
            MagnifyMode::Weighted
        };
        debug!(
            level = target_level,
            insets = insets.len(),
            mode = ?mode,
            "raster blender ready"
        );

        Ok(Self {
            target_level,
            insets,
            skip_transparent: false,
            data_reader: CachingProductTileReader::new(tile_size, DEFAULT_TILE_CACHE_SIZE)
                .with_mode(mode),
            alpha_reader: CachingProductTileReader::new(tile_size, DEFAULT_TILE_CACHE_SIZE),
            read_data: RasterTile::new(tile_size),
            read_alpha: AlphaTile::new(tile_size),
        })
    }

    /// Report tiles whose top inset is empty or transparent as
    /// `Transparent` without filling the output.
    pub fn with_skip_transparent(mut self, skip: bool) -> Self {
        self.skip_transparent = skip;
        self
    }

    /// Resize the ancestor caches of both readers.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        let size = self.read_data.size();
        let mode = self.data_reader.mode();
        self.data_reader = CachingProductTileReader::new(size, capacity).with_mode(mode);
        self.alpha_reader = CachingProductTileReader::new(size, capacity);
        self
    }

    pub fn target_level(&self) -> u32 {
        self.target_level
    }

    pub fn insets(&self) -> &[BlendInset<K>] {
        &self.insets
    }

    pub fn data_cache_stats(&self) -> CacheStats {
        self.data_reader.cache_stats()
    }
}

impl<K: TileKind> TileLoader<K> for RasterBlender<K> {
    fn load(
        &mut self,
        addr: TileAddress,
        dst: &mut RasterTile<K>,
        dst_alpha: &mut AlphaTile,
    ) -> ReadResult<(Opacity, BlendStatus)> {
        debug!(target = %addr, "blend load");
        let mut status = BlendStatus::NonBlended;

        for (i, inset) in self.insets.iter().enumerate() {
            let top = i == 0;
            let name = inset.name();

            if !inset.target_coverage().contains(&addr) {
                if top {
                    if self.skip_transparent {
                        trace!(inset = name, "no coverage at top, skipping tile");
                        return Ok((Opacity::Transparent, status));
                    }
                    dst.fill_with_zeros();
                    dst_alpha.fill_with_zeros();
                    trace!(inset = name, "no coverage at top");
                } else {
                    trace!(inset = name, "no coverage");
                }
                continue;
            }

            let mut opacity = Opacity::Opaque;
            if let Some(alpha_level) = inset.alpha_level() {
                opacity = alpha_level.product().opacity_mask().get_opacity(addr);
                match opacity {
                    Opacity::Amalgam => {
                        self.alpha_reader
                            .read_tile(alpha_level, addr, &mut self.read_alpha)?;
                    }
                    Opacity::Unknown => {
                        // Missing alpha tiles are fully transparent, not broken.
                        self.alpha_reader
                            .read_tile_or_zero(alpha_level, addr, &mut self.read_alpha)?;
                        opacity = compute_opacity(&self.read_alpha);
                    }
                    Opacity::Opaque | Opacity::Transparent => {}
                }
            }

            match opacity {
                Opacity::Opaque => {
                    if top {
                        self.data_reader.read_tile(inset.data_level(), addr, dst)?;
                        dst_alpha.fill(u8::MAX);
                        trace!(inset = name, "opaque top");
                    } else {
                        self.data_reader
                            .read_tile(inset.data_level(), addr, &mut self.read_data)?;
                        blend_terminal_tile(dst, dst_alpha, &self.read_data);
                        status = BlendStatus::Blended;
                        trace!(inset = name, "opaque under blend");
                    }
                    return Ok((Opacity::Opaque, status));
                }
                Opacity::Transparent => {
                    if top {
                        if self.skip_transparent {
                            trace!(inset = name, "transparent top, skipping tile");
                            return Ok((Opacity::Transparent, status));
                        }
                        dst.fill_with_zeros();
                        dst_alpha.fill_with_zeros();
                    }
                    trace!(inset = name, top, "transparent");
                }
                Opacity::Amalgam | Opacity::Unknown => {
                    status = BlendStatus::Blended;
                    self.data_reader
                        .read_tile(inset.data_level(), addr, &mut self.read_data)?;
                    if top {
                        apply_alpha(dst, dst_alpha, &self.read_data, &self.read_alpha);
                        trace!(inset = name, "top with alpha");
                    } else {
                        blend_tile_and_saturate_alpha(
                            dst,
                            dst_alpha,
                            &self.read_data,
                            &self.read_alpha,
                        );
                        if compute_opacity(dst_alpha) == Opacity::Opaque {
                            trace!(inset = name, "alpha saturated");
                            return Ok((Opacity::Opaque, status));
                        }
                        trace!(inset = name, "blended");
                    }
                }
            }
        }

        if status == BlendStatus::Blended {
            Ok((Opacity::Amalgam, status))
        } else {
            Ok((Opacity::Transparent, status))
        }
    }

    fn cache_stats(&self) -> CacheStats {
        self.data_reader.cache_stats() + self.alpha_reader.cache_stats()
    }
}
