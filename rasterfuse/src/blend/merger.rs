//! Coarser-level tiles built by minifying four child tiles.

use tracing::{debug, info, trace};

use super::blender::DEFAULT_TILE_CACHE_SIZE;
use super::{MergeInset, TileLoader};
use crate::cache::{CacheStats, CachingProductTileReader};
use crate::coord::TileAddress;
use crate::error::{InsetError, InsetResult, ReadResult};
use crate::opacity::{compute_opacity, BlendStatus, Opacity};
use crate::product::{ProductKind, ProductLevel, SharedProduct};
use crate::resample::{average_reducer, minify_into_quadrant, zero_or_average_reducer};
use crate::tile::{Alpha, AlphaTile, RasterTile, TileKind};

/// Highest-priority source read directly at the target level.
struct Burn<K: TileKind> {
    data_level: ProductLevel<K>,
    alpha_level: Option<ProductLevel<Alpha>>,
}

/// Builds a tile at level `n` from the four tiles beneath it at `n + 1`.
///
/// ```text
///          target (n)
///     ┌─────────┬─────────┐
///     │ quad 2  │ quad 3  │ ◄── each quad: first inset (top first) with a
///     ├─────────┼─────────┤     usable child tile, minified in
///     │ quad 0  │ quad 1  │
///     └─────────┴─────────┘
/// ```
///
/// A child tile is usable if it is in the inset's cached blend, or if the
/// raw product tile is classified fully opaque.
pub struct RasterMerger<K: TileKind> {
    target_level: u32,
    insets: Vec<MergeInset<K>>,
    burn: Option<Burn<K>>,
    data_reader: CachingProductTileReader<K>,
    alpha_reader: CachingProductTileReader<Alpha>,
    read_data: RasterTile<K>,
    read_alpha: AlphaTile,
}

impl<K: TileKind> RasterMerger<K> {
    /// Build a merger for `target_level`; insets are read at
    /// `target_level + 1`, top first. An empty stack is allowed and yields
    /// transparent tiles.
    pub fn new(target_level: u32, insets: Vec<MergeInset<K>>, tile_size: usize) -> Self {
        if insets.is_empty() {
            info!(level = target_level, "no insets to merge");
        }
        debug!(level = target_level, insets = insets.len(), "raster merger ready");
        Self {
            target_level,
            insets,
            burn: None,
            // Child tiles are read at their native level, so only alpha
            // ever needs magnifying.
            data_reader: CachingProductTileReader::new(tile_size, 0),
            alpha_reader: CachingProductTileReader::new(tile_size, DEFAULT_TILE_CACHE_SIZE),
            read_data: RasterTile::new(tile_size),
            read_alpha: AlphaTile::new(tile_size),
        }
    }

    /// Add a burn product: where it fully covers a target tile with opaque
    /// data, it is used as-is and the child quads are never consulted.
    /// Such tiles report [`BlendStatus::NonBlended`]; they are not coverage gaps.
    pub fn with_burn(
        mut self,
        data: SharedProduct<K>,
        alpha: Option<SharedProduct<Alpha>>,
    ) -> InsetResult<Self> {
        if !data.kind().is_data() {
            return Err(InsetError::NotDataProduct {
                name: data.name().to_string(),
                kind: data.kind(),
            });
        }
        let level = self.target_level;
        if !data.valid_level(level) {
            if data.kind() == ProductKind::Heightmap && level <= data.max_level() {
                info!(
                    product = data.name(),
                    level, "burn product starts finer than merge level; merging without it"
                );
                return Ok(self);
            }
            return Err(InsetError::MissingLevel {
                name: data.name().to_string(),
                level,
            });
        }

        let name = data.name().to_string();
        let data_level =
            ProductLevel::new(data, level).ok_or(InsetError::MissingLevel { name, level })?;
        let alpha_level = match alpha {
            Some(alpha) => {
                if alpha.kind() != ProductKind::AlphaMask {
                    return Err(InsetError::NotAlphaMask {
                        name: alpha.name().to_string(),
                        kind: alpha.kind(),
                    });
                }
                let alpha_lvl = level.min(alpha.max_level());
                let name = alpha.name().to_string();
                Some(ProductLevel::new(alpha, alpha_lvl).ok_or(InsetError::MissingLevel {
                    name,
                    level: alpha_lvl,
                })?)
            }
            None => None,
        };
        self.burn = Some(Burn {
            data_level,
            alpha_level,
        });
        Ok(self)
    }

    pub fn target_level(&self) -> u32 {
        self.target_level
    }

    pub fn insets(&self) -> &[MergeInset<K>] {
        &self.insets
    }
}

/// Opacity of `addr` in an alpha product, reading pixels if the mask
/// cannot answer. No alpha product means fully opaque.
fn mask_opacity(
    reader: &mut CachingProductTileReader<Alpha>,
    scratch: &mut AlphaTile,
    addr: TileAddress,
    alpha_level: Option<&ProductLevel<Alpha>>,
) -> ReadResult<Opacity> {
    let Some(level) = alpha_level else {
        return Ok(Opacity::Opaque);
    };
    let opacity = level.product().opacity_mask().get_opacity(addr);
    if opacity != Opacity::Unknown {
        return Ok(opacity);
    }
    reader.read_tile_or_zero(level, addr, scratch)?;
    Ok(compute_opacity(scratch))
}

impl<K: TileKind> TileLoader<K> for RasterMerger<K> {
    fn load(
        &mut self,
        addr: TileAddress,
        dst: &mut RasterTile<K>,
        dst_alpha: &mut AlphaTile,
    ) -> ReadResult<(Opacity, BlendStatus)> {
        debug!(target = %addr, "merge load");
        let Self {
            insets,
            burn,
            data_reader,
            alpha_reader,
            read_data,
            read_alpha,
            ..
        } = self;

        if let Some(burn) = burn {
            if burn.data_level.contains(&addr) {
                let opacity = mask_opacity(alpha_reader, read_alpha, addr, burn.alpha_level.as_ref())?;
                trace!(opacity = %opacity, "burn short circuit check");
                if opacity == Opacity::Opaque {
                    data_reader.read_tile(&burn.data_level, addr, dst)?;
                    dst_alpha.fill(u8::MAX);
                    return Ok((Opacity::Opaque, BlendStatus::NonBlended));
                }
            }
        }

        let children = addr.children();
        let child_span = addr.magnified_to(addr.level + 1);
        let mut done = [false; 4];
        let mut num_done = 0;

        'insets: for inset in insets.iter() {
            if !inset
                .magnify_coverage()
                .extents
                .intersects(&child_span.extents)
            {
                trace!(inset = inset.name(), "no coverage");
                continue;
            }
            for (quad, child) in children.iter().enumerate() {
                if done[quad] {
                    continue;
                }
                let found = read_child(inset, *child, data_reader, alpha_reader, read_data, read_alpha)?;
                if !found {
                    continue;
                }
                minify_into_quadrant(dst, quad, read_data, average_reducer::<K>());
                minify_into_quadrant(dst_alpha, quad, read_alpha, zero_or_average_reducer::<Alpha>());
                trace!(inset = inset.name(), quad, "quad filled");
                done[quad] = true;
                num_done += 1;
                if num_done == done.len() {
                    break 'insets;
                }
            }
        }

        match num_done {
            4 => Ok((compute_opacity(dst_alpha), BlendStatus::Blended)),
            0 => {
                dst.fill_with_zeros();
                dst_alpha.fill_with_zeros();
                Ok((Opacity::Transparent, BlendStatus::NonBlended))
            }
            _ => {
                for (quad, filled) in done.iter().enumerate() {
                    if !filled {
                        dst.fill_quad_with_zeros(quad);
                        dst_alpha.fill_quad_with_zeros(quad);
                    }
                }
                Ok((Opacity::Amalgam, BlendStatus::NoDataBlended))
            }
        }
    }

    fn cache_stats(&self) -> CacheStats {
        self.alpha_reader.cache_stats()
    }
}

/// Fetch the child tile `addr` from `inset` if it has a usable one.
fn read_child<K: TileKind>(
    inset: &MergeInset<K>,
    addr: TileAddress,
    data_reader: &mut CachingProductTileReader<K>,
    alpha_reader: &mut CachingProductTileReader<Alpha>,
    read_data: &mut RasterTile<K>,
    read_alpha: &mut AlphaTile,
) -> ReadResult<bool> {
    if let Some(cache) = inset.cached_blend() {
        if cache.has_tile(addr) {
            cache.read_tile(addr, read_data)?;
            if !cache.read_alpha(addr, read_alpha)? {
                read_alpha.fill(u8::MAX);
            }
            return Ok(true);
        }
    }

    if let Some(level) = inset.data_level() {
        if level.contains(&addr)
            && mask_opacity(alpha_reader, read_alpha, addr, inset.alpha_level())? == Opacity::Opaque
        {
            data_reader.read_tile(level, addr, read_data)?;
            read_alpha.fill(u8::MAX);
            return Ok(true);
        }
    }

    Ok(false)
}
