//! Inset construction for the blender and merger.
//!
//! Insets validate their products up front so that a bad stack fails
//! before any pipeline thread starts.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::cache::BlendCache;
use crate::coord::{LevelCoverage, TileExtents};
use crate::error::{InsetError, InsetResult};
use crate::product::{ProductKind, ProductLevel, SharedProduct};
use crate::tile::{Alpha, TileKind};

fn check_data_product<K: TileKind>(product: &SharedProduct<K>) -> InsetResult<()> {
    if product.kind().is_data() {
        Ok(())
    } else {
        Err(InsetError::NotDataProduct {
            name: product.name().to_string(),
            kind: product.kind(),
        })
    }
}

/// Pin an alpha product to `level`, clamped to its finest level.
fn alpha_level(product: SharedProduct<Alpha>, level: u32) -> InsetResult<ProductLevel<Alpha>> {
    if product.kind() != ProductKind::AlphaMask {
        return Err(InsetError::NotAlphaMask {
            name: product.name().to_string(),
            kind: product.kind(),
        });
    }
    let level = level.min(product.max_level());
    let name = product.name().to_string();
    ProductLevel::new(product, level).ok_or(InsetError::MissingLevel { name, level })
}

/// One layer of a same-level blend stack.
pub struct BlendInset<K: TileKind> {
    data_level: ProductLevel<K>,
    alpha_level: Option<ProductLevel<Alpha>>,
    target_coverage: LevelCoverage,
}

impl<K: TileKind> BlendInset<K> {
    /// Prepare `data` (and optional `alpha`) for blending at `target_level`.
    ///
    /// Levels finer than the product's finest level are magnified from it.
    pub fn new(
        target_level: u32,
        data: SharedProduct<K>,
        alpha: Option<SharedProduct<Alpha>>,
    ) -> InsetResult<Self> {
        check_data_product(&data)?;
        if target_level < data.min_level() {
            return Err(InsetError::LevelBelowMinimum {
                name: data.name().to_string(),
                target: target_level,
                min: data.min_level(),
            });
        }

        let level = target_level.min(data.max_level());
        let name = data.name().to_string();
        let data_level =
            ProductLevel::new(data, level).ok_or(InsetError::MissingLevel { name, level })?;
        let alpha_level = alpha.map(|a| alpha_level(a, target_level)).transpose()?;
        let target_coverage = data_level.coverage().translated_to(target_level);

        Ok(Self {
            data_level,
            alpha_level,
            target_coverage,
        })
    }

    pub fn data_level(&self) -> &ProductLevel<K> {
        &self.data_level
    }

    pub fn alpha_level(&self) -> Option<&ProductLevel<Alpha>> {
        self.alpha_level.as_ref()
    }

    /// Extents of this inset expressed at the target level.
    pub fn target_coverage(&self) -> &LevelCoverage {
        &self.target_coverage
    }

    pub fn name(&self) -> &str {
        self.data_level.name()
    }

    pub fn kind(&self) -> ProductKind {
        self.data_level.product().kind()
    }
}

impl<K: TileKind> fmt::Debug for BlendInset<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlendInset")
            .field("data", &self.data_level)
            .field("alpha", &self.alpha_level)
            .field("target_coverage", &self.target_coverage)
            .finish()
    }
}

/// One layer of a merge stack, read at the child level (`target + 1`).
pub struct MergeInset<K: TileKind> {
    data_level: Option<ProductLevel<K>>,
    alpha_level: Option<ProductLevel<Alpha>>,
    cached_blend: Option<Arc<dyn BlendCache<K>>>,
    magnify_coverage: LevelCoverage,
}

impl<K: TileKind> MergeInset<K> {
    /// Prepare a merge source for `child_level`.
    ///
    /// At least one of `data` and `cached_blend` should be given; an inset
    /// with neither never contributes.
    pub fn new(
        child_level: u32,
        data: Option<SharedProduct<K>>,
        alpha: Option<SharedProduct<Alpha>>,
        cached_blend: Option<Arc<dyn BlendCache<K>>>,
    ) -> InsetResult<Self> {
        let mut data_level = None;
        let mut alpha_level_opt = None;
        let mut magnify_coverage =
            LevelCoverage::new(child_level, TileExtents::default());

        if let Some(data) = data {
            check_data_product(&data)?;
            if data.valid_level(child_level) {
                let name = data.name().to_string();
                let level = ProductLevel::new(data, child_level).ok_or(InsetError::MissingLevel {
                    name,
                    level: child_level,
                })?;
                magnify_coverage = *level.coverage();
                data_level = Some(level);
                alpha_level_opt = alpha.map(|a| alpha_level(a, child_level)).transpose()?;
            } else if data.kind() == ProductKind::Heightmap && child_level <= data.max_level() {
                // Elevation products may start finer than the merge level;
                // such levels are built purely from cached blends.
                info!(
                    product = data.name(),
                    level = child_level,
                    "merging level below heightmap product range"
                );
            } else {
                return Err(InsetError::MissingLevel {
                    name: data.name().to_string(),
                    level: child_level,
                });
            }
        }

        if let Some(cache) = &cached_blend {
            let cached = cache.level_coverage(child_level).ok_or_else(|| InsetError::MissingLevel {
                name: cache.name().to_string(),
                level: child_level,
            })?;
            let is_imagery = data_level
                .as_ref()
                .is_some_and(|l| l.product().kind() == ProductKind::Imagery);
            if is_imagery && !cached.extents.contains(&magnify_coverage.extents) {
                return Err(InsetError::CachedBlendCoverage {
                    name: cache.name().to_string(),
                    level: child_level,
                });
            }
            magnify_coverage = cached;
        }

        Ok(Self {
            data_level,
            alpha_level: alpha_level_opt,
            cached_blend,
            magnify_coverage,
        })
    }

    pub fn data_level(&self) -> Option<&ProductLevel<K>> {
        self.data_level.as_ref()
    }

    pub fn alpha_level(&self) -> Option<&ProductLevel<Alpha>> {
        self.alpha_level.as_ref()
    }

    pub fn cached_blend(&self) -> Option<&Arc<dyn BlendCache<K>>> {
        self.cached_blend.as_ref()
    }

    /// Extents at the child level this inset can supply.
    pub fn magnify_coverage(&self) -> &LevelCoverage {
        &self.magnify_coverage
    }

    pub fn name(&self) -> &str {
        match (&self.data_level, &self.cached_blend) {
            (Some(level), _) => level.name(),
            (None, Some(cache)) => cache.name(),
            (None, None) => "<empty>",
        }
    }
}

impl<K: TileKind> fmt::Debug for MergeInset<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeInset")
            .field("data", &self.data_level)
            .field("alpha", &self.alpha_level)
            .field("cached_blend", &self.cached_blend.as_ref().map(|c| c.name()))
            .field("magnify_coverage", &self.magnify_coverage)
            .finish()
    }
}
