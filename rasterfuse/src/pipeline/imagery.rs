//! Imagery level build: blend or merge, then JPEG/PNG per target tile.

use std::sync::Arc;

use tracing::{debug, trace};

use super::attribution::AttributionByExtents;
use super::traverser::{EncodedTile, PrepStatus, Preparer, Worker};
use crate::blend::TileLoader;
use crate::cache::{BlendCache, CacheStats};
use crate::codec::{encode_imagery, SubtileLayout};
use crate::config::BuildConfig;
use crate::coord::{LevelCoverage, QuadtreeTraversal, TileAddress};
use crate::error::PipelineResult;
use crate::opacity::{compute_opacity, Opacity};
use crate::tile::{AlphaTile, Imagery, RasterTile};

/// A composited product tile on its way to the work stage.
pub struct ImageryPrepItem {
    pub addr: TileAddress,
    pub data: RasterTile<Imagery>,
    pub alpha: AlphaTile,
    pub opacity: Opacity,
}

/// Walks product tiles in quadtree order and composites each one.
pub struct ImageryPreparer<L> {
    loader: L,
    traversal: QuadtreeTraversal,
    coverage: LevelCoverage,
    tile_size: usize,
    skip_transparent: bool,
    blend_cache: Option<Arc<dyn BlendCache<Imagery>>>,
}

impl<L: TileLoader<Imagery>> ImageryPreparer<L> {
    /// `coverage` is at the loader's (product) level.
    pub fn new(loader: L, coverage: LevelCoverage, tile_size: usize) -> Self {
        Self {
            loader,
            traversal: QuadtreeTraversal::new(coverage),
            coverage,
            tile_size,
            skip_transparent: false,
            blend_cache: None,
        }
    }

    /// Drop transparent tiles instead of writing them.
    pub fn with_skip_transparent(mut self, skip: bool) -> Self {
        self.skip_transparent = skip;
        self
    }

    /// Store every non-transparent tile for the next coarser merge.
    pub fn with_blend_cache(mut self, cache: Arc<dyn BlendCache<Imagery>>) -> Self {
        cache.declare_coverage(self.coverage);
        self.blend_cache = Some(cache);
        self
    }
}

impl<L: TileLoader<Imagery>> Preparer for ImageryPreparer<L> {
    type Item = ImageryPrepItem;

    fn level(&self) -> u32 {
        self.coverage.level
    }

    fn total(&self) -> u64 {
        self.coverage.extents.len()
    }

    fn new_item(&self) -> ImageryPrepItem {
        ImageryPrepItem {
            addr: TileAddress::new(self.coverage.level, 0, 0),
            data: RasterTile::new(self.tile_size),
            alpha: AlphaTile::new(self.tile_size),
            opacity: Opacity::Unknown,
        }
    }

    fn prepare(&mut self, item: &mut ImageryPrepItem) -> PipelineResult<PrepStatus> {
        let Some(addr) = self.traversal.next() else {
            return Ok(PrepStatus::Done);
        };
        let (opacity, status) = self.loader.load(addr, &mut item.data, &mut item.alpha)?;
        trace!(tile = %addr, %opacity, ?status, "imagery tile loaded");

        if opacity == Opacity::Transparent {
            if self.skip_transparent {
                return Ok(PrepStatus::Skipped);
            }
        } else if let Some(cache) = &self.blend_cache {
            let alpha = (opacity != Opacity::Opaque).then_some(&item.alpha);
            cache.store(addr, &item.data, alpha)?;
        }

        item.addr = addr;
        item.opacity = opacity;
        Ok(PrepStatus::Ready)
    }

    fn cache_stats(&self) -> CacheStats {
        self.loader.cache_stats()
    }
}

/// Splits a product tile into target tiles and encodes each.
pub struct ImageryWorker {
    layout: SubtileLayout,
    target_coverage: LevelCoverage,
    jpeg_quality: u8,
    attribution: AttributionByExtents,
}

impl ImageryWorker {
    pub fn new(config: &BuildConfig, target_coverage: LevelCoverage) -> PipelineResult<Self> {
        let layout = SubtileLayout::new(config.product_tile_size, config.target_tile_size)?;
        debug!(
            level = target_coverage.level,
            per_axis = layout.per_axis(),
            "imagery worker ready"
        );
        Ok(Self {
            layout,
            target_coverage,
            jpeg_quality: config.jpeg_quality,
            attribution: AttributionByExtents::new(),
        })
    }

    pub fn with_attribution(mut self, attribution: AttributionByExtents) -> Self {
        self.attribution = attribution;
        self
    }

    /// Product level whose tiles this worker splits.
    pub fn product_coverage(&self) -> LevelCoverage {
        self.target_coverage
            .translated_to(self.layout.product_level(self.target_coverage.level))
    }

    fn encode(
        &self,
        addr: TileAddress,
        data: &RasterTile<Imagery>,
        alpha: &AlphaTile,
        opacity: Opacity,
        out: &mut Vec<EncodedTile>,
    ) -> PipelineResult<()> {
        out.push(EncodedTile {
            addr,
            data: encode_imagery(data, alpha, opacity, self.jpeg_quality)?,
            attribution_id: self.attribution.attribution_id(addr),
        });
        Ok(())
    }
}

impl Worker<ImageryPrepItem> for ImageryWorker {
    fn work(&self, item: &ImageryPrepItem, out: &mut Vec<EncodedTile>) -> PipelineResult<()> {
        let targets = self.layout.subtiles(item.addr, &self.target_coverage);
        if self.layout.level_offset() == 0 {
            for addr in targets {
                self.encode(addr, &item.data, &item.alpha, item.opacity, out)?;
            }
            return Ok(());
        }

        let size = self.layout.target_tile_size();
        let mut data = RasterTile::new(size);
        let mut alpha = AlphaTile::new(size);
        for addr in targets {
            self.layout.extract(&item.data, addr, &mut data);
            self.layout.extract(&item.alpha, addr, &mut alpha);
            let opacity = match item.opacity {
                Opacity::Opaque | Opacity::Transparent => item.opacity,
                Opacity::Amalgam | Opacity::Unknown => compute_opacity(&alpha),
            };
            self.encode(addr, &data, &alpha, opacity, out)?;
        }
        Ok(())
    }
}
