//! Build configuration.
//!
//! `BuildConfig` carries every tunable of a level build. It can be built in
//! code with `with_*` setters or loaded from an INI file:
//!
//! ```ini
//! [pipeline]
//! work_threads = 8
//! queue_depth_per_worker = 2
//! ordered_writes = false
//!
//! [cache]
//! tile_cache_size = 100
//! cache_blends = true
//!
//! [tiles]
//! product_tile_size = 256
//! target_tile_size = 256
//! skip_transparent = false
//!
//! [imagery]
//! jpeg_quality = 75
//! ```

use std::path::Path;
use std::str::FromStr;
use std::thread;

use ini::{Ini, Properties};
use thiserror::Error;

use crate::blend::DEFAULT_TILE_CACHE_SIZE;

/// Default edge length of product and target tiles in pixels.
pub const DEFAULT_TILE_SIZE: usize = 256;

/// Default JPEG quality for opaque imagery tiles.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Pool items per work thread; prep can run this far ahead of work.
pub const DEFAULT_QUEUE_DEPTH_PER_WORKER: usize = 2;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] ini::Error),

    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Settings for one pipeline run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildConfig {
    /// Work stage threads; must be at least one.
    pub work_threads: usize,
    pub queue_depth_per_worker: usize,
    /// Ancestor tiles kept per reader; zero disables caching.
    pub tile_cache_size: usize,
    pub product_tile_size: usize,
    pub target_tile_size: usize,
    /// Drop tiles whose top inset is transparent instead of writing them.
    pub skip_transparent: bool,
    pub jpeg_quality: u8,
    /// Store blended tiles for the next coarser level's merge.
    pub cache_blends: bool,
    /// Hand records to the writer in traversal order.
    pub ordered_writes: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            work_threads: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            queue_depth_per_worker: DEFAULT_QUEUE_DEPTH_PER_WORKER,
            tile_cache_size: DEFAULT_TILE_CACHE_SIZE,
            product_tile_size: DEFAULT_TILE_SIZE,
            target_tile_size: DEFAULT_TILE_SIZE,
            skip_transparent: false,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            cache_blends: false,
            ordered_writes: false,
        }
    }
}

impl BuildConfig {
    pub fn with_work_threads(mut self, threads: usize) -> Self {
        self.work_threads = threads;
        self
    }

    pub fn with_queue_depth_per_worker(mut self, depth: usize) -> Self {
        self.queue_depth_per_worker = depth;
        self
    }

    pub fn with_tile_cache_size(mut self, size: usize) -> Self {
        self.tile_cache_size = size;
        self
    }

    pub fn with_product_tile_size(mut self, size: usize) -> Self {
        self.product_tile_size = size;
        self
    }

    pub fn with_target_tile_size(mut self, size: usize) -> Self {
        self.target_tile_size = size;
        self
    }

    pub fn with_skip_transparent(mut self, skip: bool) -> Self {
        self.skip_transparent = skip;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn with_cache_blends(mut self, cache: bool) -> Self {
        self.cache_blends = cache;
        self
    }

    pub fn with_ordered_writes(mut self, ordered: bool) -> Self {
        self.ordered_writes = ordered;
        self
    }

    /// Number of items in each of the prep and work pools.
    pub fn pool_size(&self) -> usize {
        self.work_threads * self.queue_depth_per_worker.max(1)
    }

    /// Load settings from an INI file. A missing file yields defaults;
    /// absent keys keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("pipeline")) {
            if let Some(v) = parse_positive(section, "pipeline", "work_threads")? {
                config.work_threads = v;
            }
            if let Some(v) = parse_positive(section, "pipeline", "queue_depth_per_worker")? {
                config.queue_depth_per_worker = v;
            }
            if let Some(v) = parse(section, "pipeline", "ordered_writes", "must be true or false")? {
                config.ordered_writes = v;
            }
        }

        if let Some(section) = ini.section(Some("cache")) {
            if let Some(v) = parse(section, "cache", "tile_cache_size", "must be an integer")? {
                config.tile_cache_size = v;
            }
            if let Some(v) = parse(section, "cache", "cache_blends", "must be true or false")? {
                config.cache_blends = v;
            }
        }

        if let Some(section) = ini.section(Some("tiles")) {
            if let Some(v) = parse_tile_size(section, "product_tile_size")? {
                config.product_tile_size = v;
            }
            if let Some(v) = parse_tile_size(section, "target_tile_size")? {
                config.target_tile_size = v;
            }
            if let Some(v) = parse(section, "tiles", "skip_transparent", "must be true or false")? {
                config.skip_transparent = v;
            }
        }

        if let Some(section) = ini.section(Some("imagery")) {
            if let Some(v) = section.get("jpeg_quality") {
                config.jpeg_quality = match v.trim().parse::<u8>() {
                    Ok(q) if (1..=100).contains(&q) => q,
                    _ => return Err(invalid("imagery", "jpeg_quality", v, "must be 1-100")),
                };
            }
        }

        if config.target_tile_size > config.product_tile_size {
            return Err(invalid(
                "tiles",
                "target_tile_size",
                &config.target_tile_size.to_string(),
                "must not exceed product_tile_size",
            ));
        }

        Ok(config)
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T: FromStr>(
    section: &Properties,
    name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigError> {
    match section.get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(name, key, v, reason)),
        None => Ok(None),
    }
}

fn parse_positive(section: &Properties, name: &str, key: &str) -> Result<Option<usize>, ConfigError> {
    let reason = "must be a positive integer";
    match parse::<usize>(section, name, key, reason)? {
        Some(0) => Err(invalid(name, key, "0", reason)),
        other => Ok(other),
    }
}

fn parse_tile_size(section: &Properties, key: &str) -> Result<Option<usize>, ConfigError> {
    let reason = "must be a power of two";
    match parse::<usize>(section, "tiles", key, reason)? {
        Some(v) if !v.is_power_of_two() => Err(invalid("tiles", key, &v.to_string(), reason)),
        other => Ok(other),
    }
}
