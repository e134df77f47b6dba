//! Error types for the compositing engine.
//!
//! Setup problems surface as [`InsetError`] before any pipeline thread
//! starts. Everything that can go wrong while a level is being built is
//! folded into [`PipelineError`].

use thiserror::Error;

use crate::coord::TileAddress;
use crate::product::ProductKind;

/// Failure reading one tile from a product.
#[derive(Debug, Error)]
pub enum TileReadError {
    #[error("tile {addr} is not present in {product}")]
    Missing { product: String, addr: TileAddress },

    #[error("tile {addr} in {product} is corrupt: {reason}")]
    Corrupt {
        product: String,
        addr: TileAddress,
        reason: String,
    },

    #[error("tile {addr} in {product} is {actual} pixels wide, expected {expected}")]
    SizeMismatch {
        product: String,
        addr: TileAddress,
        expected: usize,
        actual: usize,
    },
}

impl TileReadError {
    pub fn is_missing(&self) -> bool {
        matches!(self, TileReadError::Missing { .. })
    }
}

/// Failure assembling an inset stack.
#[derive(Debug, Error)]
pub enum InsetError {
    #[error("data product {name} is {kind}, expected imagery or heightmap")]
    NotDataProduct { name: String, kind: ProductKind },

    #[error("alpha product {name} is {kind}, expected an alpha mask")]
    NotAlphaMask { name: String, kind: ProductKind },

    #[error("target level {target} is below the minimum level {min} of {name}")]
    LevelBelowMinimum { name: String, target: u32, min: u32 },

    #[error("{name} has no level {level}")]
    MissingLevel { name: String, level: u32 },

    #[error("cached blend for {name} does not cover the product's extents at level {level}")]
    CachedBlendCoverage { name: String, level: u32 },

    #[error("tile sizes disagree: {name} uses {actual}, stack uses {expected}")]
    TileSizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("empty inset stack")]
    EmptyStack,
}

/// Failure turning a composited tile into its wire form.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("compression failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("target tile size {target} does not evenly divide product tile size {product}")]
    UnevenSubtiles { product: usize, target: usize },
}

/// Failure handing a finished tile to the packet writer.
#[derive(Debug, Error)]
#[error("packet write failed for {addr}: {reason}")]
pub struct WriteError {
    pub addr: TileAddress,
    pub reason: String,
}

/// Any failure that aborts a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("at least one work thread is required")]
    NoWorkThreads,

    #[error(transparent)]
    Inset(#[from] InsetError),

    #[error(transparent)]
    Read(#[from] TileReadError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("{stage} thread panicked")]
    ThreadPanicked { stage: &'static str },

    #[error("failed to spawn {stage} thread: {source}")]
    Spawn {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub type ReadResult<T> = Result<T, TileReadError>;
pub type InsetResult<T> = Result<T, InsetError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
