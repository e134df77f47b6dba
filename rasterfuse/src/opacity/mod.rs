//! Opacity classification.
//!
//! Every product tile that carries an alpha band is classified once, by an
//! earlier generation pass, as fully transparent, fully opaque or a mix.
//! The compositor consults those classifications through an
//! [`OpacityMask`] so that homogeneous tiles never need their alpha pixels
//! read.

mod mask;

pub use mask::{MaskLevel, OpacityMask, OpacityMaskError};

use std::fmt;

use crate::tile::AlphaTile;

/// Classification of a tile's alpha band.
///
/// The discriminants are the 2-bit codes stored in a mask level, so a
/// freshly allocated level reads as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opacity {
    /// Not classified; the caller must read alpha pixels and use
    /// [`compute_opacity`].
    Unknown = 0,
    Transparent = 1,
    Opaque = 2,
    /// Mixed transparent and opaque pixels.
    Amalgam = 3,
}

impl Opacity {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            1 => Opacity::Transparent,
            2 => Opacity::Opaque,
            3 => Opacity::Amalgam,
            _ => Opacity::Unknown,
        }
    }
}

impl fmt::Display for Opacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Opacity::Unknown => "unknown",
            Opacity::Transparent => "transparent",
            Opacity::Opaque => "opaque",
            Opacity::Amalgam => "amalgam",
        };
        f.write_str(s)
    }
}

/// How a composited tile came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendStatus {
    /// Nothing was composited; the tile is a direct read or empty.
    #[default]
    NonBlended,
    /// Every contributing source was composited in.
    Blended,
    /// Some, but not all, child quadrants had a source. The rest are a
    /// coverage gap filled with zeros.
    NoDataBlended,
}

/// Classify an alpha tile from its pixels.
///
/// Never returns [`Opacity::Unknown`].
pub fn compute_opacity(alpha: &AlphaTile) -> Opacity {
    let band = alpha.band(0);
    let Some(&first) = band.first() else {
        return Opacity::Transparent;
    };
    if first != 0 && first != u8::MAX {
        return Opacity::Amalgam;
    }
    if band.iter().all(|&a| a == first) {
        if first == 0 {
            Opacity::Transparent
        } else {
            Opacity::Opaque
        }
    } else {
        Opacity::Amalgam
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_opacity_transparent() {
        let alpha = AlphaTile::new(4);
        assert_eq!(compute_opacity(&alpha), Opacity::Transparent);
    }

    #[test]
    fn test_compute_opacity_opaque() {
        let mut alpha = AlphaTile::new(4);
        alpha.fill(255);
        assert_eq!(compute_opacity(&alpha), Opacity::Opaque);
    }

    #[test]
    fn test_compute_opacity_amalgam() {
        let mut alpha = AlphaTile::new(4);
        alpha.fill(255);
        alpha.set(0, 3, 3, 0);
        assert_eq!(compute_opacity(&alpha), Opacity::Amalgam);

        let mut partial = AlphaTile::new(4);
        partial.fill(128);
        assert_eq!(compute_opacity(&partial), Opacity::Amalgam);
    }

    #[test]
    fn test_opacity_bits_round_trip() {
        for op in [
            Opacity::Unknown,
            Opacity::Transparent,
            Opacity::Opaque,
            Opacity::Amalgam,
        ] {
            assert_eq!(Opacity::from_bits(op as u8), op);
        }
    }

    #[test]
    fn test_blend_status_default() {
        assert_eq!(BlendStatus::default(), BlendStatus::NonBlended);
    }
}
