//! Pixel sample types and the arithmetic the resamplers and compositor need.
//!
//! Integer samples round half-up the way the pyramid has always been built,
//! so repeated minification never drifts downward. Float samples use plain
//! arithmetic.

use std::fmt;

/// A single band value.
pub trait Sample:
    Copy + Default + PartialEq + PartialOrd + fmt::Debug + Send + Sync + 'static
{
    const ZERO: Self;
    const MAX: Self;
    /// Bytes per sample in little-endian wire form.
    const WIDTH: usize;

    /// Mean of four samples, rounded half-up for integers.
    fn average_of_4(a: Self, b: Self, c: Self, d: Self) -> Self;

    /// Mean of two samples, rounded half-up for integers.
    fn average_of_2(a: Self, b: Self) -> Self;

    /// Zero if any input is zero, otherwise [`Sample::average_of_4`].
    #[inline]
    fn zero_or_average(a: Self, b: Self, c: Self, d: Self) -> Self {
        if a == Self::ZERO || b == Self::ZERO || c == Self::ZERO || d == Self::ZERO {
            Self::ZERO
        } else {
            Self::average_of_4(a, b, c, d)
        }
    }

    /// `self * factor`, rounded half-up for integers.
    fn scale(self, factor: f32) -> Self;

    /// Accumulating add; integers saturate.
    fn accumulate(self, other: Self) -> Self;

    /// Weighted sum over four samples divided by 16 (the weights sum to 16).
    fn weighted_16(samples: [Self; 4], weights: [u32; 4]) -> Self;

    fn to_f64(self) -> f64;

    /// Mean of `count` samples whose sum is `sum`. `count` must be non-zero.
    fn mean(sum: f64, count: u32) -> Self;

    fn write_le(self, out: &mut Vec<u8>);
}

impl Sample for u8 {
    const ZERO: Self = 0;
    const MAX: Self = u8::MAX;
    const WIDTH: usize = 1;

    #[inline]
    fn average_of_4(a: Self, b: Self, c: Self, d: Self) -> Self {
        ((2 + a as u32 + b as u32 + c as u32 + d as u32) / 4) as u8
    }

    #[inline]
    fn average_of_2(a: Self, b: Self) -> Self {
        ((1 + a as u32 + b as u32) / 2) as u8
    }

    #[inline]
    fn scale(self, factor: f32) -> Self {
        (0.5 + self as f32 * factor) as u8
    }

    #[inline]
    fn accumulate(self, other: Self) -> Self {
        self.saturating_add(other)
    }

    #[inline]
    fn weighted_16(samples: [Self; 4], weights: [u32; 4]) -> Self {
        let sum: u32 = samples
            .iter()
            .zip(weights.iter())
            .map(|(&s, &w)| s as u32 * w)
            .sum();
        (sum / 16) as u8
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn mean(sum: f64, count: u32) -> Self {
        (sum / count as f64 + 0.5) as u8
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self);
    }
}

impl Sample for i16 {
    const ZERO: Self = 0;
    const MAX: Self = i16::MAX;
    const WIDTH: usize = 2;

    #[inline]
    fn average_of_4(a: Self, b: Self, c: Self, d: Self) -> Self {
        (2 + a as i32 + b as i32 + c as i32 + d as i32).div_euclid(4) as i16
    }

    #[inline]
    fn average_of_2(a: Self, b: Self) -> Self {
        (1 + a as i32 + b as i32).div_euclid(2) as i16
    }

    #[inline]
    fn scale(self, factor: f32) -> Self {
        (0.5 + self as f32 * factor) as i16
    }

    #[inline]
    fn accumulate(self, other: Self) -> Self {
        self.saturating_add(other)
    }

    #[inline]
    fn weighted_16(samples: [Self; 4], weights: [u32; 4]) -> Self {
        let sum: i32 = samples
            .iter()
            .zip(weights.iter())
            .map(|(&s, &w)| s as i32 * w as i32)
            .sum();
        // Floor like the unsigned kinds; `/` would round negatives up.
        sum.div_euclid(16) as i16
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn mean(sum: f64, count: u32) -> Self {
        (sum / count as f64 + 0.5).floor() as i16
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Sample for f32 {
    const ZERO: Self = 0.0;
    const MAX: Self = f32::MAX;
    const WIDTH: usize = 4;

    #[inline]
    fn average_of_4(a: Self, b: Self, c: Self, d: Self) -> Self {
        (a + b + c + d) / 4.0
    }

    #[inline]
    fn average_of_2(a: Self, b: Self) -> Self {
        (a + b) / 2.0
    }

    #[inline]
    fn scale(self, factor: f32) -> Self {
        self * factor
    }

    #[inline]
    fn accumulate(self, other: Self) -> Self {
        self + other
    }

    #[inline]
    fn weighted_16(samples: [Self; 4], weights: [u32; 4]) -> Self {
        let sum: f32 = samples
            .iter()
            .zip(weights.iter())
            .map(|(&s, &w)| s * w as f32)
            .sum();
        sum / 16.0
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn mean(sum: f64, count: u32) -> Self {
        (sum / count as f64) as f32
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_average_rounds_half_up() {
        assert_eq!(u8::average_of_4(1, 1, 1, 2), 1);
        assert_eq!(u8::average_of_4(1, 1, 2, 2), 2);
        assert_eq!(u8::average_of_4(255, 255, 255, 255), 255);
        assert_eq!(u8::average_of_2(3, 4), 4);
    }

    #[test]
    fn test_i16_average_rounds_half_up_below_zero() {
        assert_eq!(i16::average_of_4(-2, -2, -2, -2), -2);
        assert_eq!(i16::average_of_4(-1, -1, -2, -2), -1);
        assert_eq!(i16::average_of_4(-1, -2, -2, -2), -2);
        assert_eq!(i16::average_of_2(-3, -4), -3);
        assert_eq!(i16::average_of_2(-5, -5), -5);
        assert_eq!(i16::weighted_16([-1, -1, -1, -2], [9, 3, 3, 1]), -2);
    }

    #[test]
    fn test_zero_or_average() {
        assert_eq!(u8::zero_or_average(0, 255, 255, 255), 0);
        assert_eq!(u8::zero_or_average(100, 200, 100, 200), 150);
        assert_eq!(f32::zero_or_average(1.0, 0.0, 2.0, 3.0), 0.0);
    }

    #[test]
    fn test_scale() {
        assert_eq!(200u8.scale(128.0 / 255.0), 100);
        assert_eq!(255u8.scale(1.0), 255);
        assert_eq!(10.0f32.scale(0.5), 5.0);
    }

    #[test]
    fn test_accumulate_saturates() {
        assert_eq!(200u8.accumulate(100), 255);
        assert_eq!(i16::MAX.accumulate(1), i16::MAX);
        assert_eq!(1.5f32.accumulate(1.0), 2.5);
    }

    #[test]
    fn test_weighted_16_uniform() {
        assert_eq!(u8::weighted_16([77; 4], [1, 3, 3, 9]), 77);
        assert_eq!(i16::weighted_16([-300; 4], [9, 3, 3, 1]), -300);
        assert_eq!(f32::weighted_16([2.5; 4], [3, 1, 9, 3]), 2.5);
    }

    #[test]
    fn test_mean_rounds_half_up() {
        assert_eq!(u8::mean(5.0, 2), 3);
        assert_eq!(u8::mean(4.0, 3), 1);
        assert_eq!(u8::mean(5.0, 3), 2);
        assert_eq!(f32::mean(5.0, 2), 2.5);
    }

    #[test]
    fn test_write_le() {
        let mut out = Vec::new();
        1.0f32.write_le(&mut out);
        (-2i16).write_le(&mut out);
        7u8.write_le(&mut out);
        assert_eq!(out.len(), 4 + 2 + 1);
        assert_eq!(&out[4..6], &(-2i16).to_le_bytes());
    }
}
