//! Binomial-approximation range coder.
//!
//! Codes an integer in `[0, max]` that is expected to cluster around a known
//! mean. Values inside a power-of-two window centred on the mean cost one
//! flag bit plus the window's bounded width; values in the tails pay one or
//! two flag bits plus a bounded offset into the tail they fall in.
//!
//! # Layout
//!
//! ```text
//! max == 0                      -> nothing
//! window >= (max + 1) / 2       -> bounded(value, max + 1)
//! start <= value <= last        -> 1 | bounded(value - start, w)
//! value < start                 -> 0 | [0] | bounded(value, start)
//! value > last                  -> 0 | [1] | bounded(value - last - 1, max - last)
//! ```
//!
//! where `last = start + w - 1` is the window's highest value.
//!
//! The bracketed side bit is omitted when the window touches 0 or `max`,
//! since only one tail exists then.

use std::io::Read;

use crate::bitio::{BitReader, BitWriter};
use crate::error::{RangeCoderError, Result};

/// Normal approximation used to lay out the central window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeCoder {
    mean: f64,
    std_dev: f64,
}

/// How a given `max` is laid out for this coder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Only one value is possible
    Empty,
    /// Window would not save anything
    Flat,
    /// Central window `[start, start + width)` strictly inside `[0, max]`
    Window { start: u64, width: u64 },
}

impl Layout {
    /// Highest value inside the window; never exceeds `max`.
    fn last(start: u64, width: u64) -> u64 {
        start + (width - 1)
    }
}

impl RangeCoder {
    /// Build from a mean and standard deviation.
    ///
    /// # Errors
    /// `RangeCoderError::InvalidDistribution` unless both are finite and
    /// `std_dev > 0`.
    pub fn new(mean: f64, std_dev: f64) -> Result<Self> {
        if !mean.is_finite() || !std_dev.is_finite() || std_dev <= 0.0 {
            return Err(RangeCoderError::InvalidDistribution { mean, std_dev }.into());
        }
        Ok(Self { mean, std_dev })
    }

    /// Normal approximation of `binomial(p, n)`.
    ///
    /// # Errors
    /// `RangeCoderError::InvalidBinomial` unless `0 < p < 1` and `n > 0`.
    pub fn from_binomial(p: f64, n: u64) -> Result<Self> {
        if !(p > 0.0 && p < 1.0) || n == 0 {
            return Err(RangeCoderError::InvalidBinomial { p, n }.into());
        }
        let n_f = n as f64;
        Self::new(p * n_f, (n_f * p * (1.0 - p)).sqrt())
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    /// Width exponent of the central window.
    fn window_bits(&self) -> u32 {
        let bits = (2.0 * self.std_dev).log2().round() - 1.0;
        if bits > 0.0 {
            bits.min(63.0) as u32
        } else {
            0
        }
    }

    fn layout(&self, max: u64) -> Layout {
        if max == 0 {
            return Layout::Empty;
        }
        let width = 1u64 << self.window_bits();
        if 2 * width as u128 >= max as u128 + 1 {
            return Layout::Flat;
        }
        // Highest start that keeps the window inside [0, max].
        let last_start = max - width + 1;
        let ideal = (self.mean - width as f64 / 2.0).round();
        let start = if ideal <= 0.0 {
            0
        } else if ideal >= last_start as f64 {
            last_start
        } else {
            (ideal as u64).min(last_start)
        };
        Layout::Window { start, width }
    }

    /// Write `value`, which must lie in `[0, max]`.
    ///
    /// # Errors
    /// `RangeCoderError::ValueOutOfRange` if `value > max`.
    pub fn encode(&self, out: &mut BitWriter, value: u64, max: u64) -> Result<()> {
        if value > max {
            return Err(RangeCoderError::ValueOutOfRange { value, max }.into());
        }
        match self.layout(max) {
            Layout::Empty => Ok(()),
            Layout::Flat => out.write_bounded_long(value, max.saturating_add(1)),
            Layout::Window { start, width } => {
                let last = Layout::last(start, width);
                if (start..=last).contains(&value) {
                    out.write_bool(true)?;
                    return out.write_bounded_long(value - start, width);
                }
                out.write_bool(false)?;
                let is_high = value > last;
                if start > 0 && last < max {
                    out.write_bool(is_high)?;
                }
                if is_high {
                    out.write_bounded_long(value - (last + 1), max - last)
                } else {
                    out.write_bounded_long(value, start)
                }
            }
        }
    }

    /// Read a value written by [`encode`](Self::encode) with the same `max`.
    ///
    /// # Errors
    /// `RangeCoderError::Corrupt` if the stored offsets land outside `[0, max]`
    /// or outside the region they claim to be in.
    pub fn decode<R: Read>(&self, input: &mut BitReader<R>, max: u64) -> Result<u64> {
        let (value, limit) = match self.layout(max) {
            Layout::Empty => return Ok(0),
            Layout::Flat => (input.read_bounded_long(max.saturating_add(1))?, max),
            Layout::Window { start, width } => {
                let last = Layout::last(start, width);
                if input.read_bool()? {
                    let offset = input.read_bounded_long(width)?;
                    (start.checked_add(offset).ok_or(corrupt(offset))?, last)
                } else {
                    let low_possible = start > 0;
                    let high_possible = last < max;
                    let is_high = if low_possible && high_possible {
                        input.read_bool()?
                    } else {
                        high_possible
                    };
                    if is_high {
                        let offset = input.read_bounded_long(max - last)?;
                        ((last + 1).checked_add(offset).ok_or(corrupt(offset))?, max)
                    } else {
                        (input.read_bounded_long(start)?, start - 1)
                    }
                }
            }
        };
        if value > limit {
            return Err(RangeCoderError::Corrupt { value, max }.into());
        }
        Ok(value)
    }

    /// Number of bits [`encode`](Self::encode) spends on `value`.
    pub fn encoded_len(&self, value: u64, max: u64) -> Result<usize> {
        let mut scratch = BitWriter::new();
        self.encode(&mut scratch, value, max)?;
        Ok(scratch.bit_len())
    }
}

fn corrupt(offset: u64) -> RangeCoderError {
    RangeCoderError::Corrupt {
        value: offset,
        max: u64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitio::bounded_width;
    use crate::error::ErrorKind;
    use quickcheck_macros::quickcheck;

    fn round_trip(coder: &RangeCoder, values: &[u64], max: u64) -> Vec<u64> {
        let mut writer = BitWriter::new();
        for &v in values {
            coder.encode(&mut writer, v, max).unwrap();
        }
        let bytes = writer.finish();
        let mut reader = BitReader::new(bytes.as_slice());
        values
            .iter()
            .map(|_| coder.decode(&mut reader, max).unwrap())
            .collect()
    }

    #[test]
    fn test_parameters() {
        assert!(RangeCoder::new(0.0, 0.0).is_err());
        assert!(RangeCoder::new(f64::NAN, 1.0).is_err());
        assert!(RangeCoder::new(1.0, f64::INFINITY).is_err());
        assert!(RangeCoder::from_binomial(0.0, 10).is_err());
        assert!(RangeCoder::from_binomial(1.0, 10).is_err());
        assert!(RangeCoder::from_binomial(0.5, 0).is_err());

        let coder = RangeCoder::from_binomial(0.5, 100).unwrap();
        assert_eq!(coder.mean(), 50.0);
        assert_eq!(coder.std_dev(), 5.0);
    }

    #[test]
    fn test_central_values_are_short() {
        // sigma ~ 15.8, so the window is 16 wide around 500.
        let coder = RangeCoder::from_binomial(0.5, 1000).unwrap();
        assert_eq!(coder.encoded_len(500, 1000).unwrap(), 6);
        assert_eq!(coder.encoded_len(0, 1000).unwrap(), 11);
        assert_eq!(coder.encoded_len(1000, 1000).unwrap(), 11);
        assert!(coder.encoded_len(500, 1000).unwrap() < bounded_width(1001));
    }

    #[test]
    fn test_flat_fallback() {
        let coder = RangeCoder::new(2.0, 100.0).unwrap();
        assert_eq!(coder.encoded_len(3, 5).unwrap(), bounded_width(6));
        assert_eq!(round_trip(&coder, &[0, 3, 5], 5), vec![0, 3, 5]);
        assert_eq!(coder.encoded_len(0, 0).unwrap(), 0);
    }

    #[test]
    fn test_window_clamped_to_edges() {
        // Mean far below zero pins the window at 0: only the high tail exists.
        let low = RangeCoder::new(-50.0, 4.0).unwrap();
        assert_eq!(low.layout(100), Layout::Window { start: 0, width: 4 });
        assert_eq!(low.encoded_len(50, 100).unwrap(), 1 + bounded_width(97));

        // Mean far above max pins the window at the top: only the low tail.
        let high = RangeCoder::new(1e9, 4.0).unwrap();
        assert_eq!(high.layout(100), Layout::Window { start: 97, width: 4 });
        assert_eq!(high.encoded_len(50, 100).unwrap(), 1 + bounded_width(97));

        let values: Vec<u64> = (0..=100).collect();
        assert_eq!(round_trip(&low, &values, 100), values);
        assert_eq!(round_trip(&high, &values, 100), values);
    }

    #[test]
    fn test_full_u64_range() {
        let top = u64::MAX;

        let low = RangeCoder::new(-50.0, 4.0).unwrap();
        assert_eq!(low.layout(top), Layout::Window { start: 0, width: 4 });
        let values = [0, 3, 4, top - 1, top];
        assert_eq!(round_trip(&low, &values, top), values);

        let high = RangeCoder::new(1e30, 4.0).unwrap();
        assert_eq!(high.layout(top), Layout::Window { start: top - 3, width: 4 });
        assert_eq!(high.encoded_len(5, top).unwrap(), 1 + bounded_width(top - 3));
        assert_eq!(high.encoded_len(top, top).unwrap(), 1 + bounded_width(4));
        let values = [0, 5, top - 4, top - 3, top];
        assert_eq!(round_trip(&high, &values, top), values);

        let middle = RangeCoder::new(1e18, 4.0).unwrap();
        let values = [0, 999_999_999_999_999_998, 1_000_000_000_000_000_000, top];
        assert_eq!(round_trip(&middle, &values, top), values);
    }

    #[test]
    fn test_value_above_max_rejected() {
        let coder = RangeCoder::new(10.0, 2.0).unwrap();
        let mut writer = BitWriter::new();
        let err = coder.encode(&mut writer, 21, 20).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_sweep_small_ranges() {
        for max in 0..200u64 {
            for &(mean, std_dev) in &[(0.0, 0.3), (max as f64 / 2.0, 1.0), (max as f64 / 3.0, 5.0), (max as f64, 2.5)] {
                let coder = RangeCoder::new(mean, std_dev).unwrap();
                let values: Vec<u64> = (0..=max).collect();
                assert_eq!(round_trip(&coder, &values, max), values, "max {max} mean {mean} sd {std_dev}");
            }
        }
    }

    #[quickcheck]
    fn prop_round_trip(mean: f64, std_dev: f64, max: u64, value: u64) -> bool {
        // Mean anywhere from well below 0 to well above max.
        let mean = if mean.is_finite() { (mean % 1.5) * max as f64 } else { max as f64 };
        let std_dev = if std_dev.is_finite() { std_dev.abs() % 1e9 + 0.01 } else { 1.0 };
        let value = match max.checked_add(1) {
            Some(span) => value % span,
            None => value,
        };
        let coder = RangeCoder::new(mean, std_dev).unwrap();
        round_trip(&coder, &[value, max, 0], max) == vec![value, max, 0]
    }
}
