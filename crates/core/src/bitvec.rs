//! Immutable, fixed-length bit vectors.
//!
//! A [`BitVector`] is a logical bit length plus a packed byte buffer of
//! `ceil(len / 8)` bytes, most significant bit first. Unused bits in the last
//! byte are always zero, so two vectors are equal exactly when their lengths
//! and packed bytes are equal.
//!
//! # Ordering
//!
//! Vectors order lexicographically over their packed bytes, with a shorter
//! vector sorting before any longer vector it is a prefix of. Under this
//! order every vector sharing a prefix `p` forms one contiguous run starting
//! at `p` itself, which is what makes range scans over a sorted map answer
//! "is a prefix of" questions.
//!
//! # Example
//! ```
//! use countcodec_core::bitvec::BitVector;
//!
//! let v = BitVector::from_u64(5, 4).unwrap();
//! assert_eq!(v.to_string(), "0101");
//! assert!(v.starts_with(&"01".parse().unwrap()));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor};
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::Rng;

use crate::error::{BitVectorError, Result};

/// Number of bytes needed to hold `bits` bits.
fn byte_len(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Minimal number of bits needed to represent `value` (0 for 0).
pub fn bit_length(value: u64) -> usize {
    (u64::BITS - value.leading_zeros()) as usize
}

/// An immutable sequence of bits with an explicit logical length.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BitVector {
    /// Packed bits, MSB-first; trailing pad bits are zero
    bytes: Vec<u8>,
    /// Logical length in bits
    len: usize,
}

impl BitVector {
    /// The empty vector.
    pub const fn empty() -> Self {
        Self {
            bytes: Vec::new(),
            len: 0,
        }
    }

    /// The single bit `0`.
    pub fn zero() -> Self {
        Self {
            bytes: vec![0],
            len: 1,
        }
    }

    /// The single bit `1`.
    pub fn one() -> Self {
        Self {
            bytes: vec![0x80],
            len: 1,
        }
    }

    /// A vector of `len` zero bits.
    pub fn zeros(len: usize) -> Self {
        Self {
            bytes: vec![0; byte_len(len)],
            len,
        }
    }

    /// Build from packed bytes and an explicit length.
    ///
    /// Extra bytes beyond `ceil(len / 8)` are ignored and pad bits in the last
    /// byte are cleared.
    ///
    /// # Errors
    /// `BitVectorError::BufferTooShort` if `bytes` cannot hold `len` bits.
    pub fn from_bytes(bytes: &[u8], len: usize) -> Result<Self> {
        let needed = byte_len(len);
        if bytes.len() < needed {
            return Err(BitVectorError::BufferTooShort {
                bits: len,
                bytes: bytes.len(),
            }
            .into());
        }
        Ok(Self::from_raw(bytes[..needed].to_vec(), len))
    }

    /// Build from the low bits of an integer.
    ///
    /// `len` may exceed 64, in which case the value is left-padded with zeros.
    ///
    /// # Errors
    /// `BitVectorError::ValueTooWide` if `value` needs more than `len` bits.
    pub fn from_u64(value: u64, len: usize) -> Result<Self> {
        if bit_length(value) > len {
            return Err(BitVectorError::ValueTooWide { value, bits: len }.into());
        }
        if len > 64 {
            return Ok(Self::zeros(len - 64).concat(&Self::from_u64(value, 64)?));
        }
        if len == 0 {
            return Ok(Self::empty());
        }
        let aligned = value << (64 - len);
        Ok(Self::from_raw(aligned.to_be_bytes()[..byte_len(len)].to_vec(), len))
    }

    /// A vector of `len` uniformly random bits.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Self {
        let mut bytes = vec![0u8; byte_len(len)];
        rng.fill(bytes.as_mut_slice());
        Self::from_raw(bytes, len)
    }

    /// Wrap a buffer of exactly `byte_len(len)` bytes, clearing pad bits.
    fn from_raw(mut bytes: Vec<u8>, len: usize) -> Self {
        debug_assert_eq!(bytes.len(), byte_len(len));
        let tail = len % 8;
        if tail != 0 {
            if let Some(last) = bytes.last_mut() {
                *last &= 0xFFu8 << (8 - tail);
            }
        }
        Self { bytes, len }
    }

    /// Logical length in bits.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Packed bytes, MSB-first, zero padded.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The bit at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        Some(self.bytes[index / 8] & (0x80 >> (index % 8)) != 0)
    }

    /// Iterate over the bits in order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.bytes[i / 8] & (0x80 >> (i % 8)) != 0)
    }

    /// Slice `len` bits starting at bit `start`.
    ///
    /// # Errors
    /// `BitVectorError::OutOfBounds` if the slice reaches past the end.
    pub fn range(&self, start: usize, len: usize) -> Result<Self> {
        let end = start.checked_add(len).filter(|&end| end <= self.len).ok_or(
            BitVectorError::OutOfBounds {
                start,
                end: start.saturating_add(len),
                len: self.len,
            },
        )?;
        if len == 0 {
            return Ok(Self::empty());
        }
        let first = start / 8;
        let shift = start % 8;
        let out_len = byte_len(len);
        let bytes = if shift == 0 {
            self.bytes[first..first + out_len].to_vec()
        } else {
            let last = byte_len(end);
            (0..out_len)
                .map(|k| {
                    let hi = self.bytes[first + k] << shift;
                    let lo = if first + k + 1 < last {
                        self.bytes[first + k + 1] >> (8 - shift)
                    } else {
                        0
                    };
                    hi | lo
                })
                .collect()
        };
        Ok(Self::from_raw(bytes, len))
    }

    /// The first `len` bits.
    pub fn prefix(&self, len: usize) -> Result<Self> {
        self.range(0, len)
    }

    /// Everything after the first `start` bits.
    pub fn skip(&self, start: usize) -> Result<Self> {
        let rest = self.len.checked_sub(start).ok_or(BitVectorError::OutOfBounds {
            start,
            end: start,
            len: self.len,
        })?;
        self.range(start, rest)
    }

    /// `self` followed by `other`.
    pub fn concat(&self, other: &BitVector) -> Self {
        let len = self.len + other.len;
        let shift = self.len % 8;
        let mut bytes = self.bytes.clone();
        if shift == 0 {
            bytes.extend_from_slice(&other.bytes);
        } else {
            for &b in &other.bytes {
                if let Some(last) = bytes.last_mut() {
                    *last |= b >> shift;
                }
                bytes.push(b << (8 - shift));
            }
        }
        bytes.truncate(byte_len(len));
        Self::from_raw(bytes, len)
    }

    /// Append `n` zero bits.
    pub fn shift_left(&self, n: usize) -> Self {
        self.concat(&Self::zeros(n))
    }

    /// Drop the last `n` bits.
    ///
    /// # Errors
    /// `BitVectorError::OutOfBounds` if `n` exceeds the length.
    pub fn shift_right(&self, n: usize) -> Result<Self> {
        match self.len.checked_sub(n) {
            Some(keep) => self.range(0, keep),
            None => Err(BitVectorError::OutOfBounds {
                start: 0,
                end: n,
                len: self.len,
            }
            .into()),
        }
    }

    /// Left-pad with zeros up to `target` bits; longer vectors are unchanged.
    pub fn pad_left(&self, target: usize) -> Self {
        if self.len >= target {
            return self.clone();
        }
        Self::zeros(target - self.len).concat(self)
    }

    /// Right-pad with zeros up to `target` bits; longer vectors are unchanged.
    pub fn pad_right(&self, target: usize) -> Self {
        if self.len >= target {
            return self.clone();
        }
        self.shift_left(target - self.len)
    }

    /// True if `prefix` is a (not necessarily proper) prefix of `self`.
    pub fn starts_with(&self, prefix: &BitVector) -> bool {
        if prefix.len > self.len {
            return false;
        }
        let full = prefix.len / 8;
        if self.bytes[..full] != prefix.bytes[..full] {
            return false;
        }
        let tail = prefix.len % 8;
        if tail == 0 {
            return true;
        }
        let mask = 0xFFu8 << (8 - tail);
        self.bytes[full] & mask == prefix.bytes[full]
    }

    /// Bits as an unsigned integer.
    ///
    /// # Errors
    /// `BitVectorError::TooLong` if the vector is longer than 64 bits.
    pub fn to_u64(&self) -> Result<u64> {
        if self.len > 64 {
            return Err(BitVectorError::TooLong(self.len).into());
        }
        let mut buf = [0u8; 8];
        buf[..self.bytes.len()].copy_from_slice(&self.bytes);
        let aligned = u64::from_be_bytes(buf);
        Ok(if self.len == 0 { 0 } else { aligned >> (64 - self.len) })
    }

    /// Bits as a `'0'`/`'1'` string.
    pub fn to_bit_string(&self) -> String {
        self.iter().map(|b| if b { '1' } else { '0' }).collect()
    }

    /// Packed bytes as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Packed bytes as standard base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    fn zip_bytes(&self, other: &BitVector, op: impl Fn(u8, u8) -> u8) -> Self {
        let len = self.len.max(other.len);
        let bytes = (0..byte_len(len))
            .map(|i| {
                let a = self.bytes.get(i).copied().unwrap_or(0);
                let b = other.bytes.get(i).copied().unwrap_or(0);
                op(a, b)
            })
            .collect();
        Self::from_raw(bytes, len)
    }
}

impl Ord for BitVector {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes
            .cmp(&other.bytes)
            .then_with(|| self.len.cmp(&other.len))
    }
}

impl PartialOrd for BitVector {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bit_string())
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({:?})", self.to_bit_string())
    }
}

impl FromStr for BitVector {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        let len = s.chars().count();
        let mut bytes = vec![0u8; byte_len(len)];
        for (i, c) in s.chars().enumerate() {
            match c {
                '0' => {}
                '1' => bytes[i / 8] |= 0x80 >> (i % 8),
                other => return Err(BitVectorError::InvalidChar(other).into()),
            }
        }
        Ok(Self { bytes, len })
    }
}

impl From<bool> for BitVector {
    fn from(bit: bool) -> Self {
        if bit {
            Self::one()
        } else {
            Self::zero()
        }
    }
}

// The shorter operand is zero-extended on the right.
impl BitAnd for &BitVector {
    type Output = BitVector;

    fn bitand(self, rhs: &BitVector) -> BitVector {
        self.zip_bytes(rhs, |a, b| a & b)
    }
}

impl BitOr for &BitVector {
    type Output = BitVector;

    fn bitor(self, rhs: &BitVector) -> BitVector {
        self.zip_bytes(rhs, |a, b| a | b)
    }
}

impl BitXor for &BitVector {
    type Output = BitVector;

    fn bitxor(self, rhs: &BitVector) -> BitVector {
        self.zip_bytes(rhs, |a, b| a ^ b)
    }
}
