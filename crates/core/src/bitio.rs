//! Bit-level I/O: cursors that read and write individual bits and small
//! integer codes over a byte stream.
//!
//! Both directions are MSB-first. Every reader operation has a writer
//! counterpart and writing then reading any field is the identity.
//!
//! # Integer codes
//! - `bounded_long(max)`: exactly [`bounded_width`]`(max)` raw bits
//! - `var_long`: 2-bit selector into [`VAR_LONG_WIDTHS`], then the payload
//! - `var_short`: 1-bit selector into a pair of widths (default
//!   [`VAR_SHORT_WIDTHS`]), then the payload
//!
//! # Padding Rules
//! - BitWriter: pads incomplete bytes with trailing zeros
//! - BitReader: cannot tell padding from data; the caller's format must know
//!   where it ends
//!
//! # Example
//! ```
//! use countcodec_core::bitio::{BitWriter, BitReader};
//!
//! let mut writer = BitWriter::new();
//! writer.write_bounded_long(3, 5).unwrap();  // 3 bits: 011
//! writer.write_var_long(1000).unwrap();      // 2 + 16 bits
//!
//! let bytes = writer.finish();
//! let mut reader = BitReader::new(bytes.as_slice());
//! assert_eq!(reader.read_bounded_long(5).unwrap(), 3);
//! assert_eq!(reader.read_var_long().unwrap(), 1000);
//! ```

use std::io::{ErrorKind, Read};

use crate::bitvec::{bit_length, BitVector};
use crate::error::{BitIoError, Result};

/// Payload widths selected by the 2-bit `var_long` selector.
pub const VAR_LONG_WIDTHS: [usize; 4] = [6, 16, 32, 64];

/// Default payload widths selected by the 1-bit `var_short` selector.
pub const VAR_SHORT_WIDTHS: [usize; 2] = [7, 16];

/// Width of a `bounded_long` field able to hold any value in `[0, max]`.
///
/// Zero when `max` is zero, otherwise `floor(log2(max)) + 1`.
pub fn bounded_width(max: u64) -> usize {
    bit_length(max)
}

/// Writes bits MSB-first into a byte buffer.
///
/// Accumulates bits in a buffer and flushes complete bytes to the output.
/// When finished, pads the final partial byte with zeros.
///
/// # Invariants
/// - `bit_buffer` contains up to 7 bits (never a full byte)
/// - `bit_count` is always < 8
#[derive(Debug, Clone)]
pub struct BitWriter {
    /// Completed bytes
    bytes: Vec<u8>,
    /// Accumulator for the current partial byte (MSB-aligned)
    bit_buffer: u8,
    /// Number of bits in bit_buffer (0-7)
    bit_count: u8,
}

impl BitWriter {
    /// Create a new BitWriter with empty output.
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bit_buffer: 0,
            bit_count: 0,
        }
    }

    /// Write up to 64 bits to the output.
    ///
    /// Bits are written MSB-first. For example, writing value=0b101 with count=3
    /// writes bits 1, 0, 1 in that order.
    ///
    /// # Errors
    /// Returns `BitIoError::InvalidBitCount` if count > 64.
    pub fn write_bits(&mut self, value: u64, count: usize) -> Result<()> {
        if count > 64 {
            return Err(BitIoError::InvalidBitCount(count).into());
        }

        let mut remaining = count;
        let mut val = if count == 64 { value } else { value & ((1u64 << count) - 1) };

        while remaining > 0 {
            // How many bits fit into the current byte?
            let bits_to_write = remaining.min(8 - self.bit_count as usize);

            // Extract the top bits_to_write bits from val
            let shift = remaining - bits_to_write;
            let bits = ((val >> shift) & ((1 << bits_to_write) - 1)) as u8;

            self.bit_buffer |= bits << (8 - self.bit_count as usize - bits_to_write);
            self.bit_count += bits_to_write as u8;

            if self.bit_count == 8 {
                self.bytes.push(self.bit_buffer);
                self.bit_buffer = 0;
                self.bit_count = 0;
            }

            val &= (1 << shift) - 1;
            remaining -= bits_to_write;
        }

        Ok(())
    }

    /// Write every bit of `bits`.
    pub fn write(&mut self, bits: &BitVector) -> Result<()> {
        let tail = bits.len() % 8;
        let bytes = bits.as_bytes();
        let full = bits.len() / 8;
        for &b in &bytes[..full] {
            self.write_bits(b as u64, 8)?;
        }
        if tail != 0 {
            self.write_bits((bytes[full] >> (8 - tail)) as u64, tail)?;
        }
        Ok(())
    }

    /// Write a single bit.
    pub fn write_bool(&mut self, bit: bool) -> Result<()> {
        self.write_bits(bit as u64, 1)
    }

    /// Write a fixed 32-bit field.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_bits(value as u64, 32)
    }

    /// Write `value` in exactly `bounded_width(max)` bits.
    ///
    /// # Errors
    /// `BitIoError::ValueOutOfRange` if `value > max`.
    pub fn write_bounded_long(&mut self, value: u64, max: u64) -> Result<()> {
        if value > max {
            return Err(BitIoError::ValueOutOfRange { value, max }.into());
        }
        self.write_bits(value, bounded_width(max))
    }

    /// Write `value` behind a 2-bit width selector.
    pub fn write_var_long(&mut self, value: u64) -> Result<()> {
        let needed = bit_length(value);
        let selector = VAR_LONG_WIDTHS
            .iter()
            .position(|&w| needed <= w)
            .unwrap_or(VAR_LONG_WIDTHS.len() - 1);
        self.write_bits(selector as u64, 2)?;
        self.write_bits(value, VAR_LONG_WIDTHS[selector])
    }

    /// Write `value` behind a 1-bit selector using the default widths.
    pub fn write_var_short(&mut self, value: u16) -> Result<()> {
        self.write_var_short_with(value as u64, VAR_SHORT_WIDTHS)
    }

    /// Write `value` behind a 1-bit selector choosing between `widths`.
    ///
    /// # Errors
    /// `BitIoError::ValueOutOfRange` if `value` needs more than `widths[1]` bits.
    pub fn write_var_short_with(&mut self, value: u64, widths: [usize; 2]) -> Result<()> {
        let needed = bit_length(value);
        if needed <= widths[0] {
            self.write_bool(false)?;
            self.write_bits(value, widths[0])
        } else if needed <= widths[1] {
            self.write_bool(true)?;
            self.write_bits(value, widths[1])
        } else {
            Err(BitIoError::ValueOutOfRange {
                value,
                max: max_for_width(widths[1]),
            }
            .into())
        }
    }

    /// Finish writing and return the output bytes.
    ///
    /// If there are any remaining bits in the buffer, they are padded with
    /// trailing zeros to complete the final byte.
    ///
    /// This consumes the writer.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.bytes.push(self.bit_buffer);
        }
        self.bytes
    }

    /// Finish writing and return the output with its exact bit length.
    pub fn into_bit_vector(self) -> BitVector {
        let len = self.bit_len();
        let bytes = self.finish();
        BitVector::from_bytes(&bytes, len).unwrap_or_default()
    }

    /// Return the number of complete bytes written so far.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Return the total number of bits written (including partial byte).
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 + self.bit_count as usize
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn max_for_width(width: usize) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Largest number of bytes pulled from the source in one read.
const FILL_CHUNK: usize = 64;

/// Reads bits MSB-first from a byte source.
///
/// Whole bytes are pulled from the source on demand into a look-ahead
/// remainder, which lets [`peek`](Self::peek) inspect upcoming bits without
/// consuming them. A reader owns its cursor and is meant for one session.
#[derive(Debug)]
pub struct BitReader<R> {
    /// Byte source
    source: R,
    /// Bits pulled from the source but not yet consumed
    remainder: BitVector,
    /// Bits consumed so far
    position: usize,
}

impl<R: Read> BitReader<R> {
    /// Create a new BitReader over the given source.
    pub fn new(source: R) -> Self {
        Self {
            source,
            remainder: BitVector::empty(),
            position: 0,
        }
    }

    /// Pull whole bytes until at least `bits` are buffered or the source ends.
    ///
    /// At most [`FILL_CHUNK`] bytes are requested per pull, so an oversized
    /// request runs into end of stream rather than a huge allocation.
    fn fill(&mut self, bits: usize) -> Result<()> {
        let mut buf = [0u8; FILL_CHUNK];
        while self.remainder.len() < bits {
            let want = (bits - self.remainder.len()).div_ceil(8).min(FILL_CHUNK);
            let got = match self.source.read(&mut buf[..want]) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if got == 0 {
                break;
            }
            let more = BitVector::from_bytes(&buf[..got], got * 8)?;
            self.remainder = self.remainder.concat(&more);
        }
        Ok(())
    }

    /// Read and consume the next `count` bits.
    ///
    /// # Errors
    /// `BitIoError::UnexpectedEof` if the source ends first. Nothing is
    /// consumed in that case.
    pub fn read(&mut self, count: usize) -> Result<BitVector> {
        self.fill(count)?;
        if self.remainder.len() < count {
            return Err(BitIoError::UnexpectedEof {
                requested: count,
                available: self.remainder.len(),
            }
            .into());
        }
        let bits = self.remainder.prefix(count)?;
        self.remainder = self.remainder.skip(count)?;
        self.position += count;
        Ok(bits)
    }

    /// Return up to `count` upcoming bits without consuming them.
    ///
    /// Fewer bits are returned only when the stream ends.
    pub fn peek(&mut self, count: usize) -> Result<BitVector> {
        self.fill(count)?;
        self.remainder.prefix(count.min(self.remainder.len()))
    }

    /// Read up to 64 bits as an unsigned integer.
    ///
    /// # Errors
    /// - `BitIoError::InvalidBitCount` if count > 64
    /// - `BitIoError::UnexpectedEof` if not enough bits remain
    pub fn read_bits(&mut self, count: usize) -> Result<u64> {
        if count > 64 {
            return Err(BitIoError::InvalidBitCount(count).into());
        }
        self.read(count)?.to_u64()
    }

    /// Read a single bit (0 or 1).
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Read a fixed 32-bit field.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.read_bits(32)? as u32)
    }

    /// Read a value written by [`BitWriter::write_bounded_long`].
    ///
    /// # Errors
    /// `BitIoError::BoundExceeded` if the stored value exceeds `max`.
    pub fn read_bounded_long(&mut self, max: u64) -> Result<u64> {
        let value = self.read_bits(bounded_width(max))?;
        if value > max {
            return Err(BitIoError::BoundExceeded { value, max }.into());
        }
        Ok(value)
    }

    /// Read a value written by [`BitWriter::write_var_long`].
    pub fn read_var_long(&mut self) -> Result<u64> {
        let selector = self.read_bits(2)? as usize;
        self.read_bits(VAR_LONG_WIDTHS[selector])
    }

    /// Read a value written by [`BitWriter::write_var_short`].
    pub fn read_var_short(&mut self) -> Result<u16> {
        Ok(self.read_var_short_with(VAR_SHORT_WIDTHS)? as u16)
    }

    /// Read a value written by [`BitWriter::write_var_short_with`].
    pub fn read_var_short_with(&mut self, widths: [usize; 2]) -> Result<u64> {
        let width = if self.read_bool()? { widths[1] } else { widths[0] };
        self.read_bits(width)
    }

    /// Read `expected.len()` bits and require them to equal `expected`.
    ///
    /// # Errors
    /// `BitIoError::Mismatch` if the bits differ.
    pub fn expect(&mut self, expected: &BitVector) -> Result<()> {
        let actual = self.read(expected.len())?;
        if &actual != expected {
            return Err(BitIoError::Mismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Map the upcoming bits proportionally into `[0, max)` without consuming.
    ///
    /// The window is one bit wider than `bounded_width(max)`; a stream that
    /// ends early is treated as zero-padded.
    pub fn peek_long_coord(&mut self, max: u64) -> Result<u64> {
        if max <= 1 {
            return Ok(0);
        }
        let width = (bounded_width(max) + 1).min(64);
        let window = self.peek(width)?.pad_right(width).to_u64()?;
        Ok(((window as u128 * max as u128) >> width) as u64)
    }

    /// 32-bit flavour of [`peek_long_coord`](Self::peek_long_coord).
    pub fn peek_int_coord(&mut self, max: u32) -> Result<u32> {
        Ok(self.peek_long_coord(max as u64)? as u32)
    }

    /// Return the number of bits consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// True if no further bits can be read.
    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.peek(1)?.is_empty())
    }

    /// Release the byte source. Buffered look-ahead bits are dropped.
    pub fn into_inner(self) -> R {
        self.source
    }
}
