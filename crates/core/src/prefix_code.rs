//! Weight-optimal prefix-free codes.
//!
//! A [`PrefixCodeBook`] is built from a weighted symbol table by repeatedly
//! merging the two lightest partial codes, the way a Huffman tree is grown.
//! Ties on weight are broken by the smallest member symbol, so the same table
//! always yields the same code assignment.
//!
//! Once built the book is immutable and can be shared between threads for
//! concurrent `encode` / `decode` calls.
//!
//! # Example
//! ```
//! use countcodec_core::prefix_code::PrefixCodeBook;
//!
//! let book = PrefixCodeBook::build([('A', 5), ('B', 1), ('C', 1)]).unwrap();
//! assert_eq!(book.encode(&'A').unwrap().len(), 1);
//! assert_eq!(book.encode(&'B').unwrap().len(), 2);
//! ```

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use std::io::Read;
use std::ops::Bound;

use crate::bitio::{BitReader, BitWriter};
use crate::bitvec::BitVector;
use crate::count_map::{CountCodec, CountMap};
use crate::error::{BitIoError, PrefixCodeError, Result};
use crate::trie_codec::TrieCountCodec;

/// A symbol table mapping every symbol to a prefix-free code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixCodeBook<T> {
    /// code -> symbol
    forward: BTreeMap<BitVector, T>,
    /// symbol -> code
    reverse: BTreeMap<T, BitVector>,
    /// symbol -> weight
    weights: BTreeMap<T, u64>,
}

/// A subtree under construction: its total weight and each member's suffix.
#[derive(Debug)]
struct PartialCode<T> {
    weight: u64,
    members: BTreeMap<T, BitVector>,
}

impl<T: Ord> PartialCode<T> {
    fn smallest(&self) -> Option<&T> {
        self.members.keys().next()
    }

    /// Prefix every member's code with `bit`.
    fn prefixed(self, bit: bool) -> impl Iterator<Item = (T, BitVector)> {
        let lead = BitVector::from(bit);
        self.members
            .into_iter()
            .map(move |(symbol, code)| (symbol, lead.concat(&code)))
    }
}

impl<T: Ord> PartialEq for PartialCode<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Ord> Eq for PartialCode<T> {}

impl<T: Ord> Ord for PartialCode<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .cmp(&other.weight)
            .then_with(|| self.smallest().cmp(&other.smallest()))
    }
}

impl<T: Ord> PartialOrd for PartialCode<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord + Clone> PrefixCodeBook<T> {
    /// Build the book for a weighted symbol table.
    ///
    /// Repeated symbols have their weights summed. An empty table gives an
    /// empty book and a single symbol gets the empty code.
    ///
    /// # Errors
    /// - `PrefixCodeError::ZeroWeight` if any weight is zero
    /// - `PrefixCodeError::NotPrefixFree` / `IndexMismatch` if the result
    ///   fails its self-check
    pub fn build<I>(table: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T, u64)>,
    {
        let mut weights = BTreeMap::new();
        for (symbol, weight) in table {
            if weight == 0 {
                return Err(PrefixCodeError::ZeroWeight.into());
            }
            let total = weights.entry(symbol).or_insert(0u64);
            *total = total.saturating_add(weight);
        }

        let mut heap: BinaryHeap<Reverse<PartialCode<T>>> = weights
            .iter()
            .map(|(symbol, &weight)| {
                Reverse(PartialCode {
                    weight,
                    members: BTreeMap::from([(symbol.clone(), BitVector::empty())]),
                })
            })
            .collect();

        while heap.len() > 1 {
            let (Some(Reverse(zero)), Some(Reverse(one))) = (heap.pop(), heap.pop()) else {
                break;
            };
            let weight = zero.weight.saturating_add(one.weight);
            let members = zero.prefixed(false).chain(one.prefixed(true)).collect();
            heap.push(Reverse(PartialCode { weight, members }));
        }

        let reverse: BTreeMap<T, BitVector> = heap
            .pop()
            .map(|Reverse(root)| root.members)
            .unwrap_or_default();
        let forward = reverse
            .iter()
            .map(|(symbol, code)| (code.clone(), symbol.clone()))
            .collect();

        let book = Self {
            forward,
            reverse,
            weights,
        };
        book.verify()?;
        tracing::debug!(
            symbols = book.len(),
            max_code_len = book.max_code_len(),
            "built prefix code book"
        );
        Ok(book)
    }

    /// Check that codes are prefix-free and both indices agree.
    pub fn verify(&self) -> Result<()> {
        // Under BitVector ordering a prefix sorts immediately before the
        // codes extending it, so adjacent pairs are enough.
        let codes: Vec<&BitVector> = self.forward.keys().collect();
        for pair in codes.windows(2) {
            if pair[1].starts_with(pair[0]) {
                return Err(PrefixCodeError::NotPrefixFree {
                    prefix: pair[0].to_string(),
                    code: pair[1].to_string(),
                }
                .into());
            }
        }
        if self.forward.len() != self.reverse.len() || self.forward.len() != self.weights.len() {
            return Err(PrefixCodeError::IndexMismatch.into());
        }
        for (code, symbol) in &self.forward {
            if self.reverse.get(symbol) != Some(code) {
                return Err(PrefixCodeError::IndexMismatch.into());
            }
        }
        Ok(())
    }

    /// The code assigned to `symbol`.
    ///
    /// # Errors
    /// `PrefixCodeError::SymbolNotFound` if the symbol was not in the table.
    pub fn encode(&self, symbol: &T) -> Result<&BitVector> {
        self.reverse
            .get(symbol)
            .ok_or_else(|| PrefixCodeError::SymbolNotFound.into())
    }

    /// Write the code for `symbol`.
    pub fn encode_to(&self, symbol: &T, out: &mut BitWriter) -> Result<()> {
        out.write(self.encode(symbol)?)
    }

    /// Write the codes for a sequence of symbols.
    pub fn encode_all<'a, I>(&self, symbols: I, out: &mut BitWriter) -> Result<()>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        for symbol in symbols {
            self.encode_to(symbol, out)?;
        }
        Ok(())
    }

    /// Find the stored code that prefixes `bits`, if any.
    pub fn decode(&self, bits: &BitVector) -> Option<(&BitVector, &T)> {
        // Only the greatest code <= bits can be a prefix of it.
        self.forward
            .range::<BitVector, _>((Bound::Unbounded, Bound::Included(bits)))
            .next_back()
            .filter(|(code, _)| bits.starts_with(code))
    }

    /// Read one symbol from a stream.
    ///
    /// Look-ahead grows a byte at a time until it holds a complete code, then
    /// exactly that code's bits are consumed.
    ///
    /// # Errors
    /// - `BitIoError::UnexpectedEof` if the stream ends before a code matches
    /// - `PrefixCodeError::NoMatchingCode` if no code can ever match
    pub fn decode_stream<R: Read>(&self, input: &mut BitReader<R>) -> Result<&T> {
        let longest = self.max_code_len();
        let mut want = 8;
        loop {
            let window = input.peek(want)?;
            if let Some((code, symbol)) = self.decode(&window) {
                input.read(code.len())?;
                return Ok(symbol);
            }
            if window.len() < want {
                return Err(BitIoError::UnexpectedEof {
                    requested: want,
                    available: window.len(),
                }
                .into());
            }
            if self.forward.is_empty() || window.len() >= longest {
                return Err(PrefixCodeError::NoMatchingCode {
                    bits: window.to_string(),
                }
                .into());
            }
            want += 8;
        }
    }

    /// Read `count` symbols from a stream.
    pub fn decode_all<R: Read>(&self, input: &mut BitReader<R>, count: usize) -> Result<Vec<T>> {
        (0..count)
            .map(|_| self.decode_stream(input).cloned())
            .collect()
    }

    /// All codes at or after `from`, in code order.
    pub fn codes_from<'a>(&'a self, from: &BitVector) -> impl Iterator<Item = (&'a BitVector, &'a T)> {
        self.forward
            .range::<BitVector, _>((Bound::Included(from), Bound::Unbounded))
    }

    /// All codes starting with `prefix`, in code order.
    pub fn codes_with_prefix<'a>(
        &'a self,
        prefix: &'a BitVector,
    ) -> impl Iterator<Item = (&'a BitVector, &'a T)> {
        self.codes_from(prefix)
            .take_while(move |(code, _)| code.starts_with(prefix))
    }

    /// Weight the symbol was built with.
    pub fn weight(&self, symbol: &T) -> Option<u64> {
        self.weights.get(symbol).copied()
    }

    /// Total coded length of the weighted table, in bits.
    pub fn expected_bits(&self) -> u64 {
        self.reverse
            .iter()
            .map(|(symbol, code)| self.weights[symbol].saturating_mul(code.len() as u64))
            .sum()
    }

    /// Length of the longest code.
    pub fn max_code_len(&self) -> usize {
        self.forward.keys().map(BitVector::len).max().unwrap_or(0)
    }

    /// Iterate over `(code, symbol)` in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&BitVector, &T)> {
        self.forward.iter()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

impl PrefixCodeBook<BitVector> {
    /// Persist the weight table through the trie codec.
    ///
    /// Building is deterministic, so [`read_weights`](Self::read_weights)
    /// reproduces the same codes.
    pub fn write_weights(&self, codec: &TrieCountCodec, out: &mut BitWriter) -> Result<()> {
        let mut map = CountMap::new();
        for (symbol, &weight) in &self.weights {
            map.increment(symbol.clone(), weight)?;
        }
        codec.write(&map, out)
    }

    /// Rebuild a book persisted by [`write_weights`](Self::write_weights).
    pub fn read_weights<R: Read>(codec: &TrieCountCodec, input: &mut BitReader<R>) -> Result<Self> {
        let mut map = CountMap::new();
        codec.read(input, &mut map)?;
        Self::build(map.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use quickcheck_macros::quickcheck;
    use std::collections::BTreeSet;

    fn bits(s: &str) -> BitVector {
        s.parse().unwrap()
    }

    #[test]
    fn test_skewed_table() {
        let book = PrefixCodeBook::build([('A', 5), ('B', 1), ('C', 1)]).unwrap();
        assert_eq!(book.encode(&'A').unwrap(), &bits("1"));
        assert_eq!(book.encode(&'B').unwrap(), &bits("00"));
        assert_eq!(book.encode(&'C').unwrap(), &bits("01"));
        assert_eq!(book.expected_bits(), 9);
        assert_eq!(book.weight(&'A'), Some(5));
        assert_eq!(book.len(), 3);
    }

    #[test]
    fn test_degenerate_tables() {
        let empty = PrefixCodeBook::<u8>::build([]).unwrap();
        assert!(empty.is_empty());
        assert!(empty.decode(&bits("0101")).is_none());

        let single = PrefixCodeBook::build([(7u8, 3)]).unwrap();
        assert_eq!(single.encode(&7).unwrap(), &BitVector::empty());
        let mut reader = BitReader::new(&[0u8; 0][..]);
        assert_eq!(single.decode_stream(&mut reader).unwrap(), &7);
    }

    #[test]
    fn test_zero_weight_rejected() {
        let err = PrefixCodeBook::build([(1u8, 2), (2, 0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_unknown_symbol() {
        let book = PrefixCodeBook::build([(1u8, 2), (2, 3)]).unwrap();
        assert_eq!(book.encode(&9).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_duplicate_symbols_sum() {
        let book = PrefixCodeBook::build([("x", 2), ("y", 1), ("x", 3)]).unwrap();
        assert_eq!(book.weight(&"x"), Some(5));
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_tie_break_is_deterministic() {
        let a = PrefixCodeBook::build([(3u8, 1), (1, 1), (2, 1), (4, 1)]).unwrap();
        let b = PrefixCodeBook::build([(4u8, 1), (2, 1), (1, 1), (3, 1)]).unwrap();
        assert_eq!(a, b);
        // 1 and 2 merge first and take the 0 branch.
        assert_eq!(a.encode(&1).unwrap(), &bits("00"));
        assert_eq!(a.encode(&2).unwrap(), &bits("01"));
        assert_eq!(a.encode(&3).unwrap(), &bits("10"));
        assert_eq!(a.encode(&4).unwrap(), &bits("11"));
    }

    #[test]
    fn test_decode_lookup() {
        let book = PrefixCodeBook::build([('A', 5), ('B', 1), ('C', 1)]).unwrap();
        assert_eq!(book.decode(&bits("0110")), Some((&bits("01"), &'C')));
        assert_eq!(book.decode(&bits("1")), Some((&bits("1"), &'A')));
        assert_eq!(book.decode(&bits("0")), None);
        assert_eq!(book.decode(&BitVector::empty()), None);
    }

    #[test]
    fn test_stream_round_trip() {
        let text = b"abracadabra, the quick brown fox";
        let mut counts = BTreeMap::new();
        for &c in text.iter() {
            *counts.entry(c).or_insert(0u64) += 1;
        }
        let book = PrefixCodeBook::build(counts).unwrap();

        let mut writer = BitWriter::new();
        book.encode_all(text.iter(), &mut writer).unwrap();
        assert_eq!(writer.bit_len() as u64, book.expected_bits());

        let bytes = writer.finish();
        let mut reader = BitReader::new(bytes.as_slice());
        assert_eq!(book.decode_all(&mut reader, text.len()).unwrap(), text.to_vec());
    }

    #[test]
    fn test_stream_end_without_match() {
        let book = PrefixCodeBook::build([('A', 5), ('B', 1), ('C', 1)]).unwrap();
        let data = [0u8];
        let mut reader = BitReader::new(&data[..]);
        for _ in 0..4 {
            assert_eq!(book.decode_stream(&mut reader).unwrap(), &'B');
        }
        let err = book.decode_stream(&mut reader).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndOfStream);
    }

    #[test]
    fn test_codes_from() {
        let book = PrefixCodeBook::build([('A', 5), ('B', 1), ('C', 1)]).unwrap();
        let after: Vec<char> = book.codes_from(&bits("01")).map(|(_, s)| *s).collect();
        assert_eq!(after, vec!['C', 'A']);
        let zeros: Vec<char> = book.codes_with_prefix(&bits("0")).map(|(_, s)| *s).collect();
        assert_eq!(zeros, vec!['B', 'C']);
    }

    #[test]
    fn test_weights_persist_through_trie_codec() {
        let table = [(bits("0"), 4), (bits("01"), 9), (bits("111"), 1), (bits("10"), 2)];
        let book = PrefixCodeBook::build(table).unwrap();
        let codec = TrieCountCodec::default();

        let mut writer = BitWriter::new();
        book.write_weights(&codec, &mut writer).unwrap();
        let bytes = writer.finish();

        let mut reader = BitReader::new(bytes.as_slice());
        let restored = PrefixCodeBook::read_weights(&codec, &mut reader).unwrap();
        assert_eq!(restored, book);
    }

    #[quickcheck]
    fn prop_prefix_free_and_invertible(table: Vec<(u16, u16)>) -> bool {
        let table: Vec<(u16, u64)> = table
            .into_iter()
            .map(|(s, w)| (s, w as u64 + 1))
            .collect();
        let distinct: BTreeSet<u16> = table.iter().map(|(s, _)| *s).collect();
        let book = PrefixCodeBook::build(table).unwrap();

        let codes: Vec<&BitVector> = book.iter().map(|(c, _)| c).collect();
        let prefix_free = codes.iter().enumerate().all(|(i, a)| {
            codes
                .iter()
                .enumerate()
                .all(|(j, b)| i == j || !b.starts_with(a))
        });
        let invertible = distinct.iter().all(|s| {
            let code = book.encode(s).unwrap();
            book.decode(code) == Some((code, s))
        });
        prefix_free && invertible && book.len() == distinct.len()
    }
}
