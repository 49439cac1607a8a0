//! Sparse maps from bit-string paths to positive counts.
//!
//! A [`CountMap`] labels leaves of an implicit binary trie. An optional fixed
//! bit depth classifies every path (see [`NodeType`]) and is enforced on
//! insertion, so a map with a depth only ever holds full-depth paths.
//!
//! The [`CountCodec`] trait is the contract shared by the trie and flat
//! serializers.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::io::Read;

use crate::bitio::{BitReader, BitWriter};
use crate::bitvec::BitVector;
use crate::error::{CountCodecError, Result};

/// How a path relates to the map's bit depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Full depth: carries a count, never branches
    Terminal,
    /// Shorter than the depth: must branch, never carries a count
    Prefix,
    /// No depth declared: may carry a count and/or branch
    Unknown,
}

/// Ordered map from paths to positive counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountMap {
    counts: BTreeMap<BitVector, u64>,
    bit_depth: Option<usize>,
    total: u64,
}

impl CountMap {
    /// An empty map without a fixed depth.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty map whose paths are all exactly `bit_depth` bits.
    pub fn with_depth(bit_depth: usize) -> Self {
        Self {
            bit_depth: Some(bit_depth),
            ..Self::default()
        }
    }

    /// Build from `(path, count)` pairs, summing repeated paths.
    pub fn from_entries<I>(bit_depth: Option<usize>, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (BitVector, u64)>,
    {
        let mut map = Self {
            bit_depth,
            ..Self::default()
        };
        for (path, count) in entries {
            map.increment(path, count)?;
        }
        Ok(map)
    }

    pub fn bit_depth(&self) -> Option<usize> {
        self.bit_depth
    }

    /// Classify `path` against the bit depth.
    ///
    /// # Errors
    /// `CountCodecError::InvalidPath` if the path is longer than the depth.
    pub fn classify(&self, path: &BitVector) -> Result<NodeType> {
        match self.bit_depth {
            None => Ok(NodeType::Unknown),
            Some(depth) if path.len() == depth => Ok(NodeType::Terminal),
            Some(depth) if path.len() < depth => Ok(NodeType::Prefix),
            Some(_) => Err(self.invalid_path(path)),
        }
    }

    fn invalid_path(&self, path: &BitVector) -> crate::error::Error {
        CountCodecError::InvalidPath {
            path: path.to_string(),
            depth: self.bit_depth,
        }
        .into()
    }

    /// Add `count` to `path`. Adding zero is a no-op.
    ///
    /// # Errors
    /// - `CountCodecError::InvalidPath` if the path cannot carry a count
    /// - `CountCodecError::CountTooLarge` if the map total would overflow
    pub fn increment(&mut self, path: BitVector, count: u64) -> Result<()> {
        if self.classify(&path)? == NodeType::Prefix {
            return Err(self.invalid_path(&path));
        }
        if count == 0 {
            return Ok(());
        }
        self.total = self
            .total
            .checked_add(count)
            .ok_or(CountCodecError::CountTooLarge { count })?;
        *self.counts.entry(path).or_insert(0) += count;
        Ok(())
    }

    /// Count stored at exactly `path` (0 if absent).
    pub fn get(&self, path: &BitVector) -> u64 {
        self.counts.get(path).copied().unwrap_or(0)
    }

    /// Sum of every count.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Sum of counts at `prefix` and every path below it.
    pub fn sum_under(&self, prefix: &BitVector) -> u64 {
        self.counts
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(_, &count)| count)
            .sum()
    }

    /// Number of distinct paths.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate over `(path, count)` in path order.
    pub fn iter(&self) -> btree_map::Iter<'_, BitVector, u64> {
        self.counts.iter()
    }
}

impl IntoIterator for CountMap {
    type Item = (BitVector, u64);
    type IntoIter = btree_map::IntoIter<BitVector, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.into_iter()
    }
}

impl<'a> IntoIterator for &'a CountMap {
    type Item = (&'a BitVector, &'a u64);
    type IntoIter = btree_map::Iter<'a, BitVector, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.counts.iter()
    }
}

/// Serializer for a [`CountMap`].
pub trait CountCodec {
    /// Serialize `map` onto `out`.
    fn write(&self, map: &CountMap, out: &mut BitWriter) -> Result<()>;

    /// Read one serialized map from `input`, adding its counts to `map`.
    ///
    /// `map`'s bit depth must match the depth the stream was written with.
    fn read<R: Read>(&self, input: &mut BitReader<R>, map: &mut CountMap) -> Result<()>;

    /// Serialize `map` into a fresh byte buffer.
    fn to_bytes(&self, map: &CountMap) -> Result<Vec<u8>> {
        let mut out = BitWriter::new();
        self.write(map, &mut out)?;
        Ok(out.finish())
    }

    /// Deserialize a map from a byte buffer.
    fn from_bytes(&self, bytes: &[u8], bit_depth: Option<usize>) -> Result<CountMap> {
        let mut map = CountMap {
            bit_depth,
            ..CountMap::default()
        };
        self.read(&mut BitReader::new(bytes), &mut map)?;
        Ok(map)
    }
}
