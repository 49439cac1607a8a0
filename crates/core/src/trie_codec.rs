//! Recursive trie serializer for count maps.
//!
//! The map is viewed as an implicit binary trie. Each visited node knows its
//! branch size (the total count at and below it) and transmits how that size
//! splits between its own terminal count and its `0` subtree; the `1`
//! subtree's size is whatever is left and is never written.
//!
//! # Stream Format
//!
//! ```text
//! var_long(total)
//! for each node, depth-first, 0 before 1, while budget remains:
//!   [sentinel NODE]                      verify mode only
//!   terminals    bounded(size)           Unknown nodes only
//!   [sentinel SPLIT]                     verify mode only, if remaining > 0
//!   zero_count   binomial(0.5, remaining) or bounded(remaining)
//! ```
//!
//! Prefix nodes have no terminals field (always 0) and Terminal nodes write
//! nothing at all (terminals == size). With binomial coding, balanced splits
//! cost a few bits and skewed splits cost more, so the stream approaches the
//! entropy of the map under a binomial branching model.
//!
//! Traversal uses an explicit stack, so unbounded paths cannot exhaust the
//! call stack.

use std::io::Read;

use crate::bitio::{BitReader, BitWriter};
use crate::bitvec::BitVector;
use crate::count_map::{CountCodec, CountMap, NodeType};
use crate::error::{BitIoError, CountCodecError, Error, RangeCoderError, Result};
use crate::range_coder::RangeCoder;

/// Options for [`TrieCountCodec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieCodecConfig {
    /// Code split sizes with the binomial range coder instead of flat fields
    pub binomial: bool,
    /// Interleave sentinel markers and run self-checks; development only
    pub verify: bool,
}

impl Default for TrieCodecConfig {
    fn default() -> Self {
        Self {
            binomial: true,
            verify: false,
        }
    }
}

/// Markers written between fields in verify mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sentinel {
    Node,
    Split,
}

impl Sentinel {
    fn name(self) -> &'static str {
        match self {
            Sentinel::Node => "NODE",
            Sentinel::Split => "SPLIT",
        }
    }

    fn pattern(self) -> u64 {
        match self {
            Sentinel::Node => 0xA5,
            Sentinel::Split => 0x3C,
        }
    }
}

const SENTINEL_BITS: usize = 8;

/// A pending subtree: its path and its branch size.
#[derive(Debug)]
struct Branch {
    path: BitVector,
    size: u64,
}

/// Pending subtree during writing, as a run of the sorted entries.
#[derive(Debug)]
struct WriteBranch {
    path: BitVector,
    /// Entries `lo..hi` of the sorted entry list lie at or below `path`
    lo: usize,
    hi: usize,
}

/// Statistically compact [`CountCodec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TrieCountCodec {
    config: TrieCodecConfig,
}

impl TrieCountCodec {
    pub fn new(config: TrieCodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> TrieCodecConfig {
        self.config
    }

    fn write_sentinel(&self, out: &mut BitWriter, sentinel: Sentinel) -> Result<()> {
        if self.config.verify {
            out.write_bits(sentinel.pattern(), SENTINEL_BITS)?;
        }
        Ok(())
    }

    fn expect_sentinel<R: Read>(
        &self,
        input: &mut BitReader<R>,
        sentinel: Sentinel,
        path: &BitVector,
    ) -> Result<()> {
        if !self.config.verify {
            return Ok(());
        }
        let expected = BitVector::from_u64(sentinel.pattern(), SENTINEL_BITS)?;
        input.expect(&expected).map_err(|e| match e {
            Error::BitIo(BitIoError::Mismatch { .. }) => CountCodecError::Sentinel {
                expected: sentinel.name(),
                path: path.to_string(),
            }
            .into(),
            other => other,
        })
    }

    fn write_split(&self, out: &mut BitWriter, zero: u64, remaining: u64) -> Result<()> {
        if self.config.binomial {
            RangeCoder::from_binomial(0.5, remaining)?.encode(out, zero, remaining)
        } else {
            out.write_bounded_long(zero, remaining)
        }
    }

    fn read_split<R: Read>(&self, input: &mut BitReader<R>, remaining: u64) -> Result<u64> {
        if self.config.binomial {
            RangeCoder::from_binomial(0.5, remaining)?.decode(input, remaining)
        } else {
            input.read_bounded_long(remaining)
        }
    }

    /// In verify mode, report a field decoded past its bound as a broken
    /// node invariant rather than a format error.
    fn verified(&self, field: Result<u64>, what: impl FnOnce() -> String) -> Result<u64> {
        match field {
            Err(Error::BitIo(BitIoError::BoundExceeded { .. }))
            | Err(Error::RangeCoder(RangeCoderError::Corrupt { .. }))
                if self.config.verify =>
            {
                Err(CountCodecError::Invariant(what()).into())
            }
            other => other,
        }
    }

    fn check(&self, holds: bool, what: impl FnOnce() -> String) -> Result<()> {
        if self.config.verify && !holds {
            return Err(CountCodecError::Invariant(what()).into());
        }
        Ok(())
    }
}

fn malformed(path: &BitVector, reason: impl Into<String>) -> Error {
    CountCodecError::Malformed {
        path: path.to_string(),
        reason: reason.into(),
    }
    .into()
}

impl CountCodec for TrieCountCodec {
    fn write(&self, map: &CountMap, out: &mut BitWriter) -> Result<()> {
        let entries: Vec<(&BitVector, u64)> = map.iter().map(|(p, &c)| (p, c)).collect();
        // cumulative[i] is the sum of the first i counts
        let mut cumulative = Vec::with_capacity(entries.len() + 1);
        cumulative.push(0u64);
        for &(_, count) in &entries {
            let last = cumulative[cumulative.len() - 1];
            cumulative.push(last + count);
        }
        let sum = |lo: usize, hi: usize| cumulative[hi] - cumulative[lo];

        let total = map.total();
        let start_bits = out.bit_len();
        out.write_var_long(total)?;

        let mut stack = Vec::new();
        if total > 0 {
            stack.push(WriteBranch {
                path: BitVector::empty(),
                lo: 0,
                hi: entries.len(),
            });
        }
        let mut nodes = 0usize;

        while let Some(WriteBranch { path, lo, hi }) = stack.pop() {
            nodes += 1;
            let size = sum(lo, hi);
            let class = map.classify(&path)?;
            let own = match entries.get(lo) {
                Some(&(p, count)) if lo < hi && *p == path => count,
                _ => 0,
            };
            let terminals = match class {
                NodeType::Prefix => 0,
                NodeType::Terminal => size,
                NodeType::Unknown => own,
            };
            self.check(class != NodeType::Prefix || own == 0, || {
                format!("prefix node {path} carries count {own}")
            })?;
            self.check(class != NodeType::Terminal || own == size, || {
                format!("terminal node {path} has descendants")
            })?;

            self.write_sentinel(out, Sentinel::Node)?;
            if class == NodeType::Unknown {
                out.write_bounded_long(terminals, size)?;
            }

            let remaining = size - terminals;
            tracing::trace!(%path, size, terminals, "trie node");
            if remaining == 0 {
                continue;
            }

            let child_lo = if own > 0 { lo + 1 } else { lo };
            let depth = path.len();
            let split = child_lo
                + entries[child_lo..hi].partition_point(|(p, _)| p.get(depth) == Some(false));
            let zero = sum(child_lo, split);
            let one = remaining - zero;
            self.check(one == sum(split, hi), || {
                format!("split at {path}: {zero} + {one} != {remaining}")
            })?;

            self.write_sentinel(out, Sentinel::Split)?;
            self.write_split(out, zero, remaining)?;

            if one > 0 {
                stack.push(WriteBranch {
                    path: path.concat(&BitVector::one()),
                    lo: split,
                    hi,
                });
            }
            if zero > 0 {
                stack.push(WriteBranch {
                    path: path.concat(&BitVector::zero()),
                    lo: child_lo,
                    hi: split,
                });
            }
        }

        tracing::debug!(
            entries = entries.len(),
            total,
            nodes,
            bits = out.bit_len() - start_bits,
            "wrote trie count map"
        );
        Ok(())
    }

    fn read<R: Read>(&self, input: &mut BitReader<R>, map: &mut CountMap) -> Result<()> {
        let start_bits = input.position();
        let total = input.read_var_long()?;

        let mut stack = Vec::new();
        if total > 0 {
            stack.push(Branch {
                path: BitVector::empty(),
                size: total,
            });
        }
        let mut nodes = 0usize;

        while let Some(Branch { path, size }) = stack.pop() {
            nodes += 1;
            self.expect_sentinel(input, Sentinel::Node, &path)?;
            let class = map.classify(&path)?;
            let terminals = match class {
                NodeType::Prefix => 0,
                NodeType::Terminal => size,
                NodeType::Unknown => self.verified(input.read_bounded_long(size), || {
                    format!("terminals at {path} exceed branch size {size}")
                })?,
            };
            self.check(terminals <= size, || {
                format!("terminals at {path}: {terminals} > {size}")
            })?;
            self.check(class != NodeType::Prefix || terminals == 0, || {
                format!("prefix node {path} carries count {terminals}")
            })?;
            self.check(class != NodeType::Terminal || terminals == size, || {
                format!("terminal node {path} has descendants")
            })?;
            if terminals > 0 {
                map.increment(path.clone(), terminals)?;
            }

            let remaining = size - terminals;
            tracing::trace!(%path, size, terminals, "trie node");
            if remaining == 0 {
                continue;
            }

            self.expect_sentinel(input, Sentinel::Split, &path)?;
            let zero = self.verified(self.read_split(input, remaining), || {
                format!("zero count at {path} exceeds remaining {remaining}")
            })?;
            self.check(zero <= remaining, || {
                format!("split at {path}: zero count {zero} > {remaining}")
            })?;
            if zero > remaining {
                return Err(malformed(&path, format!("zero count {zero} > {remaining}")));
            }
            let one = remaining - zero;

            if one > 0 {
                stack.push(Branch {
                    path: path.concat(&BitVector::one()),
                    size: one,
                });
            }
            if zero > 0 {
                stack.push(Branch {
                    path: path.concat(&BitVector::zero()),
                    size: zero,
                });
            }
        }

        tracing::debug!(
            total,
            nodes,
            bits = input.position() - start_bits,
            "read trie count map"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    fn bits(s: &str) -> BitVector {
        s.parse().unwrap()
    }

    fn map_of(depth: Option<usize>, entries: &[(&str, u64)]) -> CountMap {
        CountMap::from_entries(depth, entries.iter().map(|&(p, c)| (bits(p), c))).unwrap()
    }

    fn round_trip(codec: &TrieCountCodec, map: &CountMap) -> CountMap {
        let bytes = codec.to_bytes(map).unwrap();
        codec.from_bytes(&bytes, map.bit_depth()).unwrap()
    }

    fn all_configs() -> Vec<TrieCountCodec> {
        [(true, false), (false, false), (true, true), (false, true)]
            .into_iter()
            .map(|(binomial, verify)| TrieCountCodec::new(TrieCodecConfig { binomial, verify }))
            .collect()
    }

    #[test]
    fn test_mixed_depth_map() {
        let map = map_of(None, &[("00", 3), ("01", 2), ("1", 5)]);
        for codec in all_configs() {
            let decoded = round_trip(&codec, &map);
            assert_eq!(decoded, map);
            assert_eq!(decoded.total(), 10);
        }
    }

    #[test]
    fn test_empty_map_is_single_zero() {
        let codec = TrieCountCodec::default();
        let mut out = BitWriter::new();
        codec.write(&CountMap::new(), &mut out).unwrap();
        assert_eq!(out.bit_len(), 8);
        let bytes = out.finish();
        assert_eq!(bytes, vec![0]);
        assert!(codec.from_bytes(&bytes, None).unwrap().is_empty());
    }

    #[test]
    fn test_single_entry() {
        for codec in all_configs() {
            let map = map_of(Some(4), &[("1011", 42)]);
            assert_eq!(round_trip(&codec, &map), map);
            let map = map_of(None, &[("", 7)]);
            assert_eq!(round_trip(&codec, &map), map);
        }
    }

    #[test]
    fn test_fixed_depth_writes_no_terminal_fields() {
        // Every node is a Prefix until depth 2, so only split sizes are sent.
        let codec = TrieCountCodec::new(TrieCodecConfig {
            binomial: false,
            verify: false,
        });
        let map = map_of(Some(2), &[("00", 1), ("11", 1)]);
        let mut out = BitWriter::new();
        codec.write(&map, &mut out).unwrap();
        // var_long(2) = 8 bits; root split bounded(1, 2) = 2 bits;
        // "0" split bounded(1, 1) = 1 bit; "1" split bounded(0, 1) = 1 bit.
        assert_eq!(out.bit_len(), 12);
        assert_eq!(round_trip(&codec, &map), map);
    }

    #[test]
    fn test_interior_counts_with_unknown_depth() {
        let map = map_of(None, &[("", 2), ("0", 4), ("01", 1), ("0110", 9), ("1", 3)]);
        for codec in all_configs() {
            assert_eq!(round_trip(&codec, &map), map);
        }
    }

    fn flat_splits() -> TrieCountCodec {
        TrieCountCodec::new(TrieCodecConfig {
            binomial: false,
            verify: false,
        })
    }

    #[test]
    fn test_even_counts_favour_binomial_splits() {
        // Every depth-8 path with a count near 1000: splits stay close to
        // half at every level, which is what the binomial model expects.
        use rand::{Rng, SeedableRng};
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(17);
        let mut map = CountMap::with_depth(8);
        for i in 0..256u64 {
            map.increment(BitVector::from_u64(i, 8).unwrap(), 1000 + rng.gen_range(0..30)).unwrap();
        }
        let binomial = TrieCountCodec::default().to_bytes(&map).unwrap();
        let flat = flat_splits().to_bytes(&map).unwrap();
        assert!(binomial.len() < flat.len(), "{} vs {}", binomial.len(), flat.len());
        assert_eq!(TrieCountCodec::default().from_bytes(&binomial, Some(8)).unwrap(), map);
    }

    #[test]
    fn test_one_sided_chain_costs_more_with_binomial_splits() {
        // A lone path: every split has remaining == 1, which the binomial
        // coder writes as bounded(v, 2) = 2 bits against 1 bit flat.
        let map = map_of(Some(12), &[("000000000000", 1)]);
        let mut binomial = BitWriter::new();
        TrieCountCodec::default().write(&map, &mut binomial).unwrap();
        let mut flat = BitWriter::new();
        flat_splits().write(&map, &mut flat).unwrap();
        assert_eq!(binomial.bit_len(), 8 + 12 * 2);
        assert_eq!(flat.bit_len(), 8 + 12);
    }

    #[test]
    fn test_verify_reports_terminals_beyond_branch_size() {
        // total 2, NODE, terminals = 3 in a 2-bit field
        let mut out = BitWriter::new();
        out.write_var_long(2).unwrap();
        out.write_bits(Sentinel::Node.pattern(), SENTINEL_BITS).unwrap();
        out.write_bits(3, 2).unwrap();
        let bytes = out.finish();

        let verify = TrieCountCodec::new(TrieCodecConfig {
            binomial: false,
            verify: true,
        });
        let err = verify.from_bytes(&bytes, None).unwrap_err();
        assert!(matches!(err, Error::CountCodec(CountCodecError::Invariant(_))));
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    #[test]
    fn test_verify_reports_split_beyond_remaining() {
        // total 2, NODE, terminals 0, SPLIT, zero count = 3 in a 2-bit field
        let mut out = BitWriter::new();
        out.write_var_long(2).unwrap();
        out.write_bits(Sentinel::Node.pattern(), SENTINEL_BITS).unwrap();
        out.write_bits(0, 2).unwrap();
        out.write_bits(Sentinel::Split.pattern(), SENTINEL_BITS).unwrap();
        out.write_bits(3, 2).unwrap();
        let bytes = out.finish();

        let verify = TrieCountCodec::new(TrieCodecConfig {
            binomial: false,
            verify: true,
        });
        let err = verify.from_bytes(&bytes, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);

        // Same bad field without verify mode is a plain format error.
        let mut out = BitWriter::new();
        out.write_var_long(2).unwrap();
        out.write_bits(0, 2).unwrap();
        out.write_bits(3, 2).unwrap();
        let err = flat_splits().from_bytes(&out.finish(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatMismatch);
    }

    #[test]
    fn test_truncated_stream_fails() {
        let map = map_of(Some(6), &[("000001", 5), ("101010", 9), ("111111", 2)]);
        let codec = TrieCountCodec::default();
        let bytes = codec.to_bytes(&map).unwrap();
        let err = codec.from_bytes(&bytes[..1], Some(6)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndOfStream);
    }

    #[test]
    fn test_sentinel_mismatch() {
        let map = map_of(None, &[("0", 1), ("1", 1)]);
        let plain = TrieCountCodec::default();
        let verify = TrieCountCodec::new(TrieCodecConfig {
            binomial: true,
            verify: true,
        });
        let mut bytes = plain.to_bytes(&map).unwrap();
        bytes.extend_from_slice(&[0u8; 8]);
        let err = verify.from_bytes(&bytes, None).unwrap_err();
        assert!(matches!(
            err,
            Error::CountCodec(CountCodecError::Sentinel { expected: "NODE", .. })
        ));
        assert_eq!(err.kind(), ErrorKind::FormatMismatch);
    }

    #[test]
    fn test_read_accumulates_into_existing_map() {
        let codec = TrieCountCodec::default();
        let bytes = codec.to_bytes(&map_of(Some(2), &[("01", 4), ("10", 1)])).unwrap();

        let mut map = map_of(Some(2), &[("01", 1), ("11", 2)]);
        codec.read(&mut BitReader::new(bytes.as_slice()), &mut map).unwrap();
        assert_eq!(map, map_of(Some(2), &[("01", 5), ("10", 1), ("11", 2)]));
    }

    #[test]
    fn test_streams_concatenate() {
        let first = map_of(None, &[("1", 3)]);
        let second = map_of(None, &[("0", 1), ("00", 6)]);
        let codec = TrieCountCodec::default();
        let mut out = BitWriter::new();
        codec.write(&first, &mut out).unwrap();
        codec.write(&second, &mut out).unwrap();
        let bytes = out.finish();

        let mut reader = BitReader::new(bytes.as_slice());
        let mut a = CountMap::new();
        let mut b = CountMap::new();
        codec.read(&mut reader, &mut a).unwrap();
        codec.read(&mut reader, &mut b).unwrap();
        assert_eq!((a, b), (first, second));
    }

    #[derive(Debug, Clone)]
    struct SampleMap(CountMap);

    impl Arbitrary for SampleMap {
        fn arbitrary(g: &mut Gen) -> Self {
            let fixed = bool::arbitrary(g);
            let depth = if fixed { Some(usize::arbitrary(g) % 20) } else { None };
            let size = usize::arbitrary(g) % 40;
            let mut map = match depth {
                Some(d) => CountMap::with_depth(d),
                None => CountMap::new(),
            };
            for _ in 0..size {
                let len = depth.unwrap_or_else(|| usize::arbitrary(g) % 20);
                let path: String = (0..len)
                    .map(|_| if bool::arbitrary(g) { '1' } else { '0' })
                    .collect();
                let count = u64::from(u16::arbitrary(g)) + 1;
                map.increment(path.parse().unwrap(), count).unwrap();
            }
            SampleMap(map)
        }
    }

    #[quickcheck]
    fn prop_round_trip(sample: SampleMap, binomial: bool) -> bool {
        let codec = TrieCountCodec::new(TrieCodecConfig {
            binomial,
            verify: true,
        });
        round_trip(&codec, &sample.0) == sample.0
    }
}
