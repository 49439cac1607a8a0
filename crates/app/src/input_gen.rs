//! Sample count map generation.
//!
//! Paths are drawn bit by bit, each bit being 0 with probability `skew`.
//! A skew of 0.5 spreads observations uniformly over the trie, which is the
//! worst case for the trie codec; higher skews concentrate them on a few
//! branches, which is where split coding pays off.

use countcodec_core::{BitVector, CountMap, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Draw `entries` observations of `depth`-bit paths into a fresh map.
///
/// Each observation adds a small random weight (1-4) to its path, so the
/// map holds at most `entries` distinct paths and a total of at most
/// `4 * entries`.
pub fn generate_sample_map(seed: u64, entries: usize, depth: usize, skew: f64) -> Result<CountMap> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let skew = skew.clamp(0.0, 1.0);
    let mut map = CountMap::with_depth(depth);

    for _ in 0..entries {
        let path = sample_path(&mut rng, depth, skew);
        let weight = rng.gen_range(1..=4);
        map.increment(path, weight)?;
    }

    Ok(map)
}

fn sample_path(rng: &mut ChaCha8Rng, depth: usize, skew: f64) -> BitVector {
    (0..depth)
        .map(|_| BitVector::from(!rng.gen_bool(skew)))
        .fold(BitVector::empty(), |path, bit| path.concat(&bit))
}
