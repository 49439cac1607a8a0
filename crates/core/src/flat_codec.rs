//! Flat, fixed-depth serializer for count maps.
//!
//! # Stream Format
//!
//! ```text
//! u32 item_count
//! item_count x ( path: bit_depth bits | u32 count )
//! ```
//!
//! Entries are written in path order. No modelling is done, so this is the
//! baseline the trie codec is measured against and the better choice for
//! small or dense maps.

use std::io::Read;

use crate::bitio::{BitReader, BitWriter};
use crate::count_map::{CountCodec, CountMap};
use crate::error::{CountCodecError, Result};

/// Fixed-width [`CountCodec`]; needs a map with a declared bit depth.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatCountCodec;

impl FlatCountCodec {
    pub fn new() -> Self {
        Self
    }

    /// Exact stream size in bits for `map`.
    pub fn encoded_bits(&self, map: &CountMap) -> Result<usize> {
        let depth = map.bit_depth().ok_or(CountCodecError::DepthRequired)?;
        Ok(32 + map.len() * (depth + 32))
    }
}

fn to_u32(count: u64) -> Result<u32> {
    u32::try_from(count).map_err(|_| CountCodecError::CountTooLarge { count }.into())
}

impl CountCodec for FlatCountCodec {
    fn write(&self, map: &CountMap, out: &mut BitWriter) -> Result<()> {
        let depth = map.bit_depth().ok_or(CountCodecError::DepthRequired)?;
        out.write_u32(to_u32(map.len() as u64)?)?;
        for (path, &count) in map {
            if path.len() != depth {
                return Err(CountCodecError::InvalidPath {
                    path: path.to_string(),
                    depth: Some(depth),
                }
                .into());
            }
            out.write(path)?;
            out.write_u32(to_u32(count)?)?;
        }
        tracing::debug!(entries = map.len(), depth, "wrote flat count map");
        Ok(())
    }

    fn read<R: Read>(&self, input: &mut BitReader<R>, map: &mut CountMap) -> Result<()> {
        let depth = map.bit_depth().ok_or(CountCodecError::DepthRequired)?;
        let items = input.read_u32()?;
        for _ in 0..items {
            let path = input.read(depth)?;
            let count = input.read_u32()?;
            if count == 0 {
                return Err(CountCodecError::Malformed {
                    path: path.to_string(),
                    reason: "zero count".to_string(),
                }
                .into());
            }
            map.increment(path, count as u64)?;
        }
        tracing::debug!(entries = items, depth, "read flat count map");
        Ok(())
    }
}
