//! countcodec-core: compact bit-level statistical coding of sparse count maps
//!
//! This library provides the building blocks for serializing maps from
//! bit-string paths to counts, using far fewer bits than a naive encoding
//! when the data is skewed:
//! - Immutable bit vectors with prefix-friendly ordering
//! - MSB-first bit readers and writers with bounded and variable-width fields
//! - A binomial-approximation range coder for split counts
//! - A deterministic Huffman-style prefix code book
//! - A recursive binary-trie count codec, and a flat fixed-depth baseline
//!
//! # Architecture
//!
//! - `bitvec`: `BitVector`, the unit of paths and codes
//! - `bitio`: Low-level bit reading/writing
//! - `range_coder`: Variable-length integers near an expected value
//! - `prefix_code`: Weighted prefix code book
//! - `count_map`: Sparse count map and the `CountCodec` contract
//! - `trie_codec`: Trie serializer
//! - `flat_codec`: Flat serializer
//! - `framing`: Optional checksummed envelope
//!
//! # Design Principles
//!
//! - **No panics**: All errors are structured and recoverable
//! - **Bit exact**: Writer and reader make identical decisions from
//!   identical information, so streams carry no redundant headers
//! - **Deterministic**: Code books and streams depend only on their inputs

pub mod bitio;
pub mod bitvec;
pub mod count_map;
pub mod error;
pub mod flat_codec;
pub mod framing;
pub mod prefix_code;
pub mod range_coder;
pub mod trie_codec;

// Re-export commonly used types
pub use bitio::{BitReader, BitWriter};
pub use bitvec::BitVector;
pub use count_map::{CountCodec, CountMap, NodeType};
pub use error::{Error, ErrorKind, Result};
pub use flat_codec::FlatCountCodec;
pub use prefix_code::PrefixCodeBook;
pub use range_coder::RangeCoder;
pub use trie_codec::{TrieCodecConfig, TrieCountCodec};
