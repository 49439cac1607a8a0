//! Checksummed envelope around a serialized count map.
//!
//! Raw codec streams carry no framing: a corrupted buffer that still
//! satisfies the trie arithmetic decodes to wrong counts without an error.
//! Callers that store or ship streams through untrusted channels can wrap
//! them in a frame, which records how to decode the payload and a CRC32 over
//! everything.
//!
//! # Frame Format
//!
//! ```text
//! +------------------+
//! | Magic (4 bytes)  |  0x43 0x54 0x52 0x49 ("CTRI")
//! +------------------+
//! | kind (1)         |  0 = trie, 1 = flat
//! +------------------+
//! | flags (1)        |  bit 0 binomial, bit 1 verify (trie only)
//! +------------------+
//! | bit_depth (4)    |  u32 little-endian, 0xFFFFFFFF = none
//! +------------------+
//! | payload_len (4)  |  u32 byte length of the codec stream
//! +------------------+
//! | crc32 (4)        |  u32 checksum of everything after the magic
//! +------------------+
//! | payload          |  codec stream (payload_len bytes)
//! | (variable)       |
//! +------------------+
//! ```

use crate::count_map::{CountCodec, CountMap};
use crate::error::{CountCodecError, Error, FramingError, Result};
use crate::flat_codec::FlatCountCodec;
use crate::trie_codec::{TrieCodecConfig, TrieCountCodec};

/// Magic number for frames: "CTRI" (count trie)
const MAGIC: [u8; 4] = [0x43, 0x54, 0x52, 0x49];

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 18;

const NO_DEPTH: u32 = u32::MAX;
const FLAG_BINOMIAL: u8 = 0b01;
const FLAG_VERIFY: u8 = 0b10;

/// Which codec produced a frame's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    Trie(TrieCodecConfig),
    Flat,
}

impl CodecKind {
    fn header_bytes(self) -> [u8; 2] {
        match self {
            CodecKind::Trie(config) => {
                let mut flags = 0;
                if config.binomial {
                    flags |= FLAG_BINOMIAL;
                }
                if config.verify {
                    flags |= FLAG_VERIFY;
                }
                [0, flags]
            }
            CodecKind::Flat => [1, 0],
        }
    }

    fn from_header_bytes(kind: u8, flags: u8) -> Result<Self> {
        match kind {
            0 => Ok(CodecKind::Trie(TrieCodecConfig {
                binomial: flags & FLAG_BINOMIAL != 0,
                verify: flags & FLAG_VERIFY != 0,
            })),
            1 => Ok(CodecKind::Flat),
            other => Err(FramingError::UnknownKind(other).into()),
        }
    }

    fn encode(self, map: &CountMap) -> Result<Vec<u8>> {
        match self {
            CodecKind::Trie(config) => TrieCountCodec::new(config).to_bytes(map),
            CodecKind::Flat => FlatCountCodec::new().to_bytes(map),
        }
    }

    fn decode(self, payload: &[u8], bit_depth: Option<usize>) -> Result<CountMap> {
        match self {
            CodecKind::Trie(config) => TrieCountCodec::new(config).from_bytes(payload, bit_depth),
            CodecKind::Flat => FlatCountCodec::new().from_bytes(payload, bit_depth),
        }
    }
}

/// A parsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Codec that produced the payload
    pub kind: CodecKind,

    /// Bit depth the map was declared with
    pub bit_depth: Option<usize>,

    /// Codec stream
    pub payload: Vec<u8>,

    /// CRC32 checksum (for validation)
    pub crc32: u32,
}

impl Frame {
    /// Decode the payload back into a count map.
    pub fn decode(&self) -> Result<CountMap> {
        self.kind.decode(&self.payload, self.bit_depth)
    }
}

/// Serialize `map` with `kind` and wrap it in a frame.
///
/// # Errors
/// Propagates codec errors; `CountCodecError::CountTooLarge` if the depth or
/// payload length do not fit their 32-bit header fields.
pub fn seal(kind: CodecKind, map: &CountMap) -> Result<Vec<u8>> {
    let payload = kind.encode(map)?;

    let depth_field = match map.bit_depth() {
        None => NO_DEPTH,
        Some(depth) => u32::try_from(depth)
            .ok()
            .filter(|&d| d != NO_DEPTH)
            .ok_or(CountCodecError::CountTooLarge { count: depth as u64 })?,
    };
    let payload_len = u32::try_from(payload.len()).map_err(|_| CountCodecError::CountTooLarge {
        count: payload.len() as u64,
    })?;
    let head = kind.header_bytes();
    let crc32 = compute_crc(head, depth_field, payload_len, &payload);

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&MAGIC);
    frame.extend_from_slice(&head);
    frame.extend_from_slice(&depth_field.to_le_bytes());
    frame.extend_from_slice(&payload_len.to_le_bytes());
    frame.extend_from_slice(&crc32.to_le_bytes());
    frame.extend_from_slice(&payload);

    tracing::debug!(?kind, payload_len, crc32, "sealed count map frame");
    Ok(frame)
}

/// Parse and verify a frame without decoding its payload.
///
/// # Errors
/// - `FramingError::FrameTooShort` if the buffer is smaller than the header
///   or than the length the header declares
/// - `FramingError::InvalidMagic` if the magic number doesn't match
/// - `FramingError::UnknownKind` for an unrecognised codec byte
/// - `Error::Crc` if CRC validation fails
pub fn parse_frame(bytes: &[u8]) -> Result<Frame> {
    let header: &[u8; HEADER_SIZE] = bytes
        .get(..HEADER_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or(FramingError::FrameTooShort {
            required: HEADER_SIZE,
            actual: bytes.len(),
        })?;

    let magic = [header[0], header[1], header[2], header[3]];
    if magic != MAGIC {
        return Err(FramingError::InvalidMagic {
            expected: MAGIC,
            actual: magic,
        }
        .into());
    }

    let head = [header[4], header[5]];
    let depth_field = u32::from_le_bytes([header[6], header[7], header[8], header[9]]);
    let payload_len = u32::from_le_bytes([header[10], header[11], header[12], header[13]]);
    let crc32 = u32::from_le_bytes([header[14], header[15], header[16], header[17]]);

    let expected_size = HEADER_SIZE + payload_len as usize;
    if bytes.len() < expected_size {
        return Err(FramingError::FrameTooShort {
            required: expected_size,
            actual: bytes.len(),
        }
        .into());
    }
    if bytes.len() > expected_size {
        return Err(FramingError::PayloadLengthMismatch {
            expected: payload_len as usize,
            actual: bytes.len() - HEADER_SIZE,
        }
        .into());
    }

    let payload = &bytes[HEADER_SIZE..];
    let computed = compute_crc(head, depth_field, payload_len, payload);
    if computed != crc32 {
        return Err(Error::Crc {
            expected: crc32,
            actual: computed,
        });
    }

    Ok(Frame {
        kind: CodecKind::from_header_bytes(head[0], head[1])?,
        bit_depth: (depth_field != NO_DEPTH).then_some(depth_field as usize),
        payload: payload.to_vec(),
        crc32,
    })
}

/// Parse, verify and decode a frame.
pub fn open(bytes: &[u8]) -> Result<CountMap> {
    parse_frame(bytes)?.decode()
}

/// Compute CRC32 over the protected fields.
fn compute_crc(head: [u8; 2], depth_field: u32, payload_len: u32, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&head);
    hasher.update(&depth_field.to_le_bytes());
    hasher.update(&payload_len.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitvec::BitVector;

    fn sample_map() -> CountMap {
        CountMap::from_entries(
            Some(6),
            (0..20u64).map(|i| (BitVector::from_u64(i * 3, 6).unwrap(), i + 1)),
        )
        .unwrap()
    }

    #[test]
    fn test_seal_open_round_trip() {
        let map = sample_map();
        for kind in [
            CodecKind::Trie(TrieCodecConfig::default()),
            CodecKind::Trie(TrieCodecConfig {
                binomial: false,
                verify: true,
            }),
            CodecKind::Flat,
        ] {
            let bytes = seal(kind, &map).unwrap();
            let frame = parse_frame(&bytes).unwrap();
            assert_eq!(frame.kind, kind);
            assert_eq!(frame.bit_depth, Some(6));
            assert_eq!(open(&bytes).unwrap(), map);
        }
    }

    #[test]
    fn test_unconstrained_depth() {
        let map = CountMap::from_entries(None, [("0".parse().unwrap(), 2), ("011".parse().unwrap(), 5)])
            .unwrap();
        let bytes = seal(CodecKind::Trie(TrieCodecConfig::default()), &map).unwrap();
        assert_eq!(parse_frame(&bytes).unwrap().bit_depth, None);
        assert_eq!(open(&bytes).unwrap(), map);
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = seal(CodecKind::Flat, &sample_map()).unwrap();
        bytes[0] = 0xFF;
        assert!(matches!(
            parse_frame(&bytes),
            Err(Error::Framing(FramingError::InvalidMagic { .. }))
        ));
    }

    #[test]
    fn test_frame_too_short() {
        assert!(matches!(
            parse_frame(&[0u8; 10]),
            Err(Error::Framing(FramingError::FrameTooShort { .. }))
        ));
        let bytes = seal(CodecKind::Flat, &sample_map()).unwrap();
        assert!(matches!(
            parse_frame(&bytes[..bytes.len() - 1]),
            Err(Error::Framing(FramingError::FrameTooShort { .. }))
        ));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = seal(CodecKind::Flat, &sample_map()).unwrap();
        bytes.push(0);
        assert!(matches!(
            parse_frame(&bytes),
            Err(Error::Framing(FramingError::PayloadLengthMismatch { .. }))
        ));
    }

    #[test]
    fn test_crc_mismatch() {
        let mut bytes = seal(CodecKind::Trie(TrieCodecConfig::default()), &sample_map()).unwrap();
        let len = bytes.len();
        bytes[len - 1] ^= 0x01;
        assert!(matches!(parse_frame(&bytes), Err(Error::Crc { .. })));
    }
}
