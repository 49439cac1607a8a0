//! Error types for the count codec core.
//!
//! Every operation returns a structured error rather than panicking. Errors
//! are fail-fast: nothing in this crate retries or silently degrades, so a
//! caller that sees an error should discard whatever partial result it holds.

use thiserror::Error;

/// Top-level error type for all operations in the crate.
///
/// Each variant corresponds to a specific failure domain:
/// - Bit vector: malformed construction or slicing parameters
/// - Bit I/O: reading past the end of a stream, out-of-range fields
/// - Range coder: invalid distribution parameters
/// - Prefix code: unknown symbols, unmatched codes, broken invariants
/// - Count codec: malformed trie or flat streams
/// - Framing: envelope validation
/// - I/O: the underlying byte source failed
#[derive(Debug, Error)]
pub enum Error {
    /// Bit vector construction or slicing failed
    #[error("bit vector error: {0}")]
    BitVector(#[from] BitVectorError),

    /// Bit I/O operation failed (e.g., reading past end of stream)
    #[error("bit I/O error: {0}")]
    BitIo(#[from] BitIoError),

    /// Binomial range coder error
    #[error("range coder error: {0}")]
    RangeCoder(#[from] RangeCoderError),

    /// Prefix code book error
    #[error("prefix code error: {0}")]
    PrefixCode(#[from] PrefixCodeError),

    /// Count map codec error
    #[error("count codec error: {0}")]
    CountCodec(#[from] CountCodecError),

    /// Envelope error
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// CRC validation failed, indicating data corruption
    #[error("CRC mismatch: expected {expected:#010x}, got {actual:#010x}")]
    Crc { expected: u32, actual: u32 },

    /// Byte source I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed construction parameters
    InvalidArgument,
    /// Reader exhausted before satisfying a read
    EndOfStream,
    /// Stream content did not match what was expected
    FormatMismatch,
    /// An internal consistency check failed
    InvariantViolation,
    /// A lookup key was never seen
    NotFound,
    /// The byte source itself failed
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BitVector(_) => ErrorKind::InvalidArgument,
            Error::BitIo(BitIoError::UnexpectedEof { .. }) => ErrorKind::EndOfStream,
            Error::BitIo(BitIoError::Mismatch { .. })
            | Error::BitIo(BitIoError::BoundExceeded { .. }) => ErrorKind::FormatMismatch,
            Error::BitIo(_) => ErrorKind::InvalidArgument,
            Error::RangeCoder(RangeCoderError::Corrupt { .. }) => ErrorKind::FormatMismatch,
            Error::RangeCoder(_) => ErrorKind::InvalidArgument,
            Error::PrefixCode(PrefixCodeError::SymbolNotFound) => ErrorKind::NotFound,
            Error::PrefixCode(PrefixCodeError::NoMatchingCode { .. }) => ErrorKind::FormatMismatch,
            Error::PrefixCode(PrefixCodeError::NotPrefixFree { .. })
            | Error::PrefixCode(PrefixCodeError::IndexMismatch) => ErrorKind::InvariantViolation,
            Error::PrefixCode(_) => ErrorKind::InvalidArgument,
            Error::CountCodec(CountCodecError::Invariant(_)) => ErrorKind::InvariantViolation,
            Error::CountCodec(CountCodecError::InvalidPath { .. })
            | Error::CountCodec(CountCodecError::DepthRequired)
            | Error::CountCodec(CountCodecError::CountTooLarge { .. }) => ErrorKind::InvalidArgument,
            Error::CountCodec(_) => ErrorKind::FormatMismatch,
            Error::Framing(_) | Error::Crc { .. } => ErrorKind::FormatMismatch,
            Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => ErrorKind::EndOfStream,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

/// Bit vector construction errors.
#[derive(Debug, Error)]
pub enum BitVectorError {
    /// Backing buffer is too small for the declared length
    #[error("{bytes} bytes cannot hold {bits} bits")]
    BufferTooShort { bits: usize, bytes: usize },

    /// Value needs more bits than the requested length
    #[error("value {value} does not fit in {bits} bits")]
    ValueTooWide { value: u64, bits: usize },

    /// Slice or shift reaches past the end of the vector
    #[error("range {start}..{end} out of bounds for length {len}")]
    OutOfBounds { start: usize, end: usize, len: usize },

    /// Integer conversion of a vector longer than 64 bits
    #[error("{0} bits do not fit in a u64")]
    TooLong(usize),

    /// Bit string contained something other than '0' or '1'
    #[error("invalid bit character {0:?}")]
    InvalidChar(char),
}

/// Bit-level I/O errors.
#[derive(Debug, Error)]
pub enum BitIoError {
    /// Attempted to read past the end of the stream
    #[error("unexpected end of bit stream: requested {requested} bits, available {available}")]
    UnexpectedEof { requested: usize, available: usize },

    /// Invalid bit count (more than 64 bits for an integer field)
    #[error("invalid bit count: {0}")]
    InvalidBitCount(usize),

    /// Value does not fit the declared bound
    #[error("value {value} exceeds bound {max}")]
    ValueOutOfRange { value: u64, max: u64 },

    /// Stored bounded value is larger than its bound
    #[error("stored value {value} exceeds bound {max}")]
    BoundExceeded { value: u64, max: u64 },

    /// Expected marker was not found at the current position
    #[error("expected bits {expected}, found {actual}")]
    Mismatch { expected: String, actual: String },
}

/// Binomial range coder errors.
#[derive(Debug, Error)]
pub enum RangeCoderError {
    /// Mean or standard deviation unusable
    #[error("invalid distribution: mean {mean}, std dev {std_dev}")]
    InvalidDistribution { mean: f64, std_dev: f64 },

    /// Binomial parameters outside 0 < p < 1, n > 0
    #[error("invalid binomial parameters: p {p}, n {n}")]
    InvalidBinomial { p: f64, n: u64 },

    /// Coded value is outside [0, max]
    #[error("value {value} exceeds max {max}")]
    ValueOutOfRange { value: u64, max: u64 },

    /// Decoded value is outside [0, max]
    #[error("decoded value {value} exceeds max {max}")]
    Corrupt { value: u64, max: u64 },
}

/// Prefix code book errors.
#[derive(Debug, Error)]
pub enum PrefixCodeError {
    /// Symbol was not part of the weighted table
    #[error("symbol not found in code book")]
    SymbolNotFound,

    /// Weighted table contained a zero weight
    #[error("symbol weights must be positive")]
    ZeroWeight,

    /// No stored code prefixes the input bits
    #[error("no code matches bits {bits}")]
    NoMatchingCode { bits: String },

    /// Two codes stand in a prefix relation
    #[error("code {prefix} is a prefix of {code}")]
    NotPrefixFree { prefix: String, code: String },

    /// Forward and reverse indices disagree
    #[error("forward and reverse code indices disagree")]
    IndexMismatch,
}

/// Count map codec errors.
#[derive(Debug, Error)]
pub enum CountCodecError {
    /// Stream arithmetic is inconsistent at a trie node
    #[error("malformed stream at path {path:?}: {reason}")]
    Malformed { path: String, reason: String },

    /// Sentinel marker mismatch in verify mode
    #[error("sentinel {expected} missing at path {path:?}")]
    Sentinel { expected: &'static str, path: String },

    /// A codec self-check failed while writing
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Path does not agree with the declared bit depth
    #[error("path {path:?} invalid for bit depth {depth:?}")]
    InvalidPath { path: String, depth: Option<usize> },

    /// Flat codec needs a fixed bit depth
    #[error("flat codec requires a fixed bit depth")]
    DepthRequired,

    /// Count or item total does not fit a 32-bit field
    #[error("count {count} exceeds 32-bit field")]
    CountTooLarge { count: u64 },
}

/// Envelope errors.
#[derive(Debug, Error)]
pub enum FramingError {
    /// Invalid magic number in header
    #[error("invalid magic number: expected {expected:?}, got {actual:?}")]
    InvalidMagic { expected: [u8; 4], actual: [u8; 4] },

    /// Frame is too short to contain a valid header
    #[error("frame too short: need at least {required} bytes, got {actual}")]
    FrameTooShort { required: usize, actual: usize },

    /// Buffer length doesn't match the header's payload length
    #[error("payload length mismatch: header says {expected}, got {actual}")]
    PayloadLengthMismatch { expected: usize, actual: usize },

    /// Codec kind byte not recognised
    #[error("unknown codec kind {0}")]
    UnknownKind(u8),
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
