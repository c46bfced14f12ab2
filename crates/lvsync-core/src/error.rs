use thiserror::Error;

pub type LvsyncResult<T> = Result<T, LvsyncError>;

#[derive(Debug, Error)]
pub enum LvsyncError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    UnsupportedAlgorithm(#[from] UnsupportedAlgorithm),

    #[error("validation failure: {0}")]
    Validation(#[from] ValidationFailure),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// An algorithm tag this build does not know. The record was produced by a
/// newer protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnsupportedAlgorithm {
    #[error("unsupported strong hash type tag {0}")]
    StrongHash(u8),

    #[error("unsupported chunking algorithm tag {0}")]
    Chunking(u8),
}

/// Malformed, truncated, or internally inconsistent serialized bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("truncated input: {field} needs {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("unknown format version {0}")]
    UnknownFormatVersion(u8),

    #[error("unknown object type tag {0}")]
    UnknownObjectType(u8),

    #[error("unknown platform attribute tag {0}")]
    UnknownPlatformTag(u8),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedAlgorithm),

    #[error("{field} length {len} exceeds limit {limit}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        limit: usize,
    },

    #[error("chunk count {count} cannot fit in {remaining} remaining bytes")]
    ChunkCountExceedsBuffer { count: usize, remaining: usize },

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    #[error("malformed rabin parameters: expected {expected} bytes, got {actual}")]
    RabinParamsLength { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid padding")]
    InvalidPadding,

    #[error("decryption failed")]
    DecryptFailed,

    #[error("encryption failed: {0}")]
    EncryptFailed(String),

    #[error("{0} key is not available at this access level")]
    KeyUnavailable(&'static str),

    #[error("plaintext authentication code mismatch")]
    AuthenticationFailed,

    #[error("ciphertext does not match content hash")]
    ContentHashMismatch,

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("invalid secret: {0}")]
    InvalidSecret(String),
}

/// Structural inconsistency found by `Meta::validate`. The record must be
/// rejected, never adopted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("path id must be {expected} bytes, got {actual}")]
    PathIdLength { expected: usize, actual: usize },

    #[error("{field}: iv must be {expected} bytes, got {actual}")]
    FieldIvLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field}: ciphertext length {len} is not a non-empty multiple of the block size")]
    FieldCiphertextLength { field: &'static str, len: usize },

    #[error("{field}: ciphertext length {len} exceeds limit {limit}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        limit: usize,
    },

    #[error("max_chunksize {max} is smaller than min_chunksize {min}")]
    ChunkBoundsInverted { min: u32, max: u32 },

    #[error("file has no chunks but min_chunksize is {0}")]
    EmptyChunkList(u32),

    #[error("chunk {index} has zero plaintext size")]
    EmptyChunk { index: usize },

    #[error("chunk {index} size {size} outside [{min}, {max}]")]
    ChunkSizeOutOfBounds {
        index: usize,
        size: u32,
        min: u32,
        max: u32,
    },

    #[error("chunk {index}: content hash must be {expected} bytes, got {actual}")]
    ContentHashLength {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("chunk {index}: iv must be {expected} bytes, got {actual}")]
    ChunkIvLength {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("chunk {index}: auth code must be {expected} bytes, got {actual}")]
    AuthCodeLength {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("total file size overflows u64")]
    SizeOverflow,

    #[error("chunk index {index} out of range for {count} chunks")]
    ChunkIndexOutOfRange { index: usize, count: usize },

    #[error("new revision {proposed} does not follow current revision {current}")]
    RevisionNotIncreasing { current: i64, proposed: i64 },

    #[error("chunking params ciphertext must be {expected} bytes, got {actual}")]
    ChunkingParamsLength { expected: usize, actual: usize },

    #[error("chunk {index}: plaintext {size} bytes outside chunk bounds [{min}, {max}]")]
    ChunkOutsideConfiguredBounds {
        index: usize,
        size: usize,
        min: u32,
        max: u32,
    },
}
