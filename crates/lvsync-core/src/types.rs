use serde::{Deserialize, Serialize};

use crate::error::{ParseError, UnsupportedAlgorithm};

/// Kind of filesystem object a Meta describes, with its wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    File,
    Directory,
    Symlink,
    /// Tombstone for a removed object
    Deleted,
}

impl ObjectType {
    pub fn tag(self) -> u8 {
        match self {
            ObjectType::File => 0,
            ObjectType::Directory => 1,
            ObjectType::Symlink => 2,
            ObjectType::Deleted => 255,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, ParseError> {
        match tag {
            0 => Ok(ObjectType::File),
            1 => Ok(ObjectType::Directory),
            2 => Ok(ObjectType::Symlink),
            255 => Ok(ObjectType::Deleted),
            other => Err(ParseError::UnknownObjectType(other)),
        }
    }
}

/// Content-defined chunking algorithm used to cut a file into chunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingAlgorithm {
    #[default]
    Rabin,
}

impl ChunkingAlgorithm {
    pub fn tag(self) -> u8 {
        match self {
            ChunkingAlgorithm::Rabin => 0,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, UnsupportedAlgorithm> {
        match tag {
            0 => Ok(ChunkingAlgorithm::Rabin),
            other => Err(UnsupportedAlgorithm::Chunking(other)),
        }
    }
}

/// Strong hash used to content-address chunk ciphertext
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrongHashType {
    #[default]
    #[serde(rename = "sha3-256")]
    Sha3_256,
}

impl StrongHashType {
    pub fn tag(self) -> u8 {
        match self {
            StrongHashType::Sha3_256 => 0,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, UnsupportedAlgorithm> {
        match tag {
            0 => Ok(StrongHashType::Sha3_256),
            other => Err(UnsupportedAlgorithm::StrongHash(other)),
        }
    }

    /// Digest length in bytes
    pub fn digest_len(self) -> usize {
        match self {
            StrongHashType::Sha3_256 => 32,
        }
    }
}

/// How the IV of each chunk is chosen when it is sealed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkIvPolicy {
    /// IV taken from the plaintext auth code: equal plaintext under the same
    /// secret yields equal ciphertext, so chunks deduplicate across files.
    #[default]
    Convergent,
    /// Fresh random IV per chunk
    Random,
}

/// Parameters of the Rabin rolling fingerprint. Stored encrypted inside a
/// file Meta because they influence where chunk boundaries fall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RabinParams {
    pub polynomial: u64,
    pub polynomial_degree: u32,
    pub polynomial_shift: u32,
    pub avg_bits: u32,
}

impl RabinParams {
    /// Encoded length: u64 + 3 × u32, big-endian
    pub const ENCODED_LEN: usize = 20;

    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0..8].copy_from_slice(&self.polynomial.to_be_bytes());
        out[8..12].copy_from_slice(&self.polynomial_degree.to_be_bytes());
        out[12..16].copy_from_slice(&self.polynomial_shift.to_be_bytes());
        out[16..20].copy_from_slice(&self.avg_bits.to_be_bytes());
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        let bytes: &[u8; Self::ENCODED_LEN] =
            data.try_into().map_err(|_| ParseError::RabinParamsLength {
                expected: Self::ENCODED_LEN,
                actual: data.len(),
            })?;

        let u32_at = |at: usize| {
            u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let mut poly = [0u8; 8];
        poly.copy_from_slice(&bytes[0..8]);

        Ok(Self {
            polynomial: u64::from_be_bytes(poly),
            polynomial_degree: u32_at(8),
            polynomial_shift: u32_at(12),
            avg_bits: u32_at(16),
        })
    }
}

impl Default for RabinParams {
    fn default() -> Self {
        Self {
            polynomial: 0x3DA3_358B_4DC1_73,
            polynomial_degree: 53,
            polynomial_shift: 53 - 8,
            avg_bits: 20,
        }
    }
}

/// Lookup key for one version of one path, announced by peers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathRevision {
    pub path_id: Vec<u8>,
    pub revision: i64,
}
