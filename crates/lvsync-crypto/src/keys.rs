//! Symmetric keys and per-purpose derivation

use hkdf::Hkdf;
use lvsync_core::CryptoError;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// A 256-bit symmetric key. Zeroized on drop.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// What a derived key is used for. Every purpose yields an independent key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    /// Keyed hash turning a normalized path into a path id
    PathId,
    PathEncryption,
    SymlinkEncryption,
    ChunkingParams,
    ChunkContent,
    /// Plaintext authentication codes of chunks
    ChunkAuth,
}

impl KeyPurpose {
    pub const ALL: [KeyPurpose; 6] = [
        KeyPurpose::PathId,
        KeyPurpose::PathEncryption,
        KeyPurpose::SymlinkEncryption,
        KeyPurpose::ChunkingParams,
        KeyPurpose::ChunkContent,
        KeyPurpose::ChunkAuth,
    ];

    /// HKDF info string
    pub fn info(self) -> &'static [u8] {
        match self {
            KeyPurpose::PathId => b"lvsync-path-id",
            KeyPurpose::PathEncryption => b"lvsync-path",
            KeyPurpose::SymlinkEncryption => b"lvsync-symlink",
            KeyPurpose::ChunkingParams => b"lvsync-chunking",
            KeyPurpose::ChunkContent => b"lvsync-chunk",
            KeyPurpose::ChunkAuth => b"lvsync-chunk-auth",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KeyPurpose::PathId => "path id",
            KeyPurpose::PathEncryption => "path encryption",
            KeyPurpose::SymlinkEncryption => "symlink encryption",
            KeyPurpose::ChunkingParams => "chunking parameters",
            KeyPurpose::ChunkContent => "chunk content",
            KeyPurpose::ChunkAuth => "chunk authentication",
        }
    }
}

/// Capability to derive purpose keys. Implemented by [`crate::Secret`].
pub trait KeyDerivation {
    fn derive_key(&self, purpose: KeyPurpose) -> Result<SymmetricKey, CryptoError>;
}

/// HKDF-SHA256 key derivation with a domain-specific info string.
pub(crate) fn hkdf_derive(ikm: &[u8; KEY_SIZE], info: &[u8]) -> Result<SymmetricKey, CryptoError> {
    let hkdf = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(info, &mut okm)
        .map_err(|e| CryptoError::Kdf(format!("HKDF expand failed: {e}")))?;
    Ok(SymmetricKey::from_bytes(okm))
}
