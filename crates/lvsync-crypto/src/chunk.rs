//! Per-chunk AES-256-CBC encryption, content hashing, and authentication
//!
//! Each content-defined chunk is recorded as:
//! ```text
//! content_hash    strong hash of the ciphertext (content-addressing key)
//! plaintext_size  length before padding
//! iv              16-byte CBC IV
//! auth_code       HMAC-SHA3-256 of the plaintext (ChunkAuth key)
//! ```
//!
//! The hash addresses ciphertext so peers without the secret can store and
//! deduplicate chunks; the auth code catches corruption after decryption.

use lvsync_core::{ChunkIvPolicy, CryptoError, StrongHashType};
use tracing::debug;

use crate::field::{cbc_decrypt, cbc_encrypt, random_iv};
use crate::hash::{compute_auth_code, compute_strong_hash, verify_auth_code};
use crate::keys::{KeyDerivation, KeyPurpose, SymmetricKey};
use crate::IV_SIZE;

/// Encrypt one chunk whose boundaries were already fixed by the chunker.
///
/// The IV is supplied by the caller; see [`ChunkIvPolicy`] for the policies
/// [`Chunk::seal`] offers.
pub fn encrypt_chunk(
    plaintext: &[u8],
    key: &SymmetricKey,
    iv: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let iv: &[u8; IV_SIZE] = iv.try_into().map_err(|_| {
        CryptoError::EncryptFailed(format!("chunk iv must be {IV_SIZE} bytes, got {}", iv.len()))
    })?;
    Ok(cbc_encrypt(key, iv, plaintext))
}

/// Decrypt one chunk and check its length against the recorded size.
pub fn decrypt_chunk(
    ciphertext: &[u8],
    plaintext_size: u32,
    key: &SymmetricKey,
    iv: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let plaintext = cbc_decrypt(key, iv, ciphertext)?;
    if plaintext.len() != plaintext_size as usize {
        debug!(
            expected = plaintext_size,
            actual = plaintext.len(),
            "chunk plaintext size mismatch"
        );
        return Err(CryptoError::DecryptFailed);
    }
    Ok(plaintext)
}

/// The two keys every chunk operation needs, derived once per batch.
#[derive(Debug, Clone)]
pub struct ChunkKeys {
    pub content: SymmetricKey,
    pub auth: SymmetricKey,
}

impl ChunkKeys {
    pub fn derive(secret: &impl KeyDerivation) -> Result<Self, CryptoError> {
        Ok(Self {
            content: secret.derive_key(KeyPurpose::ChunkContent)?,
            auth: secret.derive_key(KeyPurpose::ChunkAuth)?,
        })
    }
}

/// One entry of a file's ordered chunk list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chunk {
    pub content_hash: Vec<u8>,
    pub plaintext_size: u32,
    pub iv: Vec<u8>,
    pub auth_code: Vec<u8>,
}

/// A chunk record together with the ciphertext it describes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedChunk {
    pub chunk: Chunk,
    pub ciphertext: Vec<u8>,
}

impl Chunk {
    /// Authenticate, encrypt, and hash one plaintext chunk.
    pub fn seal(
        plaintext: &[u8],
        keys: &ChunkKeys,
        policy: ChunkIvPolicy,
        hash_type: StrongHashType,
    ) -> Result<SealedChunk, CryptoError> {
        if plaintext.is_empty() {
            return Err(CryptoError::EncryptFailed("empty chunk".into()));
        }
        let plaintext_size = u32::try_from(plaintext.len()).map_err(|_| {
            CryptoError::EncryptFailed(format!("chunk of {} bytes exceeds u32", plaintext.len()))
        })?;

        let auth_code = compute_auth_code(&keys.auth, plaintext)?;
        let iv = match policy {
            ChunkIvPolicy::Convergent => {
                let mut iv = [0u8; IV_SIZE];
                iv.copy_from_slice(&auth_code[..IV_SIZE]);
                iv
            }
            ChunkIvPolicy::Random => random_iv(),
        };

        let ciphertext = cbc_encrypt(&keys.content, &iv, plaintext);
        let content_hash = compute_strong_hash(&ciphertext, hash_type);

        Ok(SealedChunk {
            chunk: Chunk {
                content_hash,
                plaintext_size,
                iv: iv.to_vec(),
                auth_code: auth_code.to_vec(),
            },
            ciphertext,
        })
    }

    /// Check that `ciphertext` is the data this record addresses. Needs no
    /// secret, so any peer can run it when chunk bytes arrive.
    pub fn verify_ciphertext(
        &self,
        ciphertext: &[u8],
        hash_type: StrongHashType,
    ) -> Result<(), CryptoError> {
        if compute_strong_hash(ciphertext, hash_type) != self.content_hash {
            return Err(CryptoError::ContentHashMismatch);
        }
        Ok(())
    }

    /// Verify the content hash, decrypt, and verify the plaintext auth code.
    pub fn open(
        &self,
        ciphertext: &[u8],
        keys: &ChunkKeys,
        hash_type: StrongHashType,
    ) -> Result<Vec<u8>, CryptoError> {
        self.verify_ciphertext(ciphertext, hash_type)?;
        let plaintext = decrypt_chunk(ciphertext, self.plaintext_size, &keys.content, &self.iv)?;
        verify_auth_code(&keys.auth, &plaintext, &self.auth_code)?;
        Ok(plaintext)
    }
}
