//! lvsync-crypto: secret capability, field encryption, and chunk integrity
//!
//! Architecture: Chunk-then-Encrypt with AES-256-CBC, SHA3-256 content addressing
//!
//! Pipeline: plaintext chunk → HMAC-SHA3 auth code → AES-256-CBC → SHA3-256 hash of ciphertext
//!
//! Key hierarchy:
//! ```text
//! Secret (256-bit root key, random or Argon2id from passphrase)
//!   ├── Path id key          (HKDF, info="lvsync-path-id")      HMAC-SHA3-256 over normalized path
//!   ├── Path key             (HKDF, info="lvsync-path")         AES-256-CBC, random IV
//!   ├── Symlink key          (HKDF, info="lvsync-symlink")      AES-256-CBC, random IV
//!   ├── Chunking params key  (HKDF, info="lvsync-chunking")     AES-256-CBC, random IV
//!   ├── Chunk content key    (HKDF, info="lvsync-chunk")        AES-256-CBC, convergent or random IV
//!   └── Chunk auth key       (HKDF, info="lvsync-chunk-auth")   HMAC-SHA3-256 over plaintext
//! ```

pub mod chunk;
pub mod field;
pub mod hash;
pub mod kdf;
pub mod keys;
pub mod secret;

pub use chunk::{decrypt_chunk, encrypt_chunk, Chunk, ChunkKeys, SealedChunk};
pub use field::EncryptedField;
pub use hash::{
    compute_auth_code, compute_strong_hash, compute_strong_hash_tagged, verify_auth_code,
};
pub use keys::{KeyDerivation, KeyPurpose, SymmetricKey};
pub use secret::{AccessLevel, Secret};

/// Size of a symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// AES block size, which is also the CBC IV size
pub const BLOCK_SIZE: usize = 16;

/// Size of a CBC initialization vector
pub const IV_SIZE: usize = BLOCK_SIZE;

/// Size of an HMAC-SHA3-256 authentication code
pub const AUTH_CODE_SIZE: usize = 32;
