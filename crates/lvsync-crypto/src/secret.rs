//! Folder secret: the capability every purpose key is derived from
//!
//! Textual form is one access-level character followed by 64 hex chars:
//! ```text
//! W<root key hex>    read-write
//! R<root key hex>    read-only
//! D<folder id hex>   download only, no key material
//! ```

use std::fmt;
use std::str::FromStr;

use lvsync_core::CryptoError;
use rand::RngCore;

use crate::hash::sha3_256;
use crate::keys::{hkdf_derive, KeyDerivation, KeyPurpose, SymmetricKey};
use crate::KEY_SIZE;

const FOLDER_ID_DOMAIN: &[u8] = b"lvsync-folder-id";

/// What a secret holder may do with a folder. Ordered from least to most
/// capable.
///
/// Only `Download` is enforced cryptographically. `ReadOnly` and `ReadWrite`
/// hold the same root key, so the text of an `R` secret with its prefix
/// swapped to `W` parses as a full read-write secret. The distinction tells
/// well-behaved peers not to publish new records; it grants nothing until
/// records are signed with a key the read-only form lacks. Hand out an `R`
/// secret only where a `W` one would also be acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessLevel {
    /// May store and relay records and ciphertext, never decrypt them
    Download,
    ReadOnly,
    ReadWrite,
}

impl AccessLevel {
    fn prefix(self) -> char {
        match self {
            AccessLevel::ReadWrite => 'W',
            AccessLevel::ReadOnly => 'R',
            AccessLevel::Download => 'D',
        }
    }

    fn from_prefix(c: char) -> Option<Self> {
        match c {
            'W' => Some(AccessLevel::ReadWrite),
            'R' => Some(AccessLevel::ReadOnly),
            'D' => Some(AccessLevel::Download),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Secret {
    level: AccessLevel,
    root: Option<SymmetricKey>,
    folder_id: [u8; 32],
}

impl Secret {
    /// New read-write secret with a random root key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_root_key(SymmetricKey::from_bytes(bytes))
    }

    /// Read-write secret over an existing root key.
    pub fn from_root_key(root: SymmetricKey) -> Self {
        let folder_id = folder_id_of(&root);
        Self {
            level: AccessLevel::ReadWrite,
            root: Some(root),
            folder_id,
        }
    }

    pub fn level(&self) -> AccessLevel {
        self.level
    }

    /// Public folder identifier, identical for every access level.
    pub fn folder_id(&self) -> &[u8; 32] {
        &self.folder_id
    }

    pub fn can_decrypt(&self) -> bool {
        self.root.is_some()
    }

    /// Copy of this secret at a lower (or equal) access level.
    pub fn downgrade(&self, level: AccessLevel) -> Result<Secret, CryptoError> {
        if level > self.level {
            return Err(CryptoError::InvalidSecret(format!(
                "cannot raise access level from {:?} to {:?}",
                self.level, level
            )));
        }
        let root = match level {
            AccessLevel::Download => None,
            _ => self.root.clone(),
        };
        Ok(Secret {
            level,
            root,
            folder_id: self.folder_id,
        })
    }
}

impl KeyDerivation for Secret {
    fn derive_key(&self, purpose: KeyPurpose) -> Result<SymmetricKey, CryptoError> {
        let root = self
            .root
            .as_ref()
            .ok_or(CryptoError::KeyUnavailable(purpose.name()))?;
        hkdf_derive(root.as_bytes(), purpose.info())
    }
}

fn folder_id_of(root: &SymmetricKey) -> [u8; 32] {
    let mut input = Vec::with_capacity(FOLDER_ID_DOMAIN.len() + KEY_SIZE);
    input.extend_from_slice(FOLDER_ID_DOMAIN);
    input.extend_from_slice(root.as_bytes());
    let id = sha3_256(&input);
    zeroize::Zeroize::zeroize(&mut input);
    id
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = match &self.root {
            Some(root) => hex::encode(root.as_bytes()),
            None => hex::encode(self.folder_id),
        };
        write!(f, "{}{}", self.level.prefix(), payload)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("level", &self.level)
            .field("folder_id", &hex::encode(self.folder_id))
            .finish_non_exhaustive()
    }
}

impl FromStr for Secret {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let level = chars
            .next()
            .and_then(AccessLevel::from_prefix)
            .ok_or_else(|| CryptoError::InvalidSecret("unknown access level prefix".into()))?;

        let payload = hex::decode(chars.as_str())
            .map_err(|e| CryptoError::InvalidSecret(format!("hex decode: {e}")))?;
        let bytes: [u8; 32] = payload.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidSecret(format!("expected 32 bytes, got {}", payload.len()))
        })?;

        match level {
            AccessLevel::Download => Ok(Secret {
                level,
                root: None,
                folder_id: bytes,
            }),
            _ => Secret::from_root_key(SymmetricKey::from_bytes(bytes)).downgrade(level),
        }
    }
}
