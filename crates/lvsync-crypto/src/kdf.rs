//! Key derivation: Argon2id passphrase → secret root key

use argon2::{Algorithm, Argon2, Params, Version};
use lvsync_core::{CryptoError, KdfConfig};
use secrecy::{ExposeSecret, SecretString};

use crate::keys::SymmetricKey;
use crate::secret::Secret;
use crate::KEY_SIZE;

/// Derive a 256-bit root key from a passphrase and salt using Argon2id.
///
/// The salt should be 16 bytes, randomly generated and shared with every
/// device that joins the folder (it does not need to be secret).
pub fn derive_root_key(
    passphrase: &SecretString,
    salt: &[u8; 16],
    params: &KdfConfig,
) -> Result<SymmetricKey, CryptoError> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::Kdf(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::Kdf(format!("Argon2id KDF failed: {e}")))?;

    Ok(SymmetricKey::from_bytes(key))
}

impl Secret {
    /// Read-write secret whose root key is derived from a passphrase.
    pub fn from_passphrase(
        passphrase: &SecretString,
        salt: &[u8; 16],
        params: &KdfConfig,
    ) -> Result<Secret, CryptoError> {
        derive_root_key(passphrase, salt, params).map(Secret::from_root_key)
    }
}
