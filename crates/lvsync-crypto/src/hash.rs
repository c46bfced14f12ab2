//! SHA3-256 content hashing and HMAC-SHA3-256 authentication codes

use hmac::{Hmac, Mac};
use lvsync_core::{CryptoError, StrongHashType, UnsupportedAlgorithm};
use sha3::{Digest, Sha3_256};

use crate::keys::SymmetricKey;
use crate::AUTH_CODE_SIZE;

type HmacSha3 = Hmac<Sha3_256>;

pub(crate) fn sha3_256(data: &[u8]) -> [u8; 32] {
    Sha3_256::digest(data).into()
}

/// Hash `data` with the given strong hash. Used as the content-addressing key
/// of chunk ciphertext.
pub fn compute_strong_hash(data: &[u8], hash_type: StrongHashType) -> Vec<u8> {
    match hash_type {
        StrongHashType::Sha3_256 => sha3_256(data).to_vec(),
    }
}

/// Same as [`compute_strong_hash`] for a raw wire tag. Unknown tags are
/// rejected, never treated as a default.
pub fn compute_strong_hash_tagged(data: &[u8], tag: u8) -> Result<Vec<u8>, UnsupportedAlgorithm> {
    StrongHashType::from_tag(tag).map(|ty| compute_strong_hash(data, ty))
}

/// HMAC-SHA3-256 of `data`.
pub fn compute_auth_code(
    key: &SymmetricKey,
    data: &[u8],
) -> Result<[u8; AUTH_CODE_SIZE], CryptoError> {
    let mut mac = <HmacSha3 as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Kdf(format!("HMAC key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// Constant-time check of an HMAC-SHA3-256 code.
pub fn verify_auth_code(key: &SymmetricKey, data: &[u8], code: &[u8]) -> Result<(), CryptoError> {
    let mut mac = <HmacSha3 as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Kdf(format!("HMAC key: {e}")))?;
    mac.update(data);
    mac.verify_slice(code).map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sha3_empty_input_known_answer() {
        let h = compute_strong_hash(b"", StrongHashType::Sha3_256);
        assert_eq!(
            hex::encode(h),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    #[test]
    fn tagged_hash_rejects_unknown() {
        assert!(compute_strong_hash_tagged(b"abc", 0).is_ok());
        assert_eq!(
            compute_strong_hash_tagged(b"abc", 3),
            Err(UnsupportedAlgorithm::StrongHash(3))
        );
    }

    #[test]
    fn auth_code_verifies_and_detects_tamper() {
        let key = SymmetricKey::from_bytes([9u8; 32]);
        let code = compute_auth_code(&key, b"chunk plaintext").unwrap();

        assert!(verify_auth_code(&key, b"chunk plaintext", &code).is_ok());
        assert_eq!(
            verify_auth_code(&key, b"chunk plaintexT", &code),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn auth_code_depends_on_key() {
        let a = compute_auth_code(&SymmetricKey::from_bytes([1u8; 32]), b"data").unwrap();
        let b = compute_auth_code(&SymmetricKey::from_bytes([2u8; 32]), b"data").unwrap();
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn strong_hash_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..=4096)) {
            let h1 = compute_strong_hash(&data, StrongHashType::Sha3_256);
            let h2 = compute_strong_hash(&data, StrongHashType::Sha3_256);
            prop_assert_eq!(h1.len(), StrongHashType::Sha3_256.digest_len());
            prop_assert_eq!(h1, h2);
        }
    }
}
