//! AES-256-CBC encrypted field
//!
//! Format: a 16-byte random IV stored next to the PKCS#7-padded ciphertext.
//! A field carries no authentication of its own; the record signature (or a
//! separate auth code, as chunks use) provides integrity.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use lvsync_core::{CryptoError, ValidationFailure};
use rand::RngCore;

use crate::keys::SymmetricKey;
use crate::{BLOCK_SIZE, IV_SIZE};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub(crate) fn random_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

pub(crate) fn cbc_encrypt(key: &SymmetricKey, iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new(key.as_bytes().into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

pub(crate) fn cbc_decrypt(
    key: &SymmetricKey,
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::DecryptFailed);
    }
    let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|_| CryptoError::DecryptFailed)?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::InvalidPadding)
}

/// IV and ciphertext of one encrypted field (path, symlink target, chunking
/// parameters). Replaced, never mutated, when the plaintext changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncryptedField {
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
}

impl EncryptedField {
    /// Encrypt `plaintext` under a fresh random IV.
    pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> Self {
        let iv = random_iv();
        let ciphertext = cbc_encrypt(key, &iv, plaintext);
        Self {
            iv: iv.to_vec(),
            ciphertext,
        }
    }

    pub fn decrypt(&self, key: &SymmetricKey) -> Result<Vec<u8>, CryptoError> {
        cbc_decrypt(key, &self.iv, &self.ciphertext)
    }

    /// Reassemble a field read off the wire. Lengths are checked by
    /// [`EncryptedField::check`], not here.
    pub fn from_parts(iv: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self { iv, ciphertext }
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Structural invariant: block-sized IV, non-empty block-aligned ciphertext.
    pub fn check(&self, field: &'static str) -> Result<(), ValidationFailure> {
        if self.iv.len() != IV_SIZE {
            return Err(ValidationFailure::FieldIvLength {
                field,
                expected: IV_SIZE,
                actual: self.iv.len(),
            });
        }
        if self.ciphertext.is_empty() || self.ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(ValidationFailure::FieldCiphertextLength {
                field,
                len: self.ciphertext.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(b: u8) -> SymmetricKey {
        SymmetricKey::from_bytes([b; 32])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let k = key(1);
        let field = EncryptedField::encrypt(b"docs/readme.txt", &k);
        assert_eq!(field.decrypt(&k).unwrap(), b"docs/readme.txt");
        assert!(field.check("path").is_ok());
    }

    #[test]
    fn test_empty_plaintext_pads_to_one_block() {
        let k = key(1);
        let field = EncryptedField::encrypt(b"", &k);
        assert_eq!(field.ciphertext().len(), BLOCK_SIZE);
        assert_eq!(field.decrypt(&k).unwrap(), b"");
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let k = key(1);
        let a = EncryptedField::encrypt(b"same", &k);
        let b = EncryptedField::encrypt(b"same", &k);
        assert_ne!(a.iv(), b.iv());
        assert_ne!(a.ciphertext(), b.ciphertext());
    }

    #[test]
    fn test_wrong_key_never_yields_plaintext() {
        let plaintext = b"a path that must stay private";
        let field = EncryptedField::encrypt(plaintext, &key(1));
        match field.decrypt(&key(2)) {
            Ok(garbage) => assert_ne!(garbage, plaintext),
            Err(e) => assert!(matches!(
                e,
                CryptoError::InvalidPadding | CryptoError::DecryptFailed
            )),
        }
    }

    #[test]
    fn test_misaligned_ciphertext_fails() {
        let k = key(1);
        let field = EncryptedField::encrypt(b"hello", &k);
        let broken = EncryptedField::from_parts(
            field.iv().to_vec(),
            field.ciphertext()[..BLOCK_SIZE - 1].to_vec(),
        );
        assert_eq!(broken.decrypt(&k), Err(CryptoError::DecryptFailed));
        assert!(broken.check("path").is_err());
    }

    #[test]
    fn test_bad_iv_length_fails() {
        let k = key(1);
        let field = EncryptedField::encrypt(b"hello", &k);
        let broken = EncryptedField::from_parts(vec![0u8; 8], field.ciphertext().to_vec());
        assert_eq!(broken.decrypt(&k), Err(CryptoError::DecryptFailed));
        assert_eq!(
            broken.check("path"),
            Err(ValidationFailure::FieldIvLength {
                field: "path",
                expected: IV_SIZE,
                actual: 8
            })
        );
    }

    #[test]
    fn test_corrupted_padding_detected() {
        use cbc::cipher::block_padding::NoPadding;

        let k = key(3);
        let iv = [4u8; IV_SIZE];
        // a final block ending in 0x00 is never valid PKCS#7
        let mut block = [0u8; BLOCK_SIZE];
        block[..10].copy_from_slice(b"0123456789");
        let ct = Aes256CbcEnc::new(k.as_bytes().into(), (&iv).into())
            .encrypt_padded_vec_mut::<NoPadding>(&block);

        let broken = EncryptedField::from_parts(iv.to_vec(), ct);
        assert_eq!(broken.decrypt(&k), Err(CryptoError::InvalidPadding));
    }

    proptest! {
        #[test]
        fn roundtrip_any_plaintext(data in proptest::collection::vec(any::<u8>(), 0..=512)) {
            let k = key(5);
            let field = EncryptedField::encrypt(&data, &k);
            prop_assert_eq!(field.ciphertext().len() % BLOCK_SIZE, 0);
            prop_assert!(field.ciphertext().len() > data.len());
            prop_assert_eq!(field.decrypt(&k).unwrap(), data);
        }
    }
}
