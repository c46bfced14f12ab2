//! Structural validation of parsed Metas
//!
//! Runs without a secret: every peer, including download-only ones, must be
//! able to reject a malformed record before adopting or relaying it.

use lvsync_core::{RabinParams, ValidationFailure};
use lvsync_crypto::{EncryptedField, AUTH_CODE_SIZE, BLOCK_SIZE, IV_SIZE};
use tracing::debug;

use crate::codec::MAX_FIELD_LEN;
use crate::meta::{FileContent, Meta, MetaKind};
use crate::path::PATH_ID_LEN;

/// Encrypted RabinParams: PKCS#7 always adds at least one byte of padding.
const CHUNKING_PARAMS_CIPHERTEXT_LEN: usize =
    (RabinParams::ENCODED_LEN / BLOCK_SIZE + 1) * BLOCK_SIZE;

impl Meta {
    pub fn validate(&self) -> Result<(), ValidationFailure> {
        let path_id = self.path_id();
        if path_id.len() != PATH_ID_LEN {
            return Err(ValidationFailure::PathIdLength {
                expected: PATH_ID_LEN,
                actual: path_id.len(),
            });
        }
        check_field(self.header().encrypted_path(), "encrypted_path")?;

        match self.kind() {
            MetaKind::File(content) => validate_file(content),
            MetaKind::Symlink { target } => check_field(target, "symlink target"),
            MetaKind::Directory | MetaKind::Deleted => Ok(()),
        }
    }

    pub fn is_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(reason) => {
                debug!(path_id = %self.path_id_hex(), %reason, "meta failed validation");
                false
            }
        }
    }
}

fn check_field(field: &EncryptedField, name: &'static str) -> Result<(), ValidationFailure> {
    field.check(name)?;
    if field.ciphertext().len() > MAX_FIELD_LEN {
        return Err(ValidationFailure::FieldTooLong {
            field: name,
            len: field.ciphertext().len(),
            limit: MAX_FIELD_LEN,
        });
    }
    Ok(())
}

fn validate_file(content: &FileContent) -> Result<(), ValidationFailure> {
    let min = content.min_chunksize();
    let max = content.max_chunksize();
    if max < min {
        return Err(ValidationFailure::ChunkBoundsInverted { min, max });
    }
    let params = content.encrypted_chunking_params();
    check_field(params, "chunking params")?;
    if params.ciphertext().len() != CHUNKING_PARAMS_CIPHERTEXT_LEN {
        return Err(ValidationFailure::ChunkingParamsLength {
            expected: CHUNKING_PARAMS_CIPHERTEXT_LEN,
            actual: params.ciphertext().len(),
        });
    }

    let chunks = content.chunks();
    if chunks.is_empty() {
        if min > 0 {
            return Err(ValidationFailure::EmptyChunkList(min));
        }
        return Ok(());
    }

    let digest_len = content.strong_hash().digest_len();
    let last = chunks.len() - 1;
    let mut total: u64 = 0;

    for (index, chunk) in chunks.iter().enumerate() {
        let size = chunk.plaintext_size;
        if size == 0 {
            return Err(ValidationFailure::EmptyChunk { index });
        }
        // the final chunk holds whatever is left, so only the upper bound applies
        let lower = if index == last { 1 } else { min };
        if size < lower || size > max {
            return Err(ValidationFailure::ChunkSizeOutOfBounds {
                index,
                size,
                min,
                max,
            });
        }
        if chunk.content_hash.len() != digest_len {
            return Err(ValidationFailure::ContentHashLength {
                index,
                expected: digest_len,
                actual: chunk.content_hash.len(),
            });
        }
        if chunk.iv.len() != IV_SIZE {
            return Err(ValidationFailure::ChunkIvLength {
                index,
                expected: IV_SIZE,
                actual: chunk.iv.len(),
            });
        }
        if chunk.auth_code.len() != AUTH_CODE_SIZE {
            return Err(ValidationFailure::AuthCodeLength {
                index,
                expected: AUTH_CODE_SIZE,
                actual: chunk.auth_code.len(),
            });
        }
        total = total
            .checked_add(u64::from(size))
            .ok_or(ValidationFailure::SizeOverflow)?;
    }
    Ok(())
}
