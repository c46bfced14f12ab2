//! Path normalization and keyed path ids
//!
//! Every peer must turn the same logical path into the same bytes before
//! hashing, or one file splits into several ids. The rule:
//!
//! 1. `\` is treated as a separator, same as `/`
//! 2. empty and `.` segments are dropped (leading, trailing, and repeated
//!    separators vanish)
//! 3. segments are rejoined with `/`; case and Unicode form are kept
//!    byte-for-byte
//!
//! `..` is not resolved: the watcher only ever reports paths inside the
//! folder root.

use lvsync_core::CryptoError;
use lvsync_crypto::{compute_auth_code, KeyDerivation, KeyPurpose};

/// Length of a path id (HMAC-SHA3-256 output)
pub const PATH_ID_LEN: usize = 32;

pub fn normalize_path(path: &str) -> String {
    path.split(|c| c == '/' || c == '\\')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// HMAC-SHA3-256 of the normalized path under the secret's path-id key.
///
/// Deterministic per (path, secret); reveals nothing about the path to a
/// peer without the key.
pub fn make_path_id(path: &str, secret: &impl KeyDerivation) -> Result<Vec<u8>, CryptoError> {
    let key = secret.derive_key(KeyPurpose::PathId)?;
    let normalized = normalize_path(path);
    Ok(compute_auth_code(&key, normalized.as_bytes())?.to_vec())
}
