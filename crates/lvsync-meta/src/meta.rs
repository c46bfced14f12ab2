//! The Meta record: one immutable version of one synchronized object
//!
//! A Meta is a common header plus a kind-specific body. Builders return new
//! values; nothing mutates a Meta after construction, so a record handed to
//! the transport can be read from any thread without locking.

use std::ops::Range;

use lvsync_core::{
    ChunkingAlgorithm, ChunkingConfig, CryptoError, LvsyncError, LvsyncResult, ObjectType,
    PathRevision, RabinParams, StrongHashType, ValidationFailure,
};
use lvsync_crypto::{Chunk, EncryptedField, KeyDerivation, KeyPurpose};

use crate::path::{make_path_id, normalize_path};

/// Platform attribute bits. Only one platform's fields travel with a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PlatformAttrs {
    #[default]
    None,
    Windows {
        attrib: u32,
    },
    Unix {
        mode: u32,
        uid: u32,
        gid: u32,
    },
}

/// Fields every Meta carries regardless of kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaHeader {
    path_id: Vec<u8>,
    encrypted_path: EncryptedField,
    revision: i64,
    mtime: i64,
    platform: PlatformAttrs,
}

impl MetaHeader {
    /// Derive the path id and encrypt the normalized path in one step, so the
    /// two always agree under `secret`.
    pub fn new(
        path: &str,
        secret: &impl KeyDerivation,
        revision: i64,
        mtime: i64,
        platform: PlatformAttrs,
    ) -> Result<Self, CryptoError> {
        let (path_id, encrypted_path) = encrypt_path(path, secret)?;
        Ok(Self {
            path_id,
            encrypted_path,
            revision,
            mtime,
            platform,
        })
    }

    pub(crate) fn from_parts(
        path_id: Vec<u8>,
        encrypted_path: EncryptedField,
        revision: i64,
        mtime: i64,
        platform: PlatformAttrs,
    ) -> Self {
        Self {
            path_id,
            encrypted_path,
            revision,
            mtime,
            platform,
        }
    }

    pub fn path_id(&self) -> &[u8] {
        &self.path_id
    }

    pub fn encrypted_path(&self) -> &EncryptedField {
        &self.encrypted_path
    }

    /// Logical timestamp of this version; higher wins unless sync logic
    /// decides otherwise.
    pub fn revision(&self) -> i64 {
        self.revision
    }

    pub fn mtime(&self) -> i64 {
        self.mtime
    }

    pub fn platform(&self) -> PlatformAttrs {
        self.platform
    }
}

fn encrypt_path(
    path: &str,
    secret: &impl KeyDerivation,
) -> Result<(Vec<u8>, EncryptedField), CryptoError> {
    let path_id = make_path_id(path, secret)?;
    let key = secret.derive_key(KeyPurpose::PathEncryption)?;
    let encrypted_path = EncryptedField::encrypt(normalize_path(path).as_bytes(), &key);
    Ok((path_id, encrypted_path))
}

fn decrypt_utf8(
    field: &EncryptedField,
    secret: &impl KeyDerivation,
    purpose: KeyPurpose,
) -> Result<String, CryptoError> {
    let key = secret.derive_key(purpose)?;
    let plaintext = field.decrypt(&key)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptFailed)
}

/// Body of a file Meta: chunking parameters and the ordered chunk list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    algorithm: ChunkingAlgorithm,
    strong_hash: StrongHashType,
    min_chunksize: u32,
    max_chunksize: u32,
    encrypted_chunking_params: EncryptedField,
    chunks: Vec<Chunk>,
}

impl FileContent {
    /// Record `chunks` under the chunking settings in `config`.
    ///
    /// A file with no chunks records `min_chunksize = 0`: a zero-length file
    /// has no chunk that could satisfy a positive lower bound.
    pub fn new(
        config: &ChunkingConfig,
        chunks: Vec<Chunk>,
        secret: &impl KeyDerivation,
    ) -> Result<Self, CryptoError> {
        let min_chunksize = if chunks.is_empty() {
            0
        } else {
            config.min_chunksize
        };
        Ok(Self {
            algorithm: config.algorithm,
            strong_hash: config.strong_hash,
            min_chunksize,
            max_chunksize: config.max_chunksize,
            encrypted_chunking_params: encrypt_rabin_params(&config.rabin, secret)?,
            chunks,
        })
    }

    pub(crate) fn from_parts(
        algorithm: ChunkingAlgorithm,
        strong_hash: StrongHashType,
        min_chunksize: u32,
        max_chunksize: u32,
        encrypted_chunking_params: EncryptedField,
        chunks: Vec<Chunk>,
    ) -> Self {
        Self {
            algorithm,
            strong_hash,
            min_chunksize,
            max_chunksize,
            encrypted_chunking_params,
            chunks,
        }
    }

    pub fn algorithm(&self) -> ChunkingAlgorithm {
        self.algorithm
    }

    pub fn strong_hash(&self) -> StrongHashType {
        self.strong_hash
    }

    pub fn min_chunksize(&self) -> u32 {
        self.min_chunksize
    }

    pub fn max_chunksize(&self) -> u32 {
        self.max_chunksize
    }

    pub fn encrypted_chunking_params(&self) -> &EncryptedField {
        &self.encrypted_chunking_params
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn rabin_params(&self, secret: &impl KeyDerivation) -> LvsyncResult<RabinParams> {
        let key = secret.derive_key(KeyPurpose::ChunkingParams)?;
        let plaintext = self.encrypted_chunking_params.decrypt(&key)?;
        Ok(RabinParams::from_bytes(&plaintext)?)
    }

    /// Same content with `params` re-encrypted under a fresh IV.
    pub fn with_rabin_params(
        &self,
        params: &RabinParams,
        secret: &impl KeyDerivation,
    ) -> Result<Self, CryptoError> {
        Ok(Self {
            encrypted_chunking_params: encrypt_rabin_params(params, secret)?,
            ..self.clone()
        })
    }

    /// Total plaintext size. Saturates instead of wrapping on hostile
    /// input; `validate` reports the overflow.
    pub fn size(&self) -> u64 {
        self.chunks
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(u64::from(c.plaintext_size)))
    }

    /// Plaintext byte range of each chunk, in order.
    pub fn chunk_ranges(&self) -> impl Iterator<Item = Range<u64>> + '_ {
        self.chunks.iter().scan(0u64, |offset, chunk| {
            let start = *offset;
            *offset = start.saturating_add(u64::from(chunk.plaintext_size));
            Some(start..*offset)
        })
    }

    /// The chunk holding plaintext byte `offset`, with its index.
    pub fn chunk_at(&self, offset: u64) -> Option<(usize, &Chunk)> {
        self.chunk_ranges()
            .position(|range| range.contains(&offset))
            .map(|index| (index, &self.chunks[index]))
    }
}

fn encrypt_rabin_params(
    params: &RabinParams,
    secret: &impl KeyDerivation,
) -> Result<EncryptedField, CryptoError> {
    let key = secret.derive_key(KeyPurpose::ChunkingParams)?;
    Ok(EncryptedField::encrypt(&params.to_bytes(), &key))
}

/// Kind-specific body of a Meta
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaKind {
    File(FileContent),
    Directory,
    Symlink { target: EncryptedField },
    Deleted,
}

impl MetaKind {
    /// Symlink body with `target` encrypted under the symlink key.
    pub fn symlink(target: &str, secret: &impl KeyDerivation) -> Result<Self, CryptoError> {
        let key = secret.derive_key(KeyPurpose::SymlinkEncryption)?;
        Ok(MetaKind::Symlink {
            target: EncryptedField::encrypt(target.as_bytes(), &key),
        })
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            MetaKind::File(_) => ObjectType::File,
            MetaKind::Directory => ObjectType::Directory,
            MetaKind::Symlink { .. } => ObjectType::Symlink,
            MetaKind::Deleted => ObjectType::Deleted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    header: MetaHeader,
    kind: MetaKind,
}

impl Meta {
    pub fn new(header: MetaHeader, kind: MetaKind) -> Self {
        Self { header, kind }
    }

    pub fn header(&self) -> &MetaHeader {
        &self.header
    }

    pub fn kind(&self) -> &MetaKind {
        &self.kind
    }

    pub fn object_type(&self) -> ObjectType {
        self.kind.object_type()
    }

    pub fn path_id(&self) -> &[u8] {
        self.header.path_id()
    }

    /// Lowercase hex of the path id, for logs and lookups by humans
    pub fn path_id_hex(&self) -> String {
        hex::encode(&self.header.path_id)
    }

    pub fn revision(&self) -> i64 {
        self.header.revision()
    }

    pub fn mtime(&self) -> i64 {
        self.header.mtime()
    }

    pub fn platform(&self) -> PlatformAttrs {
        self.header.platform()
    }

    pub fn path_revision(&self) -> PathRevision {
        PathRevision {
            path_id: self.header.path_id.clone(),
            revision: self.header.revision,
        }
    }

    pub fn file(&self) -> Option<&FileContent> {
        match &self.kind {
            MetaKind::File(content) => Some(content),
            _ => None,
        }
    }

    /// Ordered chunk list; empty for every kind but File.
    pub fn chunks(&self) -> &[Chunk] {
        self.file().map(FileContent::chunks).unwrap_or(&[])
    }

    pub fn size(&self) -> u64 {
        self.file().map_or(0, FileContent::size)
    }

    pub fn path(&self, secret: &impl KeyDerivation) -> Result<String, CryptoError> {
        decrypt_utf8(&self.header.encrypted_path, secret, KeyPurpose::PathEncryption)
    }

    /// Symlink target, or `None` for other kinds.
    pub fn symlink_path(&self, secret: &impl KeyDerivation) -> Result<Option<String>, CryptoError> {
        match &self.kind {
            MetaKind::Symlink { target } => {
                decrypt_utf8(target, secret, KeyPurpose::SymlinkEncryption).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Rabin parameters of a file, or `None` for other kinds.
    pub fn rabin_params(&self, secret: &impl KeyDerivation) -> LvsyncResult<Option<RabinParams>> {
        self.file().map(|f| f.rabin_params(secret)).transpose()
    }

    /// Same record moved to `path` at `revision`: new path id and encrypted
    /// path together.
    pub fn with_path(
        &self,
        path: &str,
        secret: &impl KeyDerivation,
        revision: i64,
    ) -> LvsyncResult<Meta> {
        self.check_next_revision(revision)?;
        let (path_id, encrypted_path) = encrypt_path(path, secret)?;
        Ok(Meta {
            header: MetaHeader {
                path_id,
                encrypted_path,
                revision,
                ..self.header.clone()
            },
            kind: self.kind.clone(),
        })
    }

    /// Same content under a later revision.
    pub fn with_revision(&self, revision: i64) -> Result<Meta, ValidationFailure> {
        self.check_next_revision(revision)?;
        Ok(Meta {
            header: MetaHeader {
                revision,
                ..self.header.clone()
            },
            kind: self.kind.clone(),
        })
    }

    /// Same object with a new body at `revision`.
    pub fn with_kind(&self, kind: MetaKind, revision: i64) -> Result<Meta, ValidationFailure> {
        self.check_next_revision(revision)?;
        Ok(Meta {
            header: MetaHeader {
                revision,
                ..self.header.clone()
            },
            kind,
        })
    }

    /// A (path_id, revision) pair names exactly one record, so every
    /// derived record must move the revision forward.
    fn check_next_revision(&self, revision: i64) -> Result<(), ValidationFailure> {
        if revision <= self.header.revision {
            return Err(ValidationFailure::RevisionNotIncreasing {
                current: self.header.revision,
                proposed: revision,
            });
        }
        Ok(())
    }

    /// Content-hash check for chunk bytes received separately from the
    /// record. Required before storing or relaying chunk `index`.
    pub fn verify_chunk_data(&self, index: usize, ciphertext: &[u8]) -> LvsyncResult<()> {
        let file = self.file().ok_or(ValidationFailure::ChunkIndexOutOfRange {
            index,
            count: 0,
        })?;
        let chunk = file
            .chunks
            .get(index)
            .ok_or(ValidationFailure::ChunkIndexOutOfRange {
                index,
                count: file.chunks.len(),
            })?;
        chunk
            .verify_ciphertext(ciphertext, file.strong_hash)
            .map_err(LvsyncError::from)
    }
}
