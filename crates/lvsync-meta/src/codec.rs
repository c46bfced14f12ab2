//! Canonical binary encoding of a Meta
//!
//! Format version 1, all integers big-endian:
//! ```text
//! u8   format version
//! blob path_id
//! blob path iv, blob path ciphertext
//! u8   object type tag
//! i64  revision, i64 mtime
//! u8   platform tag (0 none, 1 windows, 2 unix) + attribute words
//! --   symlink: blob target iv, blob target ciphertext
//! --   file:    u8 algorithm, u8 strong hash, u32 min, u32 max,
//!               blob params iv, blob params ciphertext, u32 chunk count,
//!               per chunk: blob content_hash, u32 plaintext_size,
//!                          blob iv, blob auth_code
//! blob = u32 length + bytes
//! ```
//!
//! Two peers holding equal Metas produce identical bytes, so the encoding
//! can be signed and compared directly.

use bytes::{Buf, BufMut};
use lvsync_core::{ChunkingAlgorithm, ObjectType, ParseError, StrongHashType};
use lvsync_crypto::{Chunk, EncryptedField};
use tracing::debug;

use crate::meta::{FileContent, Meta, MetaHeader, MetaKind, PlatformAttrs};

pub const FORMAT_VERSION: u8 = 1;

/// Upper bound on any length-prefixed byte field
pub const MAX_FIELD_LEN: usize = 64 * 1024;

/// Smallest possible encoding of one chunk entry: three empty blobs and a size
const MIN_CHUNK_WIRE_LEN: usize = 4 + 4 + 4 + 4;

const PLATFORM_NONE: u8 = 0;
const PLATFORM_WINDOWS: u8 = 1;
const PLATFORM_UNIX: u8 = 2;

impl Meta {
    /// Encode into the canonical byte form.
    ///
    /// Output of a Meta that passes `validate` always parses back to an
    /// equal Meta.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len_hint());
        let header = self.header();

        out.put_u8(FORMAT_VERSION);
        put_blob(&mut out, header.path_id());
        put_field(&mut out, header.encrypted_path());
        out.put_u8(self.object_type().tag());
        out.put_i64(header.revision());
        out.put_i64(header.mtime());
        put_platform(&mut out, header.platform());

        match self.kind() {
            MetaKind::File(content) => put_file(&mut out, content),
            MetaKind::Symlink { target } => put_field(&mut out, target),
            MetaKind::Directory | MetaKind::Deleted => {}
        }
        out
    }

    /// Decode a record received from an untrusted peer.
    ///
    /// Structural checks that need the whole record (chunk bounds, field
    /// invariants) are left to `validate`.
    pub fn parse(bytes: &[u8]) -> Result<Meta, ParseError> {
        decode(bytes).inspect_err(|e| {
            debug!(len = bytes.len(), error = %e, "rejected meta record");
        })
    }

    fn encoded_len_hint(&self) -> usize {
        // fixed header words plus the variable-length blobs we know about
        let mut n = 1 + 4 + 32 + 4 + 16 + 4 + 32 + 1 + 8 + 8 + 1 + 12;
        if let MetaKind::File(content) = self.kind() {
            n += 2 + 8 + 4 + 16 + 4 + 32 + 4;
            n += content.chunks().len() * (4 + 32 + 4 + 4 + 16 + 4 + 32);
        }
        n
    }
}

fn decode(bytes: &[u8]) -> Result<Meta, ParseError> {
    let mut r = Reader::new(bytes);

    let version = r.u8("format version")?;
    if version != FORMAT_VERSION {
        return Err(ParseError::UnknownFormatVersion(version));
    }

    let path_id = r.blob("path_id")?;
    let encrypted_path = r.field("encrypted_path")?;
    let object_type = ObjectType::from_tag(r.u8("object type")?)?;
    let revision = r.i64("revision")?;
    let mtime = r.i64("mtime")?;
    let platform = r.platform()?;
    let header = MetaHeader::from_parts(path_id, encrypted_path, revision, mtime, platform);

    let kind = match object_type {
        ObjectType::File => MetaKind::File(r.file_content()?),
        ObjectType::Directory => MetaKind::Directory,
        ObjectType::Symlink => MetaKind::Symlink {
            target: r.field("symlink target")?,
        },
        ObjectType::Deleted => MetaKind::Deleted,
    };

    if r.buf.has_remaining() {
        return Err(ParseError::TrailingBytes(r.buf.remaining()));
    }
    Ok(Meta::new(header, kind))
}

fn put_blob(out: &mut Vec<u8>, bytes: &[u8]) {
    debug_assert!(bytes.len() <= MAX_FIELD_LEN);
    out.put_u32(bytes.len() as u32);
    out.put_slice(bytes);
}

fn put_field(out: &mut Vec<u8>, field: &EncryptedField) {
    put_blob(out, field.iv());
    put_blob(out, field.ciphertext());
}

fn put_platform(out: &mut Vec<u8>, platform: PlatformAttrs) {
    match platform {
        PlatformAttrs::None => out.put_u8(PLATFORM_NONE),
        PlatformAttrs::Windows { attrib } => {
            out.put_u8(PLATFORM_WINDOWS);
            out.put_u32(attrib);
        }
        PlatformAttrs::Unix { mode, uid, gid } => {
            out.put_u8(PLATFORM_UNIX);
            out.put_u32(mode);
            out.put_u32(uid);
            out.put_u32(gid);
        }
    }
}

fn put_file(out: &mut Vec<u8>, content: &FileContent) {
    out.put_u8(content.algorithm().tag());
    out.put_u8(content.strong_hash().tag());
    out.put_u32(content.min_chunksize());
    out.put_u32(content.max_chunksize());
    put_field(out, content.encrypted_chunking_params());
    out.put_u32(content.chunks().len() as u32);
    for chunk in content.chunks() {
        put_blob(out, &chunk.content_hash);
        out.put_u32(chunk.plaintext_size);
        put_blob(out, &chunk.iv);
        put_blob(out, &chunk.auth_code);
    }
}

/// Bounds-checked cursor. Every read checks `remaining()` first, so a
/// short or hostile buffer yields `Truncated` instead of a panic.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn ensure(&self, field: &'static str, needed: usize) -> Result<(), ParseError> {
        if self.buf.remaining() < needed {
            return Err(ParseError::Truncated {
                field,
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, ParseError> {
        self.ensure(field, 1)?;
        Ok(self.buf.get_u8())
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, ParseError> {
        self.ensure(field, 4)?;
        Ok(self.buf.get_u32())
    }

    fn i64(&mut self, field: &'static str) -> Result<i64, ParseError> {
        self.ensure(field, 8)?;
        Ok(self.buf.get_i64())
    }

    fn blob(&mut self, field: &'static str) -> Result<Vec<u8>, ParseError> {
        let len = self.u32(field)? as usize;
        if len > MAX_FIELD_LEN {
            return Err(ParseError::FieldTooLong {
                field,
                len,
                limit: MAX_FIELD_LEN,
            });
        }
        self.ensure(field, len)?;
        let bytes = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(bytes)
    }

    fn field(&mut self, field: &'static str) -> Result<EncryptedField, ParseError> {
        let iv = self.blob(field)?;
        let ciphertext = self.blob(field)?;
        Ok(EncryptedField::from_parts(iv, ciphertext))
    }

    fn platform(&mut self) -> Result<PlatformAttrs, ParseError> {
        match self.u8("platform tag")? {
            PLATFORM_NONE => Ok(PlatformAttrs::None),
            PLATFORM_WINDOWS => Ok(PlatformAttrs::Windows {
                attrib: self.u32("windows attrib")?,
            }),
            PLATFORM_UNIX => Ok(PlatformAttrs::Unix {
                mode: self.u32("unix mode")?,
                uid: self.u32("unix uid")?,
                gid: self.u32("unix gid")?,
            }),
            other => Err(ParseError::UnknownPlatformTag(other)),
        }
    }

    fn file_content(&mut self) -> Result<FileContent, ParseError> {
        let algorithm = ChunkingAlgorithm::from_tag(self.u8("chunking algorithm")?)?;
        let strong_hash = StrongHashType::from_tag(self.u8("strong hash type")?)?;
        let min_chunksize = self.u32("min_chunksize")?;
        let max_chunksize = self.u32("max_chunksize")?;
        let params = self.field("chunking params")?;

        let count = self.u32("chunk count")? as usize;
        let remaining = self.buf.remaining();
        if count
            .checked_mul(MIN_CHUNK_WIRE_LEN)
            .map_or(true, |needed| needed > remaining)
        {
            return Err(ParseError::ChunkCountExceedsBuffer { count, remaining });
        }

        let mut chunks = Vec::with_capacity(count);
        for _ in 0..count {
            chunks.push(Chunk {
                content_hash: self.blob("chunk content_hash")?,
                plaintext_size: self.u32("chunk plaintext_size")?,
                iv: self.blob("chunk iv")?,
                auth_code: self.blob("chunk auth_code")?,
            });
        }

        Ok(FileContent::from_parts(
            algorithm,
            strong_hash,
            min_chunksize,
            max_chunksize,
            params,
            chunks,
        ))
    }
}
