//! lvsync-meta: the Meta record and its chunk pipeline
//!
//! A Meta describes one version of one synchronized object. Peers exchange
//! Metas instead of file contents:
//!
//! ```text
//! local change ─▶ Meta::new (path id + encrypted fields) ─▶ serialize ─▶ peers
//! peer bytes   ─▶ Meta::parse ─▶ validate ─▶ adopt
//! ```
//!
//! File contents travel separately as encrypted chunks addressed by the
//! SHA3-256 of their ciphertext; [`ChunkPipeline`] seals and opens them in
//! parallel.

pub mod codec;
pub mod meta;
pub mod path;
pub mod pipeline;
pub mod validate;

pub use codec::{FORMAT_VERSION, MAX_FIELD_LEN};
pub use meta::{FileContent, Meta, MetaHeader, MetaKind, PlatformAttrs};
pub use path::{make_path_id, normalize_path, PATH_ID_LEN};
pub use pipeline::ChunkPipeline;
