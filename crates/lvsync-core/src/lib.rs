//! lvsync-core: shared types, configuration schema, and error taxonomy

pub mod config;
pub mod error;
pub mod types;

pub use config::{ChunkingConfig, KdfConfig, LoggingConfig, LvsyncConfig, PipelineConfig};
pub use error::{
    CryptoError, LvsyncError, LvsyncResult, ParseError, UnsupportedAlgorithm, ValidationFailure,
};
pub use types::{
    ChunkIvPolicy, ChunkingAlgorithm, ObjectType, PathRevision, RabinParams, StrongHashType,
};
