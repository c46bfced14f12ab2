use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{LvsyncError, LvsyncResult};
use crate::types::{ChunkIvPolicy, ChunkingAlgorithm, RabinParams, StrongHashType};

/// Top-level configuration (loaded from lvsync.toml)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LvsyncConfig {
    pub chunking: ChunkingConfig,
    pub pipeline: PipelineConfig,
    pub kdf: KdfConfig,
    pub logging: LoggingConfig,
}

impl LvsyncConfig {
    /// Parse a TOML document. Missing sections and keys take their defaults.
    pub fn from_toml_str(content: &str) -> LvsyncResult<Self> {
        let config: LvsyncConfig =
            toml::from_str(content).map_err(|e| LvsyncError::Config(e.to_string()))?;
        config.chunking.check()?;
        Ok(config)
    }

    /// Load from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> LvsyncResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| LvsyncError::Config(format!("{}: {e}", path.display())))
    }
}

/// Chunking and hashing parameters recorded in every file Meta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub algorithm: ChunkingAlgorithm,
    pub strong_hash: StrongHashType,
    /// Smallest non-final chunk in bytes (default: 1 MiB)
    pub min_chunksize: u32,
    /// Largest chunk in bytes (default: 8 MiB)
    pub max_chunksize: u32,
    pub rabin: RabinParams,
}

impl ChunkingConfig {
    /// Reject bounds no chunker could satisfy.
    pub fn check(&self) -> LvsyncResult<()> {
        if self.min_chunksize == 0 {
            return Err(LvsyncError::Config(
                "chunking.min_chunksize must be greater than zero".into(),
            ));
        }
        if self.max_chunksize < self.min_chunksize {
            return Err(LvsyncError::Config(format!(
                "chunking.max_chunksize ({}) is smaller than min_chunksize ({})",
                self.max_chunksize, self.min_chunksize
            )));
        }
        Ok(())
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            algorithm: ChunkingAlgorithm::Rabin,
            strong_hash: StrongHashType::Sha3_256,
            min_chunksize: 1024 * 1024,
            max_chunksize: 8 * 1024 * 1024,
            rabin: RabinParams::default(),
        }
    }
}

/// Parallel chunk encryption settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker thread count (0 = cpu_count)
    pub workers: usize,
    pub iv_policy: ChunkIvPolicy,
}

/// Argon2id parameters for passphrase-derived secrets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Iterations (default: 3)
    pub time_cost: u32,
    /// Lanes (default: 4)
    pub parallelism: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
