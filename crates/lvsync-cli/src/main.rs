//! lvsync: developer tool for folder secrets and Meta records
//!
//! Usage:
//!   lvsync keygen [--level rw|ro|download] [--passphrase ...]
//!   lvsync path-id <PATH> --secret <SECRET>
//!   lvsync inspect <FILE> [--secret <SECRET>]
//!   lvsync config

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lvsync_core::{
    ChunkingAlgorithm, LoggingConfig, LvsyncConfig, ObjectType, RabinParams, StrongHashType,
};
use lvsync_crypto::{AccessLevel, Secret};
use lvsync_meta::{make_path_id, normalize_path, Meta, MetaKind, PlatformAttrs, FORMAT_VERSION};
use rand::RngCore;
use secrecy::SecretString;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "lvsync",
    version,
    about = "lvsync metadata tool",
    long_about = "lvsync: generate folder secrets, derive path ids, and inspect serialized Meta records"
)]
struct Cli {
    /// Path to lvsync.toml configuration file
    #[arg(long, short = 'c', env = "LVSYNC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "LVSYNC_LOG", global = true)]
    log_level: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "LVSYNC_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new folder secret
    Keygen {
        /// Access level of the printed secret
        #[arg(long, default_value = "rw")]
        level: Level,

        /// Derive the root key from a passphrase (Argon2id) instead of randomly
        #[arg(long, env = "LVSYNC_PASSPHRASE", hide_env_values = true)]
        passphrase: Option<String>,

        /// 16-byte hex salt for --passphrase; generated when omitted
        #[arg(long, requires = "passphrase")]
        salt: Option<String>,
    },

    /// Print the hex path id of a path under a secret
    PathId {
        path: String,

        #[arg(long, env = "LVSYNC_SECRET", hide_env_values = true)]
        secret: Secret,
    },

    /// Parse, validate, and summarize a serialized Meta as JSON
    Inspect {
        file: PathBuf,

        /// Decrypt path, symlink target, and chunking parameters
        #[arg(long, env = "LVSYNC_SECRET", hide_env_values = true)]
        secret: Option<Secret>,
    },

    /// Show the effective configuration as TOML
    Config,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Level {
    Rw,
    Ro,
    Download,
}

impl From<Level> for AccessLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Rw => AccessLevel::ReadWrite,
            Level::Ro => AccessLevel::ReadOnly,
            Level::Download => AccessLevel::Download,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let format = cli
        .log_format
        .unwrap_or_else(|| log_format_from_config(&config.logging));
    init_logging(level, format);

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "lvsync starting"
    );

    match cli.command {
        Commands::Keygen {
            level,
            passphrase,
            salt,
        } => cmd_keygen(&config, level, passphrase, salt.as_deref()),
        Commands::PathId { path, secret } => cmd_path_id(&path, &secret),
        Commands::Inspect { file, secret } => cmd_inspect(&file, secret.as_ref()),
        Commands::Config => cmd_config_show(&config, cli.config.as_deref()),
    }
}

// ── Config and logging ────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> Result<LvsyncConfig> {
    match path {
        Some(path) => LvsyncConfig::load(path)
            .with_context(|| format!("loading config: {}", path.display())),
        None => Ok(LvsyncConfig::default()),
    }
}

fn log_format_from_config(logging: &LoggingConfig) -> LogFormat {
    if logging.format.eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Text
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── `lvsync keygen` ───────────────────────────────────────────────────────────

fn cmd_keygen(
    config: &LvsyncConfig,
    level: Level,
    passphrase: Option<String>,
    salt: Option<&str>,
) -> Result<()> {
    let secret = match passphrase {
        Some(passphrase) => {
            let salt = match salt {
                Some(hex_salt) => parse_salt(hex_salt)?,
                None => {
                    let mut salt = [0u8; 16];
                    rand::thread_rng().fill_bytes(&mut salt);
                    eprintln!("salt: {}", hex::encode(salt));
                    salt
                }
            };
            info!(
                mem_cost_kib = config.kdf.mem_cost_kib,
                time_cost = config.kdf.time_cost,
                "deriving root key from passphrase"
            );
            Secret::from_passphrase(&SecretString::from(passphrase), &salt, &config.kdf)
                .context("deriving secret from passphrase")?
        }
        None => Secret::generate(),
    };

    let secret = secret
        .downgrade(level.into())
        .context("lowering access level")?;
    println!("{secret}");
    Ok(())
}

fn parse_salt(hex_salt: &str) -> Result<[u8; 16]> {
    let bytes = hex::decode(hex_salt).context("salt is not valid hex")?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("salt must be 16 bytes, got {}", b.len()))
}

// ── `lvsync path-id` ──────────────────────────────────────────────────────────

fn cmd_path_id(path: &str, secret: &Secret) -> Result<()> {
    let id = make_path_id(path, secret).context("deriving path id")?;
    debug!(normalized = %normalize_path(path), "derived path id");
    println!("{}", hex::encode(id));
    Ok(())
}

// ── `lvsync inspect` ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MetaSummary {
    format_version: u8,
    object_type: ObjectType,
    path_id: String,
    revision: i64,
    mtime: i64,
    platform: PlatformSummary,
    size: u64,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    symlink_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<FileSummary>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum PlatformSummary {
    None,
    Windows { attrib: u32 },
    Unix { mode: String, uid: u32, gid: u32 },
}

impl From<PlatformAttrs> for PlatformSummary {
    fn from(attrs: PlatformAttrs) -> Self {
        match attrs {
            PlatformAttrs::None => PlatformSummary::None,
            PlatformAttrs::Windows { attrib } => PlatformSummary::Windows { attrib },
            PlatformAttrs::Unix { mode, uid, gid } => PlatformSummary::Unix {
                mode: format!("{mode:o}"),
                uid,
                gid,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct FileSummary {
    algorithm: ChunkingAlgorithm,
    strong_hash: StrongHashType,
    min_chunksize: u32,
    max_chunksize: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    rabin: Option<RabinParams>,
    chunks: Vec<ChunkSummary>,
}

#[derive(Debug, Serialize)]
struct ChunkSummary {
    offset: u64,
    size: u32,
    content_hash: String,
}

fn summarize(meta: &Meta, secret: Option<&Secret>) -> MetaSummary {
    let validation_error = meta.validate().err().map(|e| e.to_string());
    let readable = secret.filter(|s| s.can_decrypt());
    if secret.is_some() && readable.is_none() {
        warn!("download-level secret cannot decrypt record fields");
    }

    let path = readable.and_then(|s| {
        meta.path(s)
            .inspect_err(|e| warn!(error = %e, "path did not decrypt"))
            .ok()
    });
    let symlink_target = readable.and_then(|s| {
        meta.symlink_path(s)
            .inspect_err(|e| warn!(error = %e, "symlink target did not decrypt"))
            .ok()
            .flatten()
    });

    let file = match meta.kind() {
        MetaKind::File(content) => Some(FileSummary {
            algorithm: content.algorithm(),
            strong_hash: content.strong_hash(),
            min_chunksize: content.min_chunksize(),
            max_chunksize: content.max_chunksize(),
            rabin: readable.and_then(|s| {
                content
                    .rabin_params(s)
                    .inspect_err(|e| warn!(error = %e, "chunking params did not decrypt"))
                    .ok()
            }),
            chunks: content
                .chunk_ranges()
                .zip(content.chunks())
                .map(|(range, chunk)| ChunkSummary {
                    offset: range.start,
                    size: chunk.plaintext_size,
                    content_hash: hex::encode(&chunk.content_hash),
                })
                .collect(),
        }),
        _ => None,
    };

    MetaSummary {
        format_version: FORMAT_VERSION,
        object_type: meta.object_type(),
        path_id: meta.path_id_hex(),
        revision: meta.revision(),
        mtime: meta.mtime(),
        platform: meta.platform().into(),
        size: meta.size(),
        valid: validation_error.is_none(),
        validation_error,
        path,
        symlink_target,
        file,
    }
}

fn inspect(file: &Path, secret: Option<&Secret>) -> Result<MetaSummary> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let meta =
        Meta::parse(&bytes).with_context(|| format!("parsing Meta record: {}", file.display()))?;
    Ok(summarize(&meta, secret))
}

fn cmd_inspect(file: &Path, secret: Option<&Secret>) -> Result<()> {
    let summary = inspect(file, secret)?;
    let rendered = serde_json::to_string_pretty(&summary).context("serializing summary")?;
    println!("{rendered}");
    Ok(())
}

// ── `lvsync config` ───────────────────────────────────────────────────────────

fn cmd_config_show(config: &LvsyncConfig, config_path: Option<&Path>) -> Result<()> {
    match config_path {
        Some(path) if path.exists() => println!("# Configuration from: {}", path.display()),
        Some(path) => println!("# Configuration: defaults (no file at {})", path.display()),
        None => println!("# Configuration: defaults"),
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
