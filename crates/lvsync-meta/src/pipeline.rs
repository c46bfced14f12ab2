//! Parallel chunk sealing and opening
//!
//! Chunk crypto is pure per chunk, so a file's chunk list fans out across a
//! rayon pool and is collected back in order. `workers = 0` shares rayon's
//! global pool; any other value gets a dedicated pool of that many threads.

use lvsync_core::{
    ChunkIvPolicy, ChunkingConfig, CryptoError, LvsyncConfig, LvsyncError, LvsyncResult,
    PipelineConfig, StrongHashType, ValidationFailure,
};
use lvsync_crypto::{Chunk, ChunkKeys, KeyDerivation, SealedChunk};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::meta::{FileContent, Meta};

pub struct ChunkPipeline {
    pool: Option<ThreadPool>,
    policy: ChunkIvPolicy,
}

impl ChunkPipeline {
    pub fn new(config: &PipelineConfig) -> LvsyncResult<Self> {
        let pool = match config.workers {
            0 => None,
            n => Some(
                ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("lvsync-chunk-{i}"))
                    .build()
                    .map_err(|e| LvsyncError::Config(format!("chunk worker pool: {e}")))?,
            ),
        };
        Ok(Self {
            pool,
            policy: config.iv_policy,
        })
    }

    pub fn from_config(config: &LvsyncConfig) -> LvsyncResult<Self> {
        Self::new(&config.pipeline)
    }

    pub fn policy(&self) -> ChunkIvPolicy {
        self.policy
    }

    /// Number of threads chunk work runs on.
    pub fn workers(&self) -> usize {
        self.pool
            .as_ref()
            .map_or_else(rayon::current_num_threads, ThreadPool::current_num_threads)
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Seal every plaintext chunk. Output order matches input order.
    pub fn seal_all<T>(
        &self,
        plaintexts: &[T],
        keys: &ChunkKeys,
        hash_type: StrongHashType,
    ) -> Result<Vec<SealedChunk>, CryptoError>
    where
        T: AsRef<[u8]> + Sync,
    {
        debug!(chunks = plaintexts.len(), policy = ?self.policy, "sealing chunk batch");
        self.install(|| {
            plaintexts
                .par_iter()
                .map(|pt| Chunk::seal(pt.as_ref(), keys, self.policy, hash_type))
                .collect()
        })
    }

    /// Open every chunk against its ciphertext, returning plaintexts in order.
    pub fn open_all<T>(
        &self,
        chunks: &[Chunk],
        ciphertexts: &[T],
        keys: &ChunkKeys,
        hash_type: StrongHashType,
    ) -> LvsyncResult<Vec<Vec<u8>>>
    where
        T: AsRef<[u8]> + Sync,
    {
        check_counts(chunks, ciphertexts)?;
        debug!(chunks = chunks.len(), "opening chunk batch");
        let plaintexts = self.install(|| {
            chunks
                .par_iter()
                .zip(ciphertexts.par_iter())
                .map(|(chunk, ct)| chunk.open(ct.as_ref(), keys, hash_type))
                .collect::<Result<Vec<_>, CryptoError>>()
        })?;
        Ok(plaintexts)
    }

    /// Content-hash check of every ciphertext a peer delivered for `meta`.
    /// Needs no secret.
    pub fn verify_all<T>(&self, meta: &Meta, ciphertexts: &[T]) -> LvsyncResult<()>
    where
        T: AsRef<[u8]> + Sync,
    {
        let chunks = meta.chunks();
        check_counts(chunks, ciphertexts)?;
        let hash_type = meta
            .file()
            .map_or(StrongHashType::default(), FileContent::strong_hash);
        self.install(|| {
            chunks
                .par_iter()
                .zip(ciphertexts.par_iter())
                .try_for_each(|(chunk, ct)| chunk.verify_ciphertext(ct.as_ref(), hash_type))
        })?;
        Ok(())
    }

    /// Seal a file's plaintext chunks and record them as file content.
    ///
    /// Every chunk but the last must lie within the configured bounds; the
    /// last only needs to be non-empty and no larger than `max_chunksize`.
    pub fn seal_file<T>(
        &self,
        plaintexts: &[T],
        secret: &impl KeyDerivation,
        config: &ChunkingConfig,
    ) -> LvsyncResult<(FileContent, Vec<Vec<u8>>)>
    where
        T: AsRef<[u8]> + Sync,
    {
        check_plaintext_bounds(plaintexts, config)?;
        let keys = ChunkKeys::derive(secret)?;
        let sealed = self.seal_all(plaintexts, &keys, config.strong_hash)?;
        let (chunks, ciphertexts): (Vec<Chunk>, Vec<Vec<u8>>) = sealed
            .into_iter()
            .map(|s| (s.chunk, s.ciphertext))
            .unzip();
        let content = FileContent::new(config, chunks, secret)?;
        Ok((content, ciphertexts))
    }

    /// Open all chunks of a file Meta and reassemble its plaintext.
    pub fn open_file<T>(
        &self,
        meta: &Meta,
        ciphertexts: &[T],
        secret: &impl KeyDerivation,
    ) -> LvsyncResult<Vec<u8>>
    where
        T: AsRef<[u8]> + Sync,
    {
        let Some(content) = meta.file() else {
            check_counts(&[], ciphertexts)?;
            return Ok(Vec::new());
        };
        let keys = ChunkKeys::derive(secret)?;
        let plaintexts =
            self.open_all(content.chunks(), ciphertexts, &keys, content.strong_hash())?;

        let mut data = Vec::with_capacity(usize::try_from(content.size()).unwrap_or(0));
        for pt in plaintexts {
            data.extend_from_slice(&pt);
        }
        Ok(data)
    }
}

fn check_counts<T>(chunks: &[Chunk], ciphertexts: &[T]) -> Result<(), ValidationFailure> {
    if chunks.len() != ciphertexts.len() {
        return Err(ValidationFailure::ChunkIndexOutOfRange {
            index: chunks.len().min(ciphertexts.len()),
            count: chunks.len(),
        });
    }
    Ok(())
}

fn check_plaintext_bounds<T: AsRef<[u8]>>(
    plaintexts: &[T],
    config: &ChunkingConfig,
) -> Result<(), ValidationFailure> {
    let (min, max) = (config.min_chunksize, config.max_chunksize);
    let last = plaintexts.len().saturating_sub(1);
    for (index, pt) in plaintexts.iter().enumerate() {
        let size = pt.as_ref().len();
        let lower = if index == last { 1 } else { min as usize };
        if size < lower || size > max as usize {
            return Err(ValidationFailure::ChunkOutsideConfiguredBounds {
                index,
                size,
                min,
                max,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{MetaHeader, MetaKind, PlatformAttrs};
    use lvsync_crypto::{AccessLevel, Secret};

    fn pipeline(workers: usize, policy: ChunkIvPolicy) -> ChunkPipeline {
        ChunkPipeline::new(&PipelineConfig {
            workers,
            iv_policy: policy,
        })
        .unwrap()
    }

    fn config() -> ChunkingConfig {
        ChunkingConfig {
            min_chunksize: 1024,
            max_chunksize: 4096,
            ..ChunkingConfig::default()
        }
    }

    fn plaintext_chunks() -> Vec<Vec<u8>> {
        (0..12u8)
            .map(|i| {
                let len = if i == 11 { 333 } else { 2048 + usize::from(i) * 100 };
                vec![i; len]
            })
            .collect()
    }

    fn file_meta(secret: &Secret, content: FileContent) -> Meta {
        let header = MetaHeader::new("data.bin", secret, 1, 0, PlatformAttrs::None).unwrap();
        Meta::new(header, MetaKind::File(content))
    }

    #[test]
    fn dedicated_pool_size() {
        assert_eq!(pipeline(3, ChunkIvPolicy::Convergent).workers(), 3);
        assert!(pipeline(0, ChunkIvPolicy::Convergent).workers() >= 1);
    }

    #[test]
    fn seal_file_then_open_file() {
        let secret = Secret::generate();
        let p = pipeline(4, ChunkIvPolicy::Convergent);
        let chunks = plaintext_chunks();

        let (content, ciphertexts) = p.seal_file(&chunks, &secret, &config()).unwrap();
        assert_eq!(content.chunks().len(), chunks.len());
        assert_eq!(ciphertexts.len(), chunks.len());

        let meta = file_meta(&secret, content);
        assert!(meta.is_valid());
        assert_eq!(meta.size(), chunks.iter().map(|c| c.len() as u64).sum::<u64>());

        let data = p.open_file(&meta, &ciphertexts, &secret).unwrap();
        assert_eq!(data, chunks.concat());
    }

    #[test]
    fn order_matches_sequential_seal() {
        let secret = Secret::generate();
        let keys = ChunkKeys::derive(&secret).unwrap();
        let chunks = plaintext_chunks();

        let parallel = pipeline(4, ChunkIvPolicy::Convergent)
            .seal_all(&chunks, &keys, StrongHashType::Sha3_256)
            .unwrap();
        let sequential: Vec<_> = chunks
            .iter()
            .map(|c| {
                Chunk::seal(c, &keys, ChunkIvPolicy::Convergent, StrongHashType::Sha3_256).unwrap()
            })
            .collect();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn global_pool_matches_dedicated_pool() {
        let secret = Secret::generate();
        let keys = ChunkKeys::derive(&secret).unwrap();
        let chunks = plaintext_chunks();

        let a = pipeline(0, ChunkIvPolicy::Convergent)
            .seal_all(&chunks, &keys, StrongHashType::Sha3_256)
            .unwrap();
        let b = pipeline(2, ChunkIvPolicy::Convergent)
            .seal_all(&chunks, &keys, StrongHashType::Sha3_256)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_chunk_fails_whole_batch() {
        let keys = ChunkKeys::derive(&Secret::generate()).unwrap();
        let chunks = vec![vec![1u8; 10], vec![], vec![2u8; 10]];
        let result =
            pipeline(2, ChunkIvPolicy::Random).seal_all(&chunks, &keys, StrongHashType::Sha3_256);
        assert!(matches!(result, Err(CryptoError::EncryptFailed(_))));
    }

    #[test]
    fn verify_all_detects_tampering() {
        let secret = Secret::generate();
        let p = pipeline(2, ChunkIvPolicy::Random);
        let (content, mut ciphertexts) =
            p.seal_file(&plaintext_chunks(), &secret, &config()).unwrap();
        let meta = file_meta(&secret, content);

        assert!(p.verify_all(&meta, &ciphertexts).is_ok());

        ciphertexts[5][0] ^= 0x01;
        let err = p.verify_all(&meta, &ciphertexts).unwrap_err();
        assert!(matches!(
            err,
            LvsyncError::Crypto(CryptoError::ContentHashMismatch)
        ));
    }

    #[test]
    fn verify_all_works_for_download_secret_holders() {
        let secret = Secret::generate();
        let p = pipeline(2, ChunkIvPolicy::Convergent);
        let (content, ciphertexts) = p.seal_file(&plaintext_chunks(), &secret, &config()).unwrap();
        let meta = file_meta(&secret, content);

        let dl = secret.downgrade(AccessLevel::Download).unwrap();
        assert!(p.verify_all(&meta, &ciphertexts).is_ok());
        assert!(matches!(
            p.open_file(&meta, &ciphertexts, &dl),
            Err(LvsyncError::Crypto(CryptoError::KeyUnavailable(_)))
        ));
    }

    #[test]
    fn count_mismatch_rejected() {
        let secret = Secret::generate();
        let p = pipeline(2, ChunkIvPolicy::Convergent);
        let (content, mut ciphertexts) =
            p.seal_file(&plaintext_chunks(), &secret, &config()).unwrap();
        let meta = file_meta(&secret, content);
        ciphertexts.pop();

        assert!(matches!(
            p.open_file(&meta, &ciphertexts, &secret),
            Err(LvsyncError::Validation(
                ValidationFailure::ChunkIndexOutOfRange {
                    index: 11,
                    count: 12
                }
            ))
        ));
    }

    #[test]
    fn empty_file() {
        let secret = Secret::generate();
        let p = pipeline(0, ChunkIvPolicy::Convergent);
        let (content, ciphertexts) = p.seal_file::<Vec<u8>>(&[], &secret, &config()).unwrap();
        assert!(ciphertexts.is_empty());
        assert_eq!(content.min_chunksize(), 0);

        let meta = file_meta(&secret, content);
        assert!(meta.is_valid());
        assert!(p.open_file(&meta, &ciphertexts, &secret).unwrap().is_empty());
    }

    #[test]
    fn seal_file_rejects_chunks_outside_bounds() {
        let secret = Secret::generate();
        let p = pipeline(2, ChunkIvPolicy::Convergent);
        let out_of_bounds = |plaintexts: &[Vec<u8>]| {
            match p.seal_file(plaintexts, &secret, &config()) {
                Err(LvsyncError::Validation(ValidationFailure::ChunkOutsideConfiguredBounds {
                    index,
                    size,
                    ..
                })) => Some((index, size)),
                _ => None,
            }
        };

        // short middle chunk
        assert_eq!(
            out_of_bounds(&[vec![0; 2048], vec![0; 100], vec![0; 10]]),
            Some((1, 100))
        );
        // oversized chunks, final or not
        assert_eq!(out_of_bounds(&[vec![0; 4097], vec![0; 10]]), Some((0, 4097)));
        assert_eq!(out_of_bounds(&[vec![0; 2048], vec![0; 5000]]), Some((1, 5000)));
        // empty final chunk
        assert_eq!(out_of_bounds(&[vec![0; 2048], vec![]]), Some((1, 0)));

        // a short final chunk is fine, and so is a lone short chunk
        assert!(p.seal_file(&[vec![0; 2048], vec![0; 1]], &secret, &config()).is_ok());
        assert!(p.seal_file(&[vec![0; 5]], &secret, &config()).is_ok());
    }

    #[test]
    fn sealed_files_always_validate() {
        let secret = Secret::generate();
        let p = pipeline(0, ChunkIvPolicy::Random);
        for sizes in [&[1024, 4096, 1][..], &[4096], &[1024, 1024, 4096]] {
            let plaintexts: Vec<Vec<u8>> = sizes.iter().map(|&n| vec![0xEE; n]).collect();
            let (content, _) = p.seal_file(&plaintexts, &secret, &config()).unwrap();
            assert_eq!(file_meta(&secret, content).validate(), Ok(()));
        }
    }

    #[test]
    fn convergent_policy_dedups_across_files() {
        let secret = Secret::generate();
        let p = pipeline(2, ChunkIvPolicy::Convergent);
        let shared = vec![0x77u8; 2048];

        let (a, _) = p.seal_file(&[shared.clone(), vec![1; 100]], &secret, &config()).unwrap();
        let (b, _) = p.seal_file(&[shared, vec![2; 200]], &secret, &config()).unwrap();
        assert_eq!(a.chunks()[0].content_hash, b.chunks()[0].content_hash);
        assert_ne!(a.chunks()[1].content_hash, b.chunks()[1].content_hash);
    }
}
