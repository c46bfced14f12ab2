use lvsync_core::{ChunkIvPolicy, ChunkingConfig, PipelineConfig};
use lvsync_crypto::Secret;
use lvsync_meta::{ChunkPipeline, Meta, MetaHeader, MetaKind, PlatformAttrs};

const CHUNK_SIZE: usize = 64 * 1024;

fn make_chunks(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|c| {
            (0..CHUNK_SIZE)
                .map(|i| (i.wrapping_mul(31) ^ c) as u8)
                .collect()
        })
        .collect()
}

fn config() -> ChunkingConfig {
    ChunkingConfig {
        min_chunksize: CHUNK_SIZE as u32,
        max_chunksize: CHUNK_SIZE as u32,
        ..ChunkingConfig::default()
    }
}

fn pipeline(workers: usize) -> ChunkPipeline {
    ChunkPipeline::new(&PipelineConfig {
        workers,
        iv_policy: ChunkIvPolicy::Convergent,
    })
    .unwrap()
}

fn file_meta(chunks: usize) -> Meta {
    let secret = Secret::generate();
    let (content, _) = pipeline(0)
        .seal_file(&make_chunks(chunks), &secret, &config())
        .unwrap();
    let header = MetaHeader::new("bench/file.bin", &secret, 1, 0, PlatformAttrs::None).unwrap();
    Meta::new(header, MetaKind::File(content))
}

#[divan::bench(args = [1, 64, 1024])]
fn bench_serialize(bencher: divan::Bencher, chunks: usize) {
    let meta = file_meta(chunks);
    bencher.bench(|| divan::black_box(&meta).serialize());
}

#[divan::bench(args = [1, 64, 1024])]
fn bench_parse(bencher: divan::Bencher, chunks: usize) {
    let bytes = file_meta(chunks).serialize();
    bencher
        .counter(divan::counter::BytesCount::new(bytes.len()))
        .bench(|| Meta::parse(divan::black_box(&bytes)).unwrap());
}

#[divan::bench(args = [1, 64, 1024])]
fn bench_validate(bencher: divan::Bencher, chunks: usize) {
    let meta = file_meta(chunks);
    bencher.bench(|| divan::black_box(&meta).validate().unwrap());
}

#[divan::bench(args = [1, 2, 4, 8])]
fn bench_seal_file(bencher: divan::Bencher, workers: usize) {
    let secret = Secret::generate();
    let chunks = make_chunks(32);
    let p = pipeline(workers);
    let cfg = config();
    bencher
        .counter(divan::counter::BytesCount::new(32 * CHUNK_SIZE))
        .bench(|| p.seal_file(divan::black_box(&chunks), &secret, &cfg).unwrap());
}

fn main() {
    divan::main();
}
