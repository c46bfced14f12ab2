//! Property tests for the wire codec against arbitrary records and bytes.

use lvsync_core::ChunkingConfig;
use lvsync_crypto::{Chunk, Secret};
use lvsync_meta::{FileContent, Meta, MetaHeader, MetaKind, PlatformAttrs};
use proptest::prelude::*;

fn arb_platform() -> impl Strategy<Value = PlatformAttrs> {
    prop_oneof![
        Just(PlatformAttrs::None),
        any::<u32>().prop_map(|attrib| PlatformAttrs::Windows { attrib }),
        (any::<u32>(), any::<u32>(), any::<u32>())
            .prop_map(|(mode, uid, gid)| PlatformAttrs::Unix { mode, uid, gid }),
    ]
}

fn arb_chunk() -> impl Strategy<Value = Chunk> {
    (
        prop::array::uniform32(any::<u8>()),
        1u32..=8192,
        prop::array::uniform16(any::<u8>()),
        prop::array::uniform32(any::<u8>()),
    )
        .prop_map(|(hash, size, iv, auth)| Chunk {
            content_hash: hash.to_vec(),
            plaintext_size: size,
            iv: iv.to_vec(),
            auth_code: auth.to_vec(),
        })
}

#[derive(Debug, Clone)]
enum KindSpec {
    File(Vec<Chunk>),
    Directory,
    Symlink(String),
    Deleted,
}

fn arb_kind() -> impl Strategy<Value = KindSpec> {
    prop_oneof![
        prop::collection::vec(arb_chunk(), 0..16).prop_map(KindSpec::File),
        Just(KindSpec::Directory),
        "[a-z./]{1,40}".prop_map(KindSpec::Symlink),
        Just(KindSpec::Deleted),
    ]
}

fn build(
    secret: &Secret,
    path: &str,
    revision: i64,
    mtime: i64,
    platform: PlatformAttrs,
    kind: KindSpec,
) -> Meta {
    let header = MetaHeader::new(path, secret, revision, mtime, platform).unwrap();
    let kind = match kind {
        KindSpec::File(chunks) => {
            let config = ChunkingConfig {
                min_chunksize: 1,
                max_chunksize: 8192,
                ..ChunkingConfig::default()
            };
            MetaKind::File(FileContent::new(&config, chunks, secret).unwrap())
        }
        KindSpec::Directory => MetaKind::Directory,
        KindSpec::Symlink(target) => MetaKind::symlink(&target, secret).unwrap(),
        KindSpec::Deleted => MetaKind::Deleted,
    };
    Meta::new(header, kind)
}

proptest! {
    #[test]
    fn parse_inverts_serialize(
        path in "[a-zA-Z0-9_/\\\\.-]{0,64}",
        revision in any::<i64>(),
        mtime in any::<i64>(),
        platform in arb_platform(),
        kind in arb_kind(),
    ) {
        let secret = Secret::generate();
        let meta = build(&secret, &path, revision, mtime, platform, kind);
        prop_assert!(meta.is_valid());

        let bytes = meta.serialize();
        let parsed = Meta::parse(&bytes).unwrap();
        prop_assert_eq!(&parsed, &meta);
        prop_assert_eq!(parsed.serialize(), bytes);
    }

    #[test]
    fn truncated_records_never_panic(
        kind in arb_kind(),
        cut in any::<prop::sample::Index>(),
    ) {
        let secret = Secret::generate();
        let bytes = build(&secret, "a/b", 1, 2, PlatformAttrs::None, kind).serialize();
        let len = cut.index(bytes.len());
        prop_assert!(Meta::parse(&bytes[..len]).is_err());
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        if let Ok(meta) = Meta::parse(&bytes) {
            // whatever parses must re-encode to the same bytes
            prop_assert_eq!(meta.serialize(), bytes);
            let _ = meta.is_valid();
        }
    }

    #[test]
    fn size_is_sum_of_chunk_sizes(chunks in prop::collection::vec(arb_chunk(), 0..32)) {
        let expected: u64 = chunks.iter().map(|c| u64::from(c.plaintext_size)).sum();
        let secret = Secret::generate();
        let meta = build(&secret, "f", 1, 0, PlatformAttrs::None, KindSpec::File(chunks));
        prop_assert_eq!(meta.size(), expected);
    }
}
