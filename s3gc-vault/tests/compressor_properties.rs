//! Property tests: compressor round-trip over arbitrary byte streams.

use proptest::prelude::*;

use s3gc_core::models::Codec;
use s3gc_vault::compressor;

proptest! {
    #[test]
    fn prop_round_trip(data in prop::collection::vec(any::<u8>(), 0..4096)) {
        let (compressed, stats) = compressor::compress_bytes(&data, Codec::Zstd).unwrap();
        prop_assert_eq!(stats.original_size, data.len() as u64);
        prop_assert_eq!(stats.stored_size, compressed.len() as u64);

        let restored = compressor::decompress_bytes(&compressed, Codec::Zstd).unwrap();
        prop_assert_eq!(&restored, &data);
        prop_assert_eq!(compressor::content_hash(&restored), stats.content_hash);
    }

    #[test]
    fn prop_hash_is_input_addressed(
        a in prop::collection::vec(any::<u8>(), 1..512),
        b in prop::collection::vec(any::<u8>(), 1..512),
    ) {
        let (_, sa) = compressor::compress_bytes(&a, Codec::Zstd).unwrap();
        let (_, sb) = compressor::compress_bytes(&b, Codec::Zstd).unwrap();
        prop_assert_eq!(a == b, sa.content_hash == sb.content_hash);
    }
}
