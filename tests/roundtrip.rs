//! Round trips through every available codec with heap and foreign buffers.

#![cfg(all(feature = "lz4", feature = "snappy", feature = "zstd"))]

use native_codecs::lz4::{Lz4Compressor, Lz4Decompressor};
use native_codecs::zstd::{self, ZstdCompressor, ZstdDecompressor};
use native_codecs::{
    Algorithm, ByteRange, ByteRangeMut, Compressor, ContextMode, DecompressedLength, Decompressor,
    DirectBuffer, LengthProbe, NativeError, Origin, Validate,
};

mod common;
use common::{available_algorithms, get_test_cases, test_input_sizes, with_algorithm};

#[test]
fn test_roundtrip_all_algorithms() {
    for algorithm in available_algorithms() {
        let mut compressor = algorithm.compressor().unwrap();
        let mut decompressor = algorithm.decompressor().unwrap();
        for n in test_input_sizes() {
            for input in get_test_cases(n) {
                let compressed = compressor.compress_to_vec(&input).unwrap();
                let mut restored = vec![0u8; input.len()];
                let restored = decompressor
                    .decompress_to_slice(&compressed, &mut restored)
                    .unwrap();
                assert_eq!(restored, &input[..], "{algorithm} round trip of {n} bytes");
            }
        }
    }
}

#[test]
fn test_empty_input_roundtrips() {
    for algorithm in available_algorithms() {
        let mut compressor = algorithm.compressor().unwrap();
        let bound = compressor.max_compressed_length(0).unwrap();
        assert!(bound > 0, "{algorithm} bound for empty input");

        let mut compressed = vec![0u8; bound];
        let written = compressor
            .compress(ByteRange::new(&[]), ByteRangeMut::new(&mut compressed))
            .unwrap();
        assert!(written >= 1, "{algorithm} writes a header for empty input");

        let mut decompressor = algorithm.decompressor().unwrap();
        let restored = decompressor
            .decompress(
                ByteRange::new(&compressed[..written]),
                ByteRangeMut::new(&mut []),
            )
            .unwrap();
        assert_eq!(restored, 0, "{algorithm}");
    }
}

#[test]
fn test_repetitive_megabyte_compresses_well() {
    let input = vec![0x41u8; 1 << 20];
    for algorithm in available_algorithms() {
        let mut compressor = algorithm.compressor().unwrap();
        let compressed = compressor.compress_to_vec(&input).unwrap();
        assert!(
            compressed.len() < input.len() / 10,
            "{algorithm} compressed 1 MiB of one byte to {} bytes",
            compressed.len()
        );

        let mut decompressor = algorithm.decompressor().unwrap();
        let mut restored = vec![0u8; input.len()];
        let n = decompressor
            .decompress(ByteRange::new(&compressed), ByteRangeMut::new(&mut restored))
            .unwrap();
        assert_eq!(n, input.len());
        assert!(restored.iter().all(|&b| b == 0x41));
    }
}

#[test]
fn test_heap_and_direct_buffers_agree() {
    let input = get_test_cases(50_000).swap_remove(2);
    for algorithm in available_algorithms() {
        let mut compressor = algorithm.compressor().unwrap();
        let bound = compressor.max_compressed_length(input.len()).unwrap();

        let mut heap_out = vec![0u8; bound];
        let heap_len = compressor
            .compress(ByteRange::new(&input), ByteRangeMut::new(&mut heap_out))
            .unwrap();

        let direct_in = DirectBuffer::from_slice(&input);
        let mut direct_out = DirectBuffer::new(bound);
        assert_eq!(direct_in.as_range().origin(), Origin::Foreign);
        let direct_len = compressor
            .compress(direct_in.as_range(), direct_out.as_range_mut())
            .unwrap();

        assert_eq!(heap_len, direct_len, "{algorithm}");
        assert_eq!(&heap_out[..heap_len], &direct_out.as_slice()[..direct_len], "{algorithm}");

        let mut restored = DirectBuffer::new(input.len());
        let mut decompressor = algorithm.decompressor().unwrap();
        let n = decompressor
            .decompress(direct_out.range(0, direct_len).unwrap(), restored.as_range_mut())
            .unwrap();
        assert_eq!(restored.as_slice()[..n], input[..]);
    }
}

#[test]
fn test_ranges_with_offsets() {
    let payload = get_test_cases(10_000).swap_remove(4);
    let mut source = vec![0xEEu8; 100];
    source.extend_from_slice(&payload);
    source.extend_from_slice(&[0xEE; 100]);

    for algorithm in available_algorithms() {
        let mut compressor = algorithm.compressor().unwrap();
        let bound = compressor.max_compressed_length(payload.len()).unwrap();
        let mut compressed = vec![0xAAu8; bound + 64];
        let written = compressor
            .compress(
                ByteRange::slice(&source, 100, payload.len()).unwrap(),
                ByteRangeMut::slice(&mut compressed, 64, bound).unwrap(),
            )
            .unwrap();
        assert!(compressed[..64].iter().all(|&b| b == 0xAA), "{algorithm} wrote before the offset");

        let mut restored = vec![0u8; payload.len() + 32];
        let mut decompressor = algorithm.decompressor().unwrap();
        let n = decompressor
            .decompress(
                ByteRange::slice(&compressed, 64, written).unwrap(),
                ByteRangeMut::slice(&mut restored, 32, payload.len()).unwrap(),
            )
            .unwrap();
        assert_eq!(n, payload.len());
        assert_eq!(&restored[32..], &payload[..], "{algorithm}");
    }
}

#[test]
fn test_bound_is_always_sufficient() {
    for algorithm in available_algorithms() {
        let compressor = algorithm.compressor().unwrap();
        let mut previous = 0;
        for n in [0, 1, 100, 4096, 1 << 16, 1 << 24] {
            let bound = compressor.max_compressed_length(n).unwrap();
            assert!(bound >= n, "{algorithm} bound({n}) = {bound}");
            assert!(bound >= previous, "{algorithm} bound is monotonic");
            previous = bound;
        }
    }
}

#[test]
fn test_length_probes_agree_with_decompress() {
    for algorithm in available_algorithms() {
        let mut compressor = algorithm.compressor().unwrap();
        let mut decompressor = algorithm.decompressor().unwrap();
        for input in get_test_cases(3000) {
            let compressed = compressor.compress_to_vec(&input).unwrap();
            let mut restored = vec![0u8; input.len()];
            let n = decompressor
                .decompress(ByteRange::new(&compressed), ByteRangeMut::new(&mut restored))
                .unwrap();

            if let Some(probe) = decompressor.as_length_probe() {
                assert_eq!(
                    probe.decompressed_length(ByteRange::new(&compressed)).unwrap(),
                    DecompressedLength::Known(n as u64),
                    "{algorithm}"
                );
            }
            if let Some(validator) = decompressor.as_validator() {
                assert!(validator.validate(ByteRange::new(&compressed)).unwrap(), "{algorithm}");
            }
        }
    }
}

#[test]
fn test_lz4_has_no_probe() {
    with_algorithm(Algorithm::Lz4, || {
        let decompressor = Algorithm::Lz4.decompressor().unwrap();
        assert!(decompressor.as_length_probe().is_none());
        assert!(decompressor.as_validator().is_none());
    });
}

#[test]
fn test_lz4_state_and_acceleration_variants_roundtrip() {
    with_algorithm(Algorithm::Lz4, || {
        let input = get_test_cases(70_000).swap_remove(4);
        let mut decompressor = Lz4Decompressor::new().unwrap();
        let variants = [
            Lz4Compressor::new().unwrap(),
            Lz4Compressor::without_state().unwrap(),
            Lz4Compressor::new().unwrap().with_acceleration(8),
            Lz4Compressor::new().unwrap().with_acceleration(-5),
        ];
        for mut compressor in variants {
            assert!(compressor.acceleration() >= 1);
            let compressed = compressor.compress_to_vec(&input).unwrap();
            let mut restored = vec![0u8; input.len()];
            decompressor.decompress_to_slice(&compressed, &mut restored).unwrap();
            assert_eq!(restored, input);
        }
    });
}

#[test]
fn test_lz4_state_and_stateless_outputs_match() {
    with_algorithm(Algorithm::Lz4, || {
        let input = get_test_cases(20_000).swap_remove(2);
        let with_state = Lz4Compressor::new().unwrap().compress_to_vec(&input).unwrap();
        let without_state = Lz4Compressor::without_state()
            .unwrap()
            .compress_to_vec(&input)
            .unwrap();
        assert_eq!(with_state, without_state);
    });
}

#[test]
fn test_zstd_levels_and_context_modes() {
    with_algorithm(Algorithm::Zstd, || {
        let range = zstd::level_range().unwrap();
        assert!(range.contains(&zstd::DEFAULT_COMPRESSION_LEVEL));

        let input = get_test_cases(100_000).swap_remove(2);
        let mut decompressor = ZstdDecompressor::new()
            .unwrap()
            .with_context_mode(ContextMode::PerCall);
        assert_eq!(decompressor.context_mode(), ContextMode::PerCall);

        for level in [*range.start(), 1, 3, 19] {
            for mode in [ContextMode::PerInstance, ContextMode::PerCall] {
                let mut compressor = ZstdCompressor::with_level(level).unwrap().with_context_mode(mode);
                assert_eq!((compressor.level(), compressor.context_mode()), (level, mode));
                for _ in 0..3 {
                    let compressed = compressor.compress_to_vec(&input).unwrap();
                    let mut restored = vec![0u8; input.len()];
                    decompressor.decompress_to_slice(&compressed, &mut restored).unwrap();
                    assert_eq!(restored, input, "level {level} {mode:?}");
                }
            }
        }
    });
}

#[test]
fn test_zstd_rejects_out_of_range_level() {
    with_algorithm(Algorithm::Zstd, || {
        let range = zstd::level_range().unwrap();
        let level = *range.end() + 1;
        let err = ZstdCompressor::with_level(level).err().unwrap();
        assert_eq!(
            err,
            NativeError::InvalidCompressionLevel {
                level,
                min: *range.start(),
                max: *range.end(),
            }
        );
    });
}

#[test]
fn test_zstd_concatenated_frames_validate_and_decompress() {
    with_algorithm(Algorithm::Zstd, || {
        let first = get_test_cases(5000).swap_remove(2);
        let second = get_test_cases(700).swap_remove(5);
        let mut compressor = ZstdCompressor::new().unwrap();
        let mut frames = compressor.compress_to_vec(&first).unwrap();
        frames.extend(compressor.compress_to_vec(&second).unwrap());

        let mut decompressor = ZstdDecompressor::new().unwrap();
        assert_eq!(
            decompressor.validate(ByteRange::new(&frames)),
            Ok(true)
        );
        let total = (first.len() + second.len()) as u64;
        assert_eq!(
            decompressor.decompressed_length(ByteRange::new(&frames)),
            Ok(DecompressedLength::Known(total))
        );
        // a cut inside the second frame still reads the first header but not the whole input
        assert!(matches!(
            decompressor.decompressed_length(ByteRange::new(&frames[..frames.len() - 1])),
            Err(NativeError::MalformedInput(_))
        ));
        let mut restored = vec![0u8; first.len() + second.len()];
        let n = decompressor.decompress_to_slice(&frames, &mut restored).unwrap().len();
        assert_eq!(n, first.len() + second.len());
        assert_eq!(&restored[..first.len()], &first[..]);
        assert_eq!(&restored[first.len()..], &second[..]);
    });
}
