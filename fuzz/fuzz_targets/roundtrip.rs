#![no_main]

use libfuzzer_sys::fuzz_target;

mod common;
use common::{available, FuzzInput};

fuzz_target!(|input: FuzzInput| {
    let Some(algorithm) = available(input.algorithm) else {
        return;
    };
    let data = &input.data[..input.data.len().min(1 << 20)];

    let compressed = algorithm
        .compressor()
        .unwrap()
        .compress_to_vec(data)
        .expect("Output is sized by the bound, so compression succeeds");

    let mut decompressed = vec![0u8; data.len()];
    let restored = algorithm
        .decompressor()
        .unwrap()
        .decompress_to_slice(&compressed, &mut decompressed)
        .expect("If we can compress it, we can decompress it");

    assert_eq!(restored, data, "{algorithm} round trip mismatch");
});
