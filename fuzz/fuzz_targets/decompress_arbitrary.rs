#![no_main]

use libfuzzer_sys::fuzz_target;
use native_codecs::{ByteRange, ByteRangeMut, NativeError};

mod common;
use common::{available, FuzzInput};

const CAPACITY: usize = 1 << 16;

fuzz_target!(|input: FuzzInput| {
    let Some(algorithm) = available(input.algorithm) else {
        return;
    };
    let mut decompressor = algorithm.decompressor().unwrap();

    // Arbitrary bytes must never crash, and failures must be classified
    let mut output = vec![0u8; CAPACITY];
    match decompressor.decompress(ByteRange::new(&input.data), ByteRangeMut::new(&mut output)) {
        Ok(written) => assert!(written <= CAPACITY),
        Err(NativeError::MalformedInput(_) | NativeError::BufferTooSmall { .. }) => {}
        Err(e) => panic!("{algorithm}: unexpected error {e}"),
    }

    if let Some(probe) = decompressor.as_length_probe() {
        let _ = probe.decompressed_length(ByteRange::new(&input.data));
    }
    if let Some(validator) = decompressor.as_validator() {
        let _ = validator.validate(ByteRange::new(&input.data));
    }
});
