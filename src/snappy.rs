use std::ffi::{c_char, c_int};

use crate::codec::{checked_length, Operation};
use crate::native::native_functions;
use crate::{
    ByteRange, ByteRangeMut, Compressor, DecompressedLength, Decompressor, LengthProbe,
    NativeError, NativeResult, Validate,
};

const CODEC: &str = "snappy";

// snappy_status
const SNAPPY_OK: c_int = 0;
const SNAPPY_INVALID_INPUT: c_int = 1;
const SNAPPY_BUFFER_TOO_SMALL: c_int = 2;

native_functions! {
    struct SnappyFunctions("snappy") {
        fn compress = "snappy_compress"(
            input: *const c_char,
            input_length: usize,
            compressed: *mut c_char,
            compressed_length: *mut usize,
        ) -> c_int;
        fn uncompress = "snappy_uncompress"(
            compressed: *const c_char,
            compressed_length: usize,
            uncompressed: *mut c_char,
            uncompressed_length: *mut usize,
        ) -> c_int;
        fn max_compressed_length = "snappy_max_compressed_length"(source_length: usize) -> usize;
        fn uncompressed_length = "snappy_uncompressed_length"(
            compressed: *const c_char,
            compressed_length: usize,
            result: *mut usize,
        ) -> c_int;
        fn validate_compressed_buffer = "snappy_validate_compressed_buffer"(
            compressed: *const c_char,
            compressed_length: usize,
        ) -> c_int;
    }
}

fn check_status(status: c_int, operation: Operation, capacity: usize) -> NativeResult<()> {
    match status {
        SNAPPY_OK => Ok(()),
        SNAPPY_INVALID_INPUT if operation.reads_compressed() => Err(NativeError::MalformedInput(
            format!("invalid snappy block during {}", operation.name()),
        )),
        SNAPPY_BUFFER_TOO_SMALL => Err(NativeError::BufferTooSmall { capacity }),
        other => Err(NativeError::call_failed(
            CODEC,
            operation.name(),
            format!("status {other}"),
        )),
    }
}

fn declared_length(length: usize) -> NativeResult<DecompressedLength> {
    if length > u32::MAX as usize {
        return Err(NativeError::MalformedInput(format!(
            "declared uncompressed length {length} exceeds the format limit"
        )));
    }
    Ok(DecompressedLength::Known(length as u64))
}

/// Snappy compressor. Stateless, so one instance can serve any number of threads.
pub struct SnappyCompressor {
    functions: &'static SnappyFunctions,
}

impl SnappyCompressor {
    pub fn new() -> NativeResult<Self> {
        Ok(Self {
            functions: SnappyFunctions::get()?,
        })
    }

    pub fn verify_available() -> NativeResult<()> {
        SnappyFunctions::get().map(|_| ())
    }
}

impl Compressor for SnappyCompressor {
    fn max_compressed_length(&self, uncompressed_size: usize) -> NativeResult<usize> {
        // SAFETY: pure function of its argument
        Ok(unsafe { self.functions.max_compressed_length(uncompressed_size) })
    }

    fn compress(&mut self, input: ByteRange<'_>, mut output: ByteRangeMut<'_>) -> NativeResult<usize> {
        let functions = self.functions;
        let capacity = output.len();
        let mut written = capacity;

        let status = input.with_address(|src, src_len| {
            output.with_address(|dst, _| {
                // SAFETY: `written` holds the destination capacity on entry and the
                // compressed size on success
                unsafe { functions.compress(src.cast(), src_len, dst.cast(), &mut written) }
            })
        });
        check_status(status, Operation::Compress, capacity)?;
        checked_length(CODEC, Operation::Compress, written, capacity)
    }
}

/// Snappy decompressor with header probing and validation.
pub struct SnappyDecompressor {
    functions: &'static SnappyFunctions,
}

impl SnappyDecompressor {
    pub fn new() -> NativeResult<Self> {
        Ok(Self {
            functions: SnappyFunctions::get()?,
        })
    }
}

impl Decompressor for SnappyDecompressor {
    fn decompress(&mut self, input: ByteRange<'_>, mut output: ByteRangeMut<'_>) -> NativeResult<usize> {
        let functions = self.functions;
        let capacity = output.len();
        let mut written = capacity;

        let status = input.with_address(|src, src_len| {
            output.with_address(|dst, _| {
                // SAFETY: as for compress
                unsafe { functions.uncompress(src.cast(), src_len, dst.cast(), &mut written) }
            })
        });
        check_status(status, Operation::Decompress, capacity)?;
        checked_length(CODEC, Operation::Decompress, written, capacity)
    }

    fn as_length_probe(&self) -> Option<&dyn LengthProbe> {
        Some(self)
    }

    fn as_validator(&self) -> Option<&dyn Validate> {
        Some(self)
    }
}

impl LengthProbe for SnappyDecompressor {
    fn decompressed_length(&self, input: ByteRange<'_>) -> NativeResult<DecompressedLength> {
        let functions = self.functions;
        let mut length = 0;
        let status = input.with_address(|src, src_len| {
            // SAFETY: reads at most `src_len` bytes and writes one `usize`
            unsafe { functions.uncompressed_length(src.cast(), src_len, &mut length) }
        });
        check_status(status, Operation::DecompressedLength, 0)?;
        declared_length(length)
    }
}

impl Validate for SnappyDecompressor {
    fn validate(&self, input: ByteRange<'_>) -> NativeResult<bool> {
        let functions = self.functions;
        let status = input.with_address(|src, src_len| {
            // SAFETY: reads at most `src_len` bytes
            unsafe { functions.validate_compressed_buffer(src.cast(), src_len) }
        });
        match status {
            SNAPPY_OK => Ok(true),
            SNAPPY_INVALID_INPUT => Ok(false),
            other => check_status(other, Operation::Validate, 0).map(|()| false),
        }
    }
}
