use std::ffi::{c_char, c_int, c_void};

use crate::codec::{checked_length, Operation};
use crate::native::native_functions;
use crate::{ByteRange, ByteRangeMut, Compressor, Decompressor, NativeError, NativeResult};

const CODEC: &str = "lz4";

/// Acceleration used unless configured otherwise. Higher is faster and compresses less.
pub const DEFAULT_ACCELERATION: i32 = 1;

/// Largest input the block format accepts (`LZ4_MAX_INPUT_SIZE`).
pub const MAX_INPUT_SIZE: usize = 0x7E00_0000;

native_functions! {
    struct Lz4Functions("lz4") {
        fn compress_bound = "LZ4_compressBound"(input_size: c_int) -> c_int;
        fn sizeof_state = "LZ4_sizeofState"() -> c_int;
        fn compress_fast = "LZ4_compress_fast"(
            src: *const c_char,
            dst: *mut c_char,
            src_size: c_int,
            dst_capacity: c_int,
            acceleration: c_int,
        ) -> c_int;
        fn compress_fast_ext_state = "LZ4_compress_fast_extState"(
            state: *mut c_void,
            src: *const c_char,
            dst: *mut c_char,
            src_size: c_int,
            dst_capacity: c_int,
            acceleration: c_int,
        ) -> c_int;
        fn decompress_safe = "LZ4_decompress_safe"(
            src: *const c_char,
            dst: *mut c_char,
            compressed_size: c_int,
            dst_capacity: c_int,
        ) -> c_int;
    }
}

fn input_size(len: usize) -> NativeResult<c_int> {
    c_int::try_from(len).map_err(|_| NativeError::InvalidInputLength(len))
}

/// Destinations larger than `c_int::MAX` are offered as `c_int::MAX` bytes.
fn destination_capacity(len: usize) -> c_int {
    c_int::try_from(len).unwrap_or(c_int::MAX)
}

fn compress_result(result: c_int, capacity: usize) -> NativeResult<usize> {
    match result {
        0 => Err(NativeError::BufferTooSmall { capacity }),
        n if n < 0 => Err(NativeError::call_failed(
            CODEC,
            Operation::Compress.name(),
            format!("returned {n}"),
        )),
        n => checked_length(CODEC, Operation::Compress, n as usize, capacity),
    }
}

/// `LZ4_decompress_safe` reports a corrupt block and a short destination the
/// same way, so both surface as malformed input.
fn decompress_result(result: c_int, capacity: usize) -> NativeResult<usize> {
    if result < 0 {
        return Err(NativeError::MalformedInput(format!(
            "invalid lz4 block or decoded size above {capacity} bytes (error at offset {})",
            -(i64::from(result) + 1)
        )));
    }
    checked_length(CODEC, Operation::Decompress, result as usize, capacity)
}

/// LZ4 block compressor.
///
/// By default the compressor owns the hash table state that
/// `LZ4_compress_fast_extState` works in, so repeated calls allocate nothing.
pub struct Lz4Compressor {
    functions: &'static Lz4Functions,
    acceleration: i32,
    state: Option<Box<[u64]>>,
}

impl Lz4Compressor {
    /// Loads `liblz4` if needed and allocates a reusable compression state.
    pub fn new() -> NativeResult<Self> {
        let functions = Lz4Functions::get()?;
        // SAFETY: no arguments
        let state_size = unsafe { functions.sizeof_state() };
        let words = usize::try_from(state_size)
            .map_err(|_| NativeError::call_failed(CODEC, "state size", format!("returned {state_size}")))?
            .div_ceil(size_of::<u64>());
        Ok(Self {
            functions,
            acceleration: DEFAULT_ACCELERATION,
            state: Some(vec![0; words].into_boxed_slice()),
        })
    }

    /// A compressor that lets `LZ4_compress_fast` keep its state on the native stack.
    pub fn without_state() -> NativeResult<Self> {
        Ok(Self {
            functions: Lz4Functions::get()?,
            acceleration: DEFAULT_ACCELERATION,
            state: None,
        })
    }

    /// Sets the acceleration factor. Values below 1 are treated as 1.
    #[must_use]
    pub fn with_acceleration(mut self, acceleration: i32) -> Self {
        self.acceleration = acceleration.max(1);
        self
    }

    pub fn acceleration(&self) -> i32 {
        self.acceleration
    }

    pub fn verify_available() -> NativeResult<()> {
        Lz4Functions::get().map(|_| ())
    }
}

impl Compressor for Lz4Compressor {
    fn max_compressed_length(&self, uncompressed_size: usize) -> NativeResult<usize> {
        if uncompressed_size > MAX_INPUT_SIZE {
            return Err(NativeError::InvalidInputLength(uncompressed_size));
        }
        // SAFETY: pure function of its argument
        let bound = unsafe { self.functions.compress_bound(input_size(uncompressed_size)?) };
        if bound <= 0 {
            return Err(NativeError::InvalidInputLength(uncompressed_size));
        }
        Ok(bound as usize)
    }

    fn compress(&mut self, input: ByteRange<'_>, mut output: ByteRangeMut<'_>) -> NativeResult<usize> {
        if input.len() > MAX_INPUT_SIZE {
            return Err(NativeError::InvalidInputLength(input.len()));
        }
        let src_size = input_size(input.len())?;
        let capacity = output.len();
        let dst_capacity = destination_capacity(capacity);
        let functions = self.functions;
        let acceleration = self.acceleration;
        let state = self.state.as_deref_mut();

        let result = input.with_address(|src, _| {
            output.with_address(|dst, _| {
                // SAFETY: `src` is readable for `src_size` bytes and `dst` writable for
                // `dst_capacity` bytes; `state` holds `LZ4_sizeofState` bytes, 8-aligned
                unsafe {
                    match state {
                        Some(state) => functions.compress_fast_ext_state(
                            state.as_mut_ptr().cast(),
                            src.cast(),
                            dst.cast(),
                            src_size,
                            dst_capacity,
                            acceleration,
                        ),
                        None => functions.compress_fast(
                            src.cast(),
                            dst.cast(),
                            src_size,
                            dst_capacity,
                            acceleration,
                        ),
                    }
                }
            })
        });
        compress_result(result, capacity)
    }
}

/// LZ4 block decompressor.
///
/// The block format does not record the uncompressed size, so the caller
/// must size the destination from its own framing.
pub struct Lz4Decompressor {
    functions: &'static Lz4Functions,
}

impl Lz4Decompressor {
    pub fn new() -> NativeResult<Self> {
        Ok(Self {
            functions: Lz4Functions::get()?,
        })
    }
}

impl Decompressor for Lz4Decompressor {
    fn decompress(&mut self, input: ByteRange<'_>, mut output: ByteRangeMut<'_>) -> NativeResult<usize> {
        let src_size = input_size(input.len())?;
        let capacity = output.len();
        let dst_capacity = destination_capacity(capacity);
        let functions = self.functions;

        let result = input.with_address(|src, _| {
            output.with_address(|dst, _| {
                // SAFETY: bounds as passed; LZ4_decompress_safe never writes past `dst_capacity`
                unsafe { functions.decompress_safe(src.cast(), dst.cast(), src_size, dst_capacity) }
            })
        });
        decompress_result(result, capacity)
    }
}
