use std::ffi::{c_char, c_int, c_uint, c_void, CStr};
use std::ops::RangeInclusive;

use crate::codec::{checked_length, Operation};
use crate::context::{ContextKind, ContextSlot, NativeContext};
use crate::native::native_functions;
use crate::{
    ByteRange, ByteRangeMut, Compressor, ContextMode, DecompressedLength, Decompressor,
    LengthProbe, NativeError, NativeResult, Validate,
};

const CODEC: &str = "zstd";

/// Level used by [`ZstdCompressor::new`], matching `ZSTD_CLEVEL_DEFAULT`.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

const CONTENTSIZE_UNKNOWN: u64 = u64::MAX;
const CONTENTSIZE_ERROR: u64 = u64::MAX - 1;

// ZSTD_ErrorCode
const DST_SIZE_TOO_SMALL: c_int = 70;
const MALFORMED_INPUT_CODES: [c_int; 10] = [
    10, // prefix_unknown
    12, // version_unsupported
    14, // frameParameter_unsupported
    16, // frameParameter_windowTooLarge
    20, // corruption_detected
    22, // checksum_wrong
    24, // literals_headerWrong
    30, // dictionary_corrupted
    32, // dictionary_wrong
    72, // srcSize_wrong
];

native_functions! {
    struct ZstdFunctions("zstd") {
        fn compress_bound = "ZSTD_compressBound"(src_size: usize) -> usize;
        fn create_cctx = "ZSTD_createCCtx"() -> *mut c_void;
        fn free_cctx = "ZSTD_freeCCtx"(cctx: *mut c_void) -> usize;
        fn compress_cctx = "ZSTD_compressCCtx"(
            cctx: *mut c_void,
            dst: *mut c_void,
            dst_capacity: usize,
            src: *const c_void,
            src_size: usize,
            compression_level: c_int,
        ) -> usize;
        fn create_dctx = "ZSTD_createDCtx"() -> *mut c_void;
        fn free_dctx = "ZSTD_freeDCtx"(dctx: *mut c_void) -> usize;
        fn decompress_dctx = "ZSTD_decompressDCtx"(
            dctx: *mut c_void,
            dst: *mut c_void,
            dst_capacity: usize,
            src: *const c_void,
            src_size: usize,
        ) -> usize;
        fn get_frame_content_size = "ZSTD_getFrameContentSize"(src: *const c_void, src_size: usize) -> u64;
        fn find_frame_compressed_size = "ZSTD_findFrameCompressedSize"(src: *const c_void, src_size: usize) -> usize;
        fn is_error = "ZSTD_isError"(code: usize) -> c_uint;
        fn get_error_code = "ZSTD_getErrorCode"(function_result: usize) -> c_int;
        fn get_error_name = "ZSTD_getErrorName"(code: usize) -> *const c_char;
        fn min_c_level = "ZSTD_minCLevel"() -> c_int;
        fn max_c_level = "ZSTD_maxCLevel"() -> c_int;
    }
}

impl ZstdFunctions {
    fn failed(&self, result: usize) -> bool {
        // SAFETY: pure function of its argument
        unsafe { self.is_error(result) != 0 }
    }

    fn error_name(&self, result: usize) -> String {
        // SAFETY: returns a pointer to a static string, or null on very old builds
        let name = unsafe { self.get_error_name(result) };
        if name.is_null() {
            return "unknown error".to_string();
        }
        // SAFETY: non-null names are NUL-terminated and static
        unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
    }

    /// Passes a size through, or translates it if `ZSTD_isError` says it is an error code.
    fn check(&self, result: usize, operation: Operation, capacity: usize) -> NativeResult<usize> {
        if !self.failed(result) {
            return Ok(result);
        }
        // SAFETY: pure function of its argument
        let code = unsafe { self.get_error_code(result) };
        Err(translate_error(code, self.error_name(result), operation, capacity))
    }

    /// Content size recorded in the header of the frame at the start of `frame`.
    fn content_size(&self, frame: ByteRange<'_>) -> u64 {
        frame.with_address(|src, src_size| {
            // SAFETY: reads at most `src_size` bytes
            unsafe { self.get_frame_content_size(src.cast(), src_size) }
        })
    }

    /// Compressed size of the frame at the start of `frame`, if it is complete.
    fn frame_size(&self, frame: ByteRange<'_>) -> Option<usize> {
        let size = frame.with_address(|src, src_size| {
            // SAFETY: reads at most `src_size` bytes
            unsafe { self.find_frame_compressed_size(src.cast(), src_size) }
        });
        (!self.failed(size) && size != 0 && size <= frame.len()).then_some(size)
    }

    fn level_range(&self) -> RangeInclusive<i32> {
        // SAFETY: no arguments
        unsafe { self.min_c_level()..=self.max_c_level() }
    }
}

fn translate_error(code: c_int, name: String, operation: Operation, capacity: usize) -> NativeError {
    match code {
        DST_SIZE_TOO_SMALL => NativeError::BufferTooSmall { capacity },
        code if operation.reads_compressed() && MALFORMED_INPUT_CODES.contains(&code) => {
            NativeError::MalformedInput(name)
        }
        _ => NativeError::call_failed(CODEC, operation.name(), name),
    }
}

fn frame_content_size(size: u64) -> NativeResult<DecompressedLength> {
    match size {
        CONTENTSIZE_UNKNOWN => Ok(DecompressedLength::Unknown),
        CONTENTSIZE_ERROR => Err(NativeError::MalformedInput(
            "not a zstd frame or frame header is truncated".to_string(),
        )),
        size => Ok(DecompressedLength::Known(size)),
    }
}

struct CompressionContext;

impl ContextKind for CompressionContext {
    type Functions = ZstdFunctions;
    const CODEC: &'static str = CODEC;
    const NAME: &'static str = "ZSTD_CCtx";

    unsafe fn create(functions: &ZstdFunctions) -> *mut c_void {
        unsafe { functions.create_cctx() }
    }

    unsafe fn release(functions: &ZstdFunctions, raw: *mut c_void) {
        unsafe { functions.free_cctx(raw) };
    }
}

struct DecompressionContext;

impl ContextKind for DecompressionContext {
    type Functions = ZstdFunctions;
    const CODEC: &'static str = CODEC;
    const NAME: &'static str = "ZSTD_DCtx";

    unsafe fn create(functions: &ZstdFunctions) -> *mut c_void {
        unsafe { functions.create_dctx() }
    }

    unsafe fn release(functions: &ZstdFunctions, raw: *mut c_void) {
        unsafe { functions.free_dctx(raw) };
    }
}

/// Compression levels accepted by the loaded `libzstd`.
pub fn level_range() -> NativeResult<RangeInclusive<i32>> {
    Ok(ZstdFunctions::get()?.level_range())
}

fn compress_with(
    functions: &ZstdFunctions,
    context: &mut NativeContext<CompressionContext>,
    level: i32,
    input: ByteRange<'_>,
    mut output: ByteRangeMut<'_>,
) -> NativeResult<usize> {
    let capacity = output.len();
    let cctx = context.as_ptr();
    let result = input.with_address(|src, src_size| {
        output.with_address(|dst, dst_capacity| {
            // SAFETY: the context is exclusively borrowed and both ranges are live
            unsafe { functions.compress_cctx(cctx, dst.cast(), dst_capacity, src.cast(), src_size, level) }
        })
    });
    let written = functions.check(result, Operation::Compress, capacity)?;
    checked_length(CODEC, Operation::Compress, written, capacity)
}

fn decompress_with(
    functions: &ZstdFunctions,
    context: &mut NativeContext<DecompressionContext>,
    input: ByteRange<'_>,
    mut output: ByteRangeMut<'_>,
) -> NativeResult<usize> {
    // libzstd reads zero bytes as zero frames
    if input.is_empty() {
        return Err(NativeError::MalformedInput("empty input holds no zstd frame".to_string()));
    }
    let capacity = output.len();
    let dctx = context.as_ptr();
    let result = input.with_address(|src, src_size| {
        output.with_address(|dst, dst_capacity| {
            // SAFETY: as for compression
            unsafe { functions.decompress_dctx(dctx, dst.cast(), dst_capacity, src.cast(), src_size) }
        })
    });
    let written = functions.check(result, Operation::Decompress, capacity)?;
    checked_length(CODEC, Operation::Decompress, written, capacity)
}

/// Zstandard compressor producing single frames with the content size recorded.
///
/// ```no_run
/// use native_codecs::zstd::ZstdCompressor;
/// use native_codecs::{Compressor, ContextMode};
///
/// let mut compressor = ZstdCompressor::with_level(19)?.with_context_mode(ContextMode::PerCall);
/// let frame = compressor.compress_to_vec(b"hello hello hello hello")?;
/// # Ok::<(), native_codecs::NativeError>(())
/// ```
pub struct ZstdCompressor {
    functions: &'static ZstdFunctions,
    level: i32,
    contexts: ContextSlot<CompressionContext>,
}

impl ZstdCompressor {
    /// A compressor at [`DEFAULT_COMPRESSION_LEVEL`] that keeps one context.
    pub fn new() -> NativeResult<Self> {
        Self::with_level(DEFAULT_COMPRESSION_LEVEL)
    }

    /// A compressor at `level`, which must lie in [`level_range`].
    pub fn with_level(level: i32) -> NativeResult<Self> {
        let functions = ZstdFunctions::get()?;
        let range = functions.level_range();
        if !range.contains(&level) {
            return Err(NativeError::InvalidCompressionLevel {
                level,
                min: *range.start(),
                max: *range.end(),
            });
        }
        Ok(Self {
            functions,
            level,
            contexts: ContextSlot::new(ContextMode::default()),
        })
    }

    /// Switches context ownership. Any context held so far is released.
    #[must_use]
    pub fn with_context_mode(mut self, mode: ContextMode) -> Self {
        self.contexts = ContextSlot::new(mode);
        self
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn context_mode(&self) -> ContextMode {
        self.contexts.mode()
    }

    /// Compresses with a context created for this call alone, so any number
    /// of threads may share one compressor.
    pub fn compress_shared(&self, input: ByteRange<'_>, output: ByteRangeMut<'_>) -> NativeResult<usize> {
        let functions = self.functions;
        NativeContext::scoped(functions, |context| {
            compress_with(functions, context, self.level, input, output)
        })
    }

    pub fn verify_available() -> NativeResult<()> {
        ZstdFunctions::get().map(|_| ())
    }
}

impl Compressor for ZstdCompressor {
    fn max_compressed_length(&self, uncompressed_size: usize) -> NativeResult<usize> {
        // SAFETY: pure function of its argument
        let bound = unsafe { self.functions.compress_bound(uncompressed_size) };
        if bound == 0 || self.functions.failed(bound) {
            return Err(NativeError::InvalidInputLength(uncompressed_size));
        }
        Ok(bound)
    }

    fn compress(&mut self, input: ByteRange<'_>, output: ByteRangeMut<'_>) -> NativeResult<usize> {
        let functions = self.functions;
        let level = self.level;
        self.contexts.with_context(functions, |context| {
            compress_with(functions, context, level, input, output)
        })
    }
}

/// Zstandard decompressor for one or more concatenated frames.
pub struct ZstdDecompressor {
    functions: &'static ZstdFunctions,
    contexts: ContextSlot<DecompressionContext>,
}

impl ZstdDecompressor {
    pub fn new() -> NativeResult<Self> {
        Ok(Self {
            functions: ZstdFunctions::get()?,
            contexts: ContextSlot::new(ContextMode::default()),
        })
    }

    /// Switches context ownership. Any context held so far is released.
    #[must_use]
    pub fn with_context_mode(mut self, mode: ContextMode) -> Self {
        self.contexts = ContextSlot::new(mode);
        self
    }

    pub fn context_mode(&self) -> ContextMode {
        self.contexts.mode()
    }

    /// Decompresses with a context created for this call alone.
    pub fn decompress_shared(&self, input: ByteRange<'_>, output: ByteRangeMut<'_>) -> NativeResult<usize> {
        let functions = self.functions;
        NativeContext::scoped(functions, |context| {
            decompress_with(functions, context, input, output)
        })
    }
}

impl Decompressor for ZstdDecompressor {
    fn decompress(&mut self, input: ByteRange<'_>, output: ByteRangeMut<'_>) -> NativeResult<usize> {
        let functions = self.functions;
        self.contexts.with_context(functions, |context| {
            decompress_with(functions, context, input, output)
        })
    }

    fn as_length_probe(&self) -> Option<&dyn LengthProbe> {
        Some(self)
    }

    fn as_validator(&self) -> Option<&dyn Validate> {
        Some(self)
    }
}

impl LengthProbe for ZstdDecompressor {
    /// Sum of the content sizes of every frame in `input`, or `Unknown` as
    /// soon as one frame header does not record its size.
    fn decompressed_length(&self, input: ByteRange<'_>) -> NativeResult<DecompressedLength> {
        let functions = self.functions;
        let mut total = 0u64;
        let mut offset = 0;
        loop {
            let frame = input.subrange(offset, input.len() - offset)?;
            let size = match frame_content_size(functions.content_size(frame))? {
                DecompressedLength::Known(size) => size,
                DecompressedLength::Unknown => return Ok(DecompressedLength::Unknown),
            };
            total = total.checked_add(size).ok_or_else(|| {
                NativeError::MalformedInput("total content size overflows u64".to_string())
            })?;
            let frame_size = functions.frame_size(frame).ok_or_else(|| {
                NativeError::MalformedInput(format!("zstd frame at offset {offset} is truncated"))
            })?;
            offset += frame_size;
            if offset == input.len() {
                return Ok(DecompressedLength::Known(total));
            }
        }
    }
}

impl Validate for ZstdDecompressor {
    /// Walks the frames and checks they exactly cover the input. Block
    /// contents are not decoded.
    fn validate(&self, input: ByteRange<'_>) -> NativeResult<bool> {
        let functions = self.functions;
        if input.is_empty() {
            return Ok(false);
        }
        let mut offset = 0;
        while offset < input.len() {
            let remaining = input.subrange(offset, input.len() - offset)?;
            match functions.frame_size(remaining) {
                Some(frame_size) => offset += frame_size,
                None => return Ok(false),
            }
        }
        Ok(true)
    }
}
