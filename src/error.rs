use thiserror::Error;

/// Alias for the result type of native codec operations.
pub type NativeResult<T> = Result<T, NativeError>;

/// Errors that can occur when loading or calling the native codecs.
///
/// Load and bind failures are cached per library, so every later call for
/// the same codec returns an equal error.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// The shared library for this platform could not be found, extracted or loaded
    #[error("Failed to load native library {library}: {reason}")]
    LibraryLoad {
        /// Library name, e.g. `zstd`
        library: String,
        /// What went wrong
        reason: String,
    },

    /// A required entry point is missing from the loaded library
    #[error("Unresolved symbol {symbol} in native library {library}")]
    SymbolResolution {
        /// Library name, e.g. `zstd`
        library: String,
        /// Exported function name
        symbol: String,
    },

    /// The buffer cannot be handed to native code without copying
    #[error("Unsupported buffer kind: {0}")]
    UnsupportedBufferKind(String),

    /// A byte range does not fit inside its backing storage
    #[error("Range {offset}..{offset}+{length} is out of bounds for storage of {size} bytes")]
    InvalidRange {
        /// Start of the range
        offset: usize,
        /// Length of the range
        length: usize,
        /// Size of the backing storage
        size: usize,
    },

    /// Invalid input length
    #[error("Invalid input length {0}")]
    InvalidInputLength(usize),

    /// Compression level outside what the native library accepts
    #[error("Compression level {level} is outside {min}..={max}")]
    InvalidCompressionLevel {
        /// Requested level
        level: i32,
        /// Lowest level the library accepts
        min: i32,
        /// Highest level the library accepts
        max: i32,
    },

    /// Output buffer too small
    #[error("Output buffer too small ({capacity} bytes)")]
    BufferTooSmall {
        /// Capacity of the destination that was passed in
        capacity: usize,
    },

    /// The compressed input is not a valid stream for this codec
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Any other failure reported by the native library
    #[error("{codec} {operation} failed: {message}")]
    NativeCallFailed {
        /// Codec family, e.g. `zstd`
        codec: &'static str,
        /// Operation that failed, e.g. `compress`
        operation: &'static str,
        /// Native diagnostic, when the library provides one
        message: String,
    },
}

impl NativeError {
    pub(crate) fn library_load(library: &str, reason: impl Into<String>) -> Self {
        NativeError::LibraryLoad {
            library: library.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn call_failed(
        codec: &'static str,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        NativeError::NativeCallFailed {
            codec,
            operation,
            message: message.into(),
        }
    }

    /// Returns `true` for load and bind failures, which no retry can fix.
    pub fn is_linkage_error(&self) -> bool {
        matches!(
            self,
            NativeError::LibraryLoad { .. } | NativeError::SymbolResolution { .. }
        )
    }
}
