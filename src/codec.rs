use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[cfg(feature = "lz4")]
use crate::lz4::{Lz4Compressor, Lz4Decompressor};
#[cfg(feature = "snappy")]
use crate::snappy::{SnappyCompressor, SnappyDecompressor};
#[cfg(feature = "zstd")]
use crate::zstd::{ZstdCompressor, ZstdDecompressor};
use crate::{Compressor, Decompressor, NativeError, NativeResult};

/// Native entry point a result or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Compress,
    Decompress,
    DecompressedLength,
    Validate,
}

impl Operation {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Operation::Compress => "compress",
            Operation::Decompress => "decompress",
            Operation::DecompressedLength => "decompressed length",
            Operation::Validate => "validate",
        }
    }

    /// Whether the operation parses compressed input, so that an input error
    /// is the caller's malformed data rather than a library failure.
    pub(crate) fn reads_compressed(self) -> bool {
        matches!(
            self,
            Operation::Decompress | Operation::DecompressedLength | Operation::Validate
        )
    }
}

/// Rejects a reported output size larger than the destination it was written to.
pub(crate) fn checked_length(
    codec: &'static str,
    operation: Operation,
    written: usize,
    capacity: usize,
) -> NativeResult<usize> {
    if written > capacity {
        return Err(NativeError::call_failed(
            codec,
            operation.name(),
            format!("reported {written} bytes written into a {capacity} byte destination"),
        ));
    }
    Ok(written)
}

/// Returned when parsing an unknown [`Algorithm`] name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown compression algorithm {0:?}")]
pub struct UnknownAlgorithm(pub String);

/// The codec families compiled into this build.
///
/// Useful when the algorithm is chosen at runtime, for example from a file
/// header or a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Algorithm {
    #[cfg(feature = "lz4")]
    Lz4,
    #[cfg(feature = "snappy")]
    Snappy,
    #[cfg(feature = "zstd")]
    Zstd,
}

impl Algorithm {
    /// Every algorithm enabled by crate features.
    pub const ALL: &'static [Algorithm] = &[
        #[cfg(feature = "lz4")]
        Algorithm::Lz4,
        #[cfg(feature = "snappy")]
        Algorithm::Snappy,
        #[cfg(feature = "zstd")]
        Algorithm::Zstd,
    ];

    pub fn name(self) -> &'static str {
        match self {
            #[cfg(feature = "lz4")]
            Algorithm::Lz4 => "lz4",
            #[cfg(feature = "snappy")]
            Algorithm::Snappy => "snappy",
            #[cfg(feature = "zstd")]
            Algorithm::Zstd => "zstd",
        }
    }

    /// Base name of the shared library that implements this algorithm.
    pub fn library_name(self) -> &'static str {
        self.name()
    }

    /// Loads and binds the native library, reporting why it is unusable.
    ///
    /// The outcome is cached, so this is cheap after the first call.
    pub fn verify_available(self) -> NativeResult<()> {
        match self {
            #[cfg(feature = "lz4")]
            Algorithm::Lz4 => Lz4Compressor::verify_available(),
            #[cfg(feature = "snappy")]
            Algorithm::Snappy => SnappyCompressor::verify_available(),
            #[cfg(feature = "zstd")]
            Algorithm::Zstd => ZstdCompressor::verify_available(),
        }
    }

    pub fn is_available(self) -> bool {
        self.verify_available().is_ok()
    }

    /// A compressor with the algorithm's default settings.
    pub fn compressor(self) -> NativeResult<Box<dyn Compressor + Send + Sync>> {
        Ok(match self {
            #[cfg(feature = "lz4")]
            Algorithm::Lz4 => Box::new(Lz4Compressor::new()?),
            #[cfg(feature = "snappy")]
            Algorithm::Snappy => Box::new(SnappyCompressor::new()?),
            #[cfg(feature = "zstd")]
            Algorithm::Zstd => Box::new(ZstdCompressor::new()?),
        })
    }

    /// A decompressor with the algorithm's default settings.
    pub fn decompressor(self) -> NativeResult<Box<dyn Decompressor + Send + Sync>> {
        Ok(match self {
            #[cfg(feature = "lz4")]
            Algorithm::Lz4 => Box::new(Lz4Decompressor::new()?),
            #[cfg(feature = "snappy")]
            Algorithm::Snappy => Box::new(SnappyDecompressor::new()?),
            #[cfg(feature = "zstd")]
            Algorithm::Zstd => Box::new(ZstdDecompressor::new()?),
        })
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .iter()
            .copied()
            .find(|algorithm| algorithm.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownAlgorithm(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for &algorithm in Algorithm::ALL {
            assert_eq!(algorithm.to_string().parse::<Algorithm>(), Ok(algorithm));
        }
    }

    #[test]
    #[cfg(feature = "zstd")]
    fn parsing_ignores_case() {
        assert_eq!("ZSTD".parse::<Algorithm>(), Ok(Algorithm::Zstd));
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert_eq!(
            "brotli".parse::<Algorithm>(),
            Err(UnknownAlgorithm("brotli".to_string()))
        );
    }

    #[test]
    fn oversized_result_is_a_native_failure() {
        assert_eq!(checked_length("lz4", Operation::Compress, 10, 10), Ok(10));
        let err = checked_length("lz4", Operation::Compress, 11, 10).unwrap_err();
        assert!(matches!(
            err,
            NativeError::NativeCallFailed {
                codec: "lz4",
                operation: "compress",
                ..
            }
        ));
    }

    #[test]
    fn only_decoding_operations_read_compressed_input() {
        assert!(!Operation::Compress.reads_compressed());
        assert!(Operation::Decompress.reads_compressed());
        assert!(Operation::DecompressedLength.reads_compressed());
        assert!(Operation::Validate.reads_compressed());
    }
}
