#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

#[cfg(not(any(feature = "lz4", feature = "snappy", feature = "zstd")))]
compile_error!("At least one of the features 'lz4', 'snappy' or 'zstd' must be enabled");

mod buffer;
mod codec;
mod context;
mod error;
pub mod native;

#[cfg(feature = "lz4")]
/// Bindings to the [LZ4](https://github.com/lz4/lz4) block API in `liblz4`
pub mod lz4;

#[cfg(feature = "snappy")]
/// Bindings to the C API of [Snappy](https://github.com/google/snappy) in `libsnappy`
pub mod snappy;

#[cfg(feature = "zstd")]
/// Bindings to the [Zstandard](https://github.com/facebook/zstd) simple API in `libzstd`
pub mod zstd;

pub use buffer::{ByteRange, ByteRangeMut, DirectBuffer, Origin};
pub use codec::{Algorithm, UnknownAlgorithm};
pub use context::ContextMode;
pub use error::{NativeError, NativeResult};

/// Block compression into a caller-provided destination.
///
/// Implementations hand both ranges straight to the native library; nothing
/// is copied and nothing is resized. Size the destination with
/// [`max_compressed_length`](Compressor::max_compressed_length) to rule out
/// [`NativeError::BufferTooSmall`].
pub trait Compressor {
    /// Upper bound on the compressed size of `uncompressed_size` input bytes.
    ///
    /// Compressing any input of that size into a destination of this size
    /// never fails for lack of space.
    fn max_compressed_length(&self, uncompressed_size: usize) -> NativeResult<usize>;

    /// Compresses `input` into `output`, returning the number of bytes written.
    ///
    /// On error the contents of `output` are unspecified.
    fn compress(&mut self, input: ByteRange<'_>, output: ByteRangeMut<'_>) -> NativeResult<usize>;

    /// Compresses into a slice, returning the sub-slice that was written.
    fn compress_to_slice<'out>(
        &mut self,
        input: &[u8],
        output: &'out mut [u8],
    ) -> NativeResult<&'out mut [u8]> {
        let written = self.compress(ByteRange::new(input), ByteRangeMut::new(&mut *output))?;
        Ok(&mut output[..written])
    }

    /// Compresses into a freshly allocated vector sized by the compression bound.
    fn compress_to_vec(&mut self, input: &[u8]) -> NativeResult<Vec<u8>> {
        let mut output = vec![0; self.max_compressed_length(input.len())?];
        let written = self.compress(ByteRange::new(input), ByteRangeMut::new(&mut output))?;
        output.truncate(written);
        Ok(output)
    }
}

/// Block decompression into a caller-provided destination.
pub trait Decompressor {
    /// Decompresses `input` into `output`, returning the number of bytes written.
    ///
    /// Fails with [`NativeError::MalformedInput`] if `input` is not a valid
    /// compressed block for this codec. On error the contents of `output`
    /// are unspecified.
    fn decompress(&mut self, input: ByteRange<'_>, output: ByteRangeMut<'_>)
        -> NativeResult<usize>;

    /// Decompresses into a slice, returning the sub-slice that was written.
    fn decompress_to_slice<'out>(
        &mut self,
        input: &[u8],
        output: &'out mut [u8],
    ) -> NativeResult<&'out mut [u8]> {
        let written = self.decompress(ByteRange::new(input), ByteRangeMut::new(&mut *output))?;
        Ok(&mut output[..written])
    }

    /// The header probe of this codec, if it has one.
    fn as_length_probe(&self) -> Option<&dyn LengthProbe> {
        None
    }

    /// The structural validator of this codec, if it has one.
    fn as_validator(&self) -> Option<&dyn Validate> {
        None
    }
}

/// Uncompressed size as recorded in a compressed block's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecompressedLength {
    /// The header records the original size.
    Known(u64),
    /// The header is valid but does not record the size.
    Unknown,
}

impl DecompressedLength {
    /// The recorded size, or `None` if the header does not carry one.
    pub fn known(self) -> Option<u64> {
        match self {
            DecompressedLength::Known(length) => Some(length),
            DecompressedLength::Unknown => None,
        }
    }
}

/// Reads the uncompressed size from a compressed block without decompressing it.
pub trait LengthProbe {
    /// Uncompressed size recorded in `input`'s header.
    ///
    /// Fails with [`NativeError::MalformedInput`] if the header cannot be parsed.
    fn decompressed_length(&self, input: ByteRange<'_>) -> NativeResult<DecompressedLength>;
}

/// Checks that a compressed block is well formed without producing output.
pub trait Validate {
    /// Returns `true` if `input` is a structurally complete compressed block.
    ///
    /// Malformed input is `Ok(false)`, not an error.
    fn validate(&self, input: ByteRange<'_>) -> NativeResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_length_is_only_reported_when_recorded() {
        assert_eq!(DecompressedLength::Known(1500).known(), Some(1500));
        assert_eq!(DecompressedLength::Known(0).known(), Some(0));
        assert_eq!(DecompressedLength::Unknown.known(), None);
    }
}
