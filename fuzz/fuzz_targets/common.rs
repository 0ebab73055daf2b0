use native_codecs::native::{self, LoaderConfig, LIBRARY_DIR_ENV};
use native_codecs::Algorithm;

#[derive(arbitrary::Arbitrary, Clone, Copy, PartialEq, Eq, Debug)]
pub enum FuzzAlgorithm {
    Lz4,
    Snappy,
    Zstd,
}

impl From<FuzzAlgorithm> for Algorithm {
    fn from(algorithm: FuzzAlgorithm) -> Self {
        match algorithm {
            FuzzAlgorithm::Lz4 => Algorithm::Lz4,
            FuzzAlgorithm::Snappy => Algorithm::Snappy,
            FuzzAlgorithm::Zstd => Algorithm::Zstd,
        }
    }
}

#[derive(arbitrary::Arbitrary)]
pub struct FuzzInput {
    pub data: Vec<u8>,
    pub algorithm: FuzzAlgorithm,
}

impl std::fmt::Debug for FuzzInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuzzInput")
            .field("algorithm", &self.algorithm)
            .field("data", &HexSlice(&self.data))
            .finish()
    }
}

struct HexSlice<'a>(&'a [u8]);

impl std::fmt::Debug for HexSlice<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Points the loader at `NATIVE_CODECS_LIBRARY_DIR`, which fuzzing requires.
pub fn available(algorithm: FuzzAlgorithm) -> Option<Algorithm> {
    if let Some(dir) = std::env::var_os(LIBRARY_DIR_ENV) {
        let _ = native::configure(LoaderConfig::new(dir));
    }
    let algorithm = Algorithm::from(algorithm);
    algorithm.is_available().then_some(algorithm)
}
