use std::collections::HashMap;
use std::env::consts::DLL_SUFFIX;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use libloading::Library;
use log::{debug, warn};
use tempfile::TempPath;

use crate::native::Platform;
use crate::{NativeError, NativeResult};

/// Environment variable naming the resource root when [`configure`] was not called.
pub const LIBRARY_DIR_ENV: &str = "NATIVE_CODECS_LIBRARY_DIR";

/// Where packaged native libraries live and where they get extracted to.
///
/// Libraries are looked up as
/// `<resource_root>/<platform identifier>/<platform file name>`, for example
/// `native/linux-x86_64/libzstd.so`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    resource_root: PathBuf,
    extract_dir: Option<PathBuf>,
    platform: Platform,
}

impl LoaderConfig {
    /// Creates a config for the current platform rooted at `resource_root`.
    pub fn new(resource_root: impl Into<PathBuf>) -> Self {
        Self {
            resource_root: resource_root.into(),
            extract_dir: None,
            platform: Platform::current(),
        }
    }

    /// Resource root from [`LIBRARY_DIR_ENV`], or `native/` next to the executable.
    pub fn from_env() -> Self {
        if let Some(dir) = std::env::var_os(LIBRARY_DIR_ENV) {
            return Self::new(dir);
        }
        let root = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("native")))
            .unwrap_or_else(|| PathBuf::from("native"));
        Self::new(root)
    }

    /// Extracts libraries into `dir` instead of the system temporary directory.
    #[must_use]
    pub fn with_extract_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extract_dir = Some(dir.into());
        self
    }

    /// Looks up libraries packaged for `platform` instead of the current one.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn resource_root(&self) -> &Path {
        &self.resource_root
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Packaged location of library `name`.
    pub fn resource_path(&self, name: &str) -> PathBuf {
        self.resource_root
            .join(self.platform.identifier())
            .join(self.platform.library_file_name(name))
    }

    /// Extracts and loads library `name` without touching the process-wide cache.
    ///
    /// Each call produces a fresh copy; use [`load`] for the shared instance.
    pub fn open(&self, name: &str) -> NativeResult<NativeLibrary> {
        let resource = self.resource_path(name);
        if !resource.is_file() {
            return Err(NativeError::library_load(
                name,
                format!("library not found: {}", resource.display()),
            ));
        }

        let extracted = self.extract(name, &resource).map_err(|e| {
            NativeError::library_load(
                name,
                format!("failed to extract {}: {e}", resource.display()),
            )
        })?;

        // SAFETY: loading runs the library's initialisers. The codec libraries
        // only set up static tables and do not depend on the loading thread.
        let library = unsafe { Library::new(&*extracted) }
            .map_err(|e| NativeError::library_load(name, e.to_string()))?;

        debug!(
            "loaded native library {name} from {} (extracted to {})",
            resource.display(),
            extracted.display()
        );

        Ok(NativeLibrary {
            name: name.to_string(),
            path: extracted.to_path_buf(),
            library,
            _extracted: extracted,
        })
    }

    fn extract(&self, name: &str, resource: &Path) -> io::Result<TempPath> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(name).suffix(DLL_SUFFIX);
        let mut file = match &self.extract_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        io::copy(&mut File::open(resource)?, file.as_file_mut())?;
        file.as_file().sync_all()?;
        Ok(file.into_temp_path())
    }
}

/// A loaded native library.
///
/// The extracted copy is deleted when the value is dropped. Libraries handed
/// out by [`load`] are never dropped.
pub struct NativeLibrary {
    name: String,
    path: PathBuf,
    // must drop before `_extracted` so the file is unmapped before removal
    pub(super) library: Library,
    _extracted: TempPath,
}

impl NativeLibrary {
    /// Name the library was loaded under, e.g. `zstd`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the extracted copy the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

static CONFIG: OnceLock<LoaderConfig> = OnceLock::new();

/// Sets the process-wide loader config.
///
/// Only the first call wins, and only if no library was loaded before it.
/// A rejected config is handed back.
pub fn configure(config: LoaderConfig) -> Result<(), LoaderConfig> {
    CONFIG.set(config)
}

/// The process-wide loader config, initialised from the environment if unset.
pub fn config() -> &'static LoaderConfig {
    CONFIG.get_or_init(LoaderConfig::from_env)
}

/// Loads library `name` once per process.
///
/// The first outcome, success or failure, is cached and returned to every
/// later caller. Concurrent first callers wait for the one doing the load.
pub fn load(name: &str) -> NativeResult<&'static NativeLibrary> {
    type Libraries = Mutex<HashMap<String, NativeResult<&'static NativeLibrary>>>;
    static LIBRARIES: OnceLock<Libraries> = OnceLock::new();

    let mut libraries = LIBRARIES
        .get_or_init(Libraries::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(result) = libraries.get(name) {
        return result.clone();
    }

    let result = config()
        .open(name)
        .map(|library| &*Box::leak(Box::new(library)));
    if let Err(e) = &result {
        warn!("{e}");
    }
    libraries.insert(name.to_string(), result.clone());
    result
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn staged_root(name: &str, contents: &[u8]) -> (tempfile::TempDir, LoaderConfig) {
        let root = tempfile::tempdir().unwrap();
        let config = LoaderConfig::new(root.path());
        let path = config.resource_path(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        (root, config)
    }

    #[test]
    fn resource_path_layout() {
        let config = LoaderConfig::new("/opt/codecs")
            .with_platform(Platform::new("linux", "aarch64"));
        assert_eq!(
            config.resource_path("zstd"),
            Path::new("/opt/codecs/linux-aarch64/libzstd.so")
        );
    }

    #[test]
    fn missing_library_is_a_load_error() {
        let root = tempfile::tempdir().unwrap();
        let err = LoaderConfig::new(root.path()).open("zstd").unwrap_err();
        match err {
            NativeError::LibraryLoad { library, reason } => {
                assert_eq!(library, "zstd");
                assert!(reason.contains("not found"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn library_for_other_platform_is_not_found() {
        let (_root, config) = staged_root("lz4", b"not a library");
        let err = config
            .with_platform(Platform::new("plan9", "mips"))
            .open("lz4")
            .unwrap_err();
        assert!(err.is_linkage_error());
        assert!(err.to_string().contains("not found"), "{err}");
    }

    #[test]
    fn corrupt_library_is_a_load_error() {
        let (_root, config) = staged_root("snappy", b"definitely not an ELF file");
        let err = config.open("snappy").unwrap_err();
        assert!(matches!(err, NativeError::LibraryLoad { ref library, .. } if library == "snappy"));
    }

    #[test]
    fn extraction_failure_is_a_load_error() {
        let (root, config) = staged_root("zstd", b"bytes");
        let err = config
            .with_extract_dir(root.path().join("does-not-exist"))
            .open("zstd")
            .unwrap_err();
        match err {
            NativeError::LibraryLoad { reason, .. } => {
                assert!(reason.contains("failed to extract"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn failed_load_removes_extracted_copy() {
        let (_root, config) = staged_root("lz4", b"garbage");
        let extract = tempfile::tempdir().unwrap();
        let _ = config.with_extract_dir(extract.path()).open("lz4");
        assert_eq!(fs::read_dir(extract.path()).unwrap().count(), 0);
    }
}
