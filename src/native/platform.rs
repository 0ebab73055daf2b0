use std::env::consts;
use std::fmt;
use std::sync::OnceLock;

/// Operating system and CPU architecture the process is running on.
///
/// Selects which packaged variant of a native library gets loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    os: &'static str,
    arch: &'static str,
}

impl Platform {
    /// Creates a platform from explicit names, e.g. `("linux", "aarch64")`.
    pub const fn new(os: &'static str, arch: &'static str) -> Self {
        Self { os, arch }
    }

    /// The platform of the running process.
    pub fn current() -> Platform {
        static CURRENT: OnceLock<Platform> = OnceLock::new();
        *CURRENT.get_or_init(|| Platform::new(consts::OS, consts::ARCH))
    }

    /// Operating system name as reported by [`std::env::consts::OS`].
    pub fn os(&self) -> &'static str {
        self.os
    }

    /// CPU architecture as reported by [`std::env::consts::ARCH`].
    pub fn arch(&self) -> &'static str {
        self.arch
    }

    /// Directory name used for this platform inside the resource root.
    pub fn identifier(&self) -> String {
        format!("{}-{}", self.os, self.arch).replace(' ', "_")
    }

    /// File name the platform's loader expects for library `name`.
    ///
    /// `zstd` becomes `libzstd.so` on Linux, `libzstd.dylib` on macOS and
    /// `zstd.dll` on Windows.
    pub fn library_file_name(&self, name: &str) -> String {
        let (prefix, suffix) = match self.os {
            "windows" => ("", ".dll"),
            "macos" | "ios" => ("lib", ".dylib"),
            _ => ("lib", ".so"),
        };
        format!("{prefix}{name}{suffix}")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}
