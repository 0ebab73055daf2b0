//! Locating, loading and binding the packaged native libraries.

mod binder;
mod loader;
mod platform;

pub(crate) use binder::native_functions;
pub use loader::{config, configure, load, LoaderConfig, NativeLibrary, LIBRARY_DIR_ENV};
pub use platform::Platform;
