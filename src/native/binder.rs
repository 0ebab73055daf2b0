use libloading::Symbol;
use log::trace;

use crate::native::NativeLibrary;
use crate::{NativeError, NativeResult};

impl NativeLibrary {
    /// Resolves `symbol` and returns it as the function pointer type `F`.
    ///
    /// A missing symbol means the library does not match the version these
    /// bindings were written against, which is not recoverable at runtime.
    ///
    /// # Safety
    ///
    /// `F` must be an `unsafe extern "C" fn` type whose arguments and return
    /// type match the native prototype exactly. The returned pointer is only
    /// valid while `self` stays loaded.
    pub unsafe fn bind<F: Copy>(&self, symbol: &str) -> NativeResult<F> {
        // SAFETY: the type contract is forwarded to the caller
        let function: Symbol<'_, F> = unsafe { self.library.get(symbol.as_bytes()) }.map_err(
            |_| NativeError::SymbolResolution {
                library: self.name().to_string(),
                symbol: symbol.to_string(),
            },
        )?;
        trace!("bound {}::{symbol}", self.name());
        Ok(*function)
    }
}

/// Declares the table of native functions one library exports.
///
/// Each entry names the exported symbol and its exact C signature, so every
/// native entry point has a single typed binding site. The generated `get()`
/// loads the library and binds the whole table on first use, caches the
/// outcome for the process, and returns the same error to every caller if
/// anything is missing. Each entry also gets an `unsafe` method of the same
/// name that performs the call.
macro_rules! native_functions {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident($library:literal) {
            $(
                $(#[$fn_attr:meta])*
                fn $function:ident = $symbol:literal ($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty;
            )*
        }
    ) => {
        $(#[$attr])*
        $vis struct $name {
            $( $function: unsafe extern "C" fn($($ty),*) -> $ret, )*
        }

        impl $name {
            fn bind(library: &'static $crate::native::NativeLibrary) -> $crate::NativeResult<Self> {
                Ok(Self {
                    $(
                        // SAFETY: the declared signature mirrors the C prototype
                        $function: unsafe {
                            library.bind::<unsafe extern "C" fn($($ty),*) -> $ret>($symbol)?
                        },
                    )*
                })
            }

            /// Process-wide function table, loaded and bound on first use.
            pub(crate) fn get() -> $crate::NativeResult<&'static Self> {
                static FUNCTIONS: ::std::sync::OnceLock<$crate::NativeResult<$name>> =
                    ::std::sync::OnceLock::new();
                FUNCTIONS
                    .get_or_init(|| $crate::native::load($library).and_then(Self::bind))
                    .as_ref()
                    .map_err(Clone::clone)
            }

            $(
                $(#[$fn_attr])*
                #[inline]
                pub(crate) unsafe fn $function(&self, $($arg: $ty),*) -> $ret {
                    // SAFETY: forwarded to the caller
                    unsafe { (self.$function)($($arg),*) }
                }
            )*
        }
    };
}

pub(crate) use native_functions;
