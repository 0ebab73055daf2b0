//! Lifetime management for opaque native contexts.
//!
//! A context is created by one native call and must be released by exactly
//! one matching call. [`NativeContext`] owns the handle and releases it in
//! `Drop`, so every exit path of the owning operation (success, invalid input,
//! native failure) frees it once. Handing out the raw pointer requires
//! `&mut`, so a handle is never used by two calls at the same time.

use std::ffi::c_void;
use std::ptr::NonNull;

use log::trace;

use crate::{NativeError, NativeResult};

/// Who owns the native context behind a facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextMode {
    /// One context is created on first use and reused until the facade is
    /// dropped. Calls on the instance must be serialised, which `&mut self`
    /// enforces.
    #[default]
    PerInstance,
    /// A fresh context is created and released inside every call. The
    /// instance holds no native memory between calls and its `&self` entry
    /// points may run concurrently.
    PerCall,
}

/// A kind of native context and the functions that create and free it.
pub(crate) trait ContextKind: 'static {
    /// Bound function table the create/free calls come from.
    type Functions: Sync + 'static;

    /// Codec family, used in error messages.
    const CODEC: &'static str;
    /// Native type name, used in logs.
    const NAME: &'static str;

    /// Calls the native constructor. Null means failure.
    unsafe fn create(functions: &Self::Functions) -> *mut c_void;

    /// Calls the native destructor.
    ///
    /// # Safety
    ///
    /// `raw` must come from `create` and must not be used afterwards.
    unsafe fn release(functions: &Self::Functions, raw: *mut c_void);
}

/// Exclusively owned native context of kind `K`.
pub(crate) struct NativeContext<K: ContextKind> {
    raw: NonNull<c_void>,
    functions: &'static K::Functions,
}

// SAFETY: the contexts managed here are plain heap state with no thread affinity
unsafe impl<K: ContextKind> Send for NativeContext<K> {}
// SAFETY: the handle is only reachable through `&mut self`
unsafe impl<K: ContextKind> Sync for NativeContext<K> {}

impl<K: ContextKind> NativeContext<K> {
    pub(crate) fn create(functions: &'static K::Functions) -> NativeResult<Self> {
        // SAFETY: constructors take no arguments and return an owned handle or null
        let raw = unsafe { K::create(functions) };
        let raw = NonNull::new(raw).ok_or_else(|| {
            NativeError::call_failed(K::CODEC, "create context", format!("{} returned null", K::NAME))
        })?;
        trace!("created {} at {raw:p}", K::NAME);
        Ok(Self { raw, functions })
    }

    /// Creates a context, runs `f` with it and releases it before returning.
    pub(crate) fn scoped<R>(
        functions: &'static K::Functions,
        f: impl FnOnce(&mut Self) -> NativeResult<R>,
    ) -> NativeResult<R> {
        let mut context = Self::create(functions)?;
        f(&mut context)
    }

    pub(crate) fn as_ptr(&mut self) -> *mut c_void {
        self.raw.as_ptr()
    }
}

impl<K: ContextKind> Drop for NativeContext<K> {
    fn drop(&mut self) {
        // SAFETY: `raw` came from `create` and this is its only release
        unsafe { K::release(self.functions, self.raw.as_ptr()) };
        trace!("released {} at {:p}", K::NAME, self.raw);
    }
}

/// Holds or creates the context for a facade according to its [`ContextMode`].
pub(crate) struct ContextSlot<K: ContextKind> {
    mode: ContextMode,
    context: Option<NativeContext<K>>,
}

impl<K: ContextKind> ContextSlot<K> {
    pub(crate) fn new(mode: ContextMode) -> Self {
        Self {
            mode,
            context: None,
        }
    }

    pub(crate) fn mode(&self) -> ContextMode {
        self.mode
    }

    /// Runs `f` with this slot's context, creating it if needed.
    pub(crate) fn with_context<R>(
        &mut self,
        functions: &'static K::Functions,
        f: impl FnOnce(&mut NativeContext<K>) -> NativeResult<R>,
    ) -> NativeResult<R> {
        match self.mode {
            ContextMode::PerCall => NativeContext::scoped(functions, f),
            ContextMode::PerInstance => {
                let context = match self.context.take() {
                    Some(context) => context,
                    None => NativeContext::create(functions)?,
                };
                f(self.context.insert(context))
            }
        }
    }
}
