//! Byte ranges handed to native calls.
//!
//! A range is an address and a length tied to the lifetime of the borrow it
//! was made from, so the storage behind it cannot be freed or moved while a
//! native call is using it. The raw address is only reachable through
//! `with_address`, from inside the adapter that makes the call.

use std::alloc::{self, Layout};
use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::slice;

use bytemuck::Pod;
use bytes::Buf;

use crate::{NativeError, NativeResult};

/// Where the memory behind a range comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Memory owned by Rust collections (slices, `Vec`, `Bytes`, ...).
    Heap,
    /// Memory allocated outside Rust collections, e.g. a [`DirectBuffer`]
    /// or a region handed over by another library.
    Foreign,
}

fn check_bounds(offset: usize, length: usize, size: usize) -> NativeResult<()> {
    match offset.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(NativeError::InvalidRange {
            offset,
            length,
            size,
        }),
    }
}

/// Read-only byte range used as the source of a native call.
#[derive(Clone, Copy)]
pub struct ByteRange<'a> {
    ptr: NonNull<u8>,
    len: usize,
    origin: Origin,
    _marker: PhantomData<&'a [u8]>,
}

// SAFETY: a `ByteRange` is a shared byte slice borrow
unsafe impl Send for ByteRange<'_> {}
// SAFETY: see above
unsafe impl Sync for ByteRange<'_> {}

impl<'a> ByteRange<'a> {
    fn from_parts(data: &'a [u8], origin: Origin) -> Self {
        Self {
            ptr: NonNull::from(data).cast(),
            len: data.len(),
            origin,
            _marker: PhantomData,
        }
    }

    /// Range over a whole slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self::from_parts(data, Origin::Heap)
    }

    /// Range over `length` bytes of `array` starting at `offset`.
    pub fn slice(array: &'a [u8], offset: usize, length: usize) -> NativeResult<Self> {
        check_bounds(offset, length, array.len())?;
        Ok(Self::new(&array[offset..offset + length]))
    }

    /// Range over the bytes of a plain-old-data array.
    pub fn from_pod<T: Pod>(array: &'a [T]) -> Self {
        Self::new(bytemuck::cast_slice(array))
    }

    /// Range over the remaining bytes of a [`Buf`].
    ///
    /// Only buffers whose remaining bytes form one contiguous chunk can be
    /// addressed directly; anything else (a wrapped `VecDeque<u8>`, a
    /// [`Chain`](bytes::buf::Chain), ...) is rejected rather than copied.
    pub fn from_buf<B: Buf + ?Sized>(buf: &'a B) -> NativeResult<Self> {
        let chunk = buf.chunk();
        if chunk.len() != buf.remaining() {
            return Err(NativeError::UnsupportedBufferKind(format!(
                "{} is not contiguous ({} of {} remaining bytes in the first chunk)",
                type_name::<B>(),
                chunk.len(),
                buf.remaining()
            )));
        }
        Ok(Self::new(chunk))
    }

    /// Range over foreign memory.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `len` bytes for all of `'a`, and the
    /// memory must not be written through any other pointer during that time.
    /// `ptr` may only be null when `len` is zero.
    pub unsafe fn from_raw_parts(ptr: *const u8, len: usize) -> Self {
        debug_assert!(!ptr.is_null() || len == 0);
        Self {
            ptr: NonNull::new(ptr.cast_mut()).unwrap_or(NonNull::dangling()),
            len,
            origin: Origin::Foreign,
            _marker: PhantomData,
        }
    }

    /// Narrows the range to `length` bytes starting at `offset`.
    pub fn subrange(&self, offset: usize, length: usize) -> NativeResult<ByteRange<'a>> {
        check_bounds(offset, length, self.len)?;
        Ok(Self {
            // SAFETY: offset + length <= len, so the result stays inside the range
            ptr: unsafe { self.ptr.add(offset) },
            len: length,
            origin: self.origin,
            _marker: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn as_slice(&self) -> &'a [u8] {
        // SAFETY: every constructor guarantees `ptr` is readable for `len` bytes during 'a
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Runs `f` with the base address and length of the range.
    ///
    /// The range stays borrowed until `f` returns, on every path.
    pub(crate) fn with_address<R>(&self, f: impl FnOnce(*const u8, usize) -> R) -> R {
        f(self.ptr.as_ptr().cast_const(), self.len)
    }
}

impl fmt::Debug for ByteRange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteRange")
            .field("len", &self.len)
            .field("origin", &self.origin)
            .finish()
    }
}

impl<'a> From<&'a [u8]> for ByteRange<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(data)
    }
}

impl<'a> From<&'a Vec<u8>> for ByteRange<'a> {
    fn from(data: &'a Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for ByteRange<'a> {
    fn from(data: &'a [u8; N]) -> Self {
        Self::new(data)
    }
}

/// Writable byte range used as the destination of a native call.
pub struct ByteRangeMut<'a> {
    ptr: NonNull<u8>,
    len: usize,
    origin: Origin,
    _marker: PhantomData<&'a mut [u8]>,
}

// SAFETY: a `ByteRangeMut` is a unique byte slice borrow
unsafe impl Send for ByteRangeMut<'_> {}
// SAFETY: see above
unsafe impl Sync for ByteRangeMut<'_> {}

impl<'a> ByteRangeMut<'a> {
    fn from_parts(data: &'a mut [u8], origin: Origin) -> Self {
        Self {
            len: data.len(),
            ptr: NonNull::from(data).cast(),
            origin,
            _marker: PhantomData,
        }
    }

    /// Range over a whole slice.
    pub fn new(data: &'a mut [u8]) -> Self {
        Self::from_parts(data, Origin::Heap)
    }

    /// Range over `length` bytes of `array` starting at `offset`.
    pub fn slice(array: &'a mut [u8], offset: usize, length: usize) -> NativeResult<Self> {
        check_bounds(offset, length, array.len())?;
        Ok(Self::new(&mut array[offset..offset + length]))
    }

    /// Range over the bytes of a plain-old-data array.
    pub fn from_pod<T: Pod>(array: &'a mut [T]) -> Self {
        Self::new(bytemuck::cast_slice_mut(array))
    }

    /// Range over foreign memory.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes for all of
    /// `'a`, and must not be accessed through any other pointer during that
    /// time. `ptr` may only be null when `len` is zero.
    pub unsafe fn from_raw_parts(ptr: *mut u8, len: usize) -> Self {
        debug_assert!(!ptr.is_null() || len == 0);
        Self {
            ptr: NonNull::new(ptr).unwrap_or(NonNull::dangling()),
            len,
            origin: Origin::Foreign,
            _marker: PhantomData,
        }
    }

    /// Narrows the range to `length` bytes starting at `offset`.
    pub fn subrange(self, offset: usize, length: usize) -> NativeResult<ByteRangeMut<'a>> {
        check_bounds(offset, length, self.len)?;
        Ok(Self {
            // SAFETY: offset + length <= len, so the result stays inside the range
            ptr: unsafe { self.ptr.add(offset) },
            len: length,
            origin: self.origin,
            _marker: PhantomData,
        })
    }

    /// Borrows the range again for a shorter lifetime, so it can be reused.
    pub fn reborrow(&mut self) -> ByteRangeMut<'_> {
        ByteRangeMut {
            ptr: self.ptr,
            len: self.len,
            origin: self.origin,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: every constructor guarantees `ptr` is valid for `len` bytes during 'a
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn into_slice(self) -> &'a mut [u8] {
        // SAFETY: as above, and `self` is consumed so the borrow stays unique
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Runs `f` with the base address and capacity of the range.
    ///
    /// The range stays mutably borrowed until `f` returns, on every path.
    pub(crate) fn with_address<R>(&mut self, f: impl FnOnce(*mut u8, usize) -> R) -> R {
        f(self.ptr.as_ptr(), self.len)
    }
}

impl fmt::Debug for ByteRangeMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteRangeMut")
            .field("len", &self.len)
            .field("origin", &self.origin)
            .finish()
    }
}

impl<'a> From<&'a mut [u8]> for ByteRangeMut<'a> {
    fn from(data: &'a mut [u8]) -> Self {
        Self::new(data)
    }
}

impl<'a> From<&'a mut Vec<u8>> for ByteRangeMut<'a> {
    fn from(data: &'a mut Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl<'a, const N: usize> From<&'a mut [u8; N]> for ByteRangeMut<'a> {
    fn from(data: &'a mut [u8; N]) -> Self {
        Self::new(data)
    }
}

/// Alignment of [`DirectBuffer`] allocations.
const DIRECT_ALIGN: usize = 64;

/// Zero-initialised memory allocated directly from the global allocator,
/// outside any Rust collection.
///
/// Ranges over a `DirectBuffer` have [`Origin::Foreign`].
pub struct DirectBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the buffer uniquely owns its allocation
unsafe impl Send for DirectBuffer {}
// SAFETY: shared access only hands out shared slices
unsafe impl Sync for DirectBuffer {}

impl DirectBuffer {
    /// Allocates `len` zeroed bytes.
    ///
    /// # Panics
    ///
    /// Panics if `len` rounded up to the alignment exceeds `isize::MAX`.
    pub fn new(len: usize) -> Self {
        if len == 0 {
            return Self {
                ptr: NonNull::dangling(),
                len,
            };
        }
        let layout = Self::layout(len);
        // SAFETY: layout has a non-zero size
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).unwrap_or_else(|| alloc::handle_alloc_error(layout));
        Self { ptr, len }
    }

    /// Allocates a buffer holding a copy of `data`.
    pub fn from_slice(data: &[u8]) -> Self {
        let mut buffer = Self::new(data.len());
        buffer.as_mut_slice().copy_from_slice(data);
        buffer
    }

    fn layout(len: usize) -> Layout {
        Layout::from_size_align(len, DIRECT_ALIGN).expect("DirectBuffer length overflows isize")
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the allocation holds `len` initialised bytes
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` makes the borrow unique
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Range over the whole buffer.
    pub fn as_range(&self) -> ByteRange<'_> {
        ByteRange::from_parts(self.as_slice(), Origin::Foreign)
    }

    /// Writable range over the whole buffer.
    pub fn as_range_mut(&mut self) -> ByteRangeMut<'_> {
        ByteRangeMut::from_parts(self.as_mut_slice(), Origin::Foreign)
    }

    /// Range over `length` bytes starting at `offset`.
    pub fn range(&self, offset: usize, length: usize) -> NativeResult<ByteRange<'_>> {
        self.as_range().subrange(offset, length)
    }

    /// Writable range over `length` bytes starting at `offset`.
    pub fn range_mut(&mut self, offset: usize, length: usize) -> NativeResult<ByteRangeMut<'_>> {
        self.as_range_mut().subrange(offset, length)
    }
}

impl Drop for DirectBuffer {
    fn drop(&mut self) {
        if self.len != 0 {
            // SAFETY: allocated in `new` with this exact layout
            unsafe { alloc::dealloc(self.ptr.as_ptr(), Self::layout(self.len)) };
        }
    }
}

impl fmt::Debug for DirectBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectBuffer")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}
