//! C entry points, so the allocator can be linked from C code (the crate also
//! builds as a `cdylib`). All of them share one process wide [`MemAlloc`] and
//! behave like their libc counterparts, except that zero sized requests
//! always return `NULL`.

use std::{ffi::c_void, ptr::{self, NonNull}};

use crate::memalloc::MemAlloc;

static ALLOCATOR: MemAlloc = MemAlloc::new();

#[inline]
fn into_raw(ptr: Option<NonNull<u8>>) -> *mut c_void {
    ptr.map_or(ptr::null_mut(), |ptr| ptr.as_ptr().cast())
}

/// Allocates `size` bytes. Returns `NULL` if `size` is zero or there is no memory left.
#[unsafe(no_mangle)]
pub extern "C" fn memalloc_malloc(size: usize) -> *mut c_void {
    into_raw(ALLOCATOR.allocate(size))
}

/// Allocates `count * size` zeroed bytes. Returns `NULL` if the product
/// overflows, is zero, or there is no memory left.
#[unsafe(no_mangle)]
pub extern "C" fn memalloc_calloc(count: usize, size: usize) -> *mut c_void {
    into_raw(ALLOCATOR.zero_allocate(count, size))
}

/// Resizes `ptr` to `size` bytes, see [`crate::Heap::resize`].
///
/// **SAFETY**: `ptr` must be `NULL` or a live pointer returned by these functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn memalloc_realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    unsafe { into_raw(ALLOCATOR.resize(NonNull::new(ptr.cast()), size)) }
}

/// Releases `ptr`. `NULL` is ignored.
///
/// **SAFETY**: `ptr` must be `NULL` or a live pointer returned by these functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn memalloc_free(ptr: *mut c_void) {
    unsafe { ALLOCATOR.release(NonNull::new(ptr.cast())) }
}
