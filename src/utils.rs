//! This file contains all the helper functions for the allocator.
//! This are functions that don't particularly belong to any concrete module of the program.

use std::ptr::NonNull;

/// It aligns `to_be_aligned` using `aligment`, which must be a power of two.
///
/// This method is used to align region sizes to be a multiple of [`crate::kernel::page_size`]
/// and block sizes to be a multiple of [`crate::block::ALIGNMENT`] because every payload we
/// hand out has to start at an aligned address.
///
/// Callers that work with user supplied sizes must use [`try_align`] instead, since this
/// one wraps around near `usize::MAX`.
pub const fn align(to_be_aligned: usize, aligment: usize) -> usize {
    (to_be_aligned + aligment - 1) & !(aligment - 1)
}

/// Same as [`align`] but returns `None` instead of wrapping when the
/// rounded value does not fit in a `usize`.
pub const fn try_align(to_be_aligned: usize, aligment: usize) -> Option<usize> {
    match to_be_aligned.checked_add(aligment - 1) {
        Some(sum) => Some(sum & !(aligment - 1)),
        None => None,
    }
}

/// Multiplies `a` by `b`, returning `None` if the mathematical product does
/// not fit in a `usize`.
///
/// A wrapping multiplication could produce a small and seemingly valid size
/// (`usize::MAX / 2 + 1` times two is zero), so the zero-allocate path must
/// reject those requests before it reaches the allocator.
#[inline]
pub const fn try_multiply(a: usize, b: usize) -> Option<usize> {
    a.checked_mul(b)
}

/// Sets `len` bytes starting at `dst` to `value`.
///
/// **SAFETY**: `dst` must be valid for `len` bytes of writes.
#[inline]
pub unsafe fn fill(dst: NonNull<u8>, value: u8, len: usize) {
    unsafe { dst.as_ptr().write_bytes(value, len) }
}

/// Copies `len` bytes from `src` to `dst`. Both ranges must not overlap.
///
/// **SAFETY**: `src` must be valid for `len` bytes of reads and `dst` for
/// `len` bytes of writes.
#[inline]
pub unsafe fn copy(src: NonNull<u8>, dst: NonNull<u8>, len: usize) {
    unsafe { src.as_ptr().copy_to_nonoverlapping(dst.as_ptr(), len) }
}
