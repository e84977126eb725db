use std::{
    alloc::{GlobalAlloc, Layout},
    mem,
    ptr::{self, NonNull},
};

use spin::Mutex;

use crate::{
    block::ALIGNMENT,
    heap::Heap,
    kernel::Stats,
    utils::{align, copy, fill},
};

/// Thread safe front end of a [`Heap`].
///
/// Every operation takes a spin lock for its whole duration, so the free list
/// and the region list are only ever touched by one thread at a time. The lock
/// never allocates, which is what makes this usable as the global allocator:
///
/// ```no_run
/// use memalloc::MemAlloc;
///
/// #[global_allocator]
/// static ALLOCATOR: MemAlloc = MemAlloc::new();
///
/// fn main() {
///     let boxed = Box::new(22);
///     assert_eq!(22, *boxed);
/// }
/// ```
pub struct MemAlloc {
    heap: Mutex<Heap>,
}

impl MemAlloc {
    pub const fn new() -> Self {
        Self {
            heap: Mutex::new(Heap::new()),
        }
    }

    /// See [`Heap::allocate`].
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.heap.lock().allocate(size)
    }

    /// See [`Heap::zero_allocate`].
    pub fn zero_allocate(&self, count: usize, elem_size: usize) -> Option<NonNull<u8>> {
        self.heap.lock().zero_allocate(count, elem_size)
    }

    /// See [`Heap::resize`].
    ///
    /// **SAFETY**: `ptr` must be `None` or a live pointer returned by this allocator
    /// through a non over-aligned path.
    pub unsafe fn resize(&self, ptr: Option<NonNull<u8>>, new_size: usize) -> Option<NonNull<u8>> {
        unsafe { self.heap.lock().resize(ptr, new_size) }
    }

    /// See [`Heap::release`].
    ///
    /// **SAFETY**: Same as [`MemAlloc::resize`].
    pub unsafe fn release(&self, ptr: Option<NonNull<u8>>) {
        unsafe { self.heap.lock().release(ptr) }
    }

    pub fn stats(&self) -> Stats {
        self.heap.lock().stats()
    }

    /// Serves layouts that need more than [`ALIGNMENT`]. We ask for `align`
    /// extra bytes, slide the pointer up to the next aligned address and keep
    /// the original pointer in the word right before the one we return:
    ///
    /// ```text
    /// +--------+-----------------+----------+---------------------+
    /// | Header |   padding ...   | original |  aligned payload    |
    /// +--------+-----------------+----------+---------------------+
    ///          ^                            ^
    ///      original                 returned pointer
    /// ```
    ///
    /// Since the original is already [`ALIGNMENT`] aligned and `align` is
    /// bigger, the gap is never smaller than [`ALIGNMENT`] so the word fits.
    unsafe fn alloc_over_aligned(&self, layout: Layout) -> *mut u8 {
        let Some(size) = layout.size().checked_add(layout.align()) else {
            return ptr::null_mut();
        };

        let Some(original) = self.allocate(size) else {
            return ptr::null_mut();
        };

        let addr = original.as_ptr() as usize;
        let offset = align(addr + 1, layout.align()) - addr;

        unsafe {
            let aligned = original.as_ptr().add(offset);
            aligned.cast::<*mut u8>().sub(1).write(original.as_ptr());

            aligned
        }
    }

    /// Recovers the pointer stored by [`MemAlloc::alloc_over_aligned`].
    unsafe fn original_of(ptr: *mut u8) -> *mut u8 {
        unsafe { ptr.cast::<*mut u8>().sub(1).read() }
    }
}

impl Default for MemAlloc {
    fn default() -> Self {
        Self::new()
    }
}

/// `true` if the layout needs the over-aligned path.
#[inline]
fn is_over_aligned(layout: &Layout) -> bool {
    layout.align() > ALIGNMENT
}

unsafe impl GlobalAlloc for MemAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if is_over_aligned(&layout) {
            return unsafe { self.alloc_over_aligned(layout) };
        }

        self.allocate(layout.size()).map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if !is_over_aligned(&layout) {
            return self.zero_allocate(1, layout.size()).map_or(ptr::null_mut(), NonNull::as_ptr);
        }

        unsafe {
            let ptr = self.alloc_over_aligned(layout);

            if let Some(ptr) = NonNull::new(ptr) {
                fill(ptr, 0, layout.size());
            }

            ptr
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe {
            let ptr = if is_over_aligned(&layout) { Self::original_of(ptr) } else { ptr };

            self.release(NonNull::new(ptr));
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if !is_over_aligned(&layout) {
            return unsafe { self.resize(NonNull::new(ptr), new_size) }.map_or(ptr::null_mut(), NonNull::as_ptr);
        }

        // There is no way to keep the alignment while the block moves, so
        // over-aligned memory is always copied.
        unsafe {
            let new_layout = Layout::from_size_align_unchecked(new_size, layout.align());
            let new_ptr = self.alloc_over_aligned(new_layout);

            if let (Some(src), Some(dst)) = (NonNull::new(ptr), NonNull::new(new_ptr)) {
                copy(src, dst, layout.size().min(new_size));
                self.dealloc(ptr, layout);
            }

            new_ptr
        }
    }
}

const _: () = assert!(mem::size_of::<*mut u8>() <= ALIGNMENT);
