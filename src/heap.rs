use std::ptr::NonNull;

use crate::{
    block::{Block, block_of, payload_of},
    error::AllocError,
    kernel::{Kernel, Os, PlatformMemory, Stats},
    utils::{copy, fill, try_multiply},
};

/// Single-threaded allocator context.
///
/// A `Heap` owns every region it maps. Requests are served from the free
/// list first and new regions are only mapped when nothing fits. Regions go
/// back to the kernel as soon as all of their blocks are free, and whatever
/// is left when the `Heap` is dropped is unmapped too, so pointers must not
/// outlive the `Heap` that returned them.
///
/// Pointers returned by a `Heap` are aligned to [`crate::ALIGNMENT`].
///
/// ```
/// use memalloc::Heap;
///
/// let mut heap = Heap::new();
///
/// unsafe {
///     let ptr = heap.allocate(8).unwrap().cast::<u64>();
///     ptr.write(42);
///     assert_eq!(42, ptr.read());
///
///     heap.release(Some(ptr.cast()));
/// }
/// ```
pub struct Heap<P: PlatformMemory = Os> {
    kernel: Kernel<P>,
}

// The heap exclusively owns all the memory its raw pointers point to.
unsafe impl<P: PlatformMemory + Send> Send for Heap<P> {}

impl Heap<Os> {
    /// Creates an empty heap backed by the operating system. Nothing is
    /// mapped until the first allocation.
    pub const fn new() -> Self {
        Self::with_platform(Os)
    }
}

impl Default for Heap<Os> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PlatformMemory> Heap<P> {
    /// Creates an empty heap that maps its regions through `platform`.
    pub const fn with_platform(platform: P) -> Self {
        Self {
            kernel: Kernel::new(platform),
        }
    }

    pub fn platform(&self) -> &P {
        &self.kernel.platform
    }

    /// Returns a pointer to `size` writable bytes, or `None` if `size` is zero
    /// or no memory could be mapped.
    #[inline]
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        self.try_allocate(size).ok()
    }

    /// Same as [`Heap::allocate`] but tells why nothing was returned.
    pub fn try_allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }

        let block = self.kernel.allocate_block(size)?;

        Ok(unsafe { payload_of(block) })
    }

    /// Allocates room for `count` elements of `elem_size` bytes each, with
    /// every byte set to zero.
    ///
    /// If `count * elem_size` overflows nothing is allocated, even if the
    /// wrapped around product would be a perfectly valid size.
    #[inline]
    pub fn zero_allocate(&mut self, count: usize, elem_size: usize) -> Option<NonNull<u8>> {
        self.try_zero_allocate(count, elem_size).ok()
    }

    /// Same as [`Heap::zero_allocate`] but tells why nothing was returned.
    pub fn try_zero_allocate(&mut self, count: usize, elem_size: usize) -> Result<NonNull<u8>, AllocError> {
        let size = try_multiply(count, elem_size).ok_or(AllocError::Overflow)?;

        let ptr = self.try_allocate(size)?;

        // Reused blocks still hold whatever their previous owner wrote.
        unsafe { fill(ptr, 0, size) };

        Ok(ptr)
    }

    /// Changes the size of the allocation at `ptr` to `new_size` bytes.
    ///
    /// - `ptr == None` behaves like [`Heap::allocate`].
    /// - `new_size == 0` releases `ptr` and returns `None`.
    /// - If `new_size` fits in the current block the same pointer comes back and
    ///   nothing moves. Capacity the block no longer needs goes to the free list.
    /// - Otherwise the contents are moved to a new block and the old one is
    ///   released. If that new block can't be obtained, `None` is returned and
    ///   `ptr` is still valid.
    ///
    /// **SAFETY**: `ptr` must be `None` or a live pointer returned by this heap.
    #[inline]
    pub unsafe fn resize(&mut self, ptr: Option<NonNull<u8>>, new_size: usize) -> Option<NonNull<u8>> {
        unsafe { self.try_resize(ptr, new_size).ok() }
    }

    /// Same as [`Heap::resize`] but tells why nothing was returned.
    /// Releasing through `new_size == 0` reports [`AllocError::ZeroSize`].
    ///
    /// **SAFETY**: Same as [`Heap::resize`].
    pub unsafe fn try_resize(&mut self, ptr: Option<NonNull<u8>>, new_size: usize) -> Result<NonNull<u8>, AllocError> {
        let Some(ptr) = ptr else {
            return self.try_allocate(new_size);
        };

        if new_size == 0 {
            unsafe { self.release(Some(ptr)) };
            return Err(AllocError::ZeroSize);
        }

        unsafe {
            let block = block_of(ptr);
            let capacity = block.as_ref().data.payload_size();

            if new_size <= capacity {
                if let Some(needed) = Block::size_for(new_size) {
                    self.kernel.trim_block(block, needed);
                }

                return Ok(ptr);
            }

            let new_ptr = self.try_allocate(new_size)?;

            copy(ptr, new_ptr, capacity);
            self.kernel.release_block(block);

            Ok(new_ptr)
        }
    }

    /// Gives the allocation at `ptr` back. `None` is ignored.
    ///
    /// **SAFETY**: `ptr` must be `None` or a live pointer returned by this heap.
    /// It must not be used after this call.
    pub unsafe fn release(&mut self, ptr: Option<NonNull<u8>>) {
        if let Some(ptr) = ptr {
            unsafe { self.kernel.release_block(block_of(ptr)) };
        }
    }

    /// Number of bytes that can actually be used at `ptr`. Always at least what
    /// was requested, and exactly what [`Heap::resize`] can grow to without moving.
    ///
    /// **SAFETY**: `ptr` must be a live pointer returned by this heap.
    pub unsafe fn usable_size(&self, ptr: NonNull<u8>) -> usize {
        unsafe { block_of(ptr).as_ref().data.payload_size() }
    }

    pub fn stats(&self) -> Stats {
        self.kernel.stats()
    }
}
