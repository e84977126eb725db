use std::{
    cmp,
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{
    block::Block,
    error::AllocError,
    freelist::FreeList,
    list::{List, Node},
    region::{REGION_HEADER_SIZE, Region},
    utils::try_align,
};

/// Every region spans at least this many pages. Small requests are grouped
/// into one mapping instead of paying for a syscall each time.
pub const MIN_REGION_PAGES: usize = 16;

/// Virtual memory page size of the computer. This is usually 4096.
/// This value should be a constant, but we can't do that since we
/// don't know the value at compile time. Zero means not computed yet.
static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// This trait provides an abstraction to handle low level memory operations
/// and syscalls. As the allocator, our top level view of this, has nothing
/// to do with the concrete implementations / APIs offered by each kernel.
///
/// [`Os`] is the implementation backed by the real kernel, but anything able
/// to hand out page aligned, read-write memory can be plugged into a [`crate::Heap`].
pub trait PlatformMemory {
    /// Request a memory region of size `len`. It returns a Pointer to the
    /// given location or None if the underlying syscall fails.
    ///
    /// **SAFETY**: `len` must be a non-zero multiple of [`PlatformMemory::page_size`].
    /// Implementations must return memory aligned to the page size that stays
    /// valid for reads and writes until it is given back.
    unsafe fn request_memory(&self, len: usize) -> Option<NonNull<u8>>;

    /// Returns the memory of size `len` starting from `addr` back to the kernel.
    /// It tells whether the kernel accepted it.
    ///
    /// **SAFETY**: `addr` and `len` must be exactly a pair previously given by
    /// [`PlatformMemory::request_memory`], and nothing may touch it afterwards.
    unsafe fn return_memory(&self, addr: NonNull<u8>, len: usize) -> bool;

    /// Returns the virtual memory page size of the computer in bytes.
    fn page_size(&self) -> usize;
}

impl<T: PlatformMemory + ?Sized> PlatformMemory for &T {
    unsafe fn request_memory(&self, len: usize) -> Option<NonNull<u8>> {
        unsafe { (**self).request_memory(len) }
    }

    unsafe fn return_memory(&self, addr: NonNull<u8>, len: usize) -> bool {
        unsafe { (**self).return_memory(addr, len) }
    }

    fn page_size(&self) -> usize {
        (**self).page_size()
    }
}

/// The operating system's own page mapping primitive. `mmap` / `munmap` on
/// unix and `VirtualAlloc` / `VirtualFree` on windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct Os;

/// Wrapper to calculate the computer's page size. The syscall only runs once.
#[inline]
pub fn page_size() -> usize {
    match PAGE_SIZE.load(Ordering::Relaxed) {
        0 => {
            let size = unsafe { Os::query_page_size() };
            PAGE_SIZE.store(size, Ordering::Relaxed);
            size
        }
        size => size,
    }
}

#[cfg(unix)]
mod unix {
    use super::{Os, PlatformMemory};

    use libc::{mmap, munmap, off_t, size_t};

    use std::{os::raw::{c_void, c_int}, ptr::NonNull};

    impl Os {
        pub(super) unsafe fn query_page_size() -> usize {
            unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) as usize }
        }
    }

    impl PlatformMemory for Os {
        unsafe fn request_memory(&self, len: usize) -> Option<NonNull<u8>> {
            // mmap parameters.
            const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
            // Read-Write only memory.
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: off_t = 0;

            unsafe {
                match mmap(ADDR, len as size_t, PROT, FLAGS, FD, OFFSET) {
                    libc::MAP_FAILED => None,
                    addr => NonNull::new(addr.cast::<u8>()),
                }
            }
        }

        unsafe fn return_memory(&self, addr: NonNull<u8>, len: usize) -> bool {
            unsafe { munmap(addr.as_ptr().cast::<c_void>(), len as size_t) == 0 }
        }

        fn page_size(&self) -> usize {
            super::page_size()
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::{mem::MaybeUninit, ptr::NonNull, os::raw::c_void};

    use super::{Os, PlatformMemory};

    use windows::Win32::System::{Memory, SystemInformation};

    impl Os {
        pub(super) unsafe fn query_page_size() -> usize {
            unsafe {
                let mut system_info = MaybeUninit::uninit();
                SystemInformation::GetSystemInfo(system_info.as_mut_ptr());

                system_info.assume_init().dwPageSize as usize
            }
        }
    }

    impl PlatformMemory for Os {
        unsafe fn request_memory(&self, len: usize) -> Option<NonNull<u8>> {
            // Read-Write only.
            let protection = Memory::PAGE_READWRITE;

            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            unsafe {
                let addr = Memory::VirtualAlloc(None, len, flags, protection);

                NonNull::new(addr.cast())
            }
        }

        unsafe fn return_memory(&self, addr: NonNull<u8>, _len: usize) -> bool {
            // MEM_RELEASE frees the whole reservation, size must be zero.
            unsafe { Memory::VirtualFree(addr.as_ptr() as *mut c_void, 0, Memory::MEM_RELEASE).is_ok() }
        }

        fn page_size(&self) -> usize {
            super::page_size()
        }
    }
}

/// Snapshot of the allocator's bookkeeping.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Regions currently mapped.
    pub regions: usize,
    /// Bytes currently mapped, headers included.
    pub mapped_bytes: usize,
    /// Blocks on the free list.
    pub free_blocks: usize,
    /// Payload bytes available in free blocks.
    pub free_bytes: usize,
}

/// The internal data structure of the allocator. Here is where
/// we manage the low level memory request as well as platform-dependant
/// stuff.
pub(crate) struct Kernel<P: PlatformMemory> {
    /// Linked list of allocator memory [`Region`]
    pub regions: List<Region>,
    /// Linked list of free blocks identified by [`Block::is_free`]
    pub free_list: FreeList,
    /// Where regions come from and go back to.
    pub platform: P,
}

impl<P: PlatformMemory> Kernel<P> {
    /// Create a new instance of the allocator's `Kernel` with both the free
    /// list and the regions list empty. Nothing is mapped until the first request.
    pub(crate) const fn new(platform: P) -> Self {
        Self {
            regions: List::new(),
            free_list: FreeList::new(),
            platform,
        }
    }

    pub(crate) fn stats(&self) -> Stats {
        Stats {
            regions: self.regions.len(),
            mapped_bytes: self.regions.iter().map(|region| region.size).sum(),
            free_blocks: self.free_list.len(),
            free_bytes: self.free_list.free_bytes(),
        }
    }

    /// This function returns a new memory [`Region`] by using [`PlatformMemory::request_memory`],
    /// together with the only block it contains, which spans all of it and is marked as used.
    ///
    /// `size` is the block size (header included) we need to fit. The region
    /// is rounded up to whole pages and never smaller than [`MIN_REGION_PAGES`].
    pub(crate) fn acquire_region(&mut self, size: usize) -> Result<NonNull<Node<Block>>, AllocError> {
        let page_size = self.platform.page_size();

        // What we really need to allocate is the requested block plus the
        // overhead introduced by the region header.
        let needed = size
            .checked_add(REGION_HEADER_SIZE)
            .and_then(|needed| try_align(needed, page_size))
            .ok_or(AllocError::Exhausted)?;

        let region_size = cmp::max(needed, MIN_REGION_PAGES * page_size);

        unsafe {
            let addr = self
                .platform
                .request_memory(region_size)
                .ok_or(AllocError::Exhausted)?;

            let region = self.regions.append(
                Region {
                    size: region_size,
                    blocks: List::new(),
                },
                addr,
            );

            // First Node<Block> right after Node<Region>
            Ok(Region::carve(region, REGION_HEADER_SIZE, region_size - REGION_HEADER_SIZE))
        }
    }

    /// Unmaps `region` as a whole. Its metadata is unlinked first: if the
    /// kernel refuses to take the memory back, the region is simply leaked.
    ///
    /// **SAFETY**: `region` must be one of our regions, and none of its blocks
    /// may be on the free list anymore.
    pub(crate) unsafe fn release_region(&mut self, region: NonNull<Node<Region>>) -> bool {
        unsafe {
            let size = region.as_ref().data.size;

            self.regions.remove(region);

            self.platform.return_memory(region.cast(), size)
        }
    }

    /// Returns a used block whose payload can hold `size` bytes.
    ///
    /// The free list is searched first (first-fit), and a new region is only
    /// mapped if none of the free blocks is big enough. Whatever the block has
    /// in excess is split off and goes to the free list.
    pub(crate) fn allocate_block(&mut self, size: usize) -> Result<NonNull<Node<Block>>, AllocError> {
        let needed = Block::size_for(size).ok_or(AllocError::Exhausted)?;

        let block = match self.free_list.find_free_block(needed) {
            Some(block) => {
                unsafe { self.free_list.remove_free_block(block) };
                block
            }
            None => self.acquire_region(needed)?,
        };

        unsafe { self.trim_block(block, needed) };

        Ok(block)
    }

    /// Gives `block` back. It is merged with its free neighbours and, if that
    /// leaves its region without any used block, the region is unmapped.
    ///
    /// **SAFETY**: `block` must be a used block of this kernel.
    pub(crate) unsafe fn release_block(&mut self, block: NonNull<Node<Block>>) {
        unsafe {
            let mut region = block.as_ref().data.region;

            self.free_list.insert_free_block(block);

            let merged = region.as_mut().data.coalesce(block, &mut self.free_list);

            if region.as_ref().data.is_vacant() {
                self.free_list.remove_free_block(merged);
                // A refused unmap leaks the region, nothing points to it anymore.
                let _leaked = !self.release_region(region);
            }
        }
    }

    /// Shrinks the used `block` to `size` bytes (header included) when the
    /// excess is big enough to become a block on its own. The excess goes to
    /// the free list and merges with the next block if that one is free.
    ///
    /// **SAFETY**: `block` must be a used block of this kernel.
    pub(crate) unsafe fn trim_block(&mut self, block: NonNull<Node<Block>>, size: usize) {
        unsafe {
            let mut region = block.as_ref().data.region;
            let data = &mut region.as_mut().data;

            if let Some(remainder) = data.split(block, size) {
                self.free_list.insert_free_block(remainder);
                data.coalesce(remainder, &mut self.free_list);
            }
        }
    }
}

impl<P: PlatformMemory> Drop for Kernel<P> {
    /// Every region still mapped goes back to the kernel, used or not.
    fn drop(&mut self) {
        while let Some(region) = self.regions.first() {
            unsafe { self.release_region(region) };
        }

        self.free_list = FreeList::new();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        block::{MIN_BLOCK_SIZE, payload_of},
        utils::fill,
    };
    use std::cell::{Cell, RefCell};

    /// Platform that hands out memory through [`Os`] but keeps count of every
    /// call and can be told to stop after a number of successful mappings, or
    /// to refuse every unmap.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub budget: Cell<Option<usize>>,
        pub refuse_unmap: Cell<bool>,
        pub mapped: RefCell<Vec<(usize, usize)>>,
        pub unmapped: RefCell<Vec<(usize, usize)>>,
    }

    impl Recorder {
        pub fn with_budget(maps: usize) -> Self {
            let recorder = Self::default();
            recorder.budget.set(Some(maps));
            recorder
        }

        pub fn maps(&self) -> usize {
            self.mapped.borrow().len()
        }

        pub fn unmaps(&self) -> usize {
            self.unmapped.borrow().len()
        }
    }

    impl PlatformMemory for Recorder {
        unsafe fn request_memory(&self, len: usize) -> Option<NonNull<u8>> {
            match self.budget.get() {
                Some(0) => return None,
                Some(left) => self.budget.set(Some(left - 1)),
                None => {}
            }

            let addr = unsafe { Os.request_memory(len)? };
            self.mapped.borrow_mut().push((addr.as_ptr() as usize, len));

            Some(addr)
        }

        unsafe fn return_memory(&self, addr: NonNull<u8>, len: usize) -> bool {
            self.unmapped.borrow_mut().push((addr.as_ptr() as usize, len));

            if self.refuse_unmap.get() {
                return false;
            }

            unsafe { Os.return_memory(addr, len) }
        }

        fn page_size(&self) -> usize {
            Os.page_size()
        }
    }

    #[test]
    fn page_size_is_cached_power_of_two() {
        let size = page_size();

        assert!(size.is_power_of_two());
        assert_eq!(size, PAGE_SIZE.load(Ordering::Relaxed));
        assert_eq!(size, Os.page_size());
    }

    #[test]
    fn os_maps_writable_pages() {
        let len = page_size() * 2;

        unsafe {
            let addr = Os.request_memory(len).unwrap();
            assert_eq!(0, addr.as_ptr() as usize % page_size());

            addr.as_ptr().write(0xAB);
            addr.as_ptr().add(len - 1).write(0xCD);
            assert_eq!(0xAB, addr.as_ptr().read());
            assert_eq!(0xCD, addr.as_ptr().add(len - 1).read());

            assert!(Os.return_memory(addr, len));
        }
    }

    #[test]
    fn acquired_regions_are_whole_pages() {
        let mut kernel = Kernel::new(Recorder::default());
        let big = MIN_REGION_PAGES * page_size() * 3 + 1;

        kernel.acquire_region(MIN_BLOCK_SIZE).unwrap();
        kernel.acquire_region(big).unwrap();

        let mapped = kernel.platform.mapped.borrow().clone();
        assert_eq!(MIN_REGION_PAGES * page_size(), mapped[0].1);
        assert!(mapped[1].1 >= big + REGION_HEADER_SIZE);
        assert!(mapped.iter().all(|(_, len)| len % page_size() == 0));
        assert_eq!(2, kernel.stats().regions);
    }

    #[test]
    fn exhausted_platform_leaves_no_trace() {
        let mut kernel = Kernel::new(Recorder::with_budget(0));

        assert_eq!(Err(AllocError::Exhausted), kernel.allocate_block(64).map(|_| ()));
        assert_eq!(Stats::default(), kernel.stats());
    }

    #[test]
    fn huge_requests_do_not_wrap() {
        let mut kernel = Kernel::new(Recorder::default());

        assert_eq!(Err(AllocError::Exhausted), kernel.acquire_region(usize::MAX - 8).map(|_| ()));
        assert_eq!(Err(AllocError::Exhausted), kernel.allocate_block(usize::MAX).map(|_| ()));
        assert_eq!(0, kernel.platform.maps());
    }

    #[test]
    fn releasing_last_block_unmaps_exact_region() {
        let mut kernel = Kernel::new(Recorder::default());

        let block = kernel.allocate_block(100).unwrap();
        assert_eq!(1, kernel.stats().free_blocks);

        unsafe { kernel.release_block(block) };

        assert_eq!(Stats::default(), kernel.stats());
        assert_eq!(*kernel.platform.mapped.borrow(), *kernel.platform.unmapped.borrow());
    }

    #[test]
    fn drop_unmaps_everything() {
        let recorder = Recorder::default();

        {
            let mut kernel = Kernel::new(&recorder);
            kernel.allocate_block(10).unwrap();
            kernel.allocate_block(MIN_REGION_PAGES * page_size()).unwrap();
        }

        assert_eq!(2, recorder.unmaps());
        assert_eq!(*recorder.mapped.borrow(), *recorder.unmapped.borrow());
    }

    #[test]
    fn refused_unmap_leaks_the_region() {
        let recorder = Recorder::default();
        recorder.refuse_unmap.set(true);

        {
            let mut kernel = Kernel::new(&recorder);

            let block = kernel.allocate_block(100).unwrap();
            unsafe { kernel.release_block(block) };

            assert_eq!(Stats::default(), kernel.stats());
            assert_eq!(1, recorder.unmaps());

            // The leaked region is gone for good, a fresh one is mapped.
            let block = kernel.allocate_block(100).unwrap();
            assert_eq!(2, recorder.maps());

            let mapped = recorder.mapped.borrow().clone();
            assert_ne!(mapped[0].0, mapped[1].0);

            unsafe {
                let payload = payload_of(block);
                fill(payload, 0x5A, 100);
                assert!((0..100).all(|i| payload.as_ptr().add(i).read() == 0x5A));

                kernel.release_block(block);
            }

            assert_eq!(Stats::default(), kernel.stats());
        }

        // Dropping the kernel does not try the leaked regions again.
        assert_eq!(2, recorder.unmaps());
        assert_eq!(*recorder.mapped.borrow(), *recorder.unmapped.borrow());

        for &(addr, len) in recorder.mapped.borrow().iter() {
            unsafe { assert!(Os.return_memory(NonNull::new(addr as *mut u8).unwrap(), len)) };
        }
    }
}
