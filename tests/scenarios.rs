//! End to end checks of the four operations through the public API only.

use std::{
    cell::Cell,
    ptr::NonNull,
};

use memalloc::{AllocError, Heap, MIN_REGION_PAGES, Os, PlatformMemory, Stats, page_size};

/// Counts how many times the kernel was asked for memory.
#[derive(Default)]
struct Counting {
    maps: Cell<usize>,
    unmaps: Cell<usize>,
}

impl PlatformMemory for Counting {
    unsafe fn request_memory(&self, len: usize) -> Option<NonNull<u8>> {
        self.maps.set(self.maps.get() + 1);
        unsafe { Os.request_memory(len) }
    }

    unsafe fn return_memory(&self, addr: NonNull<u8>, len: usize) -> bool {
        self.unmaps.set(self.unmaps.get() + 1);
        unsafe { Os.return_memory(addr, len) }
    }

    fn page_size(&self) -> usize {
        Os.page_size()
    }
}

/// Platform with no memory at all.
struct Empty;

impl PlatformMemory for Empty {
    unsafe fn request_memory(&self, _len: usize) -> Option<NonNull<u8>> {
        None
    }

    unsafe fn return_memory(&self, _addr: NonNull<u8>, _len: usize) -> bool {
        unreachable!("nothing was ever mapped")
    }

    fn page_size(&self) -> usize {
        4096
    }
}

#[test]
fn many_small_allocations_share_one_region() {
    let mut heap = Heap::with_platform(Counting::default());

    let pointers: Vec<_> = (1..=100).map(|size| heap.allocate(size).unwrap()).collect();

    for (index, ptr) in pointers.iter().enumerate() {
        unsafe { ptr.as_ptr().write_bytes(index as u8, index + 1) };
    }

    for (index, ptr) in pointers.iter().enumerate() {
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), index + 1) };
        assert!(bytes.iter().all(|&byte| byte == index as u8));
    }

    assert_eq!(1, heap.platform().maps.get());

    for ptr in pointers {
        unsafe { heap.release(Some(ptr)) };
    }

    assert_eq!(1, heap.platform().unmaps.get());
    assert_eq!(Stats::default(), heap.stats());
}

#[test]
fn lifo_reuse() {
    let mut heap = Heap::new();
    // Without a live neighbour the region would be unmapped on release.
    let _pin = heap.allocate(1).unwrap();

    let p = heap.allocate(100).unwrap();
    unsafe { heap.release(Some(p)) };

    assert_eq!(Some(p), heap.allocate(100));
}

#[test]
fn freed_block_is_reused_by_split() {
    let mut heap = Heap::with_platform(Counting::default());

    let first = heap.allocate(4000).unwrap();
    let _second = heap.allocate(100).unwrap();
    unsafe { heap.release(Some(first)) };

    assert_eq!(Some(first), heap.allocate(90));
    assert_eq!(1, heap.platform().maps.get());
}

#[test]
fn requests_larger_than_a_region_get_their_own() {
    let mut heap = Heap::with_platform(Counting::default());
    let large = MIN_REGION_PAGES * page_size() * 4;

    let small = heap.allocate(32).unwrap();
    let big = heap.allocate(large).unwrap();

    unsafe { big.as_ptr().add(large - 1).write(1) };
    assert_eq!(2, heap.stats().regions);

    unsafe { heap.release(Some(big)) };
    assert_eq!(1, heap.stats().regions);

    unsafe { heap.release(Some(small)) };
    assert_eq!(0, heap.stats().regions);
    assert_eq!(2, heap.platform().unmaps.get());
}

#[test]
fn resize_moves_contents_when_growing() {
    let mut heap = Heap::new();
    let ptr = heap.zero_allocate(10, 4).unwrap().cast::<u32>();

    unsafe {
        for i in 0..10 {
            ptr.add(i).write(i as u32 * 3);
        }

        let grown = heap.resize(Some(ptr.cast()), 40_000).unwrap().cast::<u32>();
        assert!(heap.usable_size(grown.cast()) >= 40_000);
        assert!((0..10).all(|i| grown.add(i).read() == i as u32 * 3));

        heap.release(Some(grown.cast()));
    }
}

#[test]
fn no_memory_means_no_pointer() {
    let mut heap = Heap::with_platform(Empty);

    assert_eq!(None, heap.allocate(1));
    assert_eq!(Err(AllocError::Exhausted), heap.try_allocate(1));
    assert_eq!(Err(AllocError::Exhausted), heap.try_zero_allocate(2, 2));
    assert_eq!(Err(AllocError::Exhausted), unsafe { heap.try_resize(None, 5) });
    assert_eq!(Stats::default(), heap.stats());
}

#[test]
fn errors_display_without_context() {
    assert_eq!("zero-sized request", AllocError::ZeroSize.to_string());
    assert_eq!("requested size overflows usize", AllocError::Overflow.to_string());
}
