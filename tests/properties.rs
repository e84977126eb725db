use memalloc::{AllocError, Heap};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn overflowing_products_are_rejected(a in 2usize.., b in 2usize..) {
        prop_assume!(a.checked_mul(b).is_none());

        let mut heap = Heap::new();
        let before = heap.stats();

        prop_assert_eq!(Err(AllocError::Overflow), heap.try_zero_allocate(a, b));
        prop_assert_eq!(Err(AllocError::Overflow), heap.try_zero_allocate(b, a));
        prop_assert_eq!(before, heap.stats());
    }

    #[test]
    fn zero_allocate_is_all_zeros(count in 1usize..64, elem_size in 1usize..64, dirty in any::<u8>()) {
        let mut heap = Heap::new();
        let _pin = heap.allocate(1).unwrap();
        let size = count * elem_size;

        // Leave garbage behind so the next block is a reused one.
        let previous = heap.allocate(size).unwrap();
        unsafe {
            previous.as_ptr().write_bytes(dirty, size);
            heap.release(Some(previous));
        }

        let ptr = heap.zero_allocate(count, elem_size).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), size) };

        prop_assert_eq!(previous, ptr);
        prop_assert!(bytes.iter().all(|&byte| byte == 0));
    }

    #[test]
    fn shrinking_keeps_pointer_and_prefix(size in 1usize..8192, shrink in 0.0f64..=1.0) {
        let mut heap = Heap::new();
        let ptr = heap.allocate(size).unwrap();
        let new_size = ((size as f64 * shrink) as usize).max(1);

        for i in 0..size {
            unsafe { ptr.as_ptr().add(i).write(i as u8) };
        }

        let resized = unsafe { heap.resize(Some(ptr), new_size) };

        prop_assert_eq!(Some(ptr), resized);
        prop_assert!((0..new_size).all(|i| unsafe { ptr.as_ptr().add(i).read() } == i as u8), "prefix not preserved after shrink");
    }

    #[test]
    fn random_workload_returns_every_region(sizes in proptest::collection::vec(1usize..20_000, 1..64)) {
        let mut heap = Heap::new();
        let mut live = Vec::new();

        for (index, size) in sizes.iter().enumerate() {
            let ptr = heap.allocate(*size).unwrap();
            unsafe { ptr.as_ptr().write_bytes(index as u8, *size) };
            live.push((ptr, *size, index as u8));

            // Free every third allocation straight away to interleave frees.
            if index % 3 == 2 {
                let (ptr, _, _) = live.remove(live.len() / 2);
                unsafe { heap.release(Some(ptr)) };
            }
        }

        for (ptr, size, tag) in &live {
            let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), *size) };
            prop_assert!(bytes.iter().all(|byte| byte == tag));
        }

        for (ptr, _, _) in live {
            unsafe { heap.release(Some(ptr)) };
        }

        prop_assert_eq!(0, heap.stats().regions);
    }
}
