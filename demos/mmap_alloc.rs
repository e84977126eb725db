//! Plugs a custom [`PlatformMemory`] into a [`Heap`] to watch every region
//! being mapped and unmapped.

use std::{cell::Cell, ptr::NonNull};

use log::info;
use memalloc::{Heap, Os, PlatformMemory};

#[derive(Default)]
struct Traced {
    mapped: Cell<usize>,
}

impl PlatformMemory for Traced {
    unsafe fn request_memory(&self, len: usize) -> Option<NonNull<u8>> {
        let addr = unsafe { Os.request_memory(len) };

        if let Some(addr) = addr {
            self.mapped.set(self.mapped.get() + len);
            info!("mapped {len} bytes at {addr:?} ({} bytes live)", self.mapped.get());
        }

        addr
    }

    unsafe fn return_memory(&self, addr: NonNull<u8>, len: usize) -> bool {
        self.mapped.set(self.mapped.get() - len);
        info!("unmapped {len} bytes at {addr:?} ({} bytes live)", self.mapped.get());
        unsafe { Os.return_memory(addr, len) }
    }

    fn page_size(&self) -> usize {
        Os.page_size()
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut heap = Heap::with_platform(Traced::default());

    let block1 = heap.allocate(4);
    info!("{block1:?}");
    let block2 = heap.allocate(4);
    info!("{block2:?}");

    info!("Deallocating block1");
    unsafe { heap.release(block1) };

    let block3 = heap.allocate(4);
    info!("Should be first addr {block3:?}");

    let huge = heap.allocate(1 << 20);
    info!("A megabyte gets its own region: {huge:?}");

    unsafe {
        heap.release(huge);
        heap.release(block2);
        heap.release(block3);
    }
}
