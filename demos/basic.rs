use log::info;
use memalloc::Heap;

fn log_alloc(addr: Option<std::ptr::NonNull<u8>>, size: usize) {
    info!("Requested {size} bytes of memory");
    info!("Received this address: {addr:?}");
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut heap = Heap::new();

    let addr1 = heap.allocate(8);
    log_alloc(addr1, 8);

    let addr2 = heap.zero_allocate(8, 1);
    log_alloc(addr2, 8);

    let addr3 = heap.allocate(16);
    log_alloc(addr3, 16);

    info!("{:?}", heap.stats());

    unsafe {
        let addr3 = heap.resize(addr3, 8);
        info!("Shrinking keeps the address: {addr3:?}");

        heap.release(addr1);
        heap.release(addr2);
        heap.release(addr3);
    }

    info!("After releasing everything: {:?}", heap.stats());
}
