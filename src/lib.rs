//! General purpose memory allocator built directly on top of the kernel's
//! page mapping primitive (`mmap` / `munmap`, `VirtualAlloc` / `VirtualFree`).
//! No other allocator is used underneath.
//!
//! Mapping memory is slow, so instead of one mapping per request we ask the
//! kernel for big regions and carve them into blocks ourselves.
//! We cannot assume those regions are adjacent, so we keep a LinkedList of
//! regions which inside of them have a LinkedList of blocks:
//!
//! ```text
//! +-----------------------------------------------+      +-----------------------------------------------+
//! |        | +-------+    +-------+    +-------+  |      |        | +-------+    +-------+    +-------+  |
//! | Region | | Block | -> | Block | -> | Block |  | ---> | Region | | Block | -> | Block | -> | Block |  |
//! |        | +-------+    +-------+    +-------+  |      |        | +-------+    +-------+    +-------+  |
//! +-----------------------------------------------+      +-----------------------------------------------+
//! ```
//!
//! We also need to keep track of the free blocks, sorted by address, so the
//! allocator looks something like this:
//!
//! ```text
//!                                           Free List
//!
//!                     Next free block                Next free block
//!                +---------------------+  +--------------------------------------+
//!                |                     |  |                                      |
//! +--------------|---------------------|--|----+      +--------------------------|-------------------+
//! |        | +---|--+    +------+    +-|--|-+  |      |        | +-------+    +--|---+    +-------+  |
//! | Region | | Free | -> | Block | ->| Free |  | ---> | Region | | Block | -> | Free | -> | Block |  |
//! |        | +------+    +------+    +------+  |      |        | +-------+    +------+    +-------+  |
//! +--------------------------------------------+      +----------------------------------------------+
//! ```
//!
//! Free neighbours are merged as soon as a block is released, and once every
//! block of a region is free the whole region goes back to the kernel.
//!
//! [`Heap`] is the single-threaded allocator. [`MemAlloc`] puts it behind a
//! lock and implements [`std::alloc::GlobalAlloc`], and [`ffi`] exposes the
//! same operations to C.

mod block;
mod error;
mod freelist;
mod heap;
mod kernel;
mod list;
mod memalloc;
mod region;
mod utils;

pub mod ffi;

pub use block::ALIGNMENT;
pub use error::AllocError;
pub use heap::Heap;
pub use kernel::{MIN_REGION_PAGES, Os, PlatformMemory, Stats, page_size};
pub use memalloc::MemAlloc;
