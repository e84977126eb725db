use std::{cmp, mem, ptr::NonNull};
use crate::{freelist::FreeNode, list::Node, region::Region, utils::{align, try_align}};


/// Every payload we hand out starts at an address that is a multiple of this
/// value, and every block size is a multiple of it too. Regions start at page
/// boundaries, so keeping headers and sizes on this granule is enough.
pub const ALIGNMENT: usize = 16;

/// Header size of a block. We need to add the overhead introduced by our
/// [`Node`] structure since we always use our `Block` as a node of our linked list.
pub(crate) const BLOCK_HEADER_SIZE: usize = align(mem::size_of::<Node<Block>>(), ALIGNMENT);

/// Smallest payload a block can have. Free blocks store their [`FreeNode`]
/// inside the payload, so anything smaller could not be tracked once released.
pub(crate) const MIN_PAYLOAD_SIZE: usize = align(mem::size_of::<FreeNode>(), ALIGNMENT);

/// Smallest block (header included) that we are willing to carve. Splitting
/// a block is only worth it when the remainder is at least this big.
pub(crate) const MIN_BLOCK_SIZE: usize = BLOCK_HEADER_SIZE + MIN_PAYLOAD_SIZE;

/// This is the structure of a block. The fields of the block are it's metadata,
/// content is placed after this header.
///
/// The following diagram represents this structure ignoring that the block will be
/// wrapped inside a [`Node`], whose `prev` / `next` links chain together all the
/// blocks of the same [`Region`] in ascending address order.
///
/// ```text
/// +---------------------+ <------+
/// |        size         |        |
/// +---------------------+        |
/// |    is_free (1b)     |        | -> Header (BLOCK_HEADER_SIZE)
/// +---------------------+        |
/// |       region        |        |
/// +---------------------+ <------+ <- pointer returned to the user
/// |       Content       |        |
/// |         ...         |        |
/// |         ...         |        | -> Addressable content
/// |         ...         |        |
/// |                     |        |
/// +---------------------+ <------+
/// ```
///
/// `size` spans the whole block, header included, so the next block of the
/// region always starts at `block + size`.
pub(crate) struct Block {
    /// Size of the block, header included.
    pub size: usize,
    /// Flag to tell whether the block is free or not.
    pub is_free: bool,
    /// Region which the block belongs to
    pub region: NonNull<Node<Region>>,
}

impl Block {
    /// Bytes available to the user after the header.
    #[inline]
    pub fn payload_size(&self) -> usize {
        self.size - BLOCK_HEADER_SIZE
    }

    /// Total block size (header included) needed to serve a request of
    /// `size` bytes, or `None` if that does not fit in a `usize`.
    pub fn size_for(size: usize) -> Option<usize> {
        let payload = cmp::max(try_align(size, ALIGNMENT)?, MIN_PAYLOAD_SIZE);

        payload.checked_add(BLOCK_HEADER_SIZE)
    }
}

/// Address of the first payload byte of `block`.
#[inline]
pub(crate) unsafe fn payload_of(block: NonNull<Node<Block>>) -> NonNull<u8> {
    unsafe { block.cast::<u8>().add(BLOCK_HEADER_SIZE) }
}

/// Recovers the block header of a pointer previously returned by [`payload_of`].
///
/// **SAFETY**: `payload` must have been produced by this allocator and still be live.
#[inline]
pub(crate) unsafe fn block_of(payload: NonNull<u8>) -> NonNull<Node<Block>> {
    unsafe { payload.sub(BLOCK_HEADER_SIZE).cast() }
}
