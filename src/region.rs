use std::{mem, ptr::NonNull};
use crate::{
    block::{ALIGNMENT, Block, MIN_BLOCK_SIZE},
    freelist::FreeList,
    list::{List, Node},
    utils::align,
};


/// This is the overhead size introduced by the [`Region`] header in bytes.
/// The header is represented as a [`Node`]. See [`List`] for more detail.
pub(crate) const REGION_HEADER_SIZE: usize = align(mem::size_of::<Node<Region>>(), ALIGNMENT);

/// This struct contains the memory regions specific metadata. However,
/// as every other header, this is usually represented as a [`Node<Region>`]
/// so that would be the complete region data.
///
/// [`libc::mmap`] gives as memory regions aligned with the computer page size.
/// But, we cannot use a full Region each time user allocates memory since we
/// will be wasting a lot of  space. Also, we cannot assume this regions are adjacent.
///
/// Therefor, we are going to use the following data structure which consists in
/// a LinkedList of [`Region`] which inside of them have a LinkedList of [`Block`].
///
/// ```text
/// +-----------------------------------------------+      +-----------------------------------------------+
/// |        | +-------+    +-------+    +-------+  |      |        | +-------+    +-------+    +-------+  |
/// | Region | | Block | -> | Block | -> | Block |  | ---> | Region | | Block | -> | Block | -> | Block |  |
/// |        | +-------+    +-------+    +-------+  |      |        | +-------+    +-------+    +-------+  |
/// +-----------------------------------------------+      +-----------------------------------------------+
/// ```
///
/// The blocks of a region tile it: the first one starts right after the region
/// header, each one starts where the previous one ends and the last one ends
/// exactly at `base + size`.
pub struct Region {
    /// Size of the region, exactly as it was mapped (header included)
    pub size: usize,
    /// List of blocks in the region, in ascending address order
    pub blocks: List<Block>,
}


impl Region {
    /// Writes a new block header `offset` bytes after the start of `region` and
    /// appends it to the region's block chain. The block starts as used.
    ///
    /// **SAFETY**: `offset` must be the end of the current last block (or
    /// [`REGION_HEADER_SIZE`] for an empty region) and `offset + size` must not
    /// exceed the region.
    pub(crate) unsafe fn carve(
        mut region: NonNull<Node<Region>>,
        offset: usize,
        size: usize,
    ) -> NonNull<Node<Block>> {
        unsafe {
            debug_assert!(offset + size <= region.as_ref().data.size);

            let addr = region.cast::<u8>().add(offset);

            region.as_mut().data.blocks.append(
                Block {
                    size,
                    is_free: false,
                    region,
                },
                addr,
            )
        }
    }

    /// Shrinks `node` to exactly `size` bytes and turns the excess into a new
    /// block linked right after it. The remainder inherits the old successor of
    /// `node` and is returned *used*: it's up to the caller to put it on the free list.
    ///
    /// Nothing happens if the excess could not hold a [`MIN_BLOCK_SIZE`] block,
    /// the whole block stays as it is since tiny slivers could never be reused.
    pub(crate) fn split(
        &mut self,
        mut node: NonNull<Node<Block>>,
        size: usize,
    ) -> Option<NonNull<Node<Block>>> {
        unsafe {
            let block = &mut node.as_mut().data;
            debug_assert!(size <= block.size);

            let excess = block.size.checked_sub(size)?;

            if excess < MIN_BLOCK_SIZE {
                return None;
            }

            let remainder = Block {
                size: excess,
                is_free: false,
                region: block.region,
            };

            block.size = size;

            let addr = node.cast::<u8>().add(size);

            Some(self.blocks.insert_after(node, remainder, addr))
        }
    }

    /// Tries to merge the given block `node` with the previous one
    /// on the list. This can be performed if that previos block is free.
    ///
    /// Both blocks must be on the `free_list`. When they merge, `node`
    /// disappears from it and from the region, and `node` is updated to point
    /// to the surviving block.
    pub(crate) fn merge_with_prev(&mut self, node: &mut NonNull<Node<Block>>, free_list: &mut FreeList) {
        unsafe {
            let Some(mut prev_node) = node.as_ref().prev else {
                return;
            };

            let prev_block = &mut prev_node.as_mut().data;

            if prev_block.is_free {
                // The previous block keeps its place in the free list, the
                // current one is absorbed so it has to leave it.
                free_list.remove_free_block(*node);

                // The header of the current block becomes payload of the previous one.
                prev_block.size += node.as_ref().data.size;

                self.blocks.remove(*node);

                // The current block is now its previous one
                *node = prev_node;
            }
        }
    }

    /// Tries to merge the given block `node` with the next one on the
    /// list. This can be performed if that next block is free.
    pub(crate) fn merge_with_next(&mut self, node: &mut NonNull<Node<Block>>, free_list: &mut FreeList) {
        unsafe {
            let Some(next_node) = node.as_ref().next else {
                return;
            };

            let next_size = next_node.as_ref().data.size;

            if next_node.as_ref().data.is_free {
                // The current block should already be on the free_list, so we just need to absorb the next one.
                free_list.remove_free_block(next_node);

                node.as_mut().data.size += next_size;

                self.blocks.remove(next_node);
            }
        }
    }

    /// Merges the free block `node` with both of its physical neighbours if
    /// they are free too and returns the resulting block.
    ///
    /// One pass is enough: a free block never has a free neighbour once this
    /// has run, so nothing further than the immediate neighbours can be free.
    pub(crate) fn coalesce(
        &mut self,
        mut node: NonNull<Node<Block>>,
        free_list: &mut FreeList,
    ) -> NonNull<Node<Block>> {
        self.merge_with_next(&mut node, free_list);
        self.merge_with_prev(&mut node, free_list);

        node
    }

    /// A region is vacant when it holds a single block that is free and covers
    /// everything after the region header. Vacant regions go back to the kernel.
    pub(crate) fn is_vacant(&self) -> bool {
        match self.blocks.first() {
            Some(block) if self.blocks.len() == 1 => unsafe {
                let block = &block.as_ref().data;

                block.is_free && block.size + REGION_HEADER_SIZE == self.size
            },
            _ => false,
        }
    }
}
