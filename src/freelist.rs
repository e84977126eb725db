use std::ptr::NonNull;

use crate::{
    block::{Block, payload_of},
    list::{List, Node},
};

/// Node of the [`FreeList`]. It lives in the payload of the free block it points to.
pub(crate) type FreeNode = Node<NonNull<Node<Block>>>;

/// Linked list to keep track of free [`Block`].
///
/// This list only stores pointers to the actual [`crate::region::Region`] blocks. The
/// reason behind this is that we don't actually need to store any additional content
/// for blocks which are free. We just need to keep track of them.
///
/// ```text
///                                     Free List
///
///                     Next free block                Next free block
///                +----------------------+  +--------------------------------------+
///                |                      |  |                                      |
/// +--------------|----------------------|--|----+      +--------------------------|-------------------+
/// |        | +---|--+    +-------+    +-|--|-+  |      |        | +-------+    +--|---+    +-------+  |
/// | Region | | Free | -> | Block | -> | Free |  | ---> | Region | | Block | -> | Free | -> | Block |  |
/// |        | +------+    +-------+    +------+  |      |        | +-------+    +------+    +-------+  |
/// +---------------------------------------------+      +----------------------------------------------+
///
/// ```
///
/// We use the payload of every free block as storage for its [`FreeNode`]. As the
/// block is free, the only part of it that we need is its header, the payload is
/// empty and won't be touched by the user until the block is handed out again:
///
/// ```text
/// +------------------------+ <--------+
/// |       Node<Block>      |          |-------> Block Header
/// +------------------------+ <--------+
/// |   Node<NonNull<Block>> |          |-------> FreeNode
/// +------------------------+ <--------+
/// |      Free Payload      |
/// |        (unused)        |
/// +------------------------+
/// ```
///
/// Nodes are kept sorted by block address. That keeps first-fit predictable
/// (lowest address wins) and, since the node of a block is always at a known
/// place, unlinking a block is O(1).
pub(crate) struct FreeList {
    /// Nodes of the list (Pointers to <Node<Block>>)
    pub items: List<NonNull<Node<Block>>>,
}

/// Where the [`FreeNode`] of `block` lives.
#[inline]
unsafe fn free_node_of(block: NonNull<Node<Block>>) -> NonNull<FreeNode> {
    unsafe { payload_of(block).cast() }
}

impl FreeList {
    /// Creates a new empty List
    pub const fn new() -> Self {
        Self { items: List::new() }
    }

    /// It tells whether the FreeList is empty or not.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Marks `block` as free and inserts it into the FreeList, right before the
    /// first free block with a higher address.
    ///
    /// **SAFETY**: `block` must be a live block that is not already on the list,
    /// with a payload of at least [`crate::block::MIN_PAYLOAD_SIZE`] bytes.
    pub unsafe fn insert_free_block(&mut self, mut block: NonNull<Node<Block>>) {
        unsafe {
            block.as_mut().data.is_free = true;

            let addr = payload_of(block);

            // Blocks released in allocation order end up at the tail, skip the walk.
            let is_last = match self.items.last() {
                Some(last) => last.as_ref().data < block,
                None => true,
            };

            if is_last {
                self.items.append(block, addr);
                return;
            }

            let successor = self.items.iter().copied().find(|free| *free > block);

            match successor {
                Some(successor) => {
                    self.items.insert_before(free_node_of(successor), block, addr);
                }
                None => {
                    self.items.append(block, addr);
                }
            }
        }
    }

    /// Removes `block` from the FreeList and marks it as used.
    ///
    /// **SAFETY**: `block` must currently be on the list.
    pub unsafe fn remove_free_block(&mut self, mut block: NonNull<Node<Block>>) {
        unsafe {
            self.items.remove(free_node_of(block));
            block.as_mut().data.is_free = false;
        }
    }

    /// Returns a pointer to the first [`Block`] (lowest address) whose total
    /// size is at least `size`. This is the first-fit algorithm.
    pub fn find_free_block(&self, size: usize) -> Option<NonNull<Node<Block>>> {
        if self.is_empty() {
            // We have no regions created yet, or every block is in use.
            return None;
        }

        self.items
            .iter()
            .copied()
            .find(|block| unsafe { block.as_ref().data.size >= size })
    }

    /// Sum of the payload capacity of every free block.
    pub fn free_bytes(&self) -> usize {
        self.items
            .iter()
            .map(|block| unsafe { block.as_ref().data.payload_size() })
            .sum()
    }
}
