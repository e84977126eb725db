use std::{marker::PhantomData, ptr::NonNull};


/// Non-null pointer to `T`.
pub(crate) type Link<T> = Option<NonNull<T>>;

/// Every element of a [`List`] is wrapped in a `Node`. Since this is an
/// intrusive list, the node *is* the header that our allocator writes at the
/// beginning of regions and blocks.
pub(crate) struct Node<T> {
    /// Pointer to the next node of the list
    pub next: Link<Self>,
    /// Pointer to the previous node of the list
    pub prev: Link<Self>,
    /// Element of the node
    pub data: T,
}

/// Doubly linked list whose nodes live wherever the caller says.
///
/// The list never owns or allocates memory, it only links nodes that were
/// written to addresses handed to [`List::append`], [`List::insert_after`]
/// or [`List::insert_before`].
pub(crate) struct List<T> {
    head: Link<Node<T>>,
    tail: Link<Node<T>>,
    len: usize,
    marker: PhantomData<T>,
}

pub(crate) struct Iter<'a, T> {
    current: Link<Node<T>>,
    remaining: usize,
    marker: PhantomData<&'a T>,
}

impl<T> List<T> {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn first(&self) -> Link<Node<T>> {
        self.head
    }

    #[inline]
    pub fn last(&self) -> Link<Node<T>> {
        self.tail
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a new node to the Linked List.
    ///
    /// It is very important for us that, because we are the actual memory
    /// allocator, this method can not make allocations itself. Therefor,
    /// it has to receive the `addr` where this node has to be allocated.
    ///
    /// This way, the node will we placed inside of our data structures in
    /// the exact place we want.
    ///
    /// **SAFETY**: Caller (we, as the allocator) must guarantee that the given `addr` is valid
    /// and suitably aligned for a `Node<T>`.
    pub unsafe fn append(&mut self, data: T, addr: NonNull<u8>) -> NonNull<Node<T>> {
        let node = addr.cast::<Node<T>>();

        unsafe {
            node.as_ptr().write(Node {
                next: None,
                prev: self.tail,
                data,
            });

            if let Some(mut tail) = self.tail {
                tail.as_mut().next = Some(node);
            } else {
                self.head = Some(node);
            }
        }

        self.tail = Some(node);
        self.len += 1;

        node
    }

    /// Writes a new node at `addr` and links it right after `node`.
    ///
    /// **SAFETY**: Same as [`List::append`], and `node` must belong to this list.
    pub unsafe fn insert_after(
        &mut self,
        mut node: NonNull<Node<T>>,
        data: T,
        addr: NonNull<u8>,
    ) -> NonNull<Node<T>> {
        let new = addr.cast::<Node<T>>();

        unsafe {
            let next = node.as_ref().next;

            new.as_ptr().write(Node {
                next,
                prev: Some(node),
                data,
            });

            match next {
                Some(mut next) => next.as_mut().prev = Some(new),
                None => self.tail = Some(new),
            }

            node.as_mut().next = Some(new);
        }

        self.len += 1;

        new
    }

    /// Writes a new node at `addr` and links it right before `node`.
    ///
    /// **SAFETY**: Same as [`List::append`], and `node` must belong to this list.
    pub unsafe fn insert_before(
        &mut self,
        mut node: NonNull<Node<T>>,
        data: T,
        addr: NonNull<u8>,
    ) -> NonNull<Node<T>> {
        let new = addr.cast::<Node<T>>();

        unsafe {
            let prev = node.as_ref().prev;

            new.as_ptr().write(Node {
                next: Some(node),
                prev,
                data,
            });

            match prev {
                Some(mut prev) => prev.as_mut().next = Some(new),
                None => self.head = Some(new),
            }

            node.as_mut().prev = Some(new);
        }

        self.len += 1;

        new
    }

    /// Unlinks `node` from the list. The memory of the node is left untouched,
    /// it's up to the caller to decide what happens with it.
    ///
    /// **SAFETY**: `node` must belong to this list.
    pub unsafe fn remove(&mut self, node: NonNull<Node<T>>) {
        unsafe {
            let prev = node.as_ref().prev;
            let next = node.as_ref().next;

            match prev {
                Some(mut prev) => prev.as_mut().next = next,
                None => self.head = next,
            }

            match next {
                Some(mut next) => next.as_mut().prev = prev,
                None => self.tail = prev,
            }
        }

        self.len -= 1;
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            current: self.head,
            remaining: self.len,
            marker: PhantomData,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;

        unsafe {
            self.current = node.as_ref().next;
            self.remaining -= 1;

            Some(&node.as_ref().data)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
