//! Intrusive index-linked list
//!
//! The list keeps only its head and length; the links themselves live inside
//! the elements of an external slot array and are addressed by index, so
//! threading a block onto a list never allocates.

#[cfg(feature = "log")]
use log::error;

/// Position of an element within at most one list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Link {
    pub(crate) prev: Option<usize>,
    pub(crate) next: Option<usize>,
}

impl Link {
    pub const fn new() -> Self {
        Self {
            prev: None,
            next: None,
        }
    }
}

/// Elements that embed a [`Link`]
pub trait Linked {
    fn link(&self) -> &Link;
    fn link_mut(&mut self) -> &mut Link;
}

/// Doubly-linked list over the slots of an external array
#[derive(Debug)]
pub struct FreeList {
    head: Option<usize>,
    len: usize,
}

impl FreeList {
    /// Create a new empty list
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the length of the list
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn head(&self) -> Option<usize> {
        self.head
    }

    /// Insert slot `idx` at the front. The slot must not be on any list.
    pub fn push_front<T: Linked>(&mut self, slots: &mut [T], idx: usize) {
        let old_head = self.head;
        *slots[idx].link_mut() = Link {
            prev: None,
            next: old_head,
        };
        if let Some(h) = old_head {
            slots[h].link_mut().prev = Some(idx);
        }
        self.head = Some(idx);
        self.len += 1;
    }

    /// Detach and return the front slot
    pub fn pop_front<T: Linked>(&mut self, slots: &mut [T]) -> Option<usize> {
        let idx = self.head?;
        self.remove(slots, idx);
        Some(idx)
    }

    /// Detach slot `idx` in O(1). The slot must be a member of this list.
    pub fn remove<T: Linked>(&mut self, slots: &mut [T], idx: usize) {
        if self.len == 0 {
            error!("remove of slot {} from an empty list", idx);
            return;
        }

        let Link { prev, next } = *slots[idx].link();
        match prev {
            Some(p) => slots[p].link_mut().next = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            slots[n].link_mut().prev = prev;
        }

        *slots[idx].link_mut() = Link::new();
        self.len -= 1;
    }

    /// Get iterator over member slot indices
    pub fn iter<'a, T: Linked>(&self, slots: &'a [T]) -> FreeListIter<'a, T> {
        FreeListIter {
            slots,
            current: self.head,
            remaining: self.len,
        }
    }
}

impl Default for FreeList {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator for FreeList
pub struct FreeListIter<'a, T> {
    slots: &'a [T],
    current: Option<usize>,
    // Bounded by the recorded length so a corrupted cycle cannot spin forever.
    remaining: usize,
}

impl<'a, T: Linked> Iterator for FreeListIter<'a, T> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let idx = self.current?;
        self.current = self.slots.get(idx).and_then(|slot| slot.link().next);
        self.remaining -= 1;
        Some(idx)
    }
}
