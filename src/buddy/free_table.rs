//! Free-list table
//!
//! One list per order; a block sits on the list matching its order for as
//! long as it is free.

use super::{
    descriptor::BlockDescriptor,
    free_list::{FreeList, FreeListIter},
};

/// Order-indexed free lists for a pool with orders `0..MAX_ORDER`
pub struct FreeListTable<const MAX_ORDER: usize> {
    lists: [FreeList; MAX_ORDER],
}

impl<const MAX_ORDER: usize> FreeListTable<MAX_ORDER> {
    pub const fn new() -> Self {
        Self {
            lists: [const { FreeList::new() }; MAX_ORDER],
        }
    }

    /// Track the block headed at `index` as a free block of `order`
    pub fn push(&mut self, descriptors: &mut [BlockDescriptor], order: usize, index: usize) {
        self.lists[order].push_front(descriptors, index);
    }

    /// Detach the first free block of `order`
    pub fn pop(&mut self, descriptors: &mut [BlockDescriptor], order: usize) -> Option<usize> {
        self.lists[order].pop_front(descriptors)
    }

    /// Detach the free block headed at `index` from the list of `order`
    pub fn remove(&mut self, descriptors: &mut [BlockDescriptor], order: usize, index: usize) {
        self.lists[order].remove(descriptors, index);
    }

    /// First block on the list of `order`
    pub fn head(&self, order: usize) -> Option<usize> {
        self.lists.get(order).and_then(FreeList::head)
    }

    /// Lowest order at or above `order` with a free block
    pub fn first_nonempty(&self, order: usize) -> Option<usize> {
        (order..MAX_ORDER).find(|&o| !self.lists[o].is_empty())
    }

    /// Number of free blocks of `order`; zero for orders out of range
    pub fn count(&self, order: usize) -> usize {
        self.lists.get(order).map_or(0, FreeList::len)
    }

    /// Total free pages across all orders
    pub fn free_pages(&self) -> usize {
        self.lists
            .iter()
            .enumerate()
            .map(|(order, list)| list.len() << order)
            .sum()
    }

    pub fn iter<'a>(
        &self,
        descriptors: &'a [BlockDescriptor],
        order: usize,
    ) -> FreeListIter<'a, BlockDescriptor> {
        self.lists[order].iter(descriptors)
    }
}

impl<const MAX_ORDER: usize> Default for FreeListTable<MAX_ORDER> {
    fn default() -> Self {
        Self::new()
    }
}
