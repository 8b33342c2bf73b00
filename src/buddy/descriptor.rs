//! Block descriptor metadata
//!
//! One descriptor exists per minimum-size page of the data region. Only the
//! descriptor of a block's first page (its head) carries meaningful state.

use super::free_list::{Link, Linked};

/// Maximum order supported by default (orders `0..DEFAULT_MAX_ORDER`)
pub const DEFAULT_MAX_ORDER: usize = 10;

/// Per-page block metadata
#[derive(Debug, Clone, Copy)]
pub struct BlockDescriptor {
    /// log2 of the block size in pages; valid on head descriptors only.
    pub(crate) order: usize,
    /// Set only on the head of a block currently owned by a caller.
    pub(crate) allocated: bool,
    pub(crate) link: Link,
}

impl BlockDescriptor {
    /// Create a free, unlinked order-0 descriptor
    pub const fn new() -> Self {
        Self {
            order: 0,
            allocated: false,
            link: Link::new(),
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated
    }
}

impl Default for BlockDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Linked for BlockDescriptor {
    fn link(&self) -> &Link {
        &self.link
    }

    fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }
}

/// Calculate the buddy index for the block at `index` with the given order.
///
/// The buddy is the other half of the parent block at the next higher order:
/// for a block at order k starting at page `i`, its buddy starts at `i ^ 2^k`.
#[inline]
pub const fn buddy_index(index: usize, order: usize) -> usize {
    index ^ (1 << order)
}

/// Whether a block of `order` may start at page `index`.
#[inline]
pub const fn is_block_aligned(index: usize, order: usize) -> bool {
    crate::is_aligned(index, 1 << order)
}
