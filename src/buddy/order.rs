//! Order arithmetic
//!
//! Conversions between byte sizes and block orders for a given page size.

use crate::{AllocError, AllocResult};

/// Number of pages needed to hold `size` bytes (rounded up).
#[inline]
pub const fn pages_for_size(size: usize, page_shift: u32) -> usize {
    if size == 0 {
        0
    } else {
        ((size - 1) >> page_shift) + 1
    }
}

/// Smallest order whose block holds `num_pages` pages.
#[inline]
pub const fn order_for_pages(num_pages: usize) -> usize {
    if num_pages <= 1 {
        return 0;
    }
    let high_bit = num_pages.ilog2() as usize;
    if num_pages.is_power_of_two() {
        high_bit
    } else {
        high_bit + 1
    }
}

/// Smallest order whose block holds `size` bytes.
///
/// Fails with [`AllocError::InvalidSize`] for zero, or when the order would
/// reach `max_order`.
pub fn size_to_order(size: usize, page_shift: u32, max_order: usize) -> AllocResult<usize> {
    if size == 0 {
        return Err(AllocError::InvalidSize);
    }
    let order = order_for_pages(pages_for_size(size, page_shift));
    if order >= max_order {
        return Err(AllocError::InvalidSize);
    }
    Ok(order)
}

/// Size in bytes of a block of the given order.
#[inline]
pub const fn order_to_size(order: usize, page_shift: u32) -> usize {
    1 << (order + page_shift as usize)
}
