//! Buddy Pool Allocator
//!
//! A fixed-capacity buddy allocator that carves one pre-reserved memory
//! region into power-of-two-sized blocks, featuring:
//! - Per-page block descriptors carved from the same region as the data
//! - Order-indexed intrusive free lists addressed by descriptor index
//! - Split on allocation, buddy coalescing on free
//! - A spin-locked wrapper usable as a global allocator

#![no_std]

use core::alloc::Layout;
use core::fmt;
use core::ptr::NonNull;

#[cfg(test)]
extern crate alloc;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// Default minimum block (page) size
pub const DEFAULT_PAGE_SIZE: usize = 0x1000;

/// The error type used for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Unusable pool parameters, or an alignment the pool cannot honour.
    InvalidParam,
    /// Zero-sized request, or larger than the maximum block size.
    InvalidSize,
    /// No free block at or above the required order.
    NoMemory,
    /// Freeing a pointer that is not the start of a live allocation.
    InvalidFree,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AllocError::InvalidParam => "invalid allocator parameter",
            AllocError::InvalidSize => "invalid allocation size",
            AllocError::NoMemory => "out of memory",
            AllocError::InvalidFree => "pointer is not a live allocation",
        };
        f.write_str(msg)
    }
}

/// A [`Result`] type with [`AllocError`] as the error type.
pub type AllocResult<T = ()> = Result<T, AllocError>;

/// Byte-granularity allocator.
pub trait ByteAllocator {
    /// Allocate memory with the given size (in bytes) and alignment.
    fn alloc(&mut self, layout: Layout) -> AllocResult<NonNull<u8>>;

    /// Deallocate memory at the given position, size, and alignment.
    fn dealloc(&mut self, pos: NonNull<u8>, layout: Layout);

    /// Returns total memory size in bytes.
    fn total_bytes(&self) -> usize;

    /// Returns allocated memory size in bytes.
    fn used_bytes(&self) -> usize;

    /// Returns available memory size in bytes.
    fn available_bytes(&self) -> usize;
}

#[inline]
const fn align_up(pos: usize, align: usize) -> usize {
    (pos + align - 1) & !(align - 1)
}

/// Checks whether the address has the demanded alignment.
///
/// Equivalent to `addr % align == 0`, but the alignment must be a power of two.
#[inline]
const fn is_aligned(base_addr: usize, align: usize) -> bool {
    base_addr & (align - 1) == 0
}

pub mod buddy;
#[cfg(feature = "tracking")]
pub use buddy::PoolCounters;
pub use buddy::{BlockDescriptor, BuddyPool, PoolStats, DEFAULT_MAX_ORDER};

pub mod locked_pool;
pub use locked_pool::LockedBuddyPool;
