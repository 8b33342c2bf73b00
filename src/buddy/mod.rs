//! Buddy pool module
//!
//! This module provides a fixed-region buddy system implementation with:
//! - Per-page descriptors carved from the managed region
//! - Index-linked free lists, one per order
//! - Statistics and consistency auditing

pub mod descriptor;
pub mod free_list;
pub mod free_table;
pub mod order;
pub mod pool;
pub mod stats;

pub use descriptor::{buddy_index, BlockDescriptor, DEFAULT_MAX_ORDER};
pub use free_list::{FreeList, Link, Linked};
pub use free_table::FreeListTable;
pub use pool::BuddyPool;
#[cfg(feature = "tracking")]
pub use stats::PoolCounters;
pub use stats::{MemoryStatsReporter, PoolStats};
