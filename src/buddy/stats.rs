//! Statistics and debugging for the buddy pool
//!
//! Provides snapshot statistics and failure reporting.

/// Snapshot of a pool's page accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats<const MAX_ORDER: usize> {
    pub page_size: usize,
    pub total_pages: usize,
    pub free_pages: usize,
    pub used_pages: usize,
    pub free_blocks_by_order: [usize; MAX_ORDER],
}

impl<const MAX_ORDER: usize> PoolStats<MAX_ORDER> {
    pub const fn new(page_size: usize) -> Self {
        Self {
            page_size,
            total_pages: 0,
            free_pages: 0,
            used_pages: 0,
            free_blocks_by_order: [0; MAX_ORDER],
        }
    }

    /// Largest order with a free block, if any
    pub fn largest_free_order(&self) -> Option<usize> {
        (0..MAX_ORDER)
            .rev()
            .find(|&order| self.free_blocks_by_order[order] > 0)
    }
}

/// Operation counters kept by a pool
#[cfg(feature = "tracking")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolCounters {
    pub allocations: usize,
    pub deallocations: usize,
    pub failed_allocations: usize,
    pub invalid_frees: usize,
    pub splits: usize,
    pub merges: usize,
}

/// Detailed memory statistics reporter
pub struct MemoryStatsReporter;

impl MemoryStatsReporter {
    /// Log a pool snapshot after a failed request of `request_size` bytes
    #[allow(unused_variables)]
    pub fn print_alloc_failure_stats<const MAX_ORDER: usize>(
        stats: &PoolStats<MAX_ORDER>,
        request_size: usize,
        request_order: usize,
    ) {
        #[cfg(feature = "log")]
        use log::error;

        let page_size = stats.page_size;
        error!("========================================");
        error!(
            "Request: {} bytes (order {}, {} KB block)",
            request_size,
            request_order,
            ((1 << request_order) * page_size) / 1024
        );
        error!(
            "  Total pages: {} ({} KB)",
            stats.total_pages,
            (stats.total_pages * page_size) / 1024
        );
        error!(
            "  Free pages: {} ({} KB)",
            stats.free_pages,
            (stats.free_pages * page_size) / 1024
        );
        error!(
            "  Used pages: {} ({} KB)",
            stats.used_pages,
            (stats.used_pages * page_size) / 1024
        );
        error!("  Free blocks by order:");
        for order in (0..MAX_ORDER).rev() {
            let count = stats.free_blocks_by_order[order];
            if count > 0 {
                let block_size = (1 << order) * page_size;
                error!(
                    "    Order {}: {} blocks ({} KB each, {} KB total)",
                    order,
                    count,
                    block_size / 1024,
                    (count * block_size) / 1024
                );
            }
        }
        error!("========================================");
    }
}
