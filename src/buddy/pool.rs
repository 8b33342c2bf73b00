//! Single-region buddy pool
//!
//! Carves the descriptor table and the data region out of one caller-supplied
//! span and serves power-of-two blocks from the data region.

use core::alloc::Layout;
use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ptr::NonNull;

use crate::{align_up, is_aligned, AllocError, AllocResult, ByteAllocator};

#[cfg(feature = "log")]
use log::{debug, error, info, warn};

#[cfg(feature = "tracking")]
use super::stats::{MemoryStatsReporter, PoolCounters};

use super::{
    descriptor::{buddy_index, is_block_aligned, BlockDescriptor, DEFAULT_MAX_ORDER},
    free_table::FreeListTable,
    order,
    stats::PoolStats,
};

/// Placement of the descriptor table and data region inside a span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RegionLayout {
    descriptors_offset: usize,
    data_offset: usize,
    page_count: usize,
}

impl RegionLayout {
    /// Fit as many pages as possible into `[start, start + len)`, descriptors
    /// first and the data region page-aligned after them.
    fn plan(start: usize, len: usize, page_size: usize) -> Option<Self> {
        let desc_size = size_of::<BlockDescriptor>();
        let end = start.checked_add(len)?;
        let desc_start = align_up(start, align_of::<BlockDescriptor>());
        if desc_start >= end {
            return None;
        }

        let mut page_count = (end - desc_start) / (page_size + desc_size);
        while page_count > 0 {
            let data_start = align_up(desc_start + page_count * desc_size, page_size);
            if data_start + page_count * page_size <= end {
                return Some(Self {
                    descriptors_offset: desc_start - start,
                    data_offset: data_start - start,
                    page_count,
                });
            }
            page_count -= 1;
        }
        None
    }
}

/// Buddy allocator over a single fixed region
///
/// Orders range over `0..MAX_ORDER`; the largest block is
/// `page_size << (MAX_ORDER - 1)` bytes. Free lists thread through the
/// descriptor table by index, so no memory is allocated after
/// [`BuddyPool::initialize`].
pub struct BuddyPool<'a, const MAX_ORDER: usize = DEFAULT_MAX_ORDER> {
    descriptors: &'a mut [BlockDescriptor],
    data_base: NonNull<u8>,
    page_size: usize,
    page_shift: u32,
    free_lists: FreeListTable<MAX_ORDER>,
    #[cfg(feature = "tracking")]
    counters: PoolCounters,
    _region: PhantomData<&'a mut [u8]>,
}

// SAFETY: the pool holds the only borrow of its region; `data_base` points
// into that region and is never handed out except as allocation results.
unsafe impl<const MAX_ORDER: usize> Send for BuddyPool<'_, MAX_ORDER> {}

impl<'a, const MAX_ORDER: usize> BuddyPool<'a, MAX_ORDER> {
    /// Bytes a page-aligned span needs to yield exactly `page_count` pages.
    ///
    /// `page_size` must be a power of two.
    pub const fn region_size_for(page_count: usize, page_size: usize) -> usize {
        align_up(page_count * size_of::<BlockDescriptor>(), page_size) + page_count * page_size
    }

    /// Build a pool over `region` with `page_size`-byte minimum blocks.
    ///
    /// All pages that fit are seeded as the largest aligned free blocks;
    /// capacity that is not a multiple of the largest block becomes
    /// smaller blocks rather than being dropped.
    pub fn initialize(region: &'a mut [u8], page_size: usize) -> AllocResult<Self> {
        if !page_size.is_power_of_two() {
            error!("buddy pool: page size {:#x} is not a power of two", page_size);
            return Err(AllocError::InvalidParam);
        }
        let page_shift = page_size.trailing_zeros();
        if MAX_ORDER == 0 || MAX_ORDER - 1 + page_shift as usize >= usize::BITS as usize {
            error!(
                "buddy pool: max order {} unusable with page size {:#x}",
                MAX_ORDER, page_size
            );
            return Err(AllocError::InvalidParam);
        }

        let base = region.as_mut_ptr();
        let Some(layout) = RegionLayout::plan(base as usize, region.len(), page_size) else {
            error!(
                "buddy pool: region [{:p}, +{:#x}) too small for one page of {:#x} bytes",
                base,
                region.len(),
                page_size
            );
            return Err(AllocError::InvalidParam);
        };

        // SAFETY: both offsets lie inside `region`, which is exclusively
        // borrowed for 'a. The descriptor pointer is aligned by `plan`, and
        // the descriptor table is disjoint from the data region.
        let (descriptors, data_base) = unsafe {
            let desc_ptr = base.add(layout.descriptors_offset) as *mut BlockDescriptor;
            for i in 0..layout.page_count {
                desc_ptr.add(i).write(BlockDescriptor::new());
            }
            (
                core::slice::from_raw_parts_mut(desc_ptr, layout.page_count),
                NonNull::new_unchecked(base.add(layout.data_offset)),
            )
        };

        let mut pool = Self {
            descriptors,
            data_base,
            page_size,
            page_shift,
            free_lists: FreeListTable::new(),
            #[cfg(feature = "tracking")]
            counters: PoolCounters::default(),
            _region: PhantomData,
        };
        pool.seed();

        info!(
            "buddy pool: {} pages of {:#x} bytes at {:p}, max block {:#x}",
            layout.page_count,
            page_size,
            pool.data_base,
            pool.max_block_size()
        );
        Ok(pool)
    }

    /// Put every page on a free list as the largest aligned blocks that fit
    fn seed(&mut self) {
        let page_count = self.page_count();
        let mut index = 0;
        while index < page_count {
            let mut order = MAX_ORDER - 1;
            while order > 0 && (!is_block_aligned(index, order) || index + (1 << order) > page_count)
            {
                order -= 1;
            }
            self.descriptors[index].order = order;
            self.free_lists.push(&mut *self.descriptors, order, index);
            index += 1 << order;
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// First byte of the data region
    pub fn data_start(&self) -> NonNull<u8> {
        self.data_base
    }

    /// Number of minimum-size pages in the data region
    pub fn page_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Largest size a single allocation may request
    pub fn max_block_size(&self) -> usize {
        order::order_to_size(MAX_ORDER - 1, self.page_shift)
    }

    pub fn total_pages(&self) -> usize {
        self.page_count()
    }

    pub fn free_pages(&self) -> usize {
        self.free_lists.free_pages()
    }

    pub fn used_pages(&self) -> usize {
        self.page_count() - self.free_pages()
    }

    /// Number of free blocks currently tracked at `order`
    pub fn free_count(&self, order: usize) -> usize {
        self.free_lists.count(order)
    }

    /// Start addresses of the free blocks of `order`.
    ///
    /// # Panics
    ///
    /// Panics if `order >= MAX_ORDER`.
    pub fn free_blocks(&self, order: usize) -> impl Iterator<Item = NonNull<u8>> + '_ {
        self.free_lists
            .iter(&*self.descriptors, order)
            .map(move |index| self.block_ptr(index))
    }

    /// Whether `ptr` falls inside the data region
    pub fn owns(&self, ptr: *const u8) -> bool {
        (ptr as usize)
            .checked_sub(self.data_base.as_ptr() as usize)
            .is_some_and(|offset| offset < self.page_count() << self.page_shift)
    }

    /// Size of the live block starting at `ptr`, if `ptr` is one
    pub fn block_size_of(&self, ptr: *const u8) -> Option<usize> {
        let index = self.page_index_of(ptr)?;
        let desc = &self.descriptors[index];
        desc
            .allocated
            .then(|| order::order_to_size(desc.order, self.page_shift))
    }

    /// Descriptor index of the buddy of the order-`order` block at `index`,
    /// or `None` if the buddy block does not lie entirely inside the pool.
    pub fn buddy_of(&self, index: usize, order: usize) -> Option<usize> {
        let buddy = buddy_index(index, order);
        if buddy + (1 << order) > self.page_count() {
            None
        } else {
            Some(buddy)
        }
    }

    /// Allocate a block of at least `size` bytes.
    pub fn allocate(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        let order = match order::size_to_order(size, self.page_shift, MAX_ORDER) {
            Ok(order) => order,
            Err(e) => {
                warn!(
                    "buddy pool: rejected request of {} bytes (max block {:#x})",
                    size,
                    self.max_block_size()
                );
                #[cfg(feature = "tracking")]
                {
                    self.counters.failed_allocations += 1;
                }
                return Err(e);
            }
        };

        let Some(found) = self.free_lists.first_nonempty(order) else {
            debug!(
                "buddy pool: allocation failure: {} bytes, order {}, {} pages free",
                size,
                order,
                self.free_pages()
            );
            #[cfg(feature = "tracking")]
            {
                self.counters.failed_allocations += 1;
                MemoryStatsReporter::print_alloc_failure_stats(&self.stats(), size, order);
            }
            return Err(AllocError::NoMemory);
        };

        let index = self
            .free_lists
            .pop(&mut *self.descriptors, found)
            .ok_or(AllocError::NoMemory)?;
        let index = self.split(index, order);
        self.descriptors[index].allocated = true;

        #[cfg(feature = "tracking")]
        {
            self.counters.allocations += 1;
        }
        Ok(self.block_ptr(index))
    }

    /// Return the block starting at `ptr` to the pool. A null pointer is ignored.
    ///
    /// Pointers that are not the start of a live allocation are rejected with
    /// [`AllocError::InvalidFree`] and leave the pool untouched.
    pub fn deallocate(&mut self, ptr: *mut u8) -> AllocResult {
        if ptr.is_null() {
            return Ok(());
        }

        let index = match self.page_index_of(ptr) {
            Some(index) if self.descriptors[index].allocated => index,
            _ => {
                error!(
                    "buddy pool: invalid free of {:p}: not a live allocation in [{:p}, +{:#x})",
                    ptr,
                    self.data_base,
                    self.page_count() << self.page_shift
                );
                #[cfg(feature = "tracking")]
                {
                    self.counters.invalid_frees += 1;
                }
                return Err(AllocError::InvalidFree);
            }
        };

        self.descriptors[index].allocated = false;
        let index = self.merge(index);
        let order = self.descriptors[index].order;
        self.free_lists.push(&mut *self.descriptors, order, index);

        #[cfg(feature = "tracking")]
        {
            self.counters.deallocations += 1;
        }
        Ok(())
    }

    /// Halve a detached free block until it has `target_order`, freeing the
    /// upper half at each level.
    fn split(&mut self, index: usize, target_order: usize) -> usize {
        while self.descriptors[index].order > target_order {
            let order = self.descriptors[index].order - 1;
            self.descriptors[index].order = order;

            let sibling = buddy_index(index, order);
            let desc = &mut self.descriptors[sibling];
            desc.order = order;
            desc.allocated = false;
            self.free_lists.push(&mut *self.descriptors, order, sibling);

            #[cfg(feature = "tracking")]
            {
                self.counters.splits += 1;
            }
        }
        index
    }

    /// Coalesce a just-freed block with free buddies of equal order. The
    /// lower-indexed half heads each merged block.
    fn merge(&mut self, mut index: usize) -> usize {
        loop {
            let order = self.descriptors[index].order;
            if order + 1 >= MAX_ORDER {
                break;
            }
            let Some(buddy) = self.buddy_of(index, order) else {
                break;
            };
            let desc = &self.descriptors[buddy];
            if desc.allocated || desc.order != order {
                break;
            }

            self.free_lists.remove(&mut *self.descriptors, order, buddy);
            index = index.min(buddy);
            self.descriptors[index].order = order + 1;

            #[cfg(feature = "tracking")]
            {
                self.counters.merges += 1;
            }
        }
        index
    }

    fn block_ptr(&self, index: usize) -> NonNull<u8> {
        // SAFETY: callers pass indices below page_count, so the offset stays
        // inside the data region.
        unsafe { NonNull::new_unchecked(self.data_base.as_ptr().add(index << self.page_shift)) }
    }

    /// Page index of a page-aligned pointer into the data region
    fn page_index_of(&self, ptr: *const u8) -> Option<usize> {
        let offset = (ptr as usize).checked_sub(self.data_base.as_ptr() as usize)?;
        if offset >= self.page_count() << self.page_shift || !is_aligned(offset, self.page_size) {
            return None;
        }
        Some(offset >> self.page_shift)
    }

    /// Get a statistics snapshot
    pub fn stats(&self) -> PoolStats<MAX_ORDER> {
        let mut stats = PoolStats::new(self.page_size);
        stats.total_pages = self.page_count();
        for order in 0..MAX_ORDER {
            let count = self.free_lists.count(order);
            stats.free_blocks_by_order[order] = count;
            stats.free_pages += count << order;
        }
        stats.used_pages = stats.total_pages - stats.free_pages;
        stats
    }

    #[cfg(feature = "tracking")]
    pub fn counters(&self) -> PoolCounters {
        self.counters
    }

    /// Audit the free lists against the descriptor table.
    ///
    /// Checks list linkage and counts, that every member is a free head of
    /// the list's order lying inside the pool, that allocated heads are on no
    /// list, and that free plus allocated pages cover the pool exactly.
    /// Every violation is logged; returns `true` when none were found.
    pub fn check_consistency(&self) -> bool {
        let page_count = self.page_count();
        let mut ok = true;
        let mut free_pages = 0;

        for order in 0..MAX_ORDER {
            let mut members = 0;
            let mut prev = None;
            let mut cursor = self.free_lists.head(order);
            while let Some(index) = cursor {
                if members >= page_count {
                    error!("buddy pool: order {} list does not terminate", order);
                    ok = false;
                    break;
                }
                let Some(desc) = self.descriptors.get(index) else {
                    error!("buddy pool: order {} list links to bad index {}", order, index);
                    ok = false;
                    break;
                };
                if desc.link.prev != prev {
                    error!("buddy pool: order {} block {} has a stale back link", order, index);
                    ok = false;
                }
                if desc.allocated
                    || desc.order != order
                    || !is_block_aligned(index, order)
                    || index + (1 << order) > page_count
                {
                    error!(
                        "buddy pool: block {} on order {} list is invalid (order {}, allocated {})",
                        index, order, desc.order, desc.allocated
                    );
                    ok = false;
                }
                members += 1;
                prev = cursor;
                cursor = desc.link.next;
            }

            if members != self.free_lists.count(order) {
                error!(
                    "buddy pool: order {} count {} but {} blocks reachable",
                    order,
                    self.free_lists.count(order),
                    members
                );
                ok = false;
            }
            free_pages += members << order;
        }

        let mut used_pages = 0;
        for (index, desc) in self.descriptors.iter().enumerate() {
            if !desc.allocated {
                continue;
            }
            if desc.link != Default::default() {
                error!("buddy pool: allocated block {} is still linked", index);
                ok = false;
            }
            used_pages += 1 << desc.order;
        }

        if free_pages + used_pages != page_count {
            error!(
                "buddy pool: {} free + {} used pages != {} total",
                free_pages, used_pages, page_count
            );
            ok = false;
        }
        ok
    }

    /// Print layout and free block distribution
    pub fn print_pool_info(&self) {
        info!("========== Buddy Pool Info ==========");
        info!(
            "Data region: [{:p}, +{:#x})",
            self.data_base,
            self.page_count() << self.page_shift
        );
        info!("Page size: {:#x} ({})", self.page_size, self.page_size);
        info!(
            "Pages: {} total, {} free, {} used",
            self.page_count(),
            self.free_pages(),
            self.used_pages()
        );
        info!("Free blocks distribution:");
        for order in 0..MAX_ORDER {
            let block_count = self.free_lists.count(order);
            if block_count > 0 {
                let _block_size = order::order_to_size(order, self.page_shift);
                info!(
                    "  Order {}: {} blocks (size {} bytes each, total {:#x})",
                    order,
                    block_count,
                    _block_size,
                    block_count * _block_size
                );
            }
        }
        info!("=====================================");
    }
}

impl<const MAX_ORDER: usize> ByteAllocator for BuddyPool<'_, MAX_ORDER> {
    fn alloc(&mut self, layout: Layout) -> AllocResult<NonNull<u8>> {
        // Blocks are only guaranteed page alignment.
        if layout.align() > self.page_size {
            warn!(
                "buddy pool: alignment {:#x} exceeds page size {:#x}",
                layout.align(),
                self.page_size
            );
            return Err(AllocError::InvalidParam);
        }
        self.allocate(layout.size())
    }

    fn dealloc(&mut self, pos: NonNull<u8>, _layout: Layout) {
        // Invalid frees are reported by deallocate and leave the pool intact.
        let _ = self.deallocate(pos.as_ptr());
    }

    fn total_bytes(&self) -> usize {
        self.page_count() << self.page_shift
    }

    fn used_bytes(&self) -> usize {
        self.used_pages() << self.page_shift
    }

    fn available_bytes(&self) -> usize {
        self.free_pages() << self.page_shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::alloc::{alloc, dealloc};

    const TEST_PAGE_SIZE: usize = 0x1000;

    type Pool<'a> = BuddyPool<'a, 4>;

    /// Page-aligned backing memory for a pool
    struct TestHeap {
        ptr: *mut u8,
        layout: Layout,
    }

    impl TestHeap {
        fn new(size: usize) -> Self {
            let layout = Layout::from_size_align(size, TEST_PAGE_SIZE).unwrap();
            let ptr = unsafe { alloc(layout) };
            assert!(!ptr.is_null());
            Self { ptr, layout }
        }

        fn with_pages(page_count: usize) -> Self {
            Self::new(Pool::region_size_for(page_count, TEST_PAGE_SIZE))
        }

        fn region(&mut self) -> &mut [u8] {
            unsafe { core::slice::from_raw_parts_mut(self.ptr, self.layout.size()) }
        }
    }

    impl Drop for TestHeap {
        fn drop(&mut self) {
            unsafe { dealloc(self.ptr, self.layout) };
        }
    }

    fn counts(pool: &Pool<'_>) -> [usize; 4] {
        core::array::from_fn(|order| pool.free_count(order))
    }

    #[test]
    fn test_layout_yields_requested_pages() {
        for pages in [1, 2, 8, 10, 100, 1000] {
            let mut heap = TestHeap::with_pages(pages);
            let pool = Pool::initialize(heap.region(), TEST_PAGE_SIZE).unwrap();
            assert_eq!(pool.page_count(), pages);
            assert!(pool.check_consistency());
        }
    }

    #[test]
    fn test_layout_unaligned_start() {
        let mut heap = TestHeap::new(16 * TEST_PAGE_SIZE);
        let region = &mut heap.region()[3..];
        let start = region.as_ptr() as usize;
        let pool = Pool::initialize(region, TEST_PAGE_SIZE).unwrap();
        assert!(pool.page_count() > 0);
        assert_eq!(pool.data_base.as_ptr() as usize % TEST_PAGE_SIZE, 0);
        assert!(pool.data_base.as_ptr() as usize >= start + pool.page_count() * size_of::<BlockDescriptor>());
        assert_eq!(pool.free_pages(), pool.page_count());
    }

    #[test]
    fn test_invalid_params() {
        let mut heap = TestHeap::with_pages(8);
        assert_eq!(
            Pool::initialize(heap.region(), 3000).err(),
            Some(AllocError::InvalidParam)
        );
        assert_eq!(
            Pool::initialize(&mut heap.region()[..TEST_PAGE_SIZE], TEST_PAGE_SIZE).err(),
            Some(AllocError::InvalidParam)
        );
        assert_eq!(
            BuddyPool::<0>::initialize(heap.region(), TEST_PAGE_SIZE).err(),
            Some(AllocError::InvalidParam)
        );
        assert_eq!(
            Pool::initialize(&mut [], TEST_PAGE_SIZE).err(),
            Some(AllocError::InvalidParam)
        );
    }

    #[test]
    fn test_seed_full_pool() {
        let mut heap = TestHeap::with_pages(16);
        let pool = Pool::initialize(heap.region(), TEST_PAGE_SIZE).unwrap();
        assert_eq!(counts(&pool), [0, 0, 0, 2]);
        assert_eq!(pool.max_block_size(), 8 * TEST_PAGE_SIZE);
    }

    #[test]
    fn test_seed_remainder_kept() {
        let mut heap = TestHeap::with_pages(13);
        let pool = Pool::initialize(heap.region(), TEST_PAGE_SIZE).unwrap();
        // 13 = 8 + 4 + 1
        assert_eq!(counts(&pool), [1, 0, 1, 1]);
        assert_eq!(pool.free_pages(), 13);
        assert!(pool.check_consistency());
    }

    #[test]
    fn test_split_pushes_siblings() {
        let mut heap = TestHeap::with_pages(8);
        let mut pool = Pool::initialize(heap.region(), TEST_PAGE_SIZE).unwrap();

        let ptr = pool.allocate(1).unwrap();
        assert_eq!(ptr, pool.data_base);
        assert_eq!(counts(&pool), [1, 1, 1, 0]);
        assert_eq!(pool.descriptors[1].order, 0);
        assert_eq!(pool.descriptors[2].order, 1);
        assert_eq!(pool.descriptors[4].order, 2);
        assert!(pool.descriptors[0].allocated);
        assert!(pool.check_consistency());
    }

    #[test]
    fn test_merge_keeps_lower_index() {
        let mut heap = TestHeap::with_pages(8);
        let mut pool = Pool::initialize(heap.region(), TEST_PAGE_SIZE).unwrap();

        let a = pool.allocate(TEST_PAGE_SIZE).unwrap();
        let b = pool.allocate(TEST_PAGE_SIZE).unwrap();
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, TEST_PAGE_SIZE);
        assert_eq!(counts(&pool), [0, 1, 1, 0]);

        // Buddy still allocated: no coalescing.
        pool.deallocate(b.as_ptr()).unwrap();
        assert_eq!(counts(&pool), [1, 1, 1, 0]);

        pool.deallocate(a.as_ptr()).unwrap();
        assert_eq!(counts(&pool), [0, 0, 0, 1]);
        assert_eq!(pool.descriptors[0].order, 3);
        assert_eq!(pool.free_blocks(3).next(), Some(a));
        assert!(pool.check_consistency());
    }

    #[test]
    fn test_buddy_of_boundary() {
        let mut heap = TestHeap::with_pages(10);
        let pool = Pool::initialize(heap.region(), TEST_PAGE_SIZE).unwrap();

        assert_eq!(pool.buddy_of(8, 0), Some(9));
        assert_eq!(pool.buddy_of(9, 0), Some(8));
        // [10, 12) lies past the end
        assert_eq!(pool.buddy_of(8, 1), None);
        // [8, 16) lies past the end
        assert_eq!(pool.buddy_of(0, 3), None);
        assert_eq!(pool.buddy_of(4, 2), Some(0));
    }

    #[test]
    fn test_last_block_does_not_merge_past_end() {
        let mut heap = TestHeap::with_pages(10);
        let mut pool = Pool::initialize(heap.region(), TEST_PAGE_SIZE).unwrap();
        assert_eq!(counts(&pool), [0, 1, 0, 1]);

        let ptr = pool.allocate(2 * TEST_PAGE_SIZE).unwrap();
        assert_eq!(ptr.as_ptr() as usize - pool.data_base.as_ptr() as usize, 8 * TEST_PAGE_SIZE);
        assert_eq!(counts(&pool), [0, 0, 0, 1]);

        pool.deallocate(ptr.as_ptr()).unwrap();
        assert_eq!(counts(&pool), [0, 1, 0, 1]);
        assert!(pool.check_consistency());
    }

    #[test]
    fn test_invalid_free_leaves_pool_intact() {
        let mut heap = TestHeap::with_pages(8);
        let mut pool = Pool::initialize(heap.region(), TEST_PAGE_SIZE).unwrap();

        let ptr = pool.allocate(2 * TEST_PAGE_SIZE).unwrap();
        let before = counts(&pool);

        // interior page of a live block
        let interior = unsafe { ptr.as_ptr().add(TEST_PAGE_SIZE) };
        assert_eq!(pool.deallocate(interior), Err(AllocError::InvalidFree));
        // not page aligned
        let unaligned = unsafe { ptr.as_ptr().add(1) };
        assert_eq!(pool.deallocate(unaligned), Err(AllocError::InvalidFree));
        // a free block
        let free = unsafe { ptr.as_ptr().add(4 * TEST_PAGE_SIZE) };
        assert_eq!(pool.deallocate(free), Err(AllocError::InvalidFree));
        // outside the data region
        let outside = unsafe { ptr.as_ptr().add(8 * TEST_PAGE_SIZE) };
        assert_eq!(pool.deallocate(outside), Err(AllocError::InvalidFree));
        assert_eq!(counts(&pool), before);

        pool.deallocate(ptr.as_ptr()).unwrap();
        // double free
        assert_eq!(pool.deallocate(ptr.as_ptr()), Err(AllocError::InvalidFree));
        assert_eq!(counts(&pool), [0, 0, 0, 1]);
        assert!(pool.check_consistency());
    }

    #[test]
    fn test_block_size_and_ownership() {
        let mut heap = TestHeap::with_pages(8);
        let mut pool = Pool::initialize(heap.region(), TEST_PAGE_SIZE).unwrap();

        let ptr = pool.allocate(3 * TEST_PAGE_SIZE).unwrap();
        assert_eq!(pool.block_size_of(ptr.as_ptr()), Some(4 * TEST_PAGE_SIZE));
        assert!(pool.owns(ptr.as_ptr()));
        assert!(!pool.owns(pool.descriptors.as_ptr() as *const u8));

        let buddy = unsafe { ptr.as_ptr().add(4 * TEST_PAGE_SIZE) };
        assert!(pool.owns(buddy));
        assert_eq!(pool.block_size_of(buddy), None);

        pool.deallocate(ptr.as_ptr()).unwrap();
        assert_eq!(pool.block_size_of(ptr.as_ptr()), None);
    }

    #[test]
    fn test_byte_allocator() {
        let mut heap = TestHeap::with_pages(8);
        let mut pool = Pool::initialize(heap.region(), TEST_PAGE_SIZE).unwrap();
        assert_eq!(pool.total_bytes(), 8 * TEST_PAGE_SIZE);

        let layout = Layout::from_size_align(100, 64).unwrap();
        let ptr = ByteAllocator::alloc(&mut pool, layout).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 64, 0);
        assert_eq!(pool.used_bytes(), TEST_PAGE_SIZE);
        assert_eq!(pool.available_bytes(), 7 * TEST_PAGE_SIZE);

        let wide = Layout::from_size_align(100, 2 * TEST_PAGE_SIZE).unwrap();
        assert_eq!(
            ByteAllocator::alloc(&mut pool, wide),
            Err(AllocError::InvalidParam)
        );

        ByteAllocator::dealloc(&mut pool, ptr, layout);
        assert_eq!(pool.used_bytes(), 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let mut heap = TestHeap::with_pages(8);
        let mut pool = Pool::initialize(heap.region(), TEST_PAGE_SIZE).unwrap();
        let _ptr = pool.allocate(TEST_PAGE_SIZE).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.page_size, TEST_PAGE_SIZE);
        assert_eq!(stats.total_pages, 8);
        assert_eq!(stats.free_pages, 7);
        assert_eq!(stats.used_pages, 1);
        assert_eq!(stats.free_blocks_by_order, [1, 1, 1, 0]);
        assert_eq!(stats.largest_free_order(), Some(2));
    }

    #[cfg(feature = "tracking")]
    #[test]
    fn test_counters() {
        let mut heap = TestHeap::with_pages(8);
        let mut pool = Pool::initialize(heap.region(), TEST_PAGE_SIZE).unwrap();

        let ptr = pool.allocate(TEST_PAGE_SIZE).unwrap();
        assert!(pool.allocate(0).is_err());
        pool.deallocate(ptr.as_ptr()).unwrap();
        assert!(pool.deallocate(ptr.as_ptr()).is_err());

        let counters = pool.counters();
        assert_eq!(counters.allocations, 1);
        assert_eq!(counters.deallocations, 1);
        assert_eq!(counters.failed_allocations, 1);
        assert_eq!(counters.invalid_frees, 1);
        assert_eq!(counters.splits, 3);
        assert_eq!(counters.merges, 3);
    }
}
