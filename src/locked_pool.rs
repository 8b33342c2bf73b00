//! Spin-locked buddy pool.
//!
//! Wraps a [`BuddyPool`] behind one pool-wide lock held for the whole of
//! each allocate or deallocate call, so a pool can be shared between CPUs
//! and installed as the `#[global_allocator]`.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};

use kspin::SpinNoIrq;

#[cfg(feature = "log")]
use log::{error, warn};

use crate::buddy::{BuddyPool, PoolStats, DEFAULT_MAX_ORDER};
use crate::{AllocError, AllocResult, ByteAllocator};

/// Buddy pool guarded by a pool-wide spin lock
pub struct LockedBuddyPool<'a, const MAX_ORDER: usize = DEFAULT_MAX_ORDER> {
    pool: SpinNoIrq<Option<BuddyPool<'a, MAX_ORDER>>>,
    initialized: AtomicBool,
}

impl<'a, const MAX_ORDER: usize> LockedBuddyPool<'a, MAX_ORDER> {
    pub const fn new() -> Self {
        Self {
            pool: SpinNoIrq::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    /// Initialize the pool over `region`. Fails if already initialized.
    pub fn init(&self, region: &'a mut [u8], page_size: usize) -> AllocResult {
        let mut guard = self.pool.lock();
        if guard.is_some() {
            error!("locked pool: already initialized");
            return Err(AllocError::InvalidParam);
        }
        *guard = Some(BuddyPool::initialize(region, page_size)?);
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Run `f` with the lock held. Returns `None` before initialization.
    pub fn with_pool<R>(&self, f: impl FnOnce(&mut BuddyPool<'a, MAX_ORDER>) -> R) -> Option<R> {
        self.pool.lock().as_mut().map(f)
    }

    pub fn allocate(&self, size: usize) -> AllocResult<NonNull<u8>> {
        self.with_pool(|pool| pool.allocate(size)).unwrap_or_else(|| {
            error!("locked pool: allocation before initialization");
            Err(AllocError::NoMemory)
        })
    }

    pub fn deallocate(&self, ptr: *mut u8) -> AllocResult {
        if ptr.is_null() {
            return Ok(());
        }
        self.with_pool(|pool| pool.deallocate(ptr)).unwrap_or_else(|| {
            error!("locked pool: deallocating {:p} before initialization", ptr);
            Err(AllocError::InvalidFree)
        })
    }

    pub fn free_count(&self, order: usize) -> usize {
        self.with_pool(|pool| pool.free_count(order)).unwrap_or(0)
    }

    pub fn stats(&self) -> Option<PoolStats<MAX_ORDER>> {
        self.with_pool(|pool| pool.stats())
    }
}

impl<const MAX_ORDER: usize> Default for LockedBuddyPool<'_, MAX_ORDER> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<const MAX_ORDER: usize> GlobalAlloc for LockedBuddyPool<'_, MAX_ORDER> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if !self.is_initialized() {
            warn!("locked pool: allocator not initialized");
            return core::ptr::null_mut();
        }
        match self.with_pool(|pool| ByteAllocator::alloc(pool, layout)) {
            Some(Ok(ptr)) => ptr.as_ptr(),
            _ => core::ptr::null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        let _ = self.deallocate(ptr);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // The block is a power of two and may already have room.
        let fits = self
            .with_pool(|pool| pool.block_size_of(ptr))
            .flatten()
            .is_some_and(|block_size| new_size <= block_size);
        if fits {
            return ptr;
        }

        let Ok(new_layout) = Layout::from_size_align(new_size, layout.align()) else {
            return core::ptr::null_mut();
        };
        let new_ptr = unsafe { self.alloc(new_layout) };
        if !new_ptr.is_null() {
            unsafe {
                core::ptr::copy_nonoverlapping(ptr, new_ptr, core::cmp::min(layout.size(), new_size));
                self.dealloc(ptr, layout);
            }
        }
        new_ptr
    }
}
