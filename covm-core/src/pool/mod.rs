use std::{alloc::Layout, ptr::NonNull};

use log::{debug, trace};

use crate::error::AllocResult;

pub use self::backing::{Backing, SystemBacking};

mod backing;

/// Pool size used when none is given.
pub const DEFAULT_POOL_BLOCK: usize = 64;

/// Object allocator that recycles up to `N` storage slots.
///
/// Pooled slots are raw storage and never hold a live object. Objects handed
/// out by [alloc](Self::alloc) belong to the caller until they are passed back
/// to [free](Self::free); the pool does not keep track of them.
pub struct PoolAllocator<T, const N: usize = DEFAULT_POOL_BLOCK, B: Backing = SystemBacking> {
    pool: Vec<NonNull<T>>,
    backing: B,
}

impl<T, const N: usize, B: Backing + Default> PoolAllocator<T, N, B> {
    pub fn new() -> AllocResult<Self> {
        Self::with_backing(B::default())
    }
}

impl<T, const N: usize, B: Backing> PoolAllocator<T, N, B> {
    /// Create a pool over `backing`, eagerly filling half of it.
    pub fn with_backing(backing: B) -> AllocResult<Self> {
        let mut this = Self {
            pool: Vec::with_capacity(N),
            backing,
        };
        let prefill = (N + 1) / 2;
        while this.pool.len() < prefill {
            let slot = this.fresh_slot()?;
            this.pool.push(slot);
        }
        debug!(
            "pool of {} x {} bytes prefilled with {} slots",
            N,
            Self::layout().size(),
            prefill
        );
        Ok(this)
    }

    fn layout() -> Layout {
        Layout::new::<T>()
    }

    fn fresh_slot(&mut self) -> AllocResult<NonNull<T>> {
        let layout = Self::layout();
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        Ok(self.backing.allocate(layout)?.cast())
    }

    unsafe fn release_slot(&mut self, slot: NonNull<T>) {
        let layout = Self::layout();
        if layout.size() != 0 {
            self.backing.deallocate(slot.cast(), layout);
        }
    }

    /// Move `value` into pooled storage, or fresh storage if the pool is dry.
    pub fn alloc(&mut self, value: T) -> AllocResult<NonNull<T>> {
        let slot = match self.pool.pop() {
            Some(slot) => slot,
            None => {
                trace!("pool dry, allocating fresh slot");
                self.fresh_slot()?
            }
        };
        unsafe { slot.as_ptr().write(value) };
        Ok(slot)
    }

    /// Drop the object at `ptr` and recycle its storage.
    ///
    /// # Safety
    /// `ptr` must have been returned by [alloc](Self::alloc) on this pool and
    /// not freed since. It must not be used afterwards.
    pub unsafe fn free(&mut self, ptr: NonNull<T>) {
        std::ptr::drop_in_place(ptr.as_ptr());
        if self.pool.len() < N {
            self.pool.push(ptr);
        } else {
            trace!("pool full, releasing slot");
            self.release_slot(ptr);
        }
    }

    /// Number of recycled slots ready for reuse.
    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }
}

impl<T, const N: usize, B: Backing> Drop for PoolAllocator<T, N, B> {
    fn drop(&mut self) {
        debug!("releasing {} pooled slots", self.pool.len());
        while let Some(slot) = self.pool.pop() {
            unsafe { self.release_slot(slot) };
        }
    }
}
