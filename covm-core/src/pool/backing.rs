use std::{alloc::Layout, ptr::NonNull};

use crate::error::{AllocResult, AllocationError};

/// Source of raw storage for a [PoolAllocator](super::PoolAllocator).
///
/// # Safety
/// `allocate` must return storage valid for `layout` until it is passed
/// back to `deallocate` with the same layout.
pub unsafe trait Backing {
    fn allocate(&mut self, layout: Layout) -> AllocResult<NonNull<u8>>;

    /// # Safety
    /// `ptr` must come from `allocate` on this backing with the same `layout`.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout);
}

/// The global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBacking;

unsafe impl Backing for SystemBacking {
    fn allocate(&mut self, layout: Layout) -> AllocResult<NonNull<u8>> {
        debug_assert!(layout.size() > 0);
        let ptr = unsafe { std::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocationError::NoMemory {
            size: layout.size(),
            align: layout.align(),
        })
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        std::alloc::dealloc(ptr.as_ptr(), layout)
    }
}
