use std::{cell::RefCell, ptr::NonNull};

use crate::pool::{Backing, PoolAllocator};

/// How a [DeferredCollector](super::DeferredCollector) gives an abandoned object back.
pub trait Reclaim<T> {
    /// Drop the object at `ptr` and release its storage.
    ///
    /// # Safety
    /// `ptr` must point to a live object allocated the way this strategy
    /// expects, and must not be used afterwards.
    unsafe fn reclaim(&mut self, ptr: NonNull<T>);
}

/// Objects that were allocated with `Box::new`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoxReclaim;

impl<T> Reclaim<T> for BoxReclaim {
    unsafe fn reclaim(&mut self, ptr: NonNull<T>) {
        drop(Box::from_raw(ptr.as_ptr()));
    }
}

/// Objects that were allocated from a shared [PoolAllocator].
///
/// The pool must not be borrowed when the collector is dropped.
pub struct PoolReclaim<'p, T, const N: usize, B: Backing>(pub &'p RefCell<PoolAllocator<T, N, B>>);

impl<'p, T, const N: usize, B: Backing> Reclaim<T> for PoolReclaim<'p, T, N, B> {
    unsafe fn reclaim(&mut self, ptr: NonNull<T>) {
        self.0.borrow_mut().free(ptr);
    }
}
