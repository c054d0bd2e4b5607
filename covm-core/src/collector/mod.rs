use std::{mem, ptr::NonNull};

use fnv::FnvHashSet;
use log::debug;

use crate::error::{CollectorError, CollectorResult};

pub use self::reclaim::{BoxReclaim, PoolReclaim, Reclaim};

mod reclaim;

/// Scope guard for objects whose ownership has not been handed off yet.
///
/// Every pointer registered with [add](Self::add) is destroyed when the
/// collector is dropped, unless it was withdrawn with [remove](Self::remove)
/// first. This is how multi-step construction stays leak-free when a step
/// fails: register each object as it is built, withdraw them all once the
/// result has an owner, and let an early return sweep the rest.
///
/// There is no reachability analysis. The collector never owns anything
/// until its own drop.
///
/// Zero-sized objects all share one address, so they are counted instead of
/// watched: `remove` releases any one of them.
pub struct DeferredCollector<T, R: Reclaim<T> = BoxReclaim> {
    /// Registration order, oldest first.
    tracked: Vec<NonNull<T>>,
    watched: FnvHashSet<NonNull<T>>,
    released: FnvHashSet<NonNull<T>>,
    zst_pending: usize,
    zst_released: usize,
    reclaim: R,
}

static_assertions::assert_not_impl_any!(DeferredCollector<u8>: Clone, Send, Sync);

impl<T> DeferredCollector<T> {
    pub fn new() -> Self {
        Self::with_reclaim(BoxReclaim)
    }

    /// Box `value` and register it.
    pub fn track(&mut self, value: T) -> CollectorResult<NonNull<T>> {
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        if let Err(e) = unsafe { self.add(ptr) } {
            unsafe { BoxReclaim.reclaim(ptr) };
            return Err(e);
        }
        Ok(ptr)
    }
}

impl<T> Default for DeferredCollector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R: Reclaim<T>> DeferredCollector<T, R> {
    pub fn with_reclaim(reclaim: R) -> Self {
        Self {
            tracked: Vec::new(),
            watched: FnvHashSet::default(),
            released: FnvHashSet::default(),
            zst_pending: 0,
            zst_released: 0,
            reclaim,
        }
    }

    fn zero_sized() -> bool {
        mem::size_of::<T>() == 0
    }

    /// Start watching `ptr`.
    ///
    /// Adding a pointer that was released re-arms it: its storage has been
    /// reused for a new object.
    ///
    /// # Safety
    /// `ptr` must be a live object that `R` can reclaim, and must stay live
    /// until it is removed or the collector is dropped.
    pub unsafe fn add(&mut self, ptr: NonNull<T>) -> CollectorResult<()> {
        if Self::zero_sized() {
            self.zst_pending += 1;
            return Ok(());
        }
        if self.released.remove(&ptr) {
            return Ok(());
        }
        if !self.watched.insert(ptr) {
            return Err(CollectorError::AlreadyTracked);
        }
        self.tracked.push(ptr);
        Ok(())
    }

    /// Withdraw the collector's claim on `ptr`. Nothing is destroyed.
    pub fn remove(&mut self, ptr: NonNull<T>) -> CollectorResult<()> {
        if Self::zero_sized() {
            if self.zst_pending == 0 {
                return Err(CollectorError::NotTracked);
            }
            self.zst_pending -= 1;
            self.zst_released += 1;
            return Ok(());
        }
        if !self.watched.contains(&ptr) {
            return Err(CollectorError::NotTracked);
        }
        if !self.released.insert(ptr) {
            return Err(CollectorError::AlreadyReleased);
        }
        Ok(())
    }

    /// Would `ptr` be destroyed if the collector were dropped now?
    pub fn is_pending(&self, ptr: NonNull<T>) -> bool {
        if Self::zero_sized() {
            return self.zst_pending > 0;
        }
        self.watched.contains(&ptr) && !self.released.contains(&ptr)
    }

    /// Number of objects that will be destroyed on drop.
    pub fn pending(&self) -> usize {
        self.watched.len() - self.released.len() + self.zst_pending
    }

    /// Number of objects whose ownership was handed off.
    pub fn released(&self) -> usize {
        self.released.len() + self.zst_released
    }
}

impl<T, R: Reclaim<T>> Drop for DeferredCollector<T, R> {
    fn drop(&mut self) {
        let tracked = self.tracked.len() + self.zst_pending + self.zst_released;
        if tracked == 0 {
            return;
        }
        debug!("sweeping {} unclaimed of {} tracked objects", self.pending(), tracked);
        for _ in 0..mem::take(&mut self.zst_pending) {
            unsafe { self.reclaim.reclaim(NonNull::dangling()) };
        }
        // newest first
        while let Some(ptr) = self.tracked.pop() {
            if !self.released.contains(&ptr) {
                unsafe { self.reclaim.reclaim(ptr) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        ptr::NonNull,
        rc::Rc,
    };

    use super::{DeferredCollector, PoolReclaim};
    use crate::{
        error::CollectorError,
        pool::{tests::CountingBacking, PoolAllocator},
    };

    struct Counted(Rc<Cell<usize>>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn sweeps_only_unclaimed() {
        let (d1, d2, d3) = (
            Rc::new(Cell::new(0)),
            Rc::new(Cell::new(0)),
            Rc::new(Cell::new(0)),
        );
        let o2;
        {
            let mut gc = DeferredCollector::new();
            gc.track(Counted(d1.clone())).unwrap();
            o2 = gc.track(Counted(d2.clone())).unwrap();
            gc.track(Counted(d3.clone())).unwrap();
            assert_eq!(gc.pending(), 3);

            gc.remove(o2).unwrap();
            assert!(!gc.is_pending(o2));
            assert_eq!(gc.pending(), 2);
            assert_eq!(gc.released(), 1);
        }
        assert_eq!(d1.get(), 1);
        assert_eq!(d2.get(), 0);
        assert_eq!(d3.get(), 1);

        drop(unsafe { Box::from_raw(o2.as_ptr()) });
        assert_eq!(d2.get(), 1);
    }

    #[test]
    fn registration_errors() {
        let mut gc: DeferredCollector<u32> = DeferredCollector::new();
        let mut outside = 7u32;
        assert_eq!(gc.remove(NonNull::from(&mut outside)), Err(CollectorError::NotTracked));

        let p = gc.track(1).unwrap();
        assert_eq!(unsafe { gc.add(p) }, Err(CollectorError::AlreadyTracked));
        gc.remove(p).unwrap();
        assert_eq!(gc.remove(p), Err(CollectorError::AlreadyReleased));

        // storage handed back and reused for a new object
        assert_eq!(unsafe { gc.add(p) }, Ok(()));
        assert!(gc.is_pending(p));
        assert_eq!(gc.pending(), 1);
    }

    fn build_three(
        drops: &Rc<Cell<usize>>,
        fail_at: Option<usize>,
    ) -> Result<Vec<Box<Counted>>, String> {
        let mut gc = DeferredCollector::new();
        let mut built = Vec::new();
        for step in 0..3 {
            if fail_at == Some(step) {
                return Err(format!("step {} failed", step));
            }
            built.push(gc.track(Counted(drops.clone())).map_err(|e| e.to_string())?);
        }
        for &p in &built {
            gc.remove(p).map_err(|e| e.to_string())?;
        }
        Ok(built
            .into_iter()
            .map(|p| unsafe { Box::from_raw(p.as_ptr()) })
            .collect())
    }

    #[test]
    fn failed_construction_leaks_nothing() {
        let drops = Rc::new(Cell::new(0));
        assert!(build_three(&drops, Some(2)).is_err());
        assert_eq!(drops.get(), 2);

        let done = build_three(&drops, None).unwrap();
        assert_eq!(drops.get(), 2);
        drop(done);
        assert_eq!(drops.get(), 5);
    }

    #[test]
    fn returns_storage_to_pool() {
        let drops = Rc::new(Cell::new(0));
        let backing = CountingBacking::default();
        let pool: RefCell<PoolAllocator<Counted, 8, _>> =
            RefCell::new(PoolAllocator::with_backing(backing.clone()).unwrap());
        let before = pool.borrow().pooled();

        let kept;
        {
            let mut gc = DeferredCollector::with_reclaim(PoolReclaim(&pool));
            let mut ptrs = Vec::new();
            for _ in 0..3 {
                let p = pool.borrow_mut().alloc(Counted(drops.clone())).unwrap();
                unsafe { gc.add(p) }.unwrap();
                ptrs.push(p);
            }
            kept = ptrs[1];
            gc.remove(kept).unwrap();
        }
        assert_eq!(drops.get(), 2);
        assert_eq!(pool.borrow().pooled(), before - 1);

        unsafe { pool.borrow_mut().free(kept) };
        assert_eq!(drops.get(), 3);
        assert_eq!(pool.borrow().pooled(), before);
        assert_eq!(backing.allocations.get(), before);
    }

    thread_local! {
        static TOKEN_DROPS: Cell<usize> = Cell::new(0);
    }

    struct Token;

    impl Drop for Token {
        fn drop(&mut self) {
            TOKEN_DROPS.with(|d| d.set(d.get() + 1));
        }
    }

    #[test]
    fn zero_sized_objects_are_counted() {
        TOKEN_DROPS.with(|d| d.set(0));
        {
            let mut gc = DeferredCollector::new();
            let first = gc.track(Token).unwrap();
            let second = gc.track(Token).unwrap();
            assert_eq!(gc.pending(), 2);

            gc.remove(first).unwrap();
            assert_eq!(TOKEN_DROPS.with(Cell::get), 0);
            assert!(gc.is_pending(second));
            assert_eq!(gc.pending(), 1);
            assert_eq!(gc.released(), 1);

            gc.remove(second).unwrap();
            assert_eq!(gc.remove(second), Err(CollectorError::NotTracked));
            unsafe { gc.add(second) }.unwrap();
            assert_eq!(gc.pending(), 1);
        }
        assert_eq!(TOKEN_DROPS.with(Cell::get), 1);
    }

    #[test]
    fn zero_sized_pool_objects_are_counted() {
        TOKEN_DROPS.with(|d| d.set(0));
        let backing = CountingBacking::default();
        let pool: RefCell<PoolAllocator<Token, 4, _>> =
            RefCell::new(PoolAllocator::with_backing(backing.clone()).unwrap());
        {
            let mut gc = DeferredCollector::with_reclaim(PoolReclaim(&pool));
            for _ in 0..3 {
                let p = pool.borrow_mut().alloc(Token).unwrap();
                unsafe { gc.add(p) }.unwrap();
            }
            gc.remove(NonNull::dangling()).unwrap();
            assert_eq!(gc.pending(), 2);
        }
        assert_eq!(TOKEN_DROPS.with(Cell::get), 2);
        assert_eq!(backing.allocations.get(), 0);
    }
}
