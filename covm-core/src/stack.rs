use std::{fmt::Debug, iter::Rev, mem::MaybeUninit, slice};

use crate::error::{StackError, StackResult};

/// Capacity used when none is given: the deepest expected evaluation.
pub const DEFAULT_STACK_CAPACITY: usize = 1024;

/// Fixed-capacity evaluation stack.
///
/// Elements are written in place into inline storage, so a push never
/// allocates. Slots `[0, len)` are initialized; the rest is raw storage.
/// Running out of room is an error, the stack never grows.
pub struct BoundedStack<T, const N: usize = DEFAULT_STACK_CAPACITY> {
    data: [MaybeUninit<T>; N],
    len: usize,
}

static_assertions::assert_not_impl_any!(BoundedStack<u8, 4>: Clone, Copy);

impl<T, const N: usize> BoundedStack<T, N> {
    pub const fn new() -> Self {
        Self {
            data: [const { MaybeUninit::uninit() }; N],
            len: 0,
        }
    }

    pub fn empty(&self) -> bool {
        self.len == 0
    }

    pub fn size(&self) -> usize {
        self.len
    }

    pub fn full(&self) -> bool {
        self.len == N
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Push `value` on top of the stack.
    pub fn push(&mut self, value: T) -> StackResult<()> {
        self.push_with(|| value).map(|_| ())
    }

    /// Construct the new top element from `f`.
    ///
    /// `f` is only called when there is room for its result.
    pub fn push_with<F: FnOnce() -> T>(&mut self, f: F) -> StackResult<&mut T> {
        if self.full() {
            return Err(StackError::Overflow { capacity: N });
        }
        let idx = self.len;
        self.data[idx].write(f());
        self.len += 1;
        Ok(unsafe { self.data[idx].assume_init_mut() })
    }

    /// Move the top element out of the stack.
    pub fn pop(&mut self) -> StackResult<T> {
        if self.empty() {
            return Err(StackError::Empty);
        }
        self.len -= 1;
        Ok(unsafe { self.data[self.len].assume_init_read() })
    }

    /// Drop the top element in place.
    pub fn pop_no_return(&mut self) -> StackResult<()> {
        if self.empty() {
            return Err(StackError::Empty);
        }
        self.len -= 1;
        unsafe { self.data[self.len].assume_init_drop() };
        Ok(())
    }

    pub fn top(&mut self) -> StackResult<&mut T> {
        if self.empty() {
            return Err(StackError::Empty);
        }
        Ok(unsafe { self.data[self.len - 1].assume_init_mut() })
    }

    pub fn peek(&self) -> StackResult<&T> {
        if self.empty() {
            return Err(StackError::Empty);
        }
        Ok(unsafe { self.data[self.len - 1].assume_init_ref() })
    }

    /// Drop every element, top first.
    pub fn clear(&mut self) {
        while self.len > 0 {
            self.len -= 1;
            unsafe { self.data[self.len].assume_init_drop() };
        }
    }

    /// Iterate from the top of the stack down to the base.
    pub fn iter(&self) -> Rev<slice::Iter<'_, T>> {
        self.live().iter().rev()
    }

    /// Iterate mutably from the top of the stack down to the base.
    pub fn iter_mut(&mut self) -> Rev<slice::IterMut<'_, T>> {
        self.live_mut().iter_mut().rev()
    }

    fn live(&self) -> &[T] {
        unsafe { slice::from_raw_parts(self.data.as_ptr() as *const T, self.len) }
    }

    fn live_mut(&mut self) -> &mut [T] {
        unsafe { slice::from_raw_parts_mut(self.data.as_mut_ptr() as *mut T, self.len) }
    }
}

impl<T, const N: usize> Default for BoundedStack<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for BoundedStack<T, N> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: Debug, const N: usize> Debug for BoundedStack<T, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a BoundedStack<T, N> {
    type Item = &'a T;
    type IntoIter = Rev<slice::Iter<'a, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a mut BoundedStack<T, N> {
    type Item = &'a mut T;
    type IntoIter = Rev<slice::IterMut<'a, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::BoundedStack;
    use crate::error::StackError;

    struct Noisy(u32, Rc<RefCell<Vec<u32>>>);

    impl Drop for Noisy {
        fn drop(&mut self) {
            self.1.borrow_mut().push(self.0);
        }
    }

    #[test]
    fn lifo_order() {
        let mut stack: BoundedStack<i32, 8> = BoundedStack::new();
        for v in 1..=8 {
            stack.push(v).unwrap();
        }
        let popped: Vec<i32> = (0..8).map(|_| stack.pop().unwrap()).collect();
        assert_eq!(popped, vec![8, 7, 6, 5, 4, 3, 2, 1]);
        assert!(stack.empty());
    }

    #[test]
    fn overflow_and_underflow() {
        let mut stack: BoundedStack<u8, 3> = BoundedStack::new();
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        stack.push(3).unwrap();
        assert!(stack.full());
        assert_eq!(stack.push(4), Err(StackError::Overflow { capacity: 3 }));
        assert_eq!(stack.size(), 3);

        stack.clear();
        assert_eq!(stack.pop(), Err(StackError::Empty));
        assert_eq!(stack.pop_no_return(), Err(StackError::Empty));
        assert_eq!(stack.top().err(), Some(StackError::Empty));
        assert_eq!(stack.peek().err(), Some(StackError::Empty));
    }

    #[test]
    fn push_with_skips_constructor_when_full() {
        let mut stack: BoundedStack<String, 1> = BoundedStack::new();
        stack.push_with(|| "a".to_string()).unwrap().push('b');
        let mut called = false;
        let res = stack.push_with(|| {
            called = true;
            String::new()
        });
        assert!(res.is_err());
        assert!(!called);
        assert_eq!(stack.peek().unwrap(), "ab");
    }

    #[test]
    fn top_is_mutable() {
        let mut stack: BoundedStack<Vec<u8>, 4> = BoundedStack::new();
        stack.push(vec![1]).unwrap();
        stack.top().unwrap().push(2);
        assert_eq!(stack.pop().unwrap(), vec![1, 2]);
    }

    #[test]
    fn iterates_top_to_base() {
        let mut stack: BoundedStack<i32, 4> = BoundedStack::new();
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        stack.push(3).unwrap();
        assert_eq!(stack.iter().copied().collect::<Vec<_>>(), vec![3, 2, 1]);

        for v in &mut stack {
            *v *= 10;
        }
        assert_eq!(format!("{:?}", stack), "[30, 20, 10]");
    }

    #[test]
    fn drops_in_place() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stack: BoundedStack<Noisy, 4> = BoundedStack::new();
        for i in 0..4 {
            stack.push(Noisy(i, log.clone())).unwrap();
        }

        stack.pop_no_return().unwrap();
        assert_eq!(*log.borrow(), vec![3]);

        let popped = stack.pop().unwrap();
        assert_eq!(popped.0, 2);
        assert_eq!(*log.borrow(), vec![3]);
        drop(popped);

        let moved = stack;
        drop(moved);
        assert_eq!(*log.borrow(), vec![3, 2, 1, 0]);
    }
}
