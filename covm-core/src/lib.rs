//! Memory substrate for a stack-machine interpreter.
//!
//! A bounded evaluation stack, a pooled object allocator, a parent-linked
//! binary tree for syntax and object trees, and a scoped collector that
//! cleans up objects abandoned halfway through construction.
//!
//! Nothing here is synchronized; use one instance per execution context.

pub mod collector;
pub mod error;
pub mod pool;
pub mod stack;
pub mod tree;

pub use collector::DeferredCollector;
pub use pool::PoolAllocator;
pub use stack::BoundedStack;
pub use tree::{LinkedBinaryTree, NodeRef};

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use crate::{
        collector::PoolReclaim, error::StackError, BoundedStack, DeferredCollector,
        LinkedBinaryTree, PoolAllocator,
    };

    #[derive(Clone, Debug, PartialEq)]
    enum Term {
        Num(i64),
        Add,
        Mul,
    }

    /// Post-order evaluation of an expression tree on the bounded stack.
    fn eval<const N: usize>(
        tree: &LinkedBinaryTree<Term>,
        stack: &mut BoundedStack<i64, N>,
    ) -> Result<i64, StackError> {
        fn walk<const N: usize>(
            tree: &LinkedBinaryTree<Term>,
            it: crate::NodeRef,
            stack: &mut BoundedStack<i64, N>,
        ) -> Result<(), StackError> {
            if !it.usable() {
                return Ok(());
            }
            walk(tree, tree.left(it).unwrap(), stack)?;
            walk(tree, tree.right(it).unwrap(), stack)?;
            match tree.data(it).unwrap() {
                Term::Num(n) => stack.push(*n),
                Term::Add => {
                    let rhs = stack.pop()?;
                    *stack.top()? += rhs;
                    Ok(())
                }
                Term::Mul => {
                    let rhs = stack.pop()?;
                    *stack.top()? *= rhs;
                    Ok(())
                }
            }
        }
        walk(tree, tree.root(), stack)?;
        stack.pop()
    }

    #[test]
    fn evaluates_expression_tree() {
        // (2 + 3) * 4
        let mut tree = LinkedBinaryTree::new();
        let mul = tree.insert_root_left(tree.root(), Term::Mul).unwrap();
        tree.insert_right_right(mul, Term::Num(4)).unwrap();
        let add = tree.insert_left_left(mul, Term::Add).unwrap();
        tree.insert_left_left(add, Term::Num(2)).unwrap();
        tree.insert_right_right(add, Term::Num(3)).unwrap();

        let mut stack: BoundedStack<i64, 4> = BoundedStack::new();
        assert_eq!(eval(&tree, &mut stack), Ok(20));
        assert!(stack.empty());

        // rewrite 2 + 3 into its folded value
        let mut folded = LinkedBinaryTree::new();
        folded.insert_root_left(folded.root(), Term::Num(5)).unwrap();
        tree.merge(add, &folded).unwrap();
        assert_eq!(eval(&tree, &mut stack), Ok(20));
        assert_eq!(tree.len(), 3);

        let mut tiny: BoundedStack<i64, 1> = BoundedStack::new();
        assert_eq!(eval(&tree, &mut tiny), Err(StackError::Overflow { capacity: 1 }));
    }

    #[test]
    fn pooled_terms_survive_only_when_claimed() {
        let pool: RefCell<PoolAllocator<Term, 4>> = RefCell::new(PoolAllocator::new().unwrap());
        let claimed;
        {
            let mut gc = DeferredCollector::with_reclaim(PoolReclaim(&pool));
            let a = pool.borrow_mut().alloc(Term::Num(1)).unwrap();
            unsafe { gc.add(a) }.unwrap();
            let b = pool.borrow_mut().alloc(Term::Add).unwrap();
            unsafe { gc.add(b) }.unwrap();
            gc.remove(b).unwrap();
            claimed = b;
        }
        assert_eq!(unsafe { claimed.as_ref() }, &Term::Add);
        unsafe { pool.borrow_mut().free(claimed) };
        assert_eq!(pool.borrow().pooled(), 2);
    }
}
