use std::cell::RefCell;

use covm_core::{
    collector::PoolReclaim,
    error::{StackError, TreeError},
    BoundedStack, DeferredCollector, LinkedBinaryTree, NodeRef, PoolAllocator,
};
use log::{error, info};
use thiserror::Error;

#[derive(Clone, Debug)]
enum Term {
    Num(i64),
    Add,
    Sub,
    Mul,
}

#[derive(Error, Debug)]
enum SessionError {
    #[error(transparent)]
    Stack(#[from] StackError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Allocation(#[from] covm_core::error::AllocationError),
    #[error(transparent)]
    Collector(#[from] covm_core::error::CollectorError),
}

type SessionResult<T> = std::result::Result<T, SessionError>;

fn eval(
    tree: &LinkedBinaryTree<Term>,
    it: NodeRef,
    stack: &mut BoundedStack<i64>,
) -> SessionResult<()> {
    if !it.usable() {
        return Ok(());
    }
    eval(tree, tree.left(it)?, stack)?;
    eval(tree, tree.right(it)?, stack)?;
    let apply: fn(i64, i64) -> i64 = match tree.data(it)? {
        Term::Num(n) => return Ok(stack.push(*n)?),
        Term::Add => |l, r| l + r,
        Term::Sub => |l, r| l - r,
        Term::Mul => |l, r| l * r,
    };
    let rhs = stack.pop()?;
    let lhs = stack.top()?;
    *lhs = apply(*lhs, rhs);
    Ok(())
}

/// Build `(a - b) * (a + b)`, staging the leaves in the pool until the tree owns them.
fn build(
    pool: &RefCell<PoolAllocator<Term>>,
    a: i64,
    b: i64,
) -> SessionResult<LinkedBinaryTree<Term>> {
    let mut gc = DeferredCollector::with_reclaim(PoolReclaim(pool));
    let mut leaves = Vec::new();
    for n in [a, b, a, b] {
        let leaf = pool.borrow_mut().alloc(Term::Num(n))?;
        unsafe { gc.add(leaf)? };
        leaves.push(leaf);
    }

    let mut tree = LinkedBinaryTree::new();
    let mul = tree.insert_root_left(tree.root(), Term::Mul)?;
    let sub = tree.insert_left_left(mul, Term::Sub)?;
    let add = tree.insert_right_right(mul, Term::Add)?;
    for (parent, pair) in [(sub, &leaves[0..2]), (add, &leaves[2..4])] {
        let (l, r) = (pair[0], pair[1]);
        tree.insert_left_left(parent, unsafe { l.as_ref() }.clone())?;
        tree.insert_right_right(parent, unsafe { r.as_ref() }.clone())?;
    }

    for leaf in leaves {
        gc.remove(leaf)?;
        unsafe { pool.borrow_mut().free(leaf) };
    }
    Ok(tree)
}

fn run() -> SessionResult<()> {
    let pool = RefCell::new(PoolAllocator::<Term>::new()?);
    let mut stack: BoundedStack<i64> = BoundedStack::new();

    let tree = build(&pool, 7, 3)?;
    eval(&tree, tree.root(), &mut stack)?;
    info!("(7 - 3) * (7 + 3) = {}", stack.pop()?);

    let mut folded = tree.clone();
    let lhs = folded.left(folded.root())?;
    let mut four = LinkedBinaryTree::new();
    four.insert_root_left(four.root(), Term::Num(4))?;
    folded.merge(lhs, &four)?;
    eval(&folded, folded.root(), &mut stack)?;
    info!(
        "after folding the left operand: {} ({} nodes, original still {} nodes)",
        stack.pop()?,
        folded.len(),
        tree.len()
    );
    info!("{} slots pooled", pool.borrow().pooled());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        error!("session failed: {}", e);
        std::process::exit(1);
    }
}
