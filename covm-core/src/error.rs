use thiserror::Error;

/// An error raised by a [BoundedStack](crate::stack::BoundedStack).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// Returned when pushing onto a full stack.
    #[error("stack overflow: capacity of {capacity} elements exceeded")]
    Overflow { capacity: usize },

    /// Returned when reading or popping an empty stack.
    #[error("stack is empty")]
    Empty,
}

/// An error raised by a [LinkedBinaryTree](crate::tree::LinkedBinaryTree) handle operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    /// Returned when a handle denotes no node.
    #[error("null node: handle is not usable")]
    NullNode,

    /// Returned when the node behind a handle was already erased.
    #[error("stale node: handle outlived its node")]
    StaleNode,

    /// Returned when a handle was issued by another tree.
    #[error("handle belongs to tree {found}, not tree {expected}")]
    ForeignNode { expected: u32, found: u32 },
}

/// Backing storage could not be obtained.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationError {
    #[error("No memory available for allocation of {size} bytes (align {align})")]
    NoMemory { size: usize, align: usize },
}

/// An error raised when registering pointers with a
/// [DeferredCollector](crate::collector::DeferredCollector).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorError {
    /// Returned when releasing a pointer that was never added.
    #[error("pointer is not tracked by this collector")]
    NotTracked,

    /// Returned when adding a pointer that is already pending.
    #[error("pointer is already tracked by this collector")]
    AlreadyTracked,

    /// Returned when releasing a pointer twice.
    #[error("pointer was already released")]
    AlreadyReleased,
}

pub type StackResult<T> = std::result::Result<T, StackError>;

pub type TreeResult<T> = std::result::Result<T, TreeError>;

pub type AllocResult<T> = std::result::Result<T, AllocationError>;

pub type CollectorResult<T> = std::result::Result<T, CollectorError>;
