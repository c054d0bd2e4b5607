use slotmap::new_key_type;

new_key_type! {
    /// Generational index of a node inside a tree's arena.
    pub struct NodeKey;
}

static_assertions::assert_eq_size!(Option<NodeKey>, NodeKey);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Side {
    Left,
    Right,
}

/// Where a node hangs: the root slot or a child slot of its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Slot {
    Root,
    Child(NodeKey, Side),
}

pub(super) struct Node<T> {
    /// Back-link for navigation only, never followed for destruction.
    pub parent: Option<NodeKey>,
    pub left: Option<NodeKey>,
    pub right: Option<NodeKey>,
    pub data: T,
}

impl<T> Node<T> {
    pub fn new(parent: Option<NodeKey>, data: T) -> Self {
        Self {
            parent,
            left: None,
            right: None,
            data,
        }
    }

    pub fn child(&self, side: Side) -> Option<NodeKey> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn child_mut(&mut self, side: Side) -> &mut Option<NodeKey> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

/// Handle to a node of a [LinkedBinaryTree](super::LinkedBinaryTree), or to no node.
///
/// Handles are plain values. They stay valid until their node is erased;
/// using one afterwards is reported as [StaleNode](crate::error::TreeError::StaleNode).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub(super) key: Option<NodeKey>,
    pub(super) tree: u32,
}

impl NodeRef {
    /// A handle that denotes no node.
    pub const fn null() -> Self {
        Self { key: None, tree: 0 }
    }

    pub fn usable(&self) -> bool {
        self.key.is_some()
    }
}

impl Default for NodeRef {
    fn default() -> Self {
        Self::null()
    }
}
