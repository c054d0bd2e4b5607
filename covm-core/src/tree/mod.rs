use std::sync::atomic::{AtomicU32, Ordering};

use log::trace;
use slotmap::SlotMap;

use crate::error::{TreeError, TreeResult};

pub use self::{
    iter::Preorder,
    node::{NodeKey, NodeRef},
};
use self::node::{Node, Side, Slot};

mod iter;
mod node;

/// Binary tree with parent back-links, shaped entirely by its caller.
///
/// Nodes live in a generational arena owned by the tree. Child links own
/// their subtree; the parent link is only used to find a node's slot in
/// O(1) when it is spliced, reserved or merged over.
pub struct LinkedBinaryTree<T> {
    nodes: SlotMap<NodeKey, Node<T>>,
    root: Option<NodeKey>,
    id: u32,
}

fn next_tree_id() -> u32 {
    static TREE_ID: AtomicU32 = AtomicU32::new(1);
    TREE_ID.fetch_add(1, Ordering::Relaxed)
}

impl<T> LinkedBinaryTree<T> {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
            id: next_tree_id(),
        }
    }

    pub fn empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    /// Exchange contents with `other`. Handles follow their nodes.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    pub fn root(&self) -> NodeRef {
        self.handle(self.root)
    }

    fn handle(&self, key: Option<NodeKey>) -> NodeRef {
        NodeRef { key, tree: self.id }
    }

    fn resolve(&self, it: NodeRef) -> TreeResult<NodeKey> {
        let key = it.key.ok_or(TreeError::NullNode)?;
        if it.tree != self.id {
            return Err(TreeError::ForeignNode {
                expected: self.id,
                found: it.tree,
            });
        }
        if !self.nodes.contains_key(key) {
            return Err(TreeError::StaleNode);
        }
        Ok(key)
    }

    pub fn data(&self, it: NodeRef) -> TreeResult<&T> {
        let key = self.resolve(it)?;
        Ok(&self.nodes[key].data)
    }

    pub fn data_mut(&mut self, it: NodeRef) -> TreeResult<&mut T> {
        let key = self.resolve(it)?;
        Ok(&mut self.nodes[key].data)
    }

    /// The node above `it`; null for the root.
    pub fn parent(&self, it: NodeRef) -> TreeResult<NodeRef> {
        let key = self.resolve(it)?;
        Ok(self.handle(self.nodes[key].parent))
    }

    pub fn left(&self, it: NodeRef) -> TreeResult<NodeRef> {
        let key = self.resolve(it)?;
        Ok(self.handle(self.nodes[key].left))
    }

    pub fn right(&self, it: NodeRef) -> TreeResult<NodeRef> {
        let key = self.resolve(it)?;
        Ok(self.handle(self.nodes[key].right))
    }

    pub fn is_root(&self, it: NodeRef) -> TreeResult<bool> {
        let key = self.resolve(it)?;
        Ok(self.root == Some(key))
    }

    /// Payloads in pre-order.
    pub fn iter(&self) -> Preorder<'_, T> {
        Preorder {
            nodes: &self.nodes,
            pending: self.root.into_iter().collect(),
        }
    }

    fn slot_of(&self, key: NodeKey) -> Slot {
        match self.nodes[key].parent {
            None => Slot::Root,
            Some(parent) if self.nodes[parent].left == Some(key) => Slot::Child(parent, Side::Left),
            Some(parent) => Slot::Child(parent, Side::Right),
        }
    }

    fn set_child(&mut self, parent: NodeKey, side: Side, child: Option<NodeKey>) {
        *self.nodes[parent].child_mut(side) = child;
        if let Some(child) = child {
            self.nodes[child].parent = Some(parent);
        }
    }

    fn take_child(&mut self, parent: NodeKey, side: Side) -> Option<NodeKey> {
        self.nodes[parent].child_mut(side).take()
    }

    fn set_slot(&mut self, slot: Slot, subtree: Option<NodeKey>) {
        match slot {
            Slot::Root => {
                self.root = subtree;
                if let Some(subtree) = subtree {
                    self.nodes[subtree].parent = None;
                }
            }
            Slot::Child(parent, side) => self.set_child(parent, side, subtree),
        }
    }

    /// Free `key` and everything below it. The caller unlinks it first.
    fn destroy(&mut self, key: NodeKey) {
        let mut pending = vec![key];
        while let Some(key) = pending.pop() {
            if let Some(node) = self.nodes.remove(key) {
                pending.extend(node.left);
                pending.extend(node.right);
            }
        }
    }

    fn splice_above<F: FnOnce() -> T>(
        &mut self,
        it: NodeRef,
        keep: Side,
        f: F,
    ) -> TreeResult<NodeRef> {
        if !it.usable() && self.root.is_none() {
            let node = self.nodes.insert(Node::new(None, f()));
            self.root = Some(node);
            return Ok(self.handle(Some(node)));
        }
        let key = self.resolve(it)?;
        let slot = self.slot_of(key);
        let node = self.nodes.insert(Node::new(None, f()));
        self.set_slot(slot, Some(node));
        self.set_child(node, keep, Some(key));
        trace!("tree {}: spliced node above {:?}", self.id, key);
        Ok(self.handle(Some(node)))
    }

    fn splice_below<F: FnOnce() -> T>(
        &mut self,
        it: NodeRef,
        at: Side,
        keep: Side,
        f: F,
    ) -> TreeResult<NodeRef> {
        let key = self.resolve(it)?;
        let node = self.nodes.insert(Node::new(Some(key), f()));
        let displaced = self.take_child(key, at);
        self.set_child(node, keep, displaced);
        self.set_child(key, at, Some(node));
        Ok(self.handle(Some(node)))
    }

    /// Insert `value` above `it`, which becomes the new node's left child.
    ///
    /// On the root (or on an empty tree, with a null handle) this creates a
    /// new root. Otherwise the new node takes `it`'s place under its parent.
    pub fn insert_root_left(&mut self, it: NodeRef, value: T) -> TreeResult<NodeRef> {
        self.splice_above(it, Side::Left, || value)
    }

    /// Insert `value` above `it`, which becomes the new node's right child.
    pub fn insert_root_right(&mut self, it: NodeRef, value: T) -> TreeResult<NodeRef> {
        self.splice_above(it, Side::Right, || value)
    }

    /// Insert `value` as `it`'s left child; the previous left child moves to the new node's left.
    pub fn insert_left_left(&mut self, it: NodeRef, value: T) -> TreeResult<NodeRef> {
        self.splice_below(it, Side::Left, Side::Left, || value)
    }

    /// Insert `value` as `it`'s left child; the previous left child moves to the new node's right.
    pub fn insert_left_right(&mut self, it: NodeRef, value: T) -> TreeResult<NodeRef> {
        self.splice_below(it, Side::Left, Side::Right, || value)
    }

    /// Insert `value` as `it`'s right child; the previous right child moves to the new node's left.
    pub fn insert_right_left(&mut self, it: NodeRef, value: T) -> TreeResult<NodeRef> {
        self.splice_below(it, Side::Right, Side::Left, || value)
    }

    /// Insert `value` as `it`'s right child; the previous right child moves to the new
    /// node's right.
    pub fn insert_right_right(&mut self, it: NodeRef, value: T) -> TreeResult<NodeRef> {
        self.splice_below(it, Side::Right, Side::Right, || value)
    }

    // The emplace family builds the payload only once `it` has been checked.

    pub fn emplace_root_left<F: FnOnce() -> T>(
        &mut self,
        it: NodeRef,
        f: F,
    ) -> TreeResult<NodeRef> {
        self.splice_above(it, Side::Left, f)
    }

    pub fn emplace_root_right<F: FnOnce() -> T>(
        &mut self,
        it: NodeRef,
        f: F,
    ) -> TreeResult<NodeRef> {
        self.splice_above(it, Side::Right, f)
    }

    pub fn emplace_left_left<F: FnOnce() -> T>(
        &mut self,
        it: NodeRef,
        f: F,
    ) -> TreeResult<NodeRef> {
        self.splice_below(it, Side::Left, Side::Left, f)
    }

    pub fn emplace_left_right<F: FnOnce() -> T>(
        &mut self,
        it: NodeRef,
        f: F,
    ) -> TreeResult<NodeRef> {
        self.splice_below(it, Side::Left, Side::Right, f)
    }

    pub fn emplace_right_left<F: FnOnce() -> T>(
        &mut self,
        it: NodeRef,
        f: F,
    ) -> TreeResult<NodeRef> {
        self.splice_below(it, Side::Right, Side::Left, f)
    }

    pub fn emplace_right_right<F: FnOnce() -> T>(
        &mut self,
        it: NodeRef,
        f: F,
    ) -> TreeResult<NodeRef> {
        self.splice_below(it, Side::Right, Side::Right, f)
    }

    /// Destroy `it` and its subtree, returning its former parent.
    ///
    /// Erasing the root empties the tree and returns a null handle.
    pub fn erase(&mut self, it: NodeRef) -> TreeResult<NodeRef> {
        let key = self.resolve(it)?;
        match self.slot_of(key) {
            Slot::Root => {
                self.clear();
                Ok(self.handle(None))
            }
            slot @ Slot::Child(parent, _) => {
                self.set_slot(slot, None);
                self.destroy(key);
                Ok(self.handle(Some(parent)))
            }
        }
    }

    fn erase_child(&mut self, it: NodeRef, side: Side) -> TreeResult<NodeRef> {
        let key = self.resolve(it)?;
        if let Some(child) = self.take_child(key, side) {
            self.destroy(child);
        }
        Ok(self.handle(Some(key)))
    }

    /// Destroy the left subtree of `it`.
    pub fn erase_left(&mut self, it: NodeRef) -> TreeResult<NodeRef> {
        self.erase_child(it, Side::Left)
    }

    /// Destroy the right subtree of `it`.
    pub fn erase_right(&mut self, it: NodeRef) -> TreeResult<NodeRef> {
        self.erase_child(it, Side::Right)
    }

    fn reserve(&mut self, it: NodeRef, side: Side) -> TreeResult<NodeRef> {
        let key = self.resolve(it)?;
        let slot = self.slot_of(key);
        let kept = self.take_child(key, side);
        self.set_slot(slot, kept);
        self.destroy(key);
        Ok(self.handle(kept))
    }

    /// Remove `it`, moving its left subtree into its place.
    ///
    /// The right subtree of `it` has nowhere to go and is destroyed with it.
    /// Returns the promoted child (null if `it` had no left child).
    pub fn reserve_left(&mut self, it: NodeRef) -> TreeResult<NodeRef> {
        self.reserve(it, Side::Left)
    }

    /// Remove `it`, moving its right subtree into its place.
    pub fn reserve_right(&mut self, it: NodeRef) -> TreeResult<NodeRef> {
        self.reserve(it, Side::Right)
    }
}

impl<T: Clone> LinkedBinaryTree<T> {
    /// Deep-copy the subtree at `from` into `nodes`, hanging it under `parent`.
    fn copy_into(
        src: &SlotMap<NodeKey, Node<T>>,
        from: NodeKey,
        dst: &mut SlotMap<NodeKey, Node<T>>,
        parent: Option<NodeKey>,
    ) -> NodeKey {
        let top = dst.insert(Node::new(parent, src[from].data.clone()));
        let mut pending = vec![(from, top)];
        while let Some((from, to)) = pending.pop() {
            for side in [Side::Left, Side::Right] {
                if let Some(child) = src[from].child(side) {
                    let copy = dst.insert(Node::new(Some(to), src[child].data.clone()));
                    *dst[to].child_mut(side) = Some(copy);
                    pending.push((child, copy));
                }
            }
        }
        top
    }

    /// Copy the subtree rooted at `it` into a new tree.
    pub fn from_subtree(tree: &Self, it: NodeRef) -> TreeResult<Self> {
        let key = tree.resolve(it)?;
        let mut this = Self::new();
        this.root = Some(Self::copy_into(&tree.nodes, key, &mut this.nodes, None));
        Ok(this)
    }

    /// Replace the contents of this tree with a deep copy of `other`.
    pub fn assign(&mut self, other: &Self) {
        self.clear();
        self.root = other
            .root
            .map(|root| Self::copy_into(&other.nodes, root, &mut self.nodes, None));
    }

    /// Replace `it` and its subtree with a copy of `other`.
    ///
    /// The copy hangs exactly where `it` did. `other` is left untouched.
    /// Returns the root of the grafted copy (null if `other` is empty).
    pub fn merge(&mut self, it: NodeRef, other: &Self) -> TreeResult<NodeRef> {
        let key = self.resolve(it)?;
        let slot = self.slot_of(key);
        let graft = other
            .root
            .map(|root| Self::copy_into(&other.nodes, root, &mut self.nodes, None));
        self.set_slot(slot, graft);
        self.destroy(key);
        trace!("tree {}: merged {} nodes from tree {}", self.id, other.len(), other.id);
        Ok(self.handle(graft))
    }
}

impl<T> Default for LinkedBinaryTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for LinkedBinaryTree<T> {
    fn clone(&self) -> Self {
        let mut this = Self::new();
        this.assign(self);
        this
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl<'a, T> IntoIterator for &'a LinkedBinaryTree<T> {
    type Item = &'a T;
    type IntoIter = Preorder<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for LinkedBinaryTree<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedBinaryTree")
            .field("id", &self.id)
            .field("preorder", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}
