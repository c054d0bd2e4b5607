use slotmap::SlotMap;

use super::node::{Node, NodeKey};

/// Pre-order walk over the payloads of a tree: node, left subtree, right subtree.
pub struct Preorder<'a, T> {
    pub(super) nodes: &'a SlotMap<NodeKey, Node<T>>,
    pub(super) pending: Vec<NodeKey>,
}

impl<'a, T> Iterator for Preorder<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.pending.pop()?;
        let node = self.nodes.get(key)?;
        self.pending.extend(node.right);
        self.pending.extend(node.left);
        Some(&node.data)
    }
}
