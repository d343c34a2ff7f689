//! Slot arena owning every node of one family tree.
//!
//! Nodes refer to each other through [`NodeId`] handles only; the arena is
//! the single owner. Freed slots are recycled through a free list and get a
//! new generation on reuse, so a stale handle never resolves to the node that
//! took its slot.

use crate::types::{Family, Node, NodeId};
use log::trace;
use std::mem;

struct Slot<D> {
    generation: u32,
    node: Option<Node<D>>,
}

// the root sits outside the slot vector and can never be freed
const ROOT_INDEX: u32 = u32::MAX;

pub struct Arena<D> {
    family: Family,
    root: Node<D>,
    slots: Vec<Slot<D>>,
    freelist: Vec<u32>,
    live: usize,
}

impl<D> Arena<D> {
    /// Arena owning `root`, which stays resident for the arena's lifetime.
    pub fn new(family: Family, mut root: Node<D>) -> Self {
        root.id = NodeId::new(family, ROOT_INDEX, 0);
        Self {
            family,
            root,
            slots: Vec::new(),
            freelist: Vec::new(),
            live: 0,
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root.id
    }

    pub fn root(&self) -> &Node<D> {
        &self.root
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.live + 1
    }

    /// Whether only the root is left.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Store `node` and stamp it with its handle.
    pub fn alloc(&mut self, mut node: Node<D>) -> NodeId {
        self.live += 1;
        // ① reuse a freed slot first
        if let Some(index) = self.freelist.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            let id = NodeId::new(self.family, index, slot.generation);
            trace!("[ALLOC] Reusing slot {} for {}", index, node.network);
            node.id = id;
            slot.node = Some(node);
            return id;
        }

        // ② bump allocation
        let index = self.slots.len() as u32;
        let id = NodeId::new(self.family, index, 1);
        node.id = id;
        self.slots.push(Slot {
            generation: 1,
            node: Some(node),
        });
        id
    }

    /// Take the node out of the arena; its slot goes to the free list.
    pub fn free(&mut self, id: NodeId) -> Option<Node<D>> {
        if id.family() != self.family || id == self.root.id {
            return None;
        }
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let node = slot.node.take()?;
        self.freelist.push(id.index());
        self.live -= 1;
        Some(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node<D>> {
        if id == self.root.id {
            return Some(&self.root);
        }
        if id.family() != self.family {
            return None;
        }
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<D>> {
        if id == self.root.id {
            return Some(&mut self.root);
        }
        if id.family() != self.family {
            return None;
        }
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.node.as_mut()
    }

    /// Link `child` under `parent`, keyed by the child's network.
    ///
    /// The caller guarantees the network is not already present.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        let network = match self.get_mut(child) {
            Some(node) => {
                node.parent = Some(parent);
                node.network
            }
            None => return,
        };
        if let Some(node) = self.get_mut(parent) {
            let prev = node.children.insert(network, child);
            debug_assert!(prev.is_none(), "duplicate child {network}");
        }
    }

    /// Collapse the subtree below `id` into `id`.
    ///
    /// Marks the node aggregated, discards every descendant and returns the
    /// former leaves as detached nodes (parent and children cleared), in
    /// network order. The node itself is not included. A node that is already
    /// aggregated yields nothing.
    pub fn aggregate(&mut self, id: NodeId) -> Vec<Node<D>> {
        let children = match self.get_mut(id) {
            Some(node) if !node.aggregated => {
                node.aggregated = true;
                mem::take(&mut node.children)
            }
            _ => return Vec::new(),
        };

        let mut removed = Vec::new();
        let mut stack: Vec<NodeId> = children.into_values().rev().collect();
        while let Some(child) = stack.pop() {
            let Some(mut node) = self.free(child) else {
                continue;
            };
            node.parent = None;
            if node.children.is_empty() {
                removed.push(node);
            } else {
                let grandchildren = mem::take(&mut node.children);
                stack.extend(grandchildren.into_values().rev());
            }
        }
        removed
    }

    /// Lazy, non-destructive walk over the current leaves below `id`.
    pub fn leaves(&self, id: NodeId) -> Leaves<'_, D> {
        Leaves {
            arena: self,
            stack: vec![id],
        }
    }

    /// Strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_, D> {
        Ancestors {
            arena: self,
            next: self.get(id).and_then(|n| n.parent),
        }
    }
}

/// Depth-first iterator over leaf nodes; see [`Arena::leaves`].
pub struct Leaves<'a, D> {
    arena: &'a Arena<D>,
    stack: Vec<NodeId>,
}

impl<'a, D> Clone for Leaves<'a, D> {
    fn clone(&self) -> Self {
        Self {
            arena: self.arena,
            stack: self.stack.clone(),
        }
    }
}

impl<'a, D> Iterator for Leaves<'a, D> {
    type Item = &'a Node<D>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let Some(node) = self.arena.get(id) else {
                continue;
            };
            if node.children.is_empty() {
                return Some(node);
            }
            self.stack.extend(node.children.values().rev().copied());
        }
        None
    }
}

pub struct Ancestors<'a, D> {
    arena: &'a Arena<D>,
    next: Option<NodeId>,
}

impl<'a, D> Iterator for Ancestors<'a, D> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.arena.get(id).and_then(|n| n.parent);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipnet::IpNet;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    fn leaf_networks(arena: &Arena<()>, id: NodeId) -> Vec<String> {
        arena.leaves(id).map(|n| n.network().to_string()).collect()
    }

    #[test]
    fn add_child_links_both_ways() {
        let mut arena = Arena::new(Family::V4, Node::new(net("0.0.0.0/0"), ()));
        let root = arena.root_id();
        let child = arena.alloc(Node::new(net("127.0.0.1/32"), ()));
        arena.add_child(root, child);

        let root_node = arena.get(root).unwrap();
        assert!(root_node.contains(&net("127.0.0.1/32")));
        assert!(!root_node.contains(&net("192.0.2.1/32")));
        assert_eq!(root_node.child(&net("127.0.0.1/32")).unwrap(), child);
        assert_eq!(arena.get(child).unwrap().parent(), Some(root));
    }

    #[test]
    fn leaves_is_restartable() {
        let mut arena = Arena::new(Family::V6, Node::new(net("::/0"), ()));
        let root = arena.root_id();
        let mid = arena.alloc(Node::new(net("2001:db8::/32"), ()));
        arena.add_child(root, mid);
        for s in ["2001:db8::2/128", "2001:db8::1/128"] {
            let leaf = arena.alloc(Node::new(net(s), ()));
            arena.add_child(mid, leaf);
        }

        let first = leaf_networks(&arena, root);
        let second = leaf_networks(&arena, root);
        assert_eq!(first, vec!["2001:db8::1/128", "2001:db8::2/128"]);
        assert_eq!(first, second);
        assert_eq!(arena.get(mid).unwrap().child_count(), 2);
    }

    #[test]
    fn childless_node_yields_itself() {
        let arena = Arena::new(Family::V6, Node::new(net("::/0"), ()));
        let root = arena.root_id();
        assert_eq!(leaf_networks(&arena, root), vec!["::/0"]);
    }

    #[test]
    fn aggregate_discards_subtree_and_returns_leaves() {
        let mut arena = Arena::new(Family::V4, Node::new(net("0.0.0.0/0"), ()));
        let root = arena.root_id();
        let a = arena.alloc(Node::new(net("10.0.0.0/16"), ()));
        let b = arena.alloc(Node::new(net("10.0.1.0/24"), ()));
        let c = arena.alloc(Node::new(net("10.0.1.1/32"), ()));
        let d = arena.alloc(Node::new(net("10.0.2.0/24"), ()));
        arena.add_child(root, a);
        arena.add_child(a, b);
        arena.add_child(b, c);
        arena.add_child(a, d);

        let removed = arena.aggregate(a);
        let names: Vec<String> = removed.iter().map(|n| n.network().to_string()).collect();
        assert_eq!(names, vec!["10.0.1.1/32", "10.0.2.0/24"]);
        assert!(removed.iter().all(|n| n.parent().is_none() && n.is_leaf()));

        let a_node = arena.get(a).unwrap();
        assert!(a_node.is_aggregated());
        assert!(a_node.is_leaf());
        assert!(arena.get(b).is_none());
        assert!(arena.get(c).is_none());
        assert_eq!(arena.len(), 2);

        // guarded second call
        assert!(arena.aggregate(a).is_empty());
    }

    #[test]
    fn stale_handles_do_not_resolve_after_reuse() {
        let mut arena = Arena::new(Family::V4, Node::new(net("0.0.0.0/0"), ()));
        let first = arena.alloc(Node::new(net("10.0.0.1/32"), ()));
        assert!(arena.free(first).is_some());
        let second = arena.alloc(Node::new(net("10.0.0.2/32"), ()));
        assert_ne!(first, second);
        assert!(arena.get(first).is_none());
        assert_eq!(
            arena.get(second).unwrap().network().to_string(),
            "10.0.0.2/32"
        );
    }

    #[test]
    fn handles_of_other_family_are_rejected() {
        let mut v4 = Arena::new(Family::V4, Node::new(net("0.0.0.0/0"), ()));
        let mut v6 = Arena::new(Family::V6, Node::new(net("::/0"), ()));
        let _ = v4.alloc(Node::new(net("10.0.0.1/32"), ()));
        let id6 = v6.alloc(Node::new(net("::1/128"), ()));
        assert!(v4.get(id6).is_none());
        assert!(v4.get(v6.root_id()).is_none());
    }

    #[test]
    fn root_cannot_be_freed() {
        let mut arena = Arena::new(Family::V4, Node::new(net("10.0.0.0/8"), ()));
        let root = arena.root_id();
        assert!(arena.free(root).is_none());
        assert_eq!(arena.get(root).unwrap().network().to_string(), "10.0.0.0/8");
        assert_eq!(arena.root().id(), root);
        assert_eq!(arena.len(), 1);
        assert!(arena.is_empty());
    }
}
