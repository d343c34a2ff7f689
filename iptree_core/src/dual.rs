//! One family tree per address family behind a single entry point.

use crate::errors::Result;
use crate::helpers::family_of_str;
use crate::methods::{NoopMethods, UserMethods};
use crate::tree::FamilyTree;
use crate::types::{Family, Hit, Node, NodeId};

/// IPv4 and IPv6 trees; strings with a colon go to IPv6.
pub struct IpTree<D = (), M = NoopMethods> {
    ipv4: FamilyTree<D, M>,
    ipv6: FamilyTree<D, M>,
}

impl IpTree<(), NoopMethods> {
    /// Both families with their default level tables.
    pub fn new() -> Self {
        Self::from_trees(FamilyTree::ipv4(), FamilyTree::ipv6())
    }
}

impl Default for IpTree<(), NoopMethods> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, M: UserMethods<D>> IpTree<D, M> {
    /// Default level tables, each family with its own hooks.
    pub fn with_methods(ipv4: M, ipv6: M) -> Self {
        Self::from_trees(
            FamilyTree::ipv4_with_methods(ipv4),
            FamilyTree::ipv6_with_methods(ipv6),
        )
    }

    pub fn from_trees(ipv4: FamilyTree<D, M>, ipv6: FamilyTree<D, M>) -> Self {
        Self { ipv4, ipv6 }
    }

    pub fn ipv4(&self) -> &FamilyTree<D, M> {
        &self.ipv4
    }

    pub fn ipv6(&self) -> &FamilyTree<D, M> {
        &self.ipv6
    }

    pub fn ipv4_mut(&mut self) -> &mut FamilyTree<D, M> {
        &mut self.ipv4
    }

    pub fn ipv6_mut(&mut self) -> &mut FamilyTree<D, M> {
        &mut self.ipv6
    }

    pub fn tree(&self, family: Family) -> &FamilyTree<D, M> {
        match family {
            Family::V4 => &self.ipv4,
            Family::V6 => &self.ipv6,
        }
    }

    pub fn tree_mut(&mut self, family: Family) -> &mut FamilyTree<D, M> {
        match family {
            Family::V4 => &mut self.ipv4,
            Family::V6 => &mut self.ipv6,
        }
    }

    pub fn add(&mut self, address: &str) -> Result<Hit<D>> {
        self.tree_mut(family_of_str(address)).add(address)
    }

    pub fn find_node(&self, address: &str) -> Result<NodeId> {
        self.tree(family_of_str(address)).find_node(address)
    }

    pub fn lookup(&self, network: &str) -> Result<NodeId> {
        self.tree(family_of_str(network)).lookup(network)
    }

    /// Remove the leaf behind `id`; the handle knows its family.
    pub fn remove(&mut self, id: NodeId) -> Result<Node<D>> {
        self.tree_mut(id.family()).remove(id)
    }

    /// Remove the leaf whose network is exactly `network`.
    pub fn remove_network(&mut self, network: &str) -> Result<Node<D>> {
        let tree = self.tree_mut(family_of_str(network));
        let id = tree.lookup(network)?;
        tree.remove(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<D>> {
        self.tree(id.family()).node(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<D>> {
        self.tree_mut(id.family()).node_mut(id)
    }

    /// IPv6 leaves, then IPv4 leaves.
    pub fn leafs(&self) -> impl Iterator<Item = &Node<D>> + '_ {
        self.ipv6.leafs().chain(self.ipv4.leafs())
    }

    pub fn hit_count(&self) -> u64 {
        self.ipv4.hit_count() + self.ipv6.hit_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    #[test]
    fn dispatches_by_colon() {
        let mut tree = IpTree::new();
        let v6 = tree.add("2001:db8::1").unwrap();
        let v4 = tree.add("192.0.2.1").unwrap();
        assert_eq!(v6.node.family(), Family::V6);
        assert_eq!(v4.node.family(), Family::V4);
        assert_eq!(tree.ipv4().hit_count(), 1);
        assert_eq!(tree.ipv6().hit_count(), 1);
        assert_eq!(tree.node(v4.node).unwrap().network().to_string(), "192.0.2.1/32");
    }

    #[test]
    fn malformed_input_leaves_both_trees_untouched() {
        let mut tree = IpTree::new();
        assert!(matches!(tree.add("127.0.0.0.1"), Err(Error::Parse(_))));
        assert!(matches!(tree.add("2001::db8::1"), Err(Error::Parse(_))));
        assert_eq!(tree.hit_count(), 0);
    }
}
