//! Data structures for the family trees

use crate::errors::{Error, Result};
use crate::helpers::{pack, unpack};
use ipnet::IpNet;
use std::collections::BTreeMap;
use std::fmt;

/// Address family of a tree, a node or a handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub fn of(net: &IpNet) -> Self {
        match net {
            IpNet::V4(_) => Family::V4,
            IpNet::V6(_) => Family::V6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::V4 => "IPv4",
            Family::V6 => "IPv6",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a node inside a family tree.
///
/// Packs the arena slot and its generation (ABA-safe: once the node is
/// discarded the slot's generation moves on and the handle stops resolving).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    family: Family,
    raw: u64,
}

impl NodeId {
    pub(crate) fn new(family: Family, index: u32, generation: u32) -> Self {
        Self {
            family,
            raw: pack(index, generation),
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub(crate) fn index(&self) -> u32 {
        unpack(self.raw).0
    }

    pub(crate) fn generation(&self) -> u32 {
        unpack(self.raw).1
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}#{}v{})", self.family, self.index(), self.generation())
    }
}

/// One CIDR network (or single address) tracked by a family tree.
#[derive(Debug, Clone)]
pub struct Node<D> {
    pub(crate) id: NodeId,
    pub(crate) network: IpNet,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: BTreeMap<IpNet, NodeId>,
    pub(crate) hit_count: u64,
    pub(crate) leaf_count: u64,
    pub(crate) aggregated: bool,
    /// User payload, seeded by `UserMethods::initial`.
    pub data: D,
}

impl<D> Node<D> {
    pub(crate) fn new(network: IpNet, data: D) -> Self {
        Self {
            // stamped by the arena on insertion
            id: NodeId::new(Family::of(&network), 0, 0),
            network,
            parent: None,
            children: BTreeMap::new(),
            hit_count: 0,
            leaf_count: 0,
            aggregated: false,
            data,
        }
    }

    /// Handle under which this node lives (or lived, for detached nodes).
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Canonical network; its `Display` is the canonical string form.
    pub fn network(&self) -> IpNet {
        self.network
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    pub fn leaf_count(&self) -> u64 {
        self.leaf_count
    }

    pub fn is_aggregated(&self) -> bool {
        self.aggregated
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Direct child lookup by network.
    pub fn contains(&self, network: &IpNet) -> bool {
        self.children.contains_key(network)
    }

    /// Direct child lookup by network, `NotFound` when absent.
    pub fn child(&self, network: &IpNet) -> Result<NodeId> {
        self.children
            .get(network)
            .copied()
            .ok_or_else(|| Error::not_found(network))
    }

    /// Child handles in network order.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.values().copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Outcome of a single `add`.
#[derive(Debug)]
pub struct Hit<D> {
    /// Node the hit landed on after any aggregation.
    pub node: NodeId,
    /// Leaves that left the visible leaf set during this call, detached.
    pub leafs_removed: Vec<Node<D>>,
    /// Leaves that entered the visible leaf set during this call.
    pub leafs_added: Vec<NodeId>,
}
