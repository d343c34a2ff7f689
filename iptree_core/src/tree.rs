//! Aggregating prefix tree for one address family.
//!
//! Every hit walks the configured levels from the root, creating missing
//! nodes on the way, and bumps the hit count of the resolved node and all of
//! its ancestors. Afterwards the ancestors are checked bottom-up: an ancestor
//! holding more leaves than its level's fan-out limit is collapsed into a
//! single aggregated leaf, which may push a shallower ancestor over its own
//! limit in the same pass.

use crate::arena::{Ancestors, Arena, Leaves};
use crate::config::{Level, TreeConfig};
use crate::constants::{
    METRIC_AGGREGATIONS, METRIC_HITS, METRIC_LEAFS_REMOVED, METRIC_NODES, METRIC_NODES_CREATED,
    METRIC_REMOVALS,
};
use crate::errors::{Error, Result};
use crate::helpers::{network_at, parse_network};
use crate::methods::{NoopMethods, UserMethods};
use crate::types::{Family, Hit, Node, NodeId};
use ipnet::IpNet;
use log::{debug, info, trace};
use metrics::{counter, gauge};

/// Tree of hit-counted networks for a single address family.
pub struct FamilyTree<D = (), M = NoopMethods> {
    config: TreeConfig,
    arena: Arena<D>,
    root: NodeId,
    methods: M,
}

impl FamilyTree<(), NoopMethods> {
    /// IPv4 tree with the default level table and no user data.
    pub fn ipv4() -> Self {
        Self::ipv4_with_methods(NoopMethods)
    }

    /// IPv6 tree with the default level table and no user data.
    pub fn ipv6() -> Self {
        Self::ipv6_with_methods(NoopMethods)
    }
}

impl<D, M: UserMethods<D>> FamilyTree<D, M> {
    /// Tree over `config`, rejecting an invalid level table.
    pub fn new(config: TreeConfig, methods: M) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, methods))
    }

    pub fn ipv4_with_methods(methods: M) -> Self {
        Self::build(TreeConfig::ipv4_default(), methods)
    }

    pub fn ipv6_with_methods(methods: M) -> Self {
        Self::build(TreeConfig::ipv6_default(), methods)
    }

    fn build(config: TreeConfig, mut methods: M) -> Self {
        crate::ensure_logging();
        let arena = Arena::new(config.family(), Node::new(config.root, methods.initial()));
        let root = arena.root_id();
        debug!(
            "[NEW] {} tree rooted at {} with {} levels",
            config.family(),
            config.root,
            config.levels.len()
        );
        Self {
            config,
            arena,
            root,
            methods,
        }
    }

    // ---- accessors -----------------------------------------------------------

    pub fn family(&self) -> Family {
        self.config.family()
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn levels(&self) -> &[Level] {
        &self.config.levels
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_node(&self) -> &Node<D> {
        self.arena.root()
    }

    /// Total hits recorded in the tree.
    pub fn hit_count(&self) -> u64 {
        self.root_node().hit_count
    }

    /// Number of leaves currently visible (0 for an empty tree).
    pub fn leaf_count(&self) -> u64 {
        self.root_node().leaf_count
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<D>> {
        self.arena.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<D>> {
        self.arena.get_mut(id)
    }

    pub fn methods(&self) -> &M {
        &self.methods
    }

    pub fn methods_mut(&mut self) -> &mut M {
        &mut self.methods
    }

    /// Direct child of `id` whose network is `network`.
    pub fn child_of(&self, id: NodeId, network: &str) -> Result<NodeId> {
        let net = parse_network(network)?;
        self.get(id)?.child(&net)
    }

    /// Current leaves, depth first. Does not modify the tree.
    pub fn leafs(&self) -> Leaves<'_, D> {
        self.arena.leaves(self.root)
    }

    /// Current leaves below `id` (or `id` itself when it has no children).
    pub fn leafs_of(&self, id: NodeId) -> Leaves<'_, D> {
        self.arena.leaves(id)
    }

    /// Parents of `id` up to and including the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_, D> {
        self.arena.ancestors(id)
    }

    // ---- lookups -------------------------------------------------------------

    /// Node that currently represents `address`: the node at the deepest
    /// level covering it, or an aggregated ancestor.
    pub fn find_node(&self, address: &str) -> Result<NodeId> {
        let net = self.parse(address)?;
        let keys = self.keys_for(&net)?;
        self.find_in(&net, &keys).map(|(id, _)| id)
    }

    /// Node whose network is exactly `network`.
    pub fn lookup(&self, network: &str) -> Result<NodeId> {
        let net = self.parse(network)?;
        let keys = self.keys_for(&net)?;
        let (id, _) = self.find_in(&net, &keys)?;
        if self.get(id)?.network == net {
            Ok(id)
        } else {
            Err(Error::not_found(net))
        }
    }

    // ---- mutation ------------------------------------------------------------

    /// Create the path for `address` without recording a hit.
    ///
    /// Returns the node that represents the address afterwards. No
    /// aggregation check runs; `add` is the normal entry point.
    pub fn create_node(&mut self, address: &str) -> Result<NodeId> {
        let net = self.parse(address)?;
        self.check_depth(&net)?;
        let keys = self.keys_for(&net)?;
        self.create_in(&keys).map(|(id, _, _)| id)
    }

    /// Record one hit for `address`.
    ///
    /// Hits always land on a leaf. A network that resolves to a node with
    /// children covers everything seen inside it, so that node is collapsed
    /// first and reported as added.
    pub fn add(&mut self, address: &str) -> Result<Hit<D>> {
        let net = self.parse(address)?;
        self.check_depth(&net)?;
        let keys = self.keys_for(&net)?;

        let mut leafs_removed = Vec::new();
        let mut surfaced = false;
        let (node, level, created) = match self.find_in(&net, &keys) {
            Ok((node, level)) => {
                if node != self.root && !self.get(node)?.children.is_empty() {
                    leafs_removed = self.collapse(node);
                    surfaced = true;
                }
                if let Some(existing) = self.arena.get_mut(node) {
                    self.methods.on_existing_hit(existing);
                }
                (node, level, false)
            }
            Err(Error::NotFound(_)) => self.create_in(&keys)?,
            Err(e) => return Err(e),
        };

        self.walk_up(Some(node), |n| n.hit_count += 1);

        let (result, mut swallowed) = self.check_aggregation(node, level);
        let mut leafs_added = Vec::new();
        if created || surfaced {
            // a leaf swallowed in the same call was never visible
            swallowed.retain(|n| n.id != node);
            leafs_added.push(result);
        }
        leafs_removed.extend(swallowed);

        counter!(METRIC_HITS, "family" => self.family().as_str()).increment(1);
        self.report_size();
        debug!(
            "[ADD] {} -> {:?} (created={}, removed={}, added={})",
            net,
            self.get(result).ok().map(|n| n.network),
            created,
            leafs_removed.len(),
            leafs_added.len()
        );

        Ok(Hit {
            node: result,
            leafs_removed,
            leafs_added,
        })
    }

    /// Remove a leaf, cascading through the non-root ancestors it empties.
    ///
    /// Every surviving ancestor loses one leaf and the removed leaf's hits.
    /// Returns the removed leaf, detached.
    pub fn remove(&mut self, id: NodeId) -> Result<Node<D>> {
        let node = self.get(id)?;
        if !node.children.is_empty() {
            return Err(Error::NotLeaf(node.network.to_string()));
        }
        if id == self.root {
            return Err(Error::CannotRemoveRoot);
        }
        // only leaves carry hits; emptied ancestors hold exactly these
        let hits = node.hit_count;

        // highest ancestor left without children once `id` goes
        let mut top = id;
        let survivor = loop {
            let parent = self
                .get(top)?
                .parent
                .ok_or_else(|| Error::not_found(format!("{top:?}")))?;
            if parent == self.root || self.get(parent)?.children.len() > 1 {
                break parent;
            }
            top = parent;
        };

        let top_net = self.get(top)?.network;
        if let Some(parent) = self.arena.get_mut(survivor) {
            parent.children.remove(&top_net);
        }
        self.walk_up(Some(survivor), |n| {
            n.hit_count = n.hit_count.saturating_sub(hits);
            n.leaf_count = n.leaf_count.saturating_sub(1);
        });

        // free the emptied chain down to the leaf
        let mut cursor = top;
        let leaf = loop {
            let mut freed = self
                .arena
                .free(cursor)
                .ok_or_else(|| Error::not_found(format!("{cursor:?}")))?;
            freed.parent = None;
            if cursor == id {
                break freed;
            }
            trace!("[REMOVE] cascading through {}", freed.network);
            match freed.children.values().next() {
                Some(&next) => cursor = next,
                None => break freed,
            }
        };

        counter!(METRIC_REMOVALS, "family" => self.family().as_str()).increment(1);
        self.report_size();
        debug!("[REMOVE] {} (hits={}, top={})", leaf.network, hits, top_net);
        Ok(leaf)
    }

    // ---- internals -----------------------------------------------------------

    fn get(&self, id: NodeId) -> Result<&Node<D>> {
        self.arena.get(id).ok_or_else(|| Error::not_found(format!("{id:?}")))
    }

    /// Parse and check family and root coverage.
    fn parse(&self, input: &str) -> Result<IpNet> {
        let net = parse_network(input)?;
        if Family::of(&net) != self.family() {
            return Err(Error::parse(input));
        }
        if !self.config.root.contains(&net) {
            return Err(Error::OutsideRoot {
                network: net.to_string(),
                root: self.config.root.to_string(),
            });
        }
        Ok(net)
    }

    /// Reject networks broader than the shallowest level; they would land
    /// on the root above existing leaves.
    fn check_depth(&self, net: &IpNet) -> Result<()> {
        match self.config.levels.first() {
            Some(level) if net.prefix_len() < level.prefix_len => Err(Error::TooBroad {
                network: net.to_string(),
                shallowest: level.prefix_len,
            }),
            _ => Ok(()),
        }
    }

    /// Networks of `net` at every level not longer than its own prefix.
    fn keys_for(&self, net: &IpNet) -> Result<Vec<IpNet>> {
        self.config
            .levels
            .iter()
            .take_while(|level| level.prefix_len <= net.prefix_len())
            .map(|level| network_at(net, level.prefix_len))
            .collect()
    }

    /// Walk existing nodes along `keys`. Returns the node and its level index
    /// (`None` for the root).
    ///
    /// A childless node below the root covers everything under it (it is
    /// aggregated, or was hit as a whole network), so the walk ends there.
    fn find_in(&self, net: &IpNet, keys: &[IpNet]) -> Result<(NodeId, Option<usize>)> {
        let mut node = self.root;
        let mut level = None;
        for (idx, key) in keys.iter().enumerate() {
            let current = self.get(node)?;
            if node != self.root && current.children.is_empty() {
                trace!("[FIND] {} stops at {}", net, current.network);
                break;
            }
            node = current.child(key).map_err(|_| Error::not_found(net))?;
            level = Some(idx);
        }
        Ok((node, level))
    }

    /// Walk along `keys`, creating missing nodes. Stops at a childless
    /// existing node the same way `find_in` does.
    fn create_in(&mut self, keys: &[IpNet]) -> Result<(NodeId, Option<usize>, bool)> {
        let mut node = self.root;
        let mut level = None;
        // existing node the new branch hangs from
        let mut attach: Option<NodeId> = None;

        for (idx, key) in keys.iter().enumerate() {
            let current = self.get(node)?;
            if attach.is_none() && node != self.root && current.children.is_empty() {
                break;
            }
            let existing = current.children.get(key).copied();

            node = match existing {
                Some(child) => child,
                None => {
                    if attach.is_none() {
                        attach = Some(node);
                    }
                    let mut fresh = Node::new(*key, self.methods.initial());
                    fresh.leaf_count = 1;
                    let child = self.arena.alloc(fresh);
                    self.arena.add_child(node, child);
                    trace!("[CREATE] {}", key);
                    counter!(METRIC_NODES_CREATED, "family" => self.family().as_str())
                        .increment(1);
                    child
                }
            };
            level = Some(idx);
        }

        // the attach point always had children (or is the root), so the new
        // branch is one more leaf for it and everything above
        let created = attach.is_some();
        self.walk_up(attach, |n| n.leaf_count += 1);
        Ok((node, level, created))
    }

    /// Bottom-up fan-out check starting at `node` (at level index `level`).
    ///
    /// Returns the node that represents the hit afterwards and every leaf
    /// removed by aggregation, in the order they were collapsed.
    fn check_aggregation(&mut self, node: NodeId, level: Option<usize>) -> (NodeId, Vec<Node<D>>) {
        let mut representative = node;
        let mut removed = Vec::new();
        let Some(level) = level else {
            return (representative, removed);
        };

        let mut cursor = node;
        for idx in (0..level).rev() {
            let Some(ancestor) = self.arena.get(cursor).and_then(|n| n.parent) else {
                break;
            };
            cursor = ancestor;

            let limit = self.config.levels[idx];
            let leaf_count = match self.arena.get(ancestor) {
                Some(n) => n.leaf_count,
                None => break,
            };
            if !limit.exceeded_by(leaf_count) {
                continue;
            }

            debug!(
                "[AGGREGATE] {} leaves over limit {} at /{}",
                leaf_count, limit.fan_out_limit, limit.prefix_len
            );
            removed.extend(self.collapse(ancestor));
            representative = ancestor;
        }
        (representative, removed)
    }

    /// Aggregate `id` into a single leaf and fix the leaf counts above it.
    fn collapse(&mut self, id: NodeId) -> Vec<Node<D>> {
        let collapsed = self.arena.aggregate(id);
        let (parent, network) = match self.arena.get_mut(id) {
            Some(survivor) => {
                survivor.leaf_count = 1;
                self.methods.on_aggregate(survivor, &collapsed);
                (survivor.parent, survivor.network)
            }
            None => return collapsed,
        };
        let shrink = (collapsed.len() as u64).saturating_sub(1);
        self.walk_up(parent, |n| n.leaf_count = n.leaf_count.saturating_sub(shrink));

        info!("[AGGREGATE] {} collapsed {} leaves", network, collapsed.len());
        counter!(METRIC_AGGREGATIONS, "family" => self.family().as_str()).increment(1);
        counter!(METRIC_LEAFS_REMOVED, "family" => self.family().as_str())
            .increment(collapsed.len() as u64);
        collapsed
    }

    /// Apply `f` to `start` and each of its ancestors.
    fn walk_up(&mut self, start: Option<NodeId>, mut f: impl FnMut(&mut Node<D>)) {
        let mut next = start;
        while let Some(id) = next {
            let Some(node) = self.arena.get_mut(id) else {
                break;
            };
            f(node);
            next = node.parent;
        }
    }

    fn report_size(&self) {
        gauge!(METRIC_NODES, "family" => self.family().as_str()).set(self.arena.len() as f64);
    }
}
