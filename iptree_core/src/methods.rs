//! User data hooks.
//!
//! A tree calls these at three points: when a node is created, when a hit
//! lands on an existing node, and when a subtree is collapsed into one node.
//! Hooks cannot fail; counts are already updated around them.

use crate::types::Node;

pub trait UserMethods<D> {
    /// Payload for a freshly created node (including the root).
    fn initial(&mut self) -> D;

    /// A hit landed on `node`, which existed before this call.
    fn on_existing_hit(&mut self, _node: &mut Node<D>) {}

    /// `survivor` just absorbed `removed` (the former leaves of its subtree).
    fn on_aggregate(&mut self, _survivor: &mut Node<D>, _removed: &[Node<D>]) {}
}

/// Hooks that do nothing; payloads start from `D::default()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMethods;

impl<D: Default> UserMethods<D> for NoopMethods {
    fn initial(&mut self) -> D {
        D::default()
    }
}

type HitFn<D> = Box<dyn FnMut(&mut Node<D>)>;
type AggregateFn<D> = Box<dyn FnMut(&mut Node<D>, &[Node<D>])>;

/// Hooks assembled from closures; unset hooks are no-ops.
///
/// ```
/// use iptree_core::{FamilyTree, FnMethods};
///
/// let methods = FnMethods::new(|| 0u64)
///     .on_aggregate(|into, from| into.data += from.iter().map(|n| n.data).sum::<u64>());
/// let mut tree = FamilyTree::ipv6_with_methods(methods);
/// let hit = tree.add("2001:db8::1").unwrap();
/// tree.node_mut(hit.node).unwrap().data += 1;
/// ```
pub struct FnMethods<D> {
    initial: Box<dyn FnMut() -> D>,
    on_existing_hit: Option<HitFn<D>>,
    on_aggregate: Option<AggregateFn<D>>,
}

impl<D> FnMethods<D> {
    pub fn new(initial: impl FnMut() -> D + 'static) -> Self {
        Self {
            initial: Box::new(initial),
            on_existing_hit: None,
            on_aggregate: None,
        }
    }

    pub fn on_existing_hit(mut self, f: impl FnMut(&mut Node<D>) + 'static) -> Self {
        self.on_existing_hit = Some(Box::new(f));
        self
    }

    pub fn on_aggregate(mut self, f: impl FnMut(&mut Node<D>, &[Node<D>]) + 'static) -> Self {
        self.on_aggregate = Some(Box::new(f));
        self
    }
}

impl<D> UserMethods<D> for FnMethods<D> {
    fn initial(&mut self) -> D {
        (self.initial)()
    }

    fn on_existing_hit(&mut self, node: &mut Node<D>) {
        if let Some(f) = self.on_existing_hit.as_mut() {
            f(node);
        }
    }

    fn on_aggregate(&mut self, survivor: &mut Node<D>, removed: &[Node<D>]) {
        if let Some(f) = self.on_aggregate.as_mut() {
            f(survivor, removed);
        }
    }
}
