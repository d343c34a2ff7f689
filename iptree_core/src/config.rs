//! Configuration for a family tree.
//!
//! A tree is described by its root network and an ordered list of levels.
//! Each level is a prefix length plus the fan-out limit that triggers
//! aggregation of nodes at that level.

use crate::constants::{IPV4_LEVELS, IPV6_LEVELS};
use crate::errors::{Error, Result};
use crate::helpers::{max_prefix_len, parse_network};
use crate::types::Family;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::net::{Ipv4Addr, Ipv6Addr};

/// One level of the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    /// Prefix length of the nodes at this level.
    pub prefix_len: u8,
    /// A node at this level with more leaves than this is aggregated.
    /// Zero or negative disables aggregation at this level.
    pub fan_out_limit: i64,
}

impl Level {
    pub fn new(prefix_len: u8, fan_out_limit: i64) -> Self {
        Self {
            prefix_len,
            fan_out_limit,
        }
    }

    /// Whether a node at this level holding `leaf_count` leaves must collapse.
    #[inline]
    pub fn exceeded_by(&self, leaf_count: u64) -> bool {
        self.fan_out_limit > 0 && leaf_count > self.fan_out_limit as u64
    }
}

/// Configuration for a `FamilyTree`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    /// Network covered by the root node.
    pub root: IpNet,
    /// Levels, shallowest first.
    pub levels: Vec<Level>,
}

impl TreeConfig {
    /// Config with the given root and no levels yet.
    pub fn new(root: &str) -> Result<Self> {
        Ok(Self {
            root: parse_network(root)?,
            levels: Vec::new(),
        })
    }

    /// Default IPv4 table: `/16, /24, /32` with limits `(0, 16, 0)`.
    pub fn ipv4_default() -> Self {
        Self {
            root: IpNet::V4(Ipv4Net::new_assert(Ipv4Addr::UNSPECIFIED, 0)),
            levels: IPV4_LEVELS.iter().map(|&(p, l)| Level::new(p, l)).collect(),
        }
    }

    /// Default IPv6 table: `/32 … /128` with limits `(0, 50, 10, 5, 4, 3, 2, 0)`.
    pub fn ipv6_default() -> Self {
        Self {
            root: IpNet::V6(Ipv6Net::new_assert(Ipv6Addr::UNSPECIFIED, 0)),
            levels: IPV6_LEVELS.iter().map(|&(p, l)| Level::new(p, l)).collect(),
        }
    }

    /// Appends a level.
    pub fn with_level(mut self, prefix_len: u8, fan_out_limit: i64) -> Self {
        self.levels.push(Level::new(prefix_len, fan_out_limit));
        self
    }

    /// Replaces all levels.
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = (u8, i64)>) -> Self {
        self.levels = levels.into_iter().map(|(p, l)| Level::new(p, l)).collect();
        self
    }

    pub fn family(&self) -> Family {
        Family::of(&self.root)
    }

    /// Checks that levels are strictly increasing, not shorter than the root
    /// prefix and no longer than the family's address width.
    pub fn validate(&self) -> Result<()> {
        let max = max_prefix_len(&self.root);
        let root_len = self.root.prefix_len();
        let mut prev: Option<u8> = None;
        for level in &self.levels {
            if level.prefix_len > max {
                return Err(Error::invalid_config(format!(
                    "prefix length /{} exceeds {} bits",
                    level.prefix_len, max
                )));
            }
            if level.prefix_len < root_len {
                return Err(Error::invalid_config(format!(
                    "level /{} is shorter than root {}",
                    level.prefix_len, self.root
                )));
            }
            if let Some(prev) = prev.filter(|&p| level.prefix_len <= p) {
                return Err(Error::invalid_config(format!(
                    "level /{} must be longer than /{}",
                    level.prefix_len, prev
                )));
            }
            prev = Some(level.prefix_len);
        }
        Ok(())
    }

    /// Index of the level whose prefix length is `prefix_len`.
    pub fn level_index(&self, prefix_len: u8) -> Option<usize> {
        self.levels.iter().position(|l| l.prefix_len == prefix_len)
    }
}
