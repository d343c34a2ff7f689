//! Error handling for iptree

use thiserror::Error;

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the family trees and the dual tree.
///
/// Every error is detected before the tree is mutated, so a failed call
/// leaves counts and structure untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed address or network, or one of the wrong family.
    #[error("invalid address or network: {0}")]
    Parse(String),

    /// A well-formed network that the tree's root does not cover.
    #[error("{network} is outside of root network {root}")]
    OutsideRoot { network: String, root: String },

    /// A network broader than the shallowest level cannot hold hits.
    #[error("{network} is broader than the shallowest level /{shallowest}")]
    TooBroad { network: String, shallowest: u8 },

    /// Lookup miss, or a handle whose node has been discarded.
    #[error("not found: {0}")]
    NotFound(String),

    /// Attempted removal of a node that still has children.
    #[error("node {0} has children")]
    NotLeaf(String),

    #[error("cannot remove the root node")]
    CannotRemoveRoot,

    /// Rejected tree configuration.
    #[error("invalid tree configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn parse(input: impl Into<String>) -> Self {
        Self::Parse(input.into())
    }

    pub fn not_found(what: impl ToString) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
