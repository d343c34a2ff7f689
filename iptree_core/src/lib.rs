//! Bounded-memory index of IP addresses and networks with hit counts.
//!
//! Each address family gets a [`FamilyTree`] whose depth is a fixed table of
//! prefix lengths. Hits create nodes lazily; once a node at some level holds
//! more leaves than that level's fan-out limit, its subtree is collapsed into
//! it, so memory stays bounded however many distinct addresses are seen.
//! [`IpTree`] holds one tree per family.
//!
//! ```
//! use iptree_core::IpTree;
//!
//! let mut tree = IpTree::new();
//! tree.add("2001:db8:cafe::1").unwrap();
//! let hit = tree.add("2001:db8:cafe::1").unwrap();
//! let node = tree.node(hit.node).unwrap();
//! assert_eq!(node.network().to_string(), "2001:db8:cafe::1/128");
//! assert_eq!(node.hit_count(), 2);
//! ```

pub mod arena;
pub mod config;
pub mod constants;
pub mod dual;
pub mod errors;
pub mod helpers;
pub mod methods;
pub mod telemetry;
pub mod tree;
pub mod types;

pub use config::{Level, TreeConfig};
pub use dual::IpTree;
pub use errors::{Error, Result};
pub use methods::{FnMethods, NoopMethods, UserMethods};
pub use tree::FamilyTree;
pub use types::{Family, Hit, Node, NodeId};

use once_cell::sync::OnceCell;

// ---- logging bootstraper -------------------------------------------------
pub(crate) fn ensure_logging() {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_init(|| {
        // Fallback: simple env_logger with timestamps off; a host logger wins.
        let _ = env_logger::builder()
            .format_timestamp(None)
            .is_test(std::env::var("RUST_TEST_THREADS").is_ok())
            .try_init();
    });
}
