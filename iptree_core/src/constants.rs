//! Constants and default configuration for the family trees

/// Root network of the default IPv4 tree.
pub const IPV4_ROOT: &str = "0.0.0.0/0";
/// Root network of the default IPv6 tree.
pub const IPV6_ROOT: &str = "::/0";

/// Default IPv4 levels as `(prefix_len, fan_out_limit)`, shallowest first.
pub const IPV4_LEVELS: [(u8, i64); 3] = [(16, 0), (24, 16), (32, 0)];

/// Default IPv6 levels as `(prefix_len, fan_out_limit)`, shallowest first.
pub const IPV6_LEVELS: [(u8, i64); 8] = [
    (32, 0),
    (48, 50),
    (56, 10),
    (64, 5),
    (80, 4),
    (96, 3),
    (112, 2),
    (128, 0),
];

// metric names
pub const METRIC_HITS: &str = "iptree_hits_total";
pub const METRIC_NODES_CREATED: &str = "iptree_nodes_created_total";
pub const METRIC_AGGREGATIONS: &str = "iptree_aggregations_total";
pub const METRIC_LEAFS_REMOVED: &str = "iptree_leafs_removed_total";
pub const METRIC_REMOVALS: &str = "iptree_removals_total";
pub const METRIC_NODES: &str = "iptree_nodes";
