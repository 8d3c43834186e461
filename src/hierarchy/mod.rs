//! Cluster hierarchy module.
//!
//! Builds the tree of clusters bottom-up: leaf clusters of fresh nodes,
//! then levels whose members are the heads of the level below, ending in a
//! single aggregation root.

pub mod builder;
pub mod cluster;
pub mod types;
pub mod validate;

// Re-export key types and functions for easier access
pub use builder::{
    build_hierarchy, check_block_capacity, resolve_shapes, HierarchySpec, LevelShape, LevelSpec,
};
pub use cluster::{build_cluster, compose_cluster, elect_head, ClusterSlot};
pub use types::{Cluster, ClusterId, Hierarchy, Level, LevelId, Node, NodeId, Role, Uplink};
