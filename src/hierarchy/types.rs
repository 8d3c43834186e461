//! Hierarchy data model.
//!
//! Nodes, clusters and levels live in id-indexed arenas owned by the
//! [`Hierarchy`]. Consumers are handed ids, never references into the arena.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ip::AddressBlock;

/// Index of a node in [`Hierarchy::nodes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// Index of a cluster in [`Hierarchy::clusters`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub u32);

/// Level number, 1 for the leaf level, increasing towards the root
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ClusterId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl LevelId {
    /// Position of this level in [`Hierarchy::levels`]; `None` for level 0
    pub fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{:03}", self.0)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cluster{:03}", self.0)
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role a node plays in its origin cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Head,
    Member,
}

/// A simulated node, created with its level-1 cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Cluster the node was created in
    pub cluster: ClusterId,
    pub level: LevelId,
    /// Share of the origin cluster's budget
    pub resource_share: f64,
    pub role: Role,
}

/// A group of nodes with one elected head
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub level: LevelId,
    /// Members in construction order
    pub members: Vec<NodeId>,
    /// Budget share of each member, parallel to `members`
    pub shares: Vec<f64>,
    pub head: NodeId,
    pub total_resources: f64,
    /// Assigned once the level is complete
    pub address: Option<AddressBlock>,
}

impl Cluster {
    /// Share held by `node` inside this cluster
    pub fn share_of(&self, node: NodeId) -> Option<f64> {
        self.members
            .iter()
            .position(|m| *m == node)
            .map(|i| self.shares[i])
    }

    /// Members other than the head, in construction order
    pub fn followers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.members.iter().copied().filter(move |m| *m != self.head)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// One tier of the hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    pub clusters: Vec<ClusterId>,
    /// Sum of the budgets of this level's clusters
    pub total_resources: f64,
    pub pool: crate::ip::PoolId,
}

/// Address pairing between a child cluster's head and its parent cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Uplink {
    pub child: ClusterId,
    pub parent: ClusterId,
    /// Head of the child cluster
    pub head: NodeId,
    /// Head of the parent cluster
    pub parent_head: NodeId,
    pub block: AddressBlock,
}

/// The fully built hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hierarchy {
    pub nodes: Vec<Node>,
    pub clusters: Vec<Cluster>,
    /// Leaf level first
    pub levels: Vec<Level>,
    pub uplinks: Vec<Uplink>,
    pub uplink_pool: crate::ip::PoolId,
}

impl Hierarchy {
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.index())
    }

    pub fn level(&self, id: LevelId) -> Option<&Level> {
        self.levels.get(id.index()?)
    }

    /// Clusters of a level in creation order
    pub fn clusters_in<'a>(&'a self, level: &'a Level) -> impl Iterator<Item = &'a Cluster> + 'a {
        level.clusters.iter().filter_map(move |id| self.cluster(*id))
    }

    /// The single cluster of the top level, if present
    pub fn root(&self) -> Option<&Cluster> {
        let top = self.levels.last()?;
        match top.clusters.as_slice() {
            [only] => self.cluster(*only),
            _ => None,
        }
    }

    /// Highest level at which `node` is a member
    pub fn top_level_of(&self, node: NodeId) -> Option<LevelId> {
        self.levels
            .iter()
            .rev()
            .find(|l| self.clusters_in(l).any(|c| c.members.contains(&node)))
            .map(|l| l.id)
    }
}
