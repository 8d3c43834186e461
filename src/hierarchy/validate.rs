//! Structural checks over a finished hierarchy.

use std::collections::HashSet;

use super::types::{Hierarchy, NodeId, Role};
use crate::error::PlanError;
use crate::utils::validation::find_overlapping_blocks;

/// Relative tolerance for share sums
pub const SHARE_TOLERANCE: f64 = 1e-6;

impl Hierarchy {
    /// Re-check every construction invariant.
    ///
    /// Fails with [`PlanError::IncompleteHierarchy`] naming the first
    /// violation found.
    pub fn validate(&self) -> Result<(), PlanError> {
        let incomplete = |reason: String| Err(PlanError::IncompleteHierarchy(reason));

        let top = match self.levels.last() {
            Some(top) => top,
            None => return incomplete("no levels".to_string()),
        };
        if top.clusters.len() != 1 {
            return incomplete(format!(
                "top level {} has {} clusters",
                top.id,
                top.clusters.len()
            ));
        }

        for (i, level) in self.levels.iter().enumerate() {
            if level.id.0 as usize != i + 1 {
                return incomplete(format!("level at position {} is numbered {}", i, level.id));
            }
            if level.clusters.is_empty() {
                return incomplete(format!("level {} has no clusters", level.id));
            }

            for &cluster_id in &level.clusters {
                let cluster = match self.cluster(cluster_id) {
                    Some(c) => c,
                    None => {
                        return incomplete(format!(
                            "level {} references missing {}",
                            level.id, cluster_id
                        ))
                    }
                };
                if cluster.level != level.id {
                    return incomplete(format!(
                        "{} is tagged with level {}",
                        cluster.id, cluster.level
                    ));
                }
                if cluster.members.is_empty() {
                    return incomplete(format!("{} has no members", cluster.id));
                }
                if cluster.shares.len() != cluster.members.len() {
                    return incomplete(format!(
                        "{} has {} shares for {} members",
                        cluster.id,
                        cluster.shares.len(),
                        cluster.members.len()
                    ));
                }
                if cluster.members.iter().filter(|m| **m == cluster.head).count() != 1 {
                    return incomplete(format!(
                        "{} head {} is not a member",
                        cluster.id, cluster.head
                    ));
                }
                if cluster.members.iter().any(|m| self.node(*m).is_none()) {
                    return incomplete(format!("{} references unknown nodes", cluster.id));
                }

                let sum: f64 = cluster.shares.iter().sum();
                let drift = (sum - cluster.total_resources) / cluster.total_resources;
                if drift.abs() > SHARE_TOLERANCE {
                    return incomplete(format!(
                        "{} shares sum to {} instead of {}",
                        cluster.id, sum, cluster.total_resources
                    ));
                }

                match &cluster.address {
                    None => return incomplete(format!("{} has no address block", cluster.id)),
                    Some(block) => {
                        if block.owner != cluster.id || block.pool != level.pool {
                            return incomplete(format!(
                                "{} holds foreign block {}",
                                cluster.id, block
                            ));
                        }
                        if (cluster.members.len() as u64) > block.capacity() {
                            return incomplete(format!(
                                "{} does not fit in {}",
                                cluster.id,
                                block.cidr()
                            ));
                        }
                    }
                }
            }
        }

        // Leaf nodes: every node created exactly once, role matches its cluster
        let leaf = &self.levels[0];
        let mut seen: HashSet<NodeId> = HashSet::new();
        for cluster in self.clusters_in(leaf) {
            for &member in &cluster.members {
                if !seen.insert(member) {
                    return incomplete(format!("{} appears in two leaf clusters", member));
                }
                if let Some(node) = self.node(member) {
                    let expected = if member == cluster.head { Role::Head } else { Role::Member };
                    if node.cluster != cluster.id || node.role != expected {
                        return incomplete(format!("{} disagrees with {}", member, cluster.id));
                    }
                }
            }
        }
        if seen.len() != self.nodes.len() {
            return incomplete(format!(
                "{} nodes exist but {} belong to leaf clusters",
                self.nodes.len(),
                seen.len()
            ));
        }

        // Level k members are exactly the heads of level k-1
        for pair in self.levels.windows(2) {
            let mut heads: Vec<NodeId> = self.clusters_in(&pair[0]).map(|c| c.head).collect();
            let mut members: Vec<NodeId> = self
                .clusters_in(&pair[1])
                .flat_map(|c| c.members.iter().copied())
                .collect();
            heads.sort();
            members.sort();
            if heads != members {
                return incomplete(format!(
                    "level {} members are not the heads of level {}",
                    pair[1].id, pair[0].id
                ));
            }
        }

        let expected_uplinks: usize = self.levels[..self.levels.len() - 1]
            .iter()
            .map(|l| l.clusters.len())
            .sum();
        if self.uplinks.len() != expected_uplinks {
            return incomplete(format!(
                "{} uplinks for {} child clusters",
                self.uplinks.len(),
                expected_uplinks
            ));
        }
        for uplink in &self.uplinks {
            let parent_ok = self.cluster(uplink.parent).map_or(false, |p| {
                p.members.contains(&uplink.head) && p.head == uplink.parent_head
            });
            if !parent_ok || uplink.block.pool != self.uplink_pool {
                return incomplete(format!("uplink of {} is inconsistent", uplink.child));
            }
        }

        let blocks: Vec<_> = self
            .clusters
            .iter()
            .filter_map(|c| c.address.clone())
            .chain(self.uplinks.iter().map(|u| u.block.clone()))
            .collect();
        if let Some((a, b)) = find_overlapping_blocks(&blocks) {
            return incomplete(format!("address block {} overlaps {}", a, b));
        }

        Ok(())
    }
}
