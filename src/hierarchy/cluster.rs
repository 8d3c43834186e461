//! Cluster construction and head election.
//!
//! A cluster's members are ranked, the budget is split over the ranks with
//! the truncated geometric rule, and the rank-1 member (the one holding the
//! largest share) becomes head.

use std::cmp::Ordering;

use super::types::{Cluster, ClusterId, LevelId, Node, NodeId, Role};
use crate::error::PlanError;
use crate::resource::distribute;

/// Where a new cluster sits in the arena
#[derive(Debug, Clone, Copy)]
pub struct ClusterSlot {
    pub id: ClusterId,
    pub level: LevelId,
    /// Position of the cluster within its level
    pub index: usize,
}

/// Build a leaf cluster of `size` fresh nodes numbered from `first_node`.
///
/// Nodes are ranked in creation order, so the first node created receives
/// the largest share and is elected head.
pub fn build_cluster(
    slot: ClusterSlot,
    first_node: NodeId,
    size: usize,
    probability: f64,
    total_resources: f64,
) -> Result<(Cluster, Vec<Node>), PlanError> {
    if size == 0 {
        return Err(PlanError::EmptyCluster {
            level: slot.level,
            index: slot.index,
        });
    }

    let shares =
        distribute(size, total_resources, probability).map_err(|e| e.on_level(slot.level))?;
    let members: Vec<NodeId> = (0..size as u32).map(|i| NodeId(first_node.0 + i)).collect();
    let head = members[0];

    let nodes = members
        .iter()
        .zip(&shares)
        .map(|(&id, &share)| Node {
            id,
            cluster: slot.id,
            level: slot.level,
            resource_share: share,
            role: if id == head { Role::Head } else { Role::Member },
        })
        .collect();

    let cluster = Cluster {
        id: slot.id,
        level: slot.level,
        members,
        shares,
        head,
        total_resources,
        address: None,
    };
    Ok((cluster, nodes))
}

/// Build an upper-level cluster from existing heads.
///
/// `known_shares[i]` is the share `members[i]` holds in the cluster it heads
/// one level below. Members are ranked by that share, descending, with ties
/// kept in insertion order; the new budget is split over those ranks and
/// rank 1 is elected head.
pub fn compose_cluster(
    slot: ClusterSlot,
    members: Vec<NodeId>,
    known_shares: &[f64],
    probability: f64,
    total_resources: f64,
) -> Result<Cluster, PlanError> {
    if members.is_empty() {
        return Err(PlanError::EmptyCluster {
            level: slot.level,
            index: slot.index,
        });
    }

    if known_shares.len() != members.len() {
        return Err(PlanError::IncompleteHierarchy(format!(
            "{} has {} members but {} known shares",
            slot.id,
            members.len(),
            known_shares.len()
        )));
    }

    let by_rank = distribute(members.len(), total_resources, probability)
        .map_err(|e| e.on_level(slot.level))?;

    let mut shares = vec![0.0; members.len()];
    for (rank, member_idx) in rank_by_share(known_shares).into_iter().enumerate() {
        shares[member_idx] = by_rank[rank];
    }
    let head = elect_head(known_shares)
        .map(|i| members[i])
        .ok_or(PlanError::EmptyCluster {
            level: slot.level,
            index: slot.index,
        })?;

    Ok(Cluster {
        id: slot.id,
        level: slot.level,
        members,
        shares,
        head,
        total_resources,
        address: None,
    })
}

/// Member positions ordered by descending share, stable on ties
pub fn rank_by_share(shares: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| match shares[b].total_cmp(&shares[a]) {
        Ordering::Equal => a.cmp(&b),
        other => other,
    });
    order
}

/// Position of the member holding the largest share
pub fn elect_head(shares: &[f64]) -> Option<usize> {
    rank_by_share(shares).first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: u32, level: u32) -> ClusterSlot {
        ClusterSlot {
            id: ClusterId(id),
            level: LevelId(level),
            index: id as usize,
        }
    }

    #[test]
    fn test_leaf_cluster_head_is_first_node() {
        let (cluster, nodes) = build_cluster(slot(2, 1), NodeId(12), 6, 0.7, 4500.0).unwrap();

        assert_eq!(cluster.members, (12..18).map(NodeId).collect::<Vec<_>>());
        assert_eq!(cluster.head, NodeId(12));
        assert_eq!(nodes.len(), 6);
        assert_eq!(nodes[0].role, Role::Head);
        assert!(nodes[1..].iter().all(|n| n.role == Role::Member));
        assert!(nodes.iter().all(|n| n.cluster == ClusterId(2)));

        let max = cluster.shares.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(cluster.share_of(cluster.head), Some(max));

        let sum: f64 = cluster.shares.iter().sum();
        assert!(((sum - 4500.0) / 4500.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_cluster_rejected() {
        assert_eq!(
            build_cluster(slot(3, 1), NodeId(0), 0, 0.7, 100.0).unwrap_err(),
            PlanError::EmptyCluster {
                level: LevelId(1),
                index: 3
            }
        );
        assert!(matches!(
            compose_cluster(slot(0, 2), Vec::new(), &[], 0.7, 100.0),
            Err(PlanError::EmptyCluster { .. })
        ));
    }

    #[test]
    fn test_single_node_cluster() {
        let (cluster, nodes) = build_cluster(slot(0, 1), NodeId(0), 1, 0.5, 250.0).unwrap();
        assert_eq!(cluster.head, NodeId(0));
        assert_eq!(cluster.shares, vec![250.0]);
        assert_eq!(nodes[0].role, Role::Head);
    }

    #[test]
    fn test_composed_cluster_elects_richest_member() {
        let members = vec![NodeId(0), NodeId(6), NodeId(12)];
        let known = [10.0, 30.0, 20.0];
        let cluster = compose_cluster(slot(9, 2), members, &known, 0.7, 100.0).unwrap();

        assert_eq!(cluster.head, NodeId(6));
        // Member order is preserved, shares follow the ranking
        assert_eq!(cluster.members, vec![NodeId(0), NodeId(6), NodeId(12)]);
        assert!(cluster.shares[1] > cluster.shares[2]);
        assert!(cluster.shares[2] > cluster.shares[0]);
        let sum: f64 = cluster.shares.iter().sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_distribution_errors_name_level() {
        assert_eq!(
            build_cluster(slot(0, 1), NodeId(0), 4, 0.7, -1.0).unwrap_err(),
            PlanError::InvalidResourceBudget {
                value: -1.0,
                level: Some(LevelId(1))
            }
        );
        let members = vec![NodeId(0), NodeId(4)];
        assert_eq!(
            compose_cluster(slot(5, 3), members, &[1.0, 1.0], 1.5, 100.0).unwrap_err(),
            PlanError::InvalidProbability {
                value: 1.5,
                level: Some(LevelId(3))
            }
        );
    }

    #[test]
    fn test_known_shares_must_match_members() {
        let members = vec![NodeId(0), NodeId(4)];
        assert!(matches!(
            compose_cluster(slot(5, 2), members, &[1.0], 0.7, 100.0),
            Err(PlanError::IncompleteHierarchy(_))
        ));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        assert_eq!(rank_by_share(&[5.0, 5.0, 5.0]), vec![0, 1, 2]);
        assert_eq!(rank_by_share(&[1.0, 3.0, 3.0, 2.0]), vec![1, 2, 3, 0]);
        assert_eq!(elect_head(&[2.0, 2.0]), Some(0));
        assert_eq!(elect_head(&[]), None);
    }
}
