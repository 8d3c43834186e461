//! Recursive hierarchy construction.
//!
//! Level 1 is built from fresh nodes. Every higher level groups the heads of
//! the level below into new clusters without creating nodes. Levels are
//! built strictly bottom-up; clusters inside one level are independent and
//! built in parallel, then addressed sequentially through the allocator.

use log::{debug, info, warn};
use rayon::prelude::*;

use super::cluster::{build_cluster, compose_cluster, ClusterSlot};
use super::types::{Cluster, ClusterId, Hierarchy, Level, LevelId, Node, NodeId, Uplink};
use crate::error::PlanError;
use crate::ip::{AddressAllocator, PoolId, PoolKind, PoolSpec};
use crate::utils::usable_hosts;

/// Addresses needed by an uplink pairing: the child head and the parent head
pub const UPLINK_ADDRESSES: usize = 2;

/// Requested shape and parameters of one level
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSpec {
    /// May be omitted (or left at 1) on the last level to collapse it into
    /// a single aggregation root
    pub cluster_count: Option<usize>,
    /// Ignored on a collapsed last level
    pub nodes_per_cluster: Option<usize>,
    /// Budget of every cluster on this level
    pub total_resources: f64,
    pub probability: f64,
    pub pool: PoolSpec,
}

impl LevelSpec {
    pub fn new(
        level: LevelId,
        cluster_count: Option<usize>,
        nodes_per_cluster: Option<usize>,
        probability: f64,
        total_resources: f64,
    ) -> Self {
        Self {
            cluster_count,
            nodes_per_cluster,
            total_resources,
            probability,
            pool: PoolSpec::default_for_level(level),
        }
    }
}

/// Everything the builder needs
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchySpec {
    /// Leaf level first
    pub levels: Vec<LevelSpec>,
    pub uplink_pool: PoolSpec,
}

impl HierarchySpec {
    /// Levels sharing one probability and one per-cluster budget, with
    /// default address pools
    pub fn uniform(
        shapes: &[(Option<usize>, Option<usize>)],
        probability: f64,
        total_resources: f64,
    ) -> Self {
        let levels = shapes
            .iter()
            .enumerate()
            .map(|(i, &(count, per_cluster))| {
                LevelSpec::new(
                    LevelId(i as u32 + 1),
                    count,
                    per_cluster,
                    probability,
                    total_resources,
                )
            })
            .collect();
        Self {
            levels,
            uplink_pool: PoolSpec::default_uplink(),
        }
    }
}

/// Resolved cluster count and cluster size of a level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelShape {
    pub cluster_count: usize,
    pub nodes_per_cluster: usize,
}

/// Resolve and validate the shape of every level before anything is built.
///
/// Applies the collapsing rule to the last level and checks
/// `cluster_count[k] * nodes_per_cluster[k] == cluster_count[k-1]` at every
/// transition.
pub fn resolve_shapes(levels: &[LevelSpec]) -> Result<Vec<LevelShape>, PlanError> {
    let last = levels.len();
    if last == 0 {
        return Err(PlanError::MissingLevelSpec {
            level: LevelId(1),
            field: "level definition",
        });
    }

    let mut shapes: Vec<LevelShape> = Vec::with_capacity(last);
    for (i, spec) in levels.iter().enumerate() {
        let level = LevelId(i as u32 + 1);
        if spec.cluster_count == Some(0) {
            return Err(PlanError::EmptyLevel(level));
        }
        let is_last = i + 1 == last;
        let collapses = is_last && matches!(spec.cluster_count, None | Some(1));

        let shape = match shapes.last() {
            None => {
                let nodes_per_cluster = spec.nodes_per_cluster.ok_or(PlanError::MissingLevelSpec {
                    level,
                    field: "nodes_per_cluster",
                })?;
                let cluster_count = match spec.cluster_count {
                    Some(count) => count,
                    None if collapses => 1,
                    None => {
                        return Err(PlanError::MissingLevelSpec {
                            level,
                            field: "cluster_count",
                        })
                    }
                };
                LevelShape {
                    cluster_count,
                    nodes_per_cluster,
                }
            }
            Some(below) if collapses => {
                if let Some(requested) = spec.nodes_per_cluster {
                    if requested != below.cluster_count {
                        warn!(
                            "Level {} collapses into the aggregation root; nodes_per_cluster {} replaced by {}",
                            level, requested, below.cluster_count
                        );
                    }
                }
                LevelShape {
                    cluster_count: 1,
                    nodes_per_cluster: below.cluster_count,
                }
            }
            Some(below) => {
                let cluster_count = spec.cluster_count.ok_or(PlanError::MissingLevelSpec {
                    level,
                    field: "cluster_count",
                })?;
                let nodes_per_cluster = spec.nodes_per_cluster.ok_or(PlanError::MissingLevelSpec {
                    level,
                    field: "nodes_per_cluster",
                })?;
                if cluster_count.checked_mul(nodes_per_cluster) != Some(below.cluster_count) {
                    return Err(PlanError::LevelSizeMismatch {
                        level,
                        cluster_count,
                        nodes_per_cluster,
                        available: below.cluster_count,
                    });
                }
                LevelShape {
                    cluster_count,
                    nodes_per_cluster,
                }
            }
        };

        if shape.cluster_count == 0 {
            return Err(PlanError::EmptyLevel(level));
        }
        debug!(
            "Level {}: {} clusters of {} nodes",
            level, shape.cluster_count, shape.nodes_per_cluster
        );
        shapes.push(shape);
    }

    let top = shapes[last - 1];
    if top.cluster_count != 1 {
        return Err(PlanError::MissingAggregationRoot {
            level: LevelId(last as u32),
            clusters: top.cluster_count,
        });
    }
    Ok(shapes)
}

/// Check that every block can hold the addresses drawn from it: one per
/// cluster member on each level, and one uplink pairing per uplink block.
///
/// Runs before any pool is created or any node built.
pub fn check_block_capacity(
    levels: &[LevelSpec],
    shapes: &[LevelShape],
    uplink_pool: &PoolSpec,
) -> Result<(), PlanError> {
    for (i, (spec, shape)) in levels.iter().zip(shapes).enumerate() {
        let hosts = usable_hosts(spec.pool.block_prefix);
        if shape.nodes_per_cluster as u64 > hosts {
            return Err(PlanError::AddressSpaceExhausted {
                pool: PoolId(i as u32),
                reason: format!(
                    "level {} needs {} addresses per cluster but a /{} block holds {}",
                    i + 1,
                    shape.nodes_per_cluster,
                    spec.pool.block_prefix,
                    hosts
                ),
            });
        }
    }

    let hosts = usable_hosts(uplink_pool.block_prefix);
    if shapes.len() > 1 && (UPLINK_ADDRESSES as u64) > hosts {
        return Err(PlanError::AddressSpaceExhausted {
            pool: PoolId(levels.len() as u32),
            reason: format!(
                "an uplink needs {} addresses but a /{} block holds {}",
                UPLINK_ADDRESSES, uplink_pool.block_prefix, hosts
            ),
        });
    }
    Ok(())
}

/// Build the whole hierarchy, its address blocks and uplink pairings.
pub fn build_hierarchy(spec: &HierarchySpec) -> Result<Hierarchy, PlanError> {
    let shapes = resolve_shapes(&spec.levels)?;
    check_block_capacity(&spec.levels, &shapes, &spec.uplink_pool)?;
    info!(
        "Building {}-level hierarchy: {}",
        shapes.len(),
        shapes
            .iter()
            .map(|s| format!("{}x{}", s.cluster_count, s.nodes_per_cluster))
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let mut allocator = AddressAllocator::new();
    let mut level_pools = Vec::with_capacity(shapes.len());
    for (i, (level_spec, shape)) in spec.levels.iter().zip(&shapes).enumerate() {
        let level = LevelId(i as u32 + 1);
        level_pools.push(allocator.new_pool(
            PoolKind::Level(level),
            level_spec.pool,
            shape.cluster_count,
        )?);
    }
    let uplink_count: usize = shapes[..shapes.len() - 1]
        .iter()
        .map(|s| s.cluster_count)
        .sum();
    let uplink_pool = allocator.new_pool(PoolKind::Uplink, spec.uplink_pool, uplink_count)?;

    let mut hierarchy = Hierarchy {
        nodes: Vec::new(),
        clusters: Vec::new(),
        levels: Vec::new(),
        uplinks: Vec::new(),
        uplink_pool,
    };

    for (i, (level_spec, shape)) in spec.levels.iter().zip(&shapes).enumerate() {
        let level = LevelId(i as u32 + 1);
        let first_id = hierarchy.clusters.len() as u32;

        let built = if i == 0 {
            let (clusters, nodes) = build_leaf_level(level, first_id, *shape, level_spec)?;
            hierarchy.nodes = nodes;
            clusters
        } else {
            build_upper_level(&hierarchy, level, first_id, *shape, level_spec)?
        };

        let pool = level_pools[i];
        let level_clusters = assign_addresses(&mut allocator, pool, built)?;

        if i > 0 {
            let below = &hierarchy.levels[i - 1];
            let uplinks =
                link_children(&mut allocator, uplink_pool, &hierarchy, below, &level_clusters)?;
            hierarchy.uplinks.extend(uplinks);
        }

        info!(
            "Level {}: built {} clusters, heads {:?}",
            level,
            level_clusters.len(),
            level_clusters.iter().map(|c| c.head.0).collect::<Vec<_>>()
        );

        hierarchy.levels.push(Level {
            id: level,
            clusters: level_clusters.iter().map(|c| c.id).collect(),
            total_resources: level_spec.total_resources * level_clusters.len() as f64,
            pool,
        });
        hierarchy.clusters.extend(level_clusters);
    }

    hierarchy.validate()?;
    Ok(hierarchy)
}

/// Build the leaf clusters and their nodes in parallel.
fn build_leaf_level(
    level: LevelId,
    first_id: u32,
    shape: LevelShape,
    spec: &LevelSpec,
) -> Result<(Vec<Cluster>, Vec<Node>), PlanError> {
    let per_cluster = shape.nodes_per_cluster;
    let built: Vec<(Cluster, Vec<Node>)> = (0..shape.cluster_count)
        .into_par_iter()
        .map(|index| {
            let slot = ClusterSlot {
                id: ClusterId(first_id + index as u32),
                level,
                index,
            };
            let first_node = NodeId((index * per_cluster) as u32);
            build_cluster(slot, first_node, per_cluster, spec.probability, spec.total_resources)
        })
        .collect::<Result<_, _>>()?;

    let mut clusters = Vec::with_capacity(built.len());
    let mut nodes = Vec::with_capacity(shape.cluster_count * per_cluster);
    for (cluster, cluster_nodes) in built {
        clusters.push(cluster);
        nodes.extend(cluster_nodes);
    }
    Ok((clusters, nodes))
}

/// Group the heads of the previous level into this level's clusters.
fn build_upper_level(
    hierarchy: &Hierarchy,
    level: LevelId,
    first_id: u32,
    shape: LevelShape,
    spec: &LevelSpec,
) -> Result<Vec<Cluster>, PlanError> {
    let below = level
        .index()
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| hierarchy.levels.get(i))
        .ok_or_else(|| {
            PlanError::IncompleteHierarchy(format!("level {} has no level below it", level))
        })?;

    // Head pool: one head per cluster below, with the share it holds there
    let head_pool: Vec<(NodeId, f64)> = hierarchy
        .clusters_in(below)
        .map(|c| (c.head, c.share_of(c.head).unwrap_or(0.0)))
        .collect();

    head_pool
        .par_chunks(shape.nodes_per_cluster)
        .enumerate()
        .map(|(index, group)| {
            let slot = ClusterSlot {
                id: ClusterId(first_id + index as u32),
                level,
                index,
            };
            let members: Vec<NodeId> = group.iter().map(|(head, _)| *head).collect();
            let known: Vec<f64> = group.iter().map(|(_, share)| *share).collect();
            compose_cluster(slot, members, &known, spec.probability, spec.total_resources)
        })
        .collect()
}

/// Draw one block per cluster from the level pool, in cluster order.
fn assign_addresses(
    allocator: &mut AddressAllocator,
    pool: PoolId,
    clusters: Vec<Cluster>,
) -> Result<Vec<Cluster>, PlanError> {
    clusters
        .into_iter()
        .map(|mut cluster| {
            let block = allocator.allocate_block(pool, cluster.id, cluster.len())?;
            cluster.address = Some(block);
            Ok(cluster)
        })
        .collect()
}

/// Pair each child cluster's head with the parent cluster it was promoted into.
fn link_children(
    allocator: &mut AddressAllocator,
    uplink_pool: PoolId,
    hierarchy: &Hierarchy,
    below: &Level,
    parents: &[Cluster],
) -> Result<Vec<Uplink>, PlanError> {
    let mut uplinks = Vec::with_capacity(below.clusters.len());
    for child in hierarchy.clusters_in(below) {
        let parent = parents
            .iter()
            .find(|p| p.members.contains(&child.head))
            .ok_or_else(|| {
                PlanError::IncompleteHierarchy(format!(
                    "head {} of {} was not promoted to level {}",
                    child.head,
                    child.id,
                    below.id.0 + 1
                ))
            })?;
        let block = allocator.allocate_block(uplink_pool, child.id, UPLINK_ADDRESSES)?;
        uplinks.push(Uplink {
            child: child.id,
            parent: parent.id,
            head: child.head,
            parent_head: parent.head,
            block,
        });
    }
    Ok(uplinks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_level_collapses_to_root() {
        let spec =
            HierarchySpec::uniform(&[(Some(6), Some(6)), (Some(1), Some(6))], 0.7, 4500.0);
        let hierarchy = build_hierarchy(&spec).unwrap();

        assert_eq!(hierarchy.levels.len(), 2);
        assert_eq!(hierarchy.nodes.len(), 36);
        let root = hierarchy.root().unwrap();
        assert_eq!(root.members.len(), 6);

        let leaf_heads: Vec<NodeId> = hierarchy
            .clusters_in(&hierarchy.levels[0])
            .map(|c| c.head)
            .collect();
        assert_eq!(root.members, leaf_heads);
        assert!((root.shares[0] - 3152.3).abs() < 0.01);
    }

    #[test]
    fn test_omitted_last_level_shape() {
        let spec = HierarchySpec::uniform(&[(Some(4), Some(3)), (None, None)], 0.5, 100.0);
        let shapes = resolve_shapes(&spec.levels).unwrap();
        assert_eq!(
            shapes[1],
            LevelShape {
                cluster_count: 1,
                nodes_per_cluster: 4
            }
        );
    }

    #[test]
    fn test_level_size_mismatch() {
        let spec = HierarchySpec::uniform(
            &[(Some(10), Some(2)), (Some(3), Some(4)), (None, None)],
            0.7,
            100.0,
        );
        assert_eq!(
            build_hierarchy(&spec).unwrap_err(),
            PlanError::LevelSizeMismatch {
                level: LevelId(2),
                cluster_count: 3,
                nodes_per_cluster: 4,
                available: 10,
            }
        );
    }

    #[test]
    fn test_explicit_multi_cluster_top_level() {
        let spec =
            HierarchySpec::uniform(&[(Some(4), Some(2)), (Some(2), Some(2))], 0.7, 100.0);
        assert_eq!(
            build_hierarchy(&spec).unwrap_err(),
            PlanError::MissingAggregationRoot {
                level: LevelId(2),
                clusters: 2
            }
        );
    }

    #[test]
    fn test_single_level_defaults_to_one_cluster() {
        let spec = HierarchySpec::uniform(&[(None, Some(5))], 0.7, 100.0);
        let hierarchy = build_hierarchy(&spec).unwrap();
        assert_eq!(hierarchy.clusters.len(), 1);
        assert!(hierarchy.uplinks.is_empty());

        let spec = HierarchySpec::uniform(&[(Some(3), Some(5))], 0.7, 100.0);
        assert!(matches!(
            build_hierarchy(&spec),
            Err(PlanError::MissingAggregationRoot { .. })
        ));
    }

    #[test]
    fn test_missing_fields() {
        let spec = HierarchySpec::uniform(&[(Some(2), None), (None, None)], 0.7, 100.0);
        assert_eq!(
            resolve_shapes(&spec.levels).unwrap_err(),
            PlanError::MissingLevelSpec {
                level: LevelId(1),
                field: "nodes_per_cluster"
            }
        );

        let spec = HierarchySpec::uniform(
            &[(Some(4), Some(2)), (None, Some(2)), (None, None)],
            0.7,
            100.0,
        );
        assert_eq!(
            resolve_shapes(&spec.levels).unwrap_err(),
            PlanError::MissingLevelSpec {
                level: LevelId(2),
                field: "cluster_count"
            }
        );
        assert!(resolve_shapes(&[]).is_err());
    }

    #[test]
    fn test_empty_leaf_cluster() {
        let spec = HierarchySpec::uniform(&[(Some(2), Some(0)), (None, None)], 0.7, 100.0);
        assert!(matches!(
            build_hierarchy(&spec),
            Err(PlanError::EmptyCluster { .. })
        ));
    }

    #[test]
    fn test_zero_clusters_on_a_level() {
        let spec = HierarchySpec::uniform(&[(Some(0), Some(3)), (None, None)], 0.7, 100.0);
        assert_eq!(
            resolve_shapes(&spec.levels).unwrap_err(),
            PlanError::EmptyLevel(LevelId(1))
        );
    }

    #[test]
    fn test_zero_clusters_on_the_last_level() {
        let spec = HierarchySpec::uniform(&[(Some(0), Some(3))], 0.7, 100.0);
        assert_eq!(
            resolve_shapes(&spec.levels).unwrap_err(),
            PlanError::EmptyLevel(LevelId(1))
        );

        let spec = HierarchySpec::uniform(&[(Some(4), Some(3)), (Some(0), None)], 0.7, 100.0);
        assert_eq!(
            resolve_shapes(&spec.levels).unwrap_err(),
            PlanError::EmptyLevel(LevelId(2))
        );
    }

    #[test]
    fn test_collapsed_root_ignores_requested_size() {
        let spec = HierarchySpec::uniform(&[(Some(2), Some(3)), (Some(1), Some(4))], 0.7, 100.0);
        let shapes = resolve_shapes(&spec.levels).unwrap();
        assert_eq!(
            shapes[1],
            LevelShape {
                cluster_count: 1,
                nodes_per_cluster: 2
            }
        );

        let hierarchy = build_hierarchy(&spec).unwrap();
        assert_eq!(hierarchy.root().unwrap().members.len(), 2);
    }

    #[test]
    fn test_oversized_cluster_rejected_before_build() {
        let spec = HierarchySpec::uniform(&[(Some(1), Some(1usize << 40))], 0.7, 100.0);
        match build_hierarchy(&spec) {
            Err(PlanError::AddressSpaceExhausted { pool, reason }) => {
                assert_eq!(pool, PoolId(0));
                assert!(reason.contains("level 1"));
            }
            other => panic!("expected AddressSpaceExhausted, got {:?}", other),
        }

        let mut spec = HierarchySpec::uniform(&[(Some(2), Some(2)), (None, None)], 0.7, 100.0);
        spec.uplink_pool.block_prefix = 32;
        assert!(matches!(
            build_hierarchy(&spec),
            Err(PlanError::AddressSpaceExhausted { pool: PoolId(2), .. })
        ));
    }

    #[test]
    fn test_three_levels_and_uplinks() {
        let spec = HierarchySpec::uniform(
            &[(Some(6), Some(4)), (Some(2), Some(3)), (None, None)],
            0.7,
            1000.0,
        );
        let hierarchy = build_hierarchy(&spec).unwrap();

        assert_eq!(hierarchy.levels[0].clusters.len(), 6);
        assert_eq!(hierarchy.levels[1].clusters.len(), 2);
        assert_eq!(hierarchy.levels[2].clusters.len(), 1);
        assert_eq!(hierarchy.nodes.len(), 24);
        // One uplink per cluster below the root
        assert_eq!(hierarchy.uplinks.len(), 8);

        for uplink in &hierarchy.uplinks {
            let parent = hierarchy.cluster(uplink.parent).unwrap();
            assert!(parent.members.contains(&uplink.head));
            assert_eq!(parent.head, uplink.parent_head);
            assert_eq!(uplink.block.pool, hierarchy.uplink_pool);
        }

        let root = hierarchy.root().unwrap();
        assert_eq!(root.members.len(), 2);
        assert_eq!(hierarchy.levels[1].total_resources, 2000.0);
    }

    #[test]
    fn test_deterministic_rebuild() {
        let spec = HierarchySpec::uniform(&[(Some(6), Some(6)), (None, None)], 0.7, 4500.0);
        assert_eq!(build_hierarchy(&spec).unwrap(), build_hierarchy(&spec).unwrap());
    }
}
