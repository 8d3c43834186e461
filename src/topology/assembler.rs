//! Topology plan assembly.
//!
//! Turns a finished [`Hierarchy`] into the [`TopologyPlan`] handed to the
//! simulation substrate. Assembly is all-or-nothing: the hierarchy is
//! re-validated first and no section is produced from a broken tree.

use std::collections::BTreeMap;

use log::{debug, info};

use super::types::*;
use crate::error::PlanError;
use crate::hierarchy::types::{Cluster, Hierarchy, LevelId, NodeId};
use crate::ip::AddressBlock;
use crate::resource::data_rate_for_share;

/// SSID shared by the members of one radio group
pub fn ssid_for(cluster: &Cluster) -> String {
    format!("wifi-cluster-{}", cluster.id.0)
}

/// Assemble a plan with default traffic and mobility settings.
pub fn assemble(hierarchy: &Hierarchy) -> Result<TopologyPlan, PlanError> {
    assemble_with(hierarchy, &PlanOptions::default())
}

/// Assemble a plan from a built hierarchy.
///
/// # Arguments
/// * `hierarchy` - A hierarchy produced by [`crate::hierarchy::build_hierarchy`]
/// * `options` - Traffic, mobility and timing settings copied into the plan
///
/// # Returns
/// * `Ok(TopologyPlan)` with every section filled in
/// * `Err(PlanError::IncompleteHierarchy)` if the hierarchy fails validation
pub fn assemble_with(
    hierarchy: &Hierarchy,
    options: &PlanOptions,
) -> Result<TopologyPlan, PlanError> {
    hierarchy.validate().map_err(|e| match e {
        PlanError::IncompleteHierarchy(_) => e,
        other => PlanError::IncompleteHierarchy(other.to_string()),
    })?;

    let roster = build_roster(hierarchy)?;
    let radio_groups = build_radio_groups(hierarchy);
    let addresses = build_address_plan(hierarchy)?;
    let resources = build_resource_plan(hierarchy, &options.traffic);
    let mobility = build_mobility_plan(hierarchy, &options.mobility);
    let traffic = build_traffic_plan(&roster, options);
    let levels = summarize_levels(hierarchy);

    info!(
        "Assembled plan: {} nodes, {} radio groups, {} address blocks",
        roster.nodes.len(),
        radio_groups.len(),
        addresses.assignments.len()
    );

    Ok(TopologyPlan {
        levels,
        roster,
        radio_groups,
        addresses,
        resources,
        mobility,
        traffic,
    })
}

fn cluster_block(cluster: &Cluster) -> Result<&AddressBlock, PlanError> {
    cluster.address.as_ref().ok_or_else(|| {
        PlanError::IncompleteHierarchy(format!("{} has no address block", cluster.id))
    })
}

/// Numbered hosts of a cluster block, one per member in member order
fn cluster_hosts(cluster: &Cluster) -> Result<Vec<HostAddress>, PlanError> {
    let block = cluster_block(cluster)?;
    cluster
        .members
        .iter()
        .enumerate()
        .map(|(i, &node)| {
            block
                .host(i)
                .map(|address| HostAddress { node, address })
                .ok_or_else(|| {
                    PlanError::IncompleteHierarchy(format!(
                        "{} does not fit in {}",
                        node,
                        block.cidr()
                    ))
                })
        })
        .collect()
}

fn build_roster(hierarchy: &Hierarchy) -> Result<NodeRoster, PlanError> {
    let leaf = &hierarchy.levels[0];
    let mut nodes = Vec::with_capacity(hierarchy.nodes.len());

    for cluster in hierarchy.clusters_in(leaf) {
        for host in cluster_hosts(cluster)? {
            let node = hierarchy.node(host.node).ok_or_else(|| {
                PlanError::IncompleteHierarchy(format!("{} is not in the node arena", host.node))
            })?;
            nodes.push(NodeEntry {
                id: node.id,
                level: node.level,
                cluster: node.cluster,
                role: node.role,
                top_level: hierarchy.top_level_of(node.id).unwrap_or(node.level),
                address: host.address,
            });
        }
    }

    nodes.sort_by_key(|n| n.id);
    Ok(NodeRoster { nodes })
}

fn build_radio_groups(hierarchy: &Hierarchy) -> Vec<RadioGroup> {
    hierarchy
        .levels
        .iter()
        .flat_map(|level| hierarchy.clusters_in(level))
        .map(|cluster| RadioGroup {
            cluster: cluster.id,
            level: cluster.level,
            ssid: ssid_for(cluster),
            mode: if cluster.level == LevelId(1) {
                RadioMode::Infrastructure {
                    access_point: cluster.head,
                }
            } else {
                RadioMode::AdHoc
            },
            members: cluster.members.clone(),
        })
        .collect()
}

fn build_address_plan(hierarchy: &Hierarchy) -> Result<AddressPlan, PlanError> {
    let mut assignments = Vec::with_capacity(hierarchy.clusters.len() + hierarchy.uplinks.len());

    for level in &hierarchy.levels {
        for cluster in hierarchy.clusters_in(level) {
            assignments.push(AddressAssignment {
                group: cluster.id.to_string(),
                kind: AssignmentKind::Cluster,
                block: cluster_block(cluster)?.clone(),
                hosts: cluster_hosts(cluster)?,
            });
        }
    }

    for uplink in &hierarchy.uplinks {
        // A child head that also heads the parent needs a single interface
        let mut ends = vec![uplink.head];
        if uplink.parent_head != uplink.head {
            ends.push(uplink.parent_head);
        }
        let hosts = ends
            .into_iter()
            .enumerate()
            .map(|(i, node)| {
                uplink
                    .block
                    .host(i)
                    .map(|address| HostAddress { node, address })
                    .ok_or_else(|| {
                        PlanError::IncompleteHierarchy(format!(
                            "uplink block {} is too small",
                            uplink.block
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        assignments.push(AddressAssignment {
            group: format!("uplink-{}-{}", uplink.child, uplink.parent),
            kind: AssignmentKind::Uplink,
            block: uplink.block.clone(),
            hosts,
        });
    }

    debug!("Address plan holds {} blocks", assignments.len());
    Ok(AddressPlan { assignments })
}

fn build_resource_plan(hierarchy: &Hierarchy, traffic: &TrafficSettings) -> ResourcePlan {
    let mean_off = traffic.mean_off_time.as_secs_f64();
    let shares: BTreeMap<NodeId, f64> = hierarchy
        .nodes
        .iter()
        .map(|n| (n.id, n.resource_share))
        .collect();

    let allocations = hierarchy
        .levels
        .iter()
        .flat_map(|level| hierarchy.clusters_in(level))
        .flat_map(|cluster| {
            cluster
                .members
                .iter()
                .zip(&cluster.shares)
                .map(move |(&node, &share)| ResourceAllocation {
                    node,
                    cluster: cluster.id,
                    level: cluster.level,
                    share,
                    cluster_budget: cluster.total_resources,
                    data_rate: data_rate_for_share(share, mean_off),
                })
        })
        .collect();

    ResourcePlan { shares, allocations }
}

fn build_mobility_plan(hierarchy: &Hierarchy, settings: &MobilitySettings) -> MobilityPlan {
    let area = Rectangle {
        x_min: 0.0,
        x_max: settings.width,
        y_min: 0.0,
        y_max: settings.height,
    };
    let waypoint = MobilityModel::RandomWaypoint {
        area,
        min_speed: settings.min_speed,
        max_speed: settings.max_speed,
        pause: settings.pause,
    };
    let follow = MobilityModel::RandomDirection {
        bounds: Rectangle {
            x_min: -settings.follower_bounds,
            x_max: settings.follower_bounds,
            y_min: -settings.follower_bounds,
            y_max: settings.follower_bounds,
        },
        min_speed: settings.min_speed,
        max_speed: settings.max_speed,
        pause: settings.pause,
    };

    let leaf = &hierarchy.levels[0];
    let roaming = hierarchy.clusters_in(leaf).map(|c| c.head).collect();

    let groups = hierarchy
        .levels
        .iter()
        .flat_map(|level| hierarchy.clusters_in(level))
        .map(|cluster| MobilityGroup {
            cluster: cluster.id,
            level: cluster.level,
            reference: cluster.head,
            followers: cluster.followers().collect(),
            model: if cluster.level == LevelId(1) {
                follow.clone()
            } else {
                waypoint.clone()
            },
        })
        .collect();

    MobilityPlan {
        roaming,
        roaming_model: waypoint,
        groups,
    }
}

/// First node of the first leaf cluster sends to the last node of the last
fn build_traffic_plan(roster: &NodeRoster, options: &PlanOptions) -> Option<TrafficPlan> {
    let sender = roster.nodes.first()?;
    let receiver = roster.nodes.last()?;
    if sender.id == receiver.id {
        return None;
    }
    Some(TrafficPlan {
        sender: sender.id,
        receiver: receiver.id,
        sender_address: sender.address,
        receiver_address: receiver.address,
        settings: options.traffic.clone(),
        stop_time: options.simulation_time,
    })
}

fn summarize_levels(hierarchy: &Hierarchy) -> Vec<LevelSummary> {
    hierarchy
        .levels
        .iter()
        .map(|level| {
            let nodes_per_cluster = hierarchy
                .clusters_in(level)
                .map(|c| c.len())
                .max()
                .unwrap_or(0);
            let pool = hierarchy
                .clusters_in(level)
                .next()
                .and_then(|c| c.address.as_ref())
                .map(|b| b.pool.to_string())
                .unwrap_or_else(|| level.pool.to_string());
            LevelSummary {
                level: level.id,
                clusters: level.clusters.len(),
                nodes_per_cluster,
                total_resources: level.total_resources,
                pool,
            }
        })
        .collect()
}
