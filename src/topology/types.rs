//! Topology plan type definitions.
//!
//! The plan is the one-way hand-off to the simulation substrate: rosters,
//! radio groups, address blocks, resource shares, mobility groups and the
//! default traffic pair, all expressed with ids and plain values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::hierarchy::types::{ClusterId, LevelId, NodeId, Role};
use crate::ip::AddressBlock;

// ============================================================================
// Plan settings
// ============================================================================

fn default_port() -> u16 {
    9
}

fn default_packet_size() -> u32 {
    1024
}

fn default_data_rate() -> String {
    "1Mbps".to_string()
}

fn default_on_time() -> Duration {
    Duration::from_secs(1)
}

fn default_mean_off_time() -> Duration {
    Duration::from_millis(500)
}

/// On/off UDP traffic parameters for the default traffic pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSettings {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_packet_size")]
    pub packet_size: u32,
    #[serde(default = "default_data_rate")]
    pub data_rate: String,
    /// Constant on period
    #[serde(default = "default_on_time", with = "humantime_serde")]
    pub on_time: Duration,
    /// Mean of the exponential off period; also converts shares to data rates
    #[serde(default = "default_mean_off_time", with = "humantime_serde")]
    pub mean_off_time: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_packets: Option<u64>,
}

impl Default for TrafficSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            packet_size: default_packet_size(),
            data_rate: default_data_rate(),
            on_time: default_on_time(),
            mean_off_time: default_mean_off_time(),
            max_packets: None,
        }
    }
}

fn default_area() -> f64 {
    500.0
}

fn default_follower_bounds() -> f64 {
    100.0
}

fn default_max_speed() -> f64 {
    1.0
}

/// Movement parameters handed to the substrate's mobility models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilitySettings {
    /// Width of the roaming area in meters
    #[serde(default = "default_area")]
    pub width: f64,
    /// Height of the roaming area in meters
    #[serde(default = "default_area")]
    pub height: f64,
    /// Half extent of the rectangle followers move in around their head
    #[serde(default = "default_follower_bounds")]
    pub follower_bounds: f64,
    #[serde(default)]
    pub min_speed: f64,
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
    #[serde(default, with = "humantime_serde")]
    pub pause: Duration,
}

impl Default for MobilitySettings {
    fn default() -> Self {
        Self {
            width: default_area(),
            height: default_area(),
            follower_bounds: default_follower_bounds(),
            min_speed: 0.0,
            max_speed: default_max_speed(),
            pause: Duration::ZERO,
        }
    }
}

/// Settings the assembler needs beyond the hierarchy itself
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOptions {
    pub traffic: TrafficSettings,
    pub mobility: MobilitySettings,
    pub simulation_time: Duration,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            traffic: TrafficSettings::default(),
            mobility: MobilitySettings::default(),
            simulation_time: Duration::from_secs(100),
        }
    }
}

// ============================================================================
// Plan sections
// ============================================================================

/// One node of the roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: NodeId,
    pub level: LevelId,
    /// Leaf cluster the node was created in
    pub cluster: ClusterId,
    pub role: Role,
    /// Highest level the node takes part in (above 1 only for heads)
    pub top_level: LevelId,
    /// Address inside the leaf cluster block
    pub address: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRoster {
    pub nodes: Vec<NodeEntry>,
}

/// How a radio group associates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RadioMode {
    /// The head acts as access point, the other members as stations
    Infrastructure { access_point: NodeId },
    AdHoc,
}

/// Nodes sharing one radio domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioGroup {
    pub cluster: ClusterId,
    pub level: LevelId,
    pub ssid: String,
    #[serde(flatten)]
    pub mode: RadioMode,
    /// Full membership including the head
    pub members: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    Cluster,
    Uplink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAddress {
    pub node: NodeId,
    pub address: Ipv4Addr,
}

/// A block and the interfaces numbered from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressAssignment {
    pub group: String,
    pub kind: AssignmentKind,
    pub block: AddressBlock,
    pub hosts: Vec<HostAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPlan {
    pub assignments: Vec<AddressAssignment>,
}

/// Share a node holds in one cluster it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub node: NodeId,
    pub cluster: ClusterId,
    pub level: LevelId,
    pub share: f64,
    pub cluster_budget: f64,
    /// `share / mean_off_time`
    pub data_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePlan {
    /// Share of each node in its leaf cluster
    pub shares: BTreeMap<NodeId, f64>,
    /// Every membership share, leaf level first
    pub allocations: Vec<ResourceAllocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// Mobility model description; the substrate draws the random values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum MobilityModel {
    /// Random direction inside `bounds`, relative to the reference node
    RandomDirection {
        bounds: Rectangle,
        min_speed: f64,
        max_speed: f64,
        #[serde(with = "humantime_serde")]
        pause: Duration,
    },
    /// Random waypoint over the whole area
    RandomWaypoint {
        area: Rectangle,
        min_speed: f64,
        max_speed: f64,
        #[serde(with = "humantime_serde")]
        pause: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilityGroup {
    pub cluster: ClusterId,
    pub level: LevelId,
    /// The cluster head
    pub reference: NodeId,
    pub followers: Vec<NodeId>,
    pub model: MobilityModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobilityPlan {
    /// Nodes that move on their own (every leaf head)
    pub roaming: Vec<NodeId>,
    pub roaming_model: MobilityModel,
    pub groups: Vec<MobilityGroup>,
}

/// Default sender/receiver pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficPlan {
    pub sender: NodeId,
    pub receiver: NodeId,
    pub sender_address: Ipv4Addr,
    pub receiver_address: Ipv4Addr,
    #[serde(flatten)]
    pub settings: TrafficSettings,
    #[serde(with = "humantime_serde")]
    pub stop_time: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub level: LevelId,
    pub clusters: usize,
    pub nodes_per_cluster: usize,
    pub total_resources: f64,
    pub pool: String,
}

/// Everything the substrate needs to instantiate the scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyPlan {
    pub levels: Vec<LevelSummary>,
    pub roster: NodeRoster,
    pub radio_groups: Vec<RadioGroup>,
    pub addresses: AddressPlan,
    pub resources: ResourcePlan,
    pub mobility: MobilityPlan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<TrafficPlan>,
}
