//! Traffic statistics collected while the substrate runs a plan.
//!
//! The substrate reports packet events through [`TrafficObserver`]; the
//! caller owns the [`SimulationStats`] and reads the totals afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::hierarchy::types::NodeId;

/// Packet events the substrate reports back
pub trait TrafficObserver {
    fn on_packet_sent(&mut self, node: NodeId);
    fn on_packet_received(&mut self, node: NodeId);
}

/// Per-node packet counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketCounts {
    pub sent: u64,
    pub received: u64,
}

/// Totals for one simulation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub sent: u64,
    pub received: u64,
    pub per_node: BTreeMap<NodeId, PacketCounts>,
}

impl SimulationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Received packets per second of simulated time
    pub fn throughput(&self, simulation_time: Duration) -> f64 {
        let secs = simulation_time.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.received as f64 / secs
    }

    /// Fraction of sent packets that never arrived, 0 when nothing was sent
    pub fn loss_rate(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        self.sent.saturating_sub(self.received) as f64 / self.sent as f64
    }

    pub fn counts(&self, node: NodeId) -> PacketCounts {
        self.per_node.get(&node).copied().unwrap_or_default()
    }
}

impl TrafficObserver for SimulationStats {
    fn on_packet_sent(&mut self, node: NodeId) {
        self.sent += 1;
        self.per_node.entry(node).or_default().sent += 1;
    }

    fn on_packet_received(&mut self, node: NodeId) {
        self.received += 1;
        self.per_node.entry(node).or_default().received += 1;
    }
}
