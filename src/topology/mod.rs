//! Topology plan module.
//!
//! Flattens a built hierarchy into the plan sections the simulation
//! substrate consumes and writes them out as reports.

pub mod assembler;
pub mod report;
pub mod types;

// Re-export commonly used types
pub use assembler::{assemble, assemble_with};
pub use types::{
    AddressPlan, MobilityPlan, MobilitySettings, NodeRoster, PlanOptions, RadioGroup, ResourcePlan,
    TopologyPlan, TrafficPlan, TrafficSettings,
};
