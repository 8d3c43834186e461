//! # ClusterSim - Topology planner for hierarchical ad hoc network simulations
//!
//! This library builds the logical topology of a multi-level clustered ad hoc
//! network and hands it to an external simulation substrate as a plan.
//!
//! ## Overview
//!
//! Given a cluster count and cluster size per level, ClusterSim builds a tree
//! of clusters bottom-up, elects a head in each cluster, divides every
//! cluster's resource budget among its members with a truncated geometric
//! rule, and carves disjoint address blocks for every cluster and every
//! child-to-parent uplink. The output is deterministic: the same scenario
//! always produces byte-identical plan files.
//!
//! ## Architecture
//!
//! - `config`: Typed scenario configuration and validation
//! - `config_loader`: Scenario file loading and CLI overrides
//! - `resource`: Truncated geometric resource distribution
//! - `hierarchy`: Cluster, level and head construction
//! - `ip`: Address pools and block allocation
//! - `topology`: Plan assembly and reports
//! - `stats`: Traffic observer contract and run statistics
//! - `orchestrator`: End-to-end planning and file output
//! - `utils`: Address arithmetic and plan validation helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use clustersim::{config_loader, orchestrator};
//! use std::path::Path;
//!
//! let config = config_loader::load_config(Path::new("scenario.yaml"))?;
//! let (plan, files) = orchestrator::generate_topology_plan(&config, Path::new("topology_output"), false)?;
//!
//! // topology_output now contains topology_plan.yaml, node_roster.json,
//! // address_plan.json, resource_plan.json and summary.txt
//! println!("{} nodes, {} files", plan.roster.nodes.len(), files.len());
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! general:
//!   simulation_time: "100s"
//!
//! hierarchy:
//!   probability: 0.7
//!   total_resources: 4500
//!   levels:
//!     - cluster_count: 6
//!       nodes_per_cluster: 6
//!     - {}              # collapses into the aggregation root
//!
//! traffic:
//!   port: 9
//!   mean_off_time: "500ms"
//! ```
//!
//! ## Error Handling
//!
//! Planning functions return [`error::PlanError`]; configuration checks
//! return [`config::ValidationError`]. The loader and orchestrator wrap both
//! with `color_eyre` context.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod hierarchy;
pub mod ip;
pub mod orchestrator;
pub mod resource;
pub mod stats;
pub mod topology;
pub mod utils;
