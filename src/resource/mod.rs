//! Resource partitioning module.
//!
//! Splits a cluster's resource budget among its members with a truncated
//! geometric rule and converts shares into on/off traffic data rates.

pub mod distributor;

pub use distributor::{data_rate_for_share, distribute, truncated_geometric_portion};
