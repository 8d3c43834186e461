//! Planning error taxonomy.
//!
//! Every failure of the planning core is fatal: the run aborts and the
//! error names the offending level, cluster or pool.

use crate::hierarchy::types::LevelId;
use crate::ip::PoolId;

/// Errors raised while distributing resources, building the hierarchy,
/// allocating addresses or assembling the topology plan.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error(
        "Invalid probability {value}{}: must lie strictly between 0 and 1 and keep the normalizer non-zero",
        on_level(.level)
    )]
    InvalidProbability { value: f64, level: Option<LevelId> },

    #[error("Invalid point count {count}{}: at least one point is required", on_level(.level))]
    InvalidPointCount { count: usize, level: Option<LevelId> },

    #[error("Invalid resource budget {value}{}: must be a positive finite number", on_level(.level))]
    InvalidResourceBudget { value: f64, level: Option<LevelId> },

    #[error("Cluster {index} on level {level} would be empty")]
    EmptyCluster { level: LevelId, index: usize },

    #[error("Level {level} size mismatch: {cluster_count} clusters x {nodes_per_cluster} nodes != {available} heads from level below")]
    LevelSizeMismatch {
        level: LevelId,
        cluster_count: usize,
        nodes_per_cluster: usize,
        available: usize,
    },

    #[error("Level {0} has no clusters")]
    EmptyLevel(LevelId),

    #[error("Level {level} is missing its {field}")]
    MissingLevelSpec { level: LevelId, field: &'static str },

    #[error("Top level {level} has {clusters} clusters, expected a single aggregation root")]
    MissingAggregationRoot { level: LevelId, clusters: usize },

    #[error("Address pool {pool} exhausted: {reason}")]
    AddressSpaceExhausted { pool: PoolId, reason: String },

    #[error("Address pool {pool} ({range}) overlaps pool {other}")]
    OverlappingPools {
        pool: PoolId,
        other: PoolId,
        range: String,
    },

    #[error("Unknown address pool {0}")]
    UnknownPool(PoolId),

    #[error("Hierarchy is incomplete: {0}")]
    IncompleteHierarchy(String),
}

fn on_level(level: &Option<LevelId>) -> String {
    level.map(|l| format!(" on level {}", l)).unwrap_or_default()
}

impl PlanError {
    /// Attach the level a distribution error was raised for
    pub fn on_level(self, at: LevelId) -> Self {
        match self {
            PlanError::InvalidProbability { value, level: None } => {
                PlanError::InvalidProbability { value, level: Some(at) }
            }
            PlanError::InvalidPointCount { count, level: None } => {
                PlanError::InvalidPointCount { count, level: Some(at) }
            }
            PlanError::InvalidResourceBudget { value, level: None } => {
                PlanError::InvalidResourceBudget { value, level: Some(at) }
            }
            other => other,
        }
    }
}
