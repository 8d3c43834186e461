//! Scenario configuration.
//!
//! A scenario is a YAML document with `general`, `hierarchy`, `addressing`,
//! `traffic` and `mobility` sections. Everything except the level list has
//! a default.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::hierarchy::{check_block_capacity, resolve_shapes, HierarchySpec, LevelId, LevelSpec};
use crate::ip::PoolSpec;
use crate::topology::types::{MobilitySettings, PlanOptions, TrafficSettings};
use crate::utils::ip_utils::{is_private_ipv4, parse_cidr};

/// Root of a scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    pub hierarchy: HierarchyConfig,
    #[serde(default)]
    pub addressing: AddressingConfig,
    #[serde(default)]
    pub traffic: TrafficSettings,
    #[serde(default)]
    pub mobility: MobilitySettings,
}

fn default_simulation_time() -> Duration {
    Duration::from_secs(100)
}

/// Shared general configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_simulation_time", with = "humantime_serde")]
    pub simulation_time: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            simulation_time: default_simulation_time(),
            log_level: None,
        }
    }
}

fn default_probability() -> f64 {
    0.7
}

fn default_total_resources() -> f64 {
    1000.0
}

/// Shape of the cluster tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Truncated-geometric parameter shared by all levels
    #[serde(default = "default_probability")]
    pub probability: f64,
    /// Per-cluster budget shared by all levels
    #[serde(default = "default_total_resources")]
    pub total_resources: f64,
    /// Leaf level first
    pub levels: Vec<LevelConfig>,
}

/// One level of the tree; per-level values override the shared ones
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes_per_cluster: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_resources: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

/// Address pool layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressingConfig {
    /// Pools for the first levels; missing entries use the default layout
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub levels: Vec<PoolConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uplink: Option<PoolConfig>,
}

/// A pool range in `a.b.c.d/len` notation and the block size carved from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub base: String,
    pub block_prefix: u8,
}

impl PoolConfig {
    /// Parse into a pool spec
    pub fn to_spec(&self) -> Result<PoolSpec, String> {
        let (base, pool_prefix) = parse_cidr(&self.base)?;
        if self.block_prefix > 32 {
            return Err(format!("block_prefix {} out of range", self.block_prefix));
        }
        if self.block_prefix < pool_prefix {
            return Err(format!(
                "block_prefix /{} is wider than the pool {}",
                self.block_prefix, self.base
            ));
        }
        Ok(PoolSpec::new(base, pool_prefix, self.block_prefix))
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid hierarchy configuration: {0}")]
    InvalidHierarchy(String),
    #[error("Invalid addressing configuration: {0}")]
    InvalidAddressing(String),
    #[error("Invalid traffic configuration: {0}")]
    InvalidTraffic(String),
    #[error("Invalid mobility configuration: {0}")]
    InvalidMobility(String),
}

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

fn check_probability(p: f64, context: &str) -> Result<(), ValidationError> {
    if !(p > 0.0 && p < 1.0) {
        return Err(ValidationError::InvalidHierarchy(format!(
            "{} probability {} must lie strictly between 0 and 1",
            context, p
        )));
    }
    Ok(())
}

fn check_budget(total: f64, context: &str) -> Result<(), ValidationError> {
    if !(total.is_finite() && total > 0.0) {
        return Err(ValidationError::InvalidHierarchy(format!(
            "{} total_resources {} must be positive",
            context, total
        )));
    }
    Ok(())
}

impl ScenarioConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_general()?;
        self.validate_addressing()?;
        self.validate_traffic()?;
        self.validate_mobility()?;
        self.validate_hierarchy()?;
        Ok(())
    }

    fn validate_general(&self) -> Result<(), ValidationError> {
        if self.general.simulation_time.is_zero() {
            return Err(ValidationError::InvalidGeneral(
                "simulation_time must be greater than zero".to_string(),
            ));
        }
        if let Some(level) = &self.general.log_level {
            if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
                return Err(ValidationError::InvalidGeneral(format!(
                    "Unknown log_level '{}', expected one of {:?}",
                    level, LOG_LEVELS
                )));
            }
        }
        Ok(())
    }

    fn validate_hierarchy(&self) -> Result<(), ValidationError> {
        let hierarchy = &self.hierarchy;
        if hierarchy.levels.is_empty() {
            return Err(ValidationError::InvalidHierarchy(
                "At least one level must be defined".to_string(),
            ));
        }
        check_probability(hierarchy.probability, "Shared")?;
        check_budget(hierarchy.total_resources, "Shared")?;

        for (i, level) in hierarchy.levels.iter().enumerate() {
            let context = format!("Level {}", i + 1);
            if let Some(p) = level.probability {
                check_probability(p, &context)?;
            }
            if let Some(total) = level.total_resources {
                check_budget(total, &context)?;
            }
        }

        // Shape rules (level transitions, collapsing, single root)
        let spec = self.to_hierarchy_spec()?;
        let shapes = resolve_shapes(&spec.levels)
            .map_err(|e| ValidationError::InvalidHierarchy(e.to_string()))?;
        check_block_capacity(&spec.levels, &shapes, &spec.uplink_pool)
            .map_err(|e| ValidationError::InvalidAddressing(e.to_string()))?;
        Ok(())
    }

    fn validate_addressing(&self) -> Result<(), ValidationError> {
        if self.addressing.levels.len() > self.hierarchy.levels.len() {
            return Err(ValidationError::InvalidAddressing(format!(
                "{} level pools configured for {} levels",
                self.addressing.levels.len(),
                self.hierarchy.levels.len()
            )));
        }

        let spec = self.to_hierarchy_spec()?;
        let pools: Vec<PoolSpec> = spec
            .levels
            .iter()
            .map(|l| l.pool)
            .chain(std::iter::once(spec.uplink_pool))
            .collect();
        for (i, a) in pools.iter().enumerate() {
            for b in &pools[i + 1..] {
                if a.overlaps(b) {
                    return Err(ValidationError::InvalidAddressing(format!(
                        "Pool {} overlaps pool {}",
                        a.cidr(),
                        b.cidr()
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_traffic(&self) -> Result<(), ValidationError> {
        let traffic = &self.traffic;
        if traffic.port == 0 {
            return Err(ValidationError::InvalidTraffic("port cannot be 0".to_string()));
        }
        if traffic.packet_size == 0 {
            return Err(ValidationError::InvalidTraffic(
                "packet_size must be greater than zero".to_string(),
            ));
        }
        if !traffic.data_rate.starts_with(|c: char| c.is_ascii_digit())
            || !traffic.data_rate.ends_with("bps")
        {
            return Err(ValidationError::InvalidTraffic(format!(
                "data_rate '{}' must look like '1Mbps'",
                traffic.data_rate
            )));
        }
        if traffic.on_time.is_zero() || traffic.mean_off_time.is_zero() {
            return Err(ValidationError::InvalidTraffic(
                "on_time and mean_off_time must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_mobility(&self) -> Result<(), ValidationError> {
        let mobility = &self.mobility;
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(mobility.width) || !positive(mobility.height) {
            return Err(ValidationError::InvalidMobility(format!(
                "Area {}x{} must have positive dimensions",
                mobility.width, mobility.height
            )));
        }
        if !(mobility.follower_bounds.is_finite() && mobility.follower_bounds >= 0.0) {
            return Err(ValidationError::InvalidMobility(format!(
                "follower_bounds {} cannot be negative",
                mobility.follower_bounds
            )));
        }
        if !(mobility.min_speed >= 0.0 && mobility.min_speed <= mobility.max_speed) {
            return Err(ValidationError::InvalidMobility(format!(
                "Speed range {}..{} is invalid",
                mobility.min_speed, mobility.max_speed
            )));
        }
        Ok(())
    }

    /// Resolve per-level values and pools into a builder spec
    pub fn to_hierarchy_spec(&self) -> Result<HierarchySpec, ValidationError> {
        let shared = &self.hierarchy;
        let mut levels = Vec::with_capacity(shared.levels.len());

        for (i, level) in shared.levels.iter().enumerate() {
            let id = LevelId(i as u32 + 1);
            let mut spec = LevelSpec::new(
                id,
                level.cluster_count,
                level.nodes_per_cluster,
                level.probability.unwrap_or(shared.probability),
                level.total_resources.unwrap_or(shared.total_resources),
            );
            if let Some(pool) = self.addressing.levels.get(i) {
                spec.pool = pool.to_spec().map_err(|e| {
                    ValidationError::InvalidAddressing(format!("Level {} pool: {}", id, e))
                })?;
                if !is_private_ipv4(spec.pool.base) {
                    log::warn!("Level {} pool {} is not a private range", id, spec.pool.cidr());
                }
            }
            levels.push(spec);
        }

        let uplink_pool = match &self.addressing.uplink {
            Some(pool) => {
                let spec = pool.to_spec().map_err(|e| {
                    ValidationError::InvalidAddressing(format!("Uplink pool: {}", e))
                })?;
                if !is_private_ipv4(spec.base) {
                    log::warn!("Uplink pool {} is not a private range", spec.cidr());
                }
                spec
            }
            None => PoolSpec::default_uplink(),
        };

        Ok(HierarchySpec { levels, uplink_pool })
    }

    /// Traffic, mobility and timing settings for the assembler
    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            traffic: self.traffic.clone(),
            mobility: self.mobility.clone(),
            simulation_time: self.general.simulation_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
general:
  simulation_time: "200s"
  log_level: debug
hierarchy:
  probability: 0.7
  total_resources: 4500
  levels:
    - cluster_count: 6
      nodes_per_cluster: 6
    - {}
traffic:
  port: 9
  mean_off_time: "500ms"
"#;

    #[test]
    fn test_scenario_parsing() {
        let config: ScenarioConfig = serde_yaml::from_str(SCENARIO).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.general.simulation_time, Duration::from_secs(200));
        assert_eq!(config.hierarchy.levels.len(), 2);
        assert_eq!(config.traffic.packet_size, 1024);
        assert_eq!(config.mobility.width, 500.0);

        let spec = config.to_hierarchy_spec().unwrap();
        assert_eq!(spec.levels[0].total_resources, 4500.0);
        assert_eq!(spec.levels[1].cluster_count, None);
        assert_eq!(spec.levels[1].pool.cidr(), "10.1.0.0/16");
        assert_eq!(spec.uplink_pool.cidr(), "172.16.0.0/16");

        let options = config.plan_options();
        assert_eq!(options.simulation_time, Duration::from_secs(200));
        assert_eq!(options.traffic.mean_off_time, Duration::from_millis(500));
    }

    #[test]
    fn test_level_overrides() {
        let yaml = r#"
hierarchy:
  levels:
    - cluster_count: 4
      nodes_per_cluster: 3
      probability: 0.5
    - cluster_count: 1
      total_resources: 50
"#;
        let config: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        let spec = config.to_hierarchy_spec().unwrap();
        assert_eq!(spec.levels[0].probability, 0.5);
        assert_eq!(spec.levels[0].total_resources, 1000.0);
        assert_eq!(spec.levels[1].probability, 0.7);
        assert_eq!(spec.levels[1].total_resources, 50.0);
    }

    #[test]
    fn test_invalid_probability() {
        let yaml = r#"
hierarchy:
  probability: 1.0
  levels:
    - cluster_count: 1
      nodes_per_cluster: 3
"#;
        let config: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidHierarchy(_))));
    }

    #[test]
    fn test_level_mismatch_rejected() {
        let yaml = r#"
hierarchy:
  levels:
    - cluster_count: 10
      nodes_per_cluster: 2
    - cluster_count: 3
      nodes_per_cluster: 4
    - {}
"#;
        let config: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidHierarchy(_)));
        assert!(err.to_string().contains("Level 2 size mismatch"));
    }

    #[test]
    fn test_cluster_larger_than_block_rejected() {
        let yaml = r#"
hierarchy:
  levels:
    - cluster_count: 2
      nodes_per_cluster: 20
    - {}
addressing:
  levels:
    - base: "192.168.0.0/20"
      block_prefix: 28
"#;
        let config: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAddressing(_)));
        assert!(err.to_string().contains("/28 block holds 14"));
    }

    #[test]
    fn test_addressing_pools() {
        let yaml = r#"
hierarchy:
  levels:
    - cluster_count: 2
      nodes_per_cluster: 5
    - {}
addressing:
  levels:
    - base: "192.168.0.0/20"
      block_prefix: 28
  uplink:
    base: "10.200.0.0/24"
    block_prefix: 30
"#;
        let config: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        let spec = config.to_hierarchy_spec().unwrap();
        assert_eq!(spec.levels[0].pool.cidr(), "192.168.0.0/20");
        assert_eq!(spec.levels[0].pool.block_prefix, 28);
        assert_eq!(spec.levels[1].pool.cidr(), "10.1.0.0/16");
        assert_eq!(spec.uplink_pool.cidr(), "10.200.0.0/24");
    }

    #[test]
    fn test_overlapping_pools_rejected() {
        let yaml = r#"
hierarchy:
  levels:
    - cluster_count: 2
      nodes_per_cluster: 5
    - {}
addressing:
  uplink:
    base: "10.0.128.0/24"
    block_prefix: 30
"#;
        let config: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidAddressing(_))));
    }

    #[test]
    fn test_bad_pool_notation() {
        let pool = PoolConfig {
            base: "10.0.0.0".to_string(),
            block_prefix: 24,
        };
        assert!(pool.to_spec().is_err());

        let pool = PoolConfig {
            base: "10.0.0.0/24".to_string(),
            block_prefix: 16,
        };
        assert!(pool.to_spec().is_err());
    }

    #[test]
    fn test_traffic_and_mobility_checks() {
        let mut config: ScenarioConfig = serde_yaml::from_str(SCENARIO).unwrap();
        config.traffic.data_rate = "fast".to_string();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidTraffic(_))));

        let mut config: ScenarioConfig = serde_yaml::from_str(SCENARIO).unwrap();
        config.mobility.min_speed = 5.0;
        assert!(matches!(config.validate(), Err(ValidationError::InvalidMobility(_))));

        let mut config: ScenarioConfig = serde_yaml::from_str(SCENARIO).unwrap();
        config.general.log_level = Some("loud".to_string());
        assert!(matches!(config.validate(), Err(ValidationError::InvalidGeneral(_))));
    }
}
