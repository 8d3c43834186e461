use crate::config::{ScenarioConfig, ValidationError};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Load and parse a scenario from a YAML file
pub fn load_config(config_path: &Path) -> Result<ScenarioConfig> {
    info!("Loading configuration from: {:?}", config_path);

    // Open the configuration file
    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration '{}'", config_path.display()))?;

    // Parse the YAML content
    let config: ScenarioConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration '{}'", config_path.display()))?;

    info!(
        "Scenario with {} level(s), simulation time {:?}",
        config.hierarchy.levels.len(),
        config.general.simulation_time
    );

    // Validate the configuration
    config.validate()?;

    Ok(config)
}

/// CLI arguments that can override YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub probability: Option<f64>,
    pub total_resources: Option<f64>,
    pub simulation_time: Option<Duration>,
}

/// Apply CLI overrides to a scenario
///
/// Overrides replace the shared hierarchy values and clear the per-level
/// ones so the command line wins everywhere.
pub fn apply_overrides(
    config: &mut ScenarioConfig,
    overrides: &CliOverrides,
) -> Result<(), ValidationError> {
    if let Some(p) = overrides.probability {
        info!("Overriding probability: {}", p);
        config.hierarchy.probability = p;
        for level in &mut config.hierarchy.levels {
            level.probability = None;
        }
    }

    if let Some(total) = overrides.total_resources {
        info!("Overriding total resources: {}", total);
        config.hierarchy.total_resources = total;
        for level in &mut config.hierarchy.levels {
            level.total_resources = None;
        }
    }

    if let Some(time) = overrides.simulation_time {
        info!("Overriding simulation time: {:?}", time);
        config.general.simulation_time = time;
    }

    // Re-validate after applying overrides
    config.validate()
}
