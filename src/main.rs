use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clustersim::config::ScenarioConfig;
use clustersim::config_loader::{self, CliOverrides};
use clustersim::orchestrator::generate_topology_plan;
use clustersim::topology::report::print_summary;

/// Topology planner for hierarchical ad hoc network simulations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the scenario configuration YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Output directory for the plan files
    #[arg(short, long, default_value = "topology_output")]
    output: PathBuf,

    /// Override the shared truncated-geometric probability
    #[arg(long)]
    probability: Option<f64>,

    /// Override the per-cluster resource budget
    #[arg(long)]
    total_resources: Option<f64>,

    /// Override the simulation time (e.g. "200s", "5m")
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    simulation_time: Option<Duration>,

    /// Build and validate the plan without writing files
    #[arg(long)]
    dry_run: bool,
}

/// Line logged once the logger is up, since loading happens before it
fn loaded_scenario(path: &Path, config: &ScenarioConfig) -> String {
    format!(
        "Loaded scenario from {:?}: {} level(s), simulation time {:?}",
        path,
        config.hierarchy.levels.len(),
        config.general.simulation_time
    )
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    // Load configuration before logging so general.log_level can set the default
    let mut config = config_loader::load_config(&args.config)?;
    let default_level = config.general.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    info!("Starting ClusterSim topology planner");
    info!("{}", loaded_scenario(&args.config, &config));
    info!("Output directory: {:?}", args.output);

    let overrides = CliOverrides {
        probability: args.probability,
        total_resources: args.total_resources,
        simulation_time: args.simulation_time,
    };
    config_loader::apply_overrides(&mut config, &overrides)
        .wrap_err("Invalid command-line override")?;

    let (plan, files) = generate_topology_plan(&config, &args.output, args.dry_run)?;
    for file in &files {
        info!("Wrote {}", file.display());
    }
    print_summary(&plan);

    info!("Topology planning completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(&["clustersim", "--config", "scenario.yaml"]);

        assert_eq!(args.config, PathBuf::from("scenario.yaml"));
        assert_eq!(args.output, PathBuf::from("topology_output"));
        assert!(!args.dry_run);
        assert!(args.probability.is_none());
    }

    #[test]
    fn test_override_args() {
        let args = Args::parse_from(&[
            "clustersim",
            "-c",
            "scenario.yaml",
            "-o",
            "out",
            "--probability",
            "0.5",
            "--total-resources",
            "4500",
            "--simulation-time",
            "2m",
            "--dry-run",
        ]);

        assert_eq!(args.output, PathBuf::from("out"));
        assert_eq!(args.probability, Some(0.5));
        assert_eq!(args.total_resources, Some(4500.0));
        assert_eq!(args.simulation_time, Some(Duration::from_secs(120)));
        assert!(args.dry_run);
    }

    #[test]
    fn test_loaded_scenario_line() {
        let yaml = r#"
general:
  simulation_time: "60s"
hierarchy:
  levels:
    - cluster_count: 6
      nodes_per_cluster: 6
    - {}
"#;
        let config: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
        let line = loaded_scenario(Path::new("scenario.yaml"), &config);
        assert_eq!(
            line,
            "Loaded scenario from \"scenario.yaml\": 2 level(s), simulation time 60s"
        );
    }
}
