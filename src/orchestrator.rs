//! Plan orchestrator.
//!
//! This module coordinates the overall planning process, managing the flow
//! from a validated scenario through hierarchy construction, plan assembly
//! and the files written for the simulation substrate.

use color_eyre::eyre::{eyre, Result, WrapErr};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ScenarioConfig;
use crate::hierarchy::build_hierarchy;
use crate::hierarchy::validate::SHARE_TOLERANCE;
use crate::topology::report::{generate_json_report, generate_text_report, generate_yaml_plan};
use crate::topology::{assemble_with, TopologyPlan};
use crate::utils::validation::{validate_address_plan, validate_resource_plan};

pub const PLAN_FILE: &str = "topology_plan.yaml";
pub const ROSTER_FILE: &str = "node_roster.json";
pub const ADDRESS_FILE: &str = "address_plan.json";
pub const RESOURCE_FILE: &str = "resource_plan.json";
pub const SUMMARY_FILE: &str = "summary.txt";

/// Build and assemble the plan for a scenario without touching the disk
pub fn plan_scenario(config: &ScenarioConfig) -> Result<TopologyPlan> {
    let spec = config
        .to_hierarchy_spec()
        .wrap_err("Failed to resolve hierarchy specification")?;

    let hierarchy = build_hierarchy(&spec).wrap_err("Failed to build cluster hierarchy")?;
    info!(
        "Hierarchy built: {} nodes, {} clusters, {} levels, {} uplinks",
        hierarchy.nodes.len(),
        hierarchy.clusters.len(),
        hierarchy.levels.len(),
        hierarchy.uplinks.len()
    );

    let plan = assemble_with(&hierarchy, &config.plan_options())
        .wrap_err("Failed to assemble topology plan")?;

    validate_address_plan(&plan.addresses)
        .map_err(|e| eyre!("Address plan validation failed: {}", e))?;
    validate_resource_plan(&plan.resources, SHARE_TOLERANCE)
        .map_err(|e| eyre!("Resource plan validation failed: {}", e))?;

    Ok(plan)
}

/// Generate the plan files for a scenario
///
/// # Arguments
/// * `config` - A validated scenario
/// * `output_dir` - Directory receiving the plan files (created if missing)
/// * `dry_run` - Build and validate only, write nothing
///
/// # Returns
/// The assembled plan and the list of files written
pub fn generate_topology_plan(
    config: &ScenarioConfig,
    output_dir: &Path,
    dry_run: bool,
) -> Result<(TopologyPlan, Vec<PathBuf>)> {
    let plan = plan_scenario(config)?;

    if dry_run {
        info!("Dry run: plan validated, no files written");
        return Ok((plan, Vec::new()));
    }

    fs::create_dir_all(output_dir)
        .wrap_err_with(|| format!("Failed to create output directory '{}'", output_dir.display()))?;

    let plan_path = output_dir.join(PLAN_FILE);
    let roster_path = output_dir.join(ROSTER_FILE);
    let address_path = output_dir.join(ADDRESS_FILE);
    let resource_path = output_dir.join(RESOURCE_FILE);
    let summary_path = output_dir.join(SUMMARY_FILE);

    generate_yaml_plan(&plan, &plan_path)?;
    generate_json_report(&plan.roster, &roster_path)?;
    generate_json_report(&plan.addresses, &address_path)?;
    generate_json_report(&plan.resources, &resource_path)?;
    generate_text_report(&plan, &summary_path)?;

    Ok((
        plan,
        vec![plan_path, roster_path, address_path, resource_path, summary_path],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scenario() -> ScenarioConfig {
        serde_yaml::from_str(
            r#"
hierarchy:
  total_resources: 4500
  levels:
    - cluster_count: 6
      nodes_per_cluster: 6
    - {}
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_generate_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("plan");
        let (plan, files) = generate_topology_plan(&scenario(), &out, false).unwrap();

        assert_eq!(plan.roster.nodes.len(), 36);
        assert_eq!(files.len(), 5);
        for file in &files {
            assert!(file.exists(), "{} missing", file.display());
        }

        let roster: crate::topology::NodeRoster =
            serde_json::from_str(&fs::read_to_string(out.join(ROSTER_FILE)).unwrap()).unwrap();
        assert_eq!(roster, plan.roster);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("plan");
        let (_, files) = generate_topology_plan(&scenario(), &out, true).unwrap();
        assert!(files.is_empty());
        assert!(!out.exists());
    }

    #[test]
    fn test_exhausted_pool_reported() {
        let mut config = scenario();
        config.hierarchy.levels[0].nodes_per_cluster = Some(300);
        let err = plan_scenario(&config).unwrap_err();
        assert!(format!("{:?}", err).contains("exhausted"));
    }
}
