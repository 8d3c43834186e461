//! Report generation for topology plans.
//!
//! Generates both JSON files for the substrate and a human-readable text
//! summary.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use super::types::*;

/// Generate JSON report
pub fn generate_json_report<T: Serialize>(value: &T, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Generate the whole plan as YAML
pub fn generate_yaml_plan(plan: &TopologyPlan, output_path: &Path) -> Result<()> {
    let yaml = serde_yaml::to_string(plan).context("Failed to serialize plan to YAML")?;

    fs::write(output_path, yaml)
        .with_context(|| format!("Failed to write plan to {}", output_path.display()))?;

    log::info!("Topology plan written to {}", output_path.display());
    Ok(())
}

/// Render the human-readable summary
pub fn render_text_summary(plan: &TopologyPlan) -> String {
    let mut lines: Vec<String> = Vec::new();

    // Header
    lines.push("=".repeat(80));
    lines.push("                       CLUSTERSIM TOPOLOGY PLAN".to_string());
    lines.push("=".repeat(80));
    lines.push(String::new());

    lines.push(format!("Levels: {}", plan.levels.len()));
    lines.push(format!("Nodes: {}", plan.roster.nodes.len()));
    lines.push(format!("Radio groups: {}", plan.radio_groups.len()));
    lines.push(format!("Address blocks: {}", plan.addresses.assignments.len()));
    lines.push(String::new());

    for summary in &plan.levels {
        lines.push("-".repeat(80));
        lines.push(format!(
            "Level {}: {} cluster(s) of {} node(s), budget {:.2}, pool {}",
            summary.level,
            summary.clusters,
            summary.nodes_per_cluster,
            summary.total_resources,
            summary.pool
        ));
        lines.push("-".repeat(80));

        for group in plan.radio_groups.iter().filter(|g| g.level == summary.level) {
            let head = match &group.mode {
                RadioMode::Infrastructure { access_point } => Some(*access_point),
                RadioMode::AdHoc => plan
                    .mobility
                    .groups
                    .iter()
                    .find(|m| m.cluster == group.cluster)
                    .map(|m| m.reference),
            }
            .map(|h| h.to_string())
            .unwrap_or_else(|| "-".to_string());
            let block = plan
                .addresses
                .assignments
                .iter()
                .find(|a| a.kind == AssignmentKind::Cluster && a.block.owner == group.cluster)
                .map(|a| a.block.cidr())
                .unwrap_or_else(|| "-".to_string());

            lines.push(format!(
                "  {}  ssid {}  head {}  block {}",
                group.cluster, group.ssid, head, block
            ));

            let shares: Vec<String> = plan
                .resources
                .allocations
                .iter()
                .filter(|a| a.cluster == group.cluster)
                .map(|a| format!("{}={:.2}", a.node, a.share))
                .collect();
            lines.push(format!("    shares: {}", shares.join(", ")));
        }
        lines.push(String::new());
    }

    let uplinks: Vec<&AddressAssignment> = plan
        .addresses
        .assignments
        .iter()
        .filter(|a| a.kind == AssignmentKind::Uplink)
        .collect();
    if !uplinks.is_empty() {
        lines.push("-".repeat(80));
        lines.push("Uplinks".to_string());
        lines.push("-".repeat(80));
        for uplink in uplinks {
            let hosts: Vec<String> = uplink
                .hosts
                .iter()
                .map(|h| format!("{}@{}", h.node, h.address))
                .collect();
            lines.push(format!("  {}  {}  {}", uplink.group, uplink.block.cidr(), hosts.join(" ")));
        }
        lines.push(String::new());
    }

    match &plan.traffic {
        Some(traffic) => {
            lines.push(format!(
                "Traffic: {} ({}) -> {} ({}) port {}, {} byte packets at {}, stop at {}s",
                traffic.sender,
                traffic.sender_address,
                traffic.receiver,
                traffic.receiver_address,
                traffic.settings.port,
                traffic.settings.packet_size,
                traffic.settings.data_rate,
                traffic.stop_time.as_secs()
            ));
        }
        None => lines.push("Traffic: none (single node)".to_string()),
    }

    // Footer
    lines.push("=".repeat(80));
    lines.join("\n")
}

/// Generate human-readable text report
pub fn generate_text_report(plan: &TopologyPlan, output_path: &Path) -> Result<()> {
    let content = render_text_summary(plan);
    fs::write(output_path, content)
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Print a summary to stdout
pub fn print_summary(plan: &TopologyPlan) {
    println!("\n=== TOPOLOGY PLAN SUMMARY ===\n");
    for summary in &plan.levels {
        println!(
            "Level {}: {} cluster(s) x {} node(s)",
            summary.level, summary.clusters, summary.nodes_per_cluster
        );
    }
    println!("Nodes: {}", plan.roster.nodes.len());
    println!("Address blocks: {}", plan.addresses.assignments.len());
    if let Some(ref traffic) = plan.traffic {
        println!("Traffic: {} -> {}", traffic.sender, traffic.receiver);
    }
    println!();
}
