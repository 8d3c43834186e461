//! Plan validation utilities.
//!
//! This module provides consistency checks over generated address and
//! resource plans.

use crate::ip::AddressBlock;
use crate::topology::types::{AddressPlan, ResourcePlan};

/// Find a pair of overlapping blocks
///
/// Blocks are sorted by network address and neighbours compared, so the
/// check is `O(n log n)`.
///
/// # Arguments
/// * `blocks` - The blocks to check, in any order
///
/// # Returns
/// * `Some((a, b))` with the first overlapping pair found
/// * `None` if all blocks are pairwise disjoint
pub fn find_overlapping_blocks(blocks: &[AddressBlock]) -> Option<(AddressBlock, AddressBlock)> {
    let mut sorted: Vec<&AddressBlock> = blocks.iter().collect();
    sorted.sort_by_key(|b| (u32::from(b.network), b.prefix_len));

    sorted
        .windows(2)
        .find(|pair| u32::from(pair[0].last_address()) >= u32::from(pair[1].network))
        .map(|pair| (pair[0].clone(), pair[1].clone()))
}

/// Validate that every block of an address plan is disjoint from the others
///
/// Checks for:
/// - Overlapping blocks within one pool
/// - Uplink blocks intersecting any level block
/// - Groups listed twice
///
/// # Arguments
/// * `plan` - The address plan to validate
///
/// # Returns
/// * `Ok(())` if validation succeeds
/// * `Err(String)` with an error message if validation fails
///
/// # Examples
/// ```
/// use clustersim::utils::validation::validate_address_plan;
/// use clustersim::topology::types::AddressPlan;
///
/// let plan = AddressPlan { assignments: Vec::new() };
/// assert!(validate_address_plan(&plan).is_ok());
/// ```
pub fn validate_address_plan(plan: &AddressPlan) -> Result<(), String> {
    use std::collections::HashSet;

    let mut groups = HashSet::new();
    for assignment in &plan.assignments {
        if !groups.insert(assignment.group.as_str()) {
            return Err(format!("Group '{}' appears twice in the address plan", assignment.group));
        }
    }

    let blocks: Vec<AddressBlock> = plan.assignments.iter().map(|a| a.block.clone()).collect();
    if let Some((a, b)) = find_overlapping_blocks(&blocks) {
        return Err(format!("Address block {} overlaps {}", a, b));
    }

    log::debug!("Address plan validated: {} disjoint blocks", blocks.len());
    Ok(())
}

/// Validate a resource plan against the per-cluster budgets
///
/// # Arguments
/// * `plan` - The resource plan to validate
/// * `tolerance` - Allowed relative error of each cluster's share sum
///
/// # Returns
/// * `Ok(())` if each cluster's allocations sum to its budget
/// * `Err(String)` naming the first cluster that does not
pub fn validate_resource_plan(plan: &ResourcePlan, tolerance: f64) -> Result<(), String> {
    use std::collections::BTreeMap;

    let mut sums: BTreeMap<_, (f64, f64)> = BTreeMap::new();
    for allocation in &plan.allocations {
        if !(allocation.share >= 0.0) {
            return Err(format!(
                "Node {} has negative share {} in {}",
                allocation.node, allocation.share, allocation.cluster
            ));
        }
        let entry = sums.entry(allocation.cluster).or_insert((0.0, allocation.cluster_budget));
        entry.0 += allocation.share;
    }

    for (cluster, (sum, budget)) in sums {
        if ((sum - budget) / budget).abs() > tolerance {
            return Err(format!(
                "Shares of {} sum to {} but its budget is {}",
                cluster, sum, budget
            ));
        }
    }
    Ok(())
}
