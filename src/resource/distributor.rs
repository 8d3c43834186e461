//! Truncated geometric resource distribution.
//!
//! Nodes inside a cluster are ranked `1..=n` and rank `i` receives
//!
//! ```text
//! portion(i) = p * (1 - p)^(i - 1) / (1 - (1 - p)^n)
//! share(i)   = portion(i) * total_resources
//! ```
//!
//! which is the geometric mass function renormalized over the finite
//! support `1..=n`. Shares therefore sum to the budget and strictly decrease
//! with rank.

use log::debug;

use crate::error::PlanError;

/// Validate the probability and compute the normalizer `1 - (1 - p)^n`.
fn normalizer(n_points: usize, probability: f64) -> Result<f64, PlanError> {
    if !(probability > 0.0 && probability < 1.0) {
        return Err(PlanError::InvalidProbability {
            value: probability,
            level: None,
        });
    }
    if n_points == 0 {
        return Err(PlanError::InvalidPointCount {
            count: n_points,
            level: None,
        });
    }

    let norm = 1.0 - (1.0 - probability).powf(n_points as f64);
    // Underflow to zero is as fatal as p leaving (0, 1)
    if !norm.is_finite() || norm <= 0.0 {
        return Err(PlanError::InvalidProbability {
            value: probability,
            level: None,
        });
    }
    Ok(norm)
}

/// Portion of the budget taken by the node with the given 1-indexed rank.
pub fn truncated_geometric_portion(
    rank: usize,
    n_points: usize,
    probability: f64,
) -> Result<f64, PlanError> {
    let norm = normalizer(n_points, probability)?;
    if rank == 0 || rank > n_points {
        return Err(PlanError::InvalidPointCount {
            count: rank,
            level: None,
        });
    }
    Ok(probability * (1.0 - probability).powf((rank - 1) as f64) / norm)
}

/// Distribute `total_resources` over `n_points` ranked nodes.
///
/// The returned vector is indexed by `rank - 1`, so element 0 is the largest
/// share. A single point receives the whole budget exactly.
///
/// # Examples
/// ```
/// use clustersim::resource::distribute;
///
/// let shares = distribute(6, 4500.0, 0.7).unwrap();
/// assert_eq!(shares.len(), 6);
/// assert!((shares.iter().sum::<f64>() - 4500.0).abs() < 1e-6);
/// assert!(shares[0] > shares[1]);
/// ```
pub fn distribute(
    n_points: usize,
    total_resources: f64,
    probability: f64,
) -> Result<Vec<f64>, PlanError> {
    let norm = normalizer(n_points, probability)?;
    if !total_resources.is_finite() || total_resources <= 0.0 {
        return Err(PlanError::InvalidResourceBudget {
            value: total_resources,
            level: None,
        });
    }

    if n_points == 1 {
        return Ok(vec![total_resources]);
    }

    let q = 1.0 - probability;
    let shares: Vec<f64> = (0..n_points)
        .map(|i| probability * q.powf(i as f64) / norm * total_resources)
        .collect();

    debug!(
        "Distributed {} resources over {} points (p={}): head share {:.3}",
        total_resources, n_points, probability, shares[0]
    );
    Ok(shares)
}

/// Express a resource share as an on/off data rate.
///
/// Resources are modelled as `data_rate * mean_off_time`, so the rate is the
/// share divided by the mean off time in seconds.
pub fn data_rate_for_share(share: f64, mean_off_time_secs: f64) -> f64 {
    share / mean_off_time_secs
}
