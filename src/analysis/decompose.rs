//! Variance-component decomposition of the simulated sampling variances.
//!
//! For one stratum level the variance array holds V_STSI values over
//! posterior draws ξ and simulation replicates. Averaging over replicates
//! within a draw and then looking across draws splits the spread of V_STSI
//! into a variogram-uncertainty component `V_MCMC[E_ξ(V)]` and a
//! simulation-noise component `E_MCMC[V_ξ(V)]`; by the law of total
//! variance the two add up to the total spread up to Monte-Carlo error.

use serde::{Deserialize, Serialize};

use crate::simulate::sample_variance;

/// Decomposition of one draws×replicates slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceDecomposition {
    /// Point prediction: mean over draws of the per-draw replicate mean.
    pub prediction: f64,
    /// Variogram-uncertainty component, `V_MCMC[E_ξ(V_STSI)]`.
    pub variogram_component: f64,
    /// Simulation-noise component, `E_MCMC[V_ξ(V_STSI)]`.
    pub simulation_component: f64,
    /// 50th percentile of the pooled draws×replicates values.
    pub median: f64,
    /// 90th percentile of the pooled draws×replicates values.
    pub p90: f64,
}

/// Decompose a draw-major `draws × replicates` slice of sampling variances.
///
/// # Panics
///
/// Panics if `values.len() != draws * replicates` or either count is zero;
/// slices come straight out of a [`crate::simulate::VarianceArray`], which
/// guarantees the shape.
pub fn decompose(values: &[f64], draws: usize, replicates: usize) -> VarianceDecomposition {
    assert!(draws > 0 && replicates > 0, "empty variance slice");
    assert_eq!(values.len(), draws * replicates, "shape mismatch");

    let mut per_draw_mean = Vec::with_capacity(draws);
    let mut per_draw_var = Vec::with_capacity(draws);
    for d in 0..draws {
        let row = &values[d * replicates..(d + 1) * replicates];
        per_draw_mean.push(row.iter().sum::<f64>() / replicates as f64);
        per_draw_var.push(sample_variance(row));
    }

    let prediction = per_draw_mean.iter().sum::<f64>() / draws as f64;
    let variogram_component = sample_variance(&per_draw_mean);
    let simulation_component = per_draw_var.iter().sum::<f64>() / draws as f64;

    let mut pooled = values.to_vec();
    pooled.sort_by(|a, b| a.total_cmp(b));
    let median = percentile_sorted(&pooled, 0.5);
    let p90 = percentile_sorted(&pooled, 0.9);

    VarianceDecomposition {
        prediction,
        variogram_component,
        simulation_component,
        median,
        p90,
    }
}

/// Linear-interpolation percentile of an already-sorted slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = p * (n - 1) as f64;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    let frac = h - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}
