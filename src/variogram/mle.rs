//! Maximum-likelihood seeding of the posterior sampler.
//!
//! Bounded Nelder–Mead maximization of the variogram log-likelihood over the
//! prior box. The fitted point seeds the MCMC chains and the box itself
//! doubles as the uniform prior support. Non-convergence falls back to the
//! moment-based starting guess; seeding must never abort the pipeline.

use rand::Rng;
use tracing::warn;

use crate::dataset::SpatialDataset;
use crate::types::VariogramParams;
use crate::variogram::likelihood::log_likelihood;

/// Lower bound shared by λ and φ.
pub const EPS_BOUND: f64 = 1e-6;

/// Maximum Nelder–Mead iterations before declaring non-convergence.
const MAX_ITERATIONS: usize = 500;

/// Relative spread of simplex values at which the search is converged.
const TOLERANCE: f64 = 1e-9;

/// Prior box for (λ, τ²rel, φ), derived from the dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterBounds {
    /// Bounds for the inverse sill λ.
    pub inv_sill: (f64, f64),
    /// Bounds for the relative nugget τ²rel.
    pub rel_nugget: (f64, f64),
    /// Bounds for the range φ.
    pub range: (f64, f64),
}

impl ParameterBounds {
    /// Derive the box from a dataset: λ ∈ [1e-6, λ_max], τ²rel ∈ [0, 1],
    /// φ ∈ [1e-6, 3·max(D)].
    pub fn from_dataset(dataset: &SpatialDataset, lambda_upper: f64) -> Self {
        Self {
            inv_sill: (EPS_BOUND, lambda_upper),
            rel_nugget: (0.0, 1.0),
            range: (EPS_BOUND, 3.0 * dataset.max_distance()),
        }
    }

    fn axes(&self) -> [(f64, f64); 3] {
        [self.inv_sill, self.rel_nugget, self.range]
    }

    /// Whether the vector lies inside the box (inclusive).
    pub fn contains(&self, v: &[f64; 3]) -> bool {
        self.axes()
            .iter()
            .zip(v.iter())
            .all(|(&(lo, hi), &x)| x >= lo && x <= hi)
    }

    /// Project a vector onto the box.
    pub fn clamp(&self, v: [f64; 3]) -> [f64; 3] {
        let axes = self.axes();
        [
            v[0].clamp(axes[0].0, axes[0].1),
            v[1].clamp(axes[1].0, axes[1].1),
            v[2].clamp(axes[2].0, axes[2].1),
        ]
    }

    /// Draw a uniform point from the box.
    pub fn sample_uniform<R: Rng>(&self, rng: &mut R) -> [f64; 3] {
        let axes = self.axes();
        [
            rng.random_range(axes[0].0..=axes[0].1),
            rng.random_range(axes[1].0..=axes[1].1),
            rng.random_range(axes[2].0..=axes[2].1),
        ]
    }

    /// Per-axis box widths.
    pub fn widths(&self) -> [f64; 3] {
        let axes = self.axes();
        [
            axes[0].1 - axes[0].0,
            axes[1].1 - axes[1].0,
            axes[2].1 - axes[2].0,
        ]
    }
}

/// Moment-based starting guess: λ = 1/var(z), τ²rel = 0.5, φ = mean(D),
/// projected onto the box.
pub fn moment_guess(dataset: &SpatialDataset, bounds: &ParameterBounds) -> VariogramParams {
    let var = dataset.z_variance().max(f64::MIN_POSITIVE);
    let v = bounds.clamp([1.0 / var, 0.5, dataset.mean_distance()]);
    VariogramParams::from_array(v)
}

/// Result of the likelihood maximization.
#[derive(Debug, Clone, Copy)]
pub struct MleFit {
    /// Fitted (or fallback) parameters.
    pub params: VariogramParams,
    /// Log-likelihood at `params`.
    pub log_likelihood: f64,
    /// False when the optimizer hit the iteration cap and the moment guess
    /// was substituted.
    pub converged: bool,
}

/// Maximize the log-likelihood over the prior box.
///
/// Non-convergence is a recoverable local condition: it is logged at
/// warning level and the moment-based guess is returned instead.
pub fn fit_mle(dataset: &SpatialDataset, bounds: &ParameterBounds) -> MleFit {
    let start = moment_guess(dataset, bounds);
    let objective = |v: &[f64; 3]| {
        let ll = log_likelihood(dataset, &VariogramParams::from_array(*v));
        // Minimization form; −∞ likelihood becomes +∞ cost.
        -ll
    };

    match nelder_mead(objective, bounds, start.to_array()) {
        Some(best) => {
            let params = VariogramParams::from_array(best);
            MleFit {
                params,
                log_likelihood: log_likelihood(dataset, &params),
                converged: true,
            }
        }
        None => {
            warn!(
                iterations = MAX_ITERATIONS,
                "MLE search did not converge; using moment-based starting guess"
            );
            MleFit {
                params: start,
                log_likelihood: log_likelihood(dataset, &start),
                converged: false,
            }
        }
    }
}

/// Bounded Nelder–Mead: evaluation points are projected onto the box, so the
/// returned vertex always satisfies the model invariants.
///
/// Returns `None` when the simplex fails to collapse within the iteration
/// cap.
fn nelder_mead<F: Fn(&[f64; 3]) -> f64>(
    f: F,
    bounds: &ParameterBounds,
    start: [f64; 3],
) -> Option<[f64; 3]> {
    const ALPHA: f64 = 1.0; // reflection
    const GAMMA: f64 = 2.0; // expansion
    const RHO: f64 = 0.5; // contraction
    const SIGMA: f64 = 0.5; // shrink

    let widths = bounds.widths();

    // Initial simplex: start point plus 10%-of-box steps along each axis.
    let mut simplex: Vec<[f64; 3]> = vec![bounds.clamp(start)];
    for axis in 0..3 {
        let mut v = start;
        let step = 0.1 * widths[axis];
        v[axis] += if bounds.contains(&{
            let mut w = v;
            w[axis] += step;
            w
        }) {
            step
        } else {
            -step
        };
        simplex.push(bounds.clamp(v));
    }

    let mut values: Vec<f64> = simplex.iter().map(|v| f(v)).collect();

    for _ in 0..MAX_ITERATIONS {
        // Order vertices by cost.
        let mut order: Vec<usize> = (0..simplex.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        let simplex_sorted: Vec<[f64; 3]> = order.iter().map(|&i| simplex[i]).collect();
        let values_sorted: Vec<f64> = order.iter().map(|&i| values[i]).collect();
        simplex = simplex_sorted;
        values = values_sorted;

        let best = values[0];
        let worst = values[3];
        if worst.is_finite() && (worst - best).abs() <= TOLERANCE * (1.0 + best.abs()) {
            return Some(simplex[0]);
        }

        // Centroid of all but the worst vertex.
        let mut centroid = [0.0; 3];
        for v in &simplex[..3] {
            for (c, x) in centroid.iter_mut().zip(v.iter()) {
                *c += x / 3.0;
            }
        }

        let reflect = |scale: f64| {
            let mut v = [0.0; 3];
            for i in 0..3 {
                v[i] = centroid[i] + scale * (centroid[i] - simplex[3][i]);
            }
            bounds.clamp(v)
        };

        let xr = reflect(ALPHA);
        let fr = f(&xr);

        if fr < values[0] {
            // Try expanding further in the same direction.
            let xe = reflect(GAMMA);
            let fe = f(&xe);
            if fe < fr {
                simplex[3] = xe;
                values[3] = fe;
            } else {
                simplex[3] = xr;
                values[3] = fr;
            }
        } else if fr < values[2] {
            simplex[3] = xr;
            values[3] = fr;
        } else {
            // Contract toward the centroid.
            let xc = reflect(-RHO);
            let fc = f(&xc);
            if fc < values[3] {
                simplex[3] = xc;
                values[3] = fc;
            } else {
                // Shrink toward the best vertex.
                for i in 1..4 {
                    for axis in 0..3 {
                        simplex[i][axis] =
                            simplex[0][axis] + SIGMA * (simplex[i][axis] - simplex[0][axis]);
                    }
                    simplex[i] = bounds.clamp(simplex[i]);
                    values[i] = f(&simplex[i]);
                }
            }
        }
    }

    None
}
