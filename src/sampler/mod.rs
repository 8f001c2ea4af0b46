//! Population MCMC for variogram parameters.
//!
//! Differential-evolution Metropolis with snooker updates and a growing
//! historical archive (DE-MC(ZS), ter Braak & Vrugt 2008). A small number of
//! parallel chains propose jumps from differences of archived states, so the
//! proposal distribution adapts to the posterior geometry without tuning.
//!
//! The target is `likelihood(θ) × uniform prior` over the MLE box. A
//! proposal outside the box, or one whose likelihood evaluates to −∞, is an
//! ordinary rejection. No convergence diagnostics are run; the fixed budget
//! and burn-in are the whole contract, and the draw sequence is bitwise
//! deterministic for a fixed seed.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::types::VariogramParams;
use crate::variogram::ParameterBounds;

/// Parameter dimension (λ, τ²rel, φ).
const DIM: usize = 3;

/// Generations between archive appends.
const ARCHIVE_THIN: usize = 10;

/// Every this-many generations the difference scale γ is set to 1.0 to
/// allow jumps between posterior modes.
const LONG_JUMP_EVERY: usize = 10;

/// Fraction of proposals that use the snooker update.
const SNOOKER_PROB: f64 = 0.1;

/// Sampler budget and seeding.
#[derive(Debug, Clone, Copy)]
pub struct SamplerConfig {
    /// Number of parallel chains (≥ 3).
    pub chains: usize,
    /// Pooled draws discarded as burn-in.
    pub burn_in: usize,
    /// Retained draws after thinning.
    pub output_size: usize,
    /// Seed for the sampler's deterministic stream.
    pub seed: u64,
}

/// Immutable ordered posterior sample for one field.
///
/// Produced once by [`sample_posterior`], persisted, and reused by every
/// downstream stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorSample {
    draws: Vec<VariogramParams>,
}

impl PosteriorSample {
    /// Wrap an ordered draw sequence.
    pub fn new(draws: Vec<VariogramParams>) -> Self {
        Self { draws }
    }

    /// The retained draws, in sampling order.
    pub fn draws(&self) -> &[VariogramParams] {
        &self.draws
    }

    /// Number of retained draws.
    pub fn len(&self) -> usize {
        self.draws.len()
    }

    /// Whether the sample is empty.
    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Evenly spaced subsample of `k` draws for the simulation stage.
    ///
    /// For `k >= len` the full sample is returned.
    pub fn subsample(&self, k: usize) -> Vec<VariogramParams> {
        if k >= self.draws.len() {
            return self.draws.clone();
        }
        (0..k)
            .map(|i| self.draws[i * self.draws.len() / k])
            .collect()
    }

    /// Equal-tailed credible interval of a scalar summary of the draws.
    ///
    /// `prob` is the central coverage, e.g. 0.9 for the 5th–95th percentile
    /// interval.
    pub fn credible_interval<F: Fn(&VariogramParams) -> f64>(
        &self,
        summary: F,
        prob: f64,
    ) -> (f64, f64) {
        let mut values: Vec<f64> = self.draws.iter().map(summary).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        let n = values.len();
        let tail = (1.0 - prob) / 2.0;
        let lo = ((n as f64 * tail) as usize).min(n - 1);
        let hi = ((n as f64 * (1.0 - tail)) as usize).min(n - 1);
        (values[lo], values[hi])
    }
}

/// Draw a posterior sample of variogram parameters.
///
/// `log_likelihood` must be pure; it is evaluated once per proposal. The
/// chains start from the MLE point (`init`) and uniform draws from the prior
/// box, iterate for a budget derived from `burn_in + output_size`, and the
/// pooled generation-major history is burned in and evenly thinned to
/// `output_size` draws.
pub fn sample_posterior<F>(
    log_likelihood: F,
    bounds: &ParameterBounds,
    init: &VariogramParams,
    config: &SamplerConfig,
) -> PosteriorSample
where
    F: Fn(&VariogramParams) -> f64,
{
    assert!(config.chains >= 3, "DE-MC needs at least 3 chains");
    assert!(config.output_size > 0, "output_size must be positive");

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
    let eval = |v: &[f64; 3]| -> f64 {
        if bounds.contains(v) {
            log_likelihood(&VariogramParams::from_array(*v))
        } else {
            f64::NEG_INFINITY
        }
    };

    // Archive of historical states; proposals draw differences from here.
    let mut archive: Vec<[f64; 3]> = Vec::new();
    archive.push(bounds.clamp(init.to_array()));
    while archive.len() < 10 * DIM {
        archive.push(bounds.sample_uniform(&mut rng));
    }

    // Chain 0 starts at the MLE seed, the rest at uniform prior draws.
    let mut states: Vec<[f64; 3]> = Vec::with_capacity(config.chains);
    states.push(bounds.clamp(init.to_array()));
    for _ in 1..config.chains {
        states.push(bounds.sample_uniform(&mut rng));
    }
    let mut logliks: Vec<f64> = states.iter().map(&eval).collect();

    let total_needed = config.burn_in + config.output_size;
    let generations = total_needed.div_ceil(config.chains);

    let gamma_parallel = 2.38 / ((2 * DIM) as f64).sqrt();
    let mut history: Vec<[f64; 3]> = Vec::with_capacity(generations * config.chains);

    for gen in 0..generations {
        let long_jump = (gen + 1) % LONG_JUMP_EVERY == 0;

        for chain in 0..config.chains {
            let x = states[chain];
            let snooker = rng.random::<f64>() < SNOOKER_PROB;

            let (proposal, log_correction) = if snooker {
                match snooker_proposal(&x, &archive, &mut rng) {
                    Some(p) => p,
                    None => continue,
                }
            } else {
                let (z1, z2) = two_distinct(&archive, &mut rng);
                let gamma = if long_jump { 1.0 } else { gamma_parallel };
                let mut proposal = [0.0; 3];
                for i in 0..DIM {
                    let jitter = 1.0 + rng.random_range(-0.05..=0.05);
                    proposal[i] = x[i] + gamma * jitter * (z1[i] - z2[i]);
                }
                (proposal, 0.0)
            };

            let ll = eval(&proposal);
            if ll > f64::NEG_INFINITY {
                let log_alpha = ll - logliks[chain] + log_correction;
                if log_alpha >= 0.0 || rng.random::<f64>().ln() < log_alpha {
                    states[chain] = proposal;
                    logliks[chain] = ll;
                }
            }
            // −∞ likelihood or an out-of-box proposal is a plain rejection.
        }

        if (gen + 1) % ARCHIVE_THIN == 0 {
            archive.extend_from_slice(&states);
        }
        history.extend_from_slice(&states);
    }

    // Burn in, then thin evenly to the output size.
    let kept = &history[config.burn_in.min(history.len())..];
    let draws: Vec<VariogramParams> = if kept.len() <= config.output_size {
        kept.iter().copied().map(VariogramParams::from_array).collect()
    } else {
        (0..config.output_size)
            .map(|i| VariogramParams::from_array(kept[i * kept.len() / config.output_size]))
            .collect()
    };

    PosteriorSample::new(draws)
}

/// Snooker update: a jump along the direction from an anchor state z to the
/// current state x, scaled by the projection of two further archive states
/// onto that direction. The Metropolis ratio carries the
/// `(‖x*−z‖/‖x−z‖)^(d−1)` volume correction.
fn snooker_proposal<R: Rng>(
    x: &[f64; 3],
    archive: &[[f64; 3]],
    rng: &mut R,
) -> Option<([f64; 3], f64)> {
    let z = archive[rng.random_range(0..archive.len())];
    let (z1, z2) = two_distinct(archive, rng);

    let mut direction = [0.0; 3];
    let mut norm_sq = 0.0;
    for i in 0..DIM {
        direction[i] = x[i] - z[i];
        norm_sq += direction[i] * direction[i];
    }
    if norm_sq <= f64::EPSILON {
        // Anchor coincides with the current state; no direction to move in.
        return None;
    }

    let gamma = rng.random_range(1.2..=2.2);
    let projected_diff: f64 = (0..DIM)
        .map(|i| (z1[i] - z2[i]) * direction[i])
        .sum::<f64>()
        / norm_sq;

    let mut proposal = [0.0; 3];
    let mut new_norm_sq = 0.0;
    for i in 0..DIM {
        proposal[i] = x[i] + gamma * projected_diff * direction[i];
        let d = proposal[i] - z[i];
        new_norm_sq += d * d;
    }
    if new_norm_sq <= 0.0 {
        return None;
    }

    let log_correction = 0.5 * (DIM as f64 - 1.0) * (new_norm_sq / norm_sq).ln();
    Some((proposal, log_correction))
}

fn two_distinct<R: Rng>(archive: &[[f64; 3]], rng: &mut R) -> ([f64; 3], [f64; 3]) {
    let a = rng.random_range(0..archive.len());
    let mut b = rng.random_range(0..archive.len());
    while b == a {
        b = rng.random_range(0..archive.len());
    }
    (archive[a], archive[b])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variogram::ParameterBounds;

    fn unit_bounds() -> ParameterBounds {
        ParameterBounds {
            inv_sill: (1e-6, 10.0),
            rel_nugget: (0.0, 1.0),
            range: (1e-6, 10.0),
        }
    }

    /// Smooth unimodal target centered inside the box.
    fn gaussian_loglik(p: &VariogramParams) -> f64 {
        let c = [2.0, 0.5, 4.0];
        let s = [0.5, 0.15, 1.0];
        let v = p.to_array();
        -(0..3)
            .map(|i| {
                let d = (v[i] - c[i]) / s[i];
                0.5 * d * d
            })
            .sum::<f64>()
    }

    fn test_config() -> SamplerConfig {
        SamplerConfig {
            chains: 3,
            burn_in: 300,
            output_size: 300,
            seed: 42,
        }
    }

    #[test]
    fn test_determinism_for_fixed_seed() {
        let bounds = unit_bounds();
        let init = VariogramParams::from_array([2.0, 0.5, 4.0]);
        let a = sample_posterior(gaussian_loglik, &bounds, &init, &test_config());
        let b = sample_posterior(gaussian_loglik, &bounds, &init, &test_config());
        assert_eq!(a, b, "identical seed and inputs must reproduce the draw sequence");
    }

    #[test]
    fn test_different_seed_changes_draws() {
        let bounds = unit_bounds();
        let init = VariogramParams::from_array([2.0, 0.5, 4.0]);
        let a = sample_posterior(gaussian_loglik, &bounds, &init, &test_config());
        let mut config = test_config();
        config.seed = 43;
        let b = sample_posterior(gaussian_loglik, &bounds, &init, &config);
        assert_ne!(a, b);
    }

    #[test]
    fn test_output_size_and_box_respected() {
        let bounds = unit_bounds();
        let init = VariogramParams::from_array([2.0, 0.5, 4.0]);
        let sample = sample_posterior(gaussian_loglik, &bounds, &init, &test_config());
        assert_eq!(sample.len(), 300);
        for draw in sample.draws() {
            assert!(bounds.contains(&draw.to_array()));
            assert!(draw.is_valid());
        }
    }

    #[test]
    fn test_recovers_target_center() {
        let bounds = unit_bounds();
        let init = VariogramParams::from_array([2.0, 0.5, 4.0]);
        let config = SamplerConfig {
            chains: 3,
            burn_in: 1_000,
            output_size: 1_000,
            seed: 42,
        };
        let sample = sample_posterior(gaussian_loglik, &bounds, &init, &config);

        let mean =
            sample.draws().iter().map(|p| p.inv_sill).sum::<f64>() / sample.len() as f64;
        assert!(
            (mean - 2.0).abs() < 0.3,
            "posterior mean of λ should approach the target center, got {mean:.3}"
        );

        let (lo, hi) = sample.credible_interval(|p| p.inv_sill, 0.9);
        assert!(lo < 2.0 && hi > 2.0, "90% CI [{lo:.3}, {hi:.3}] should cover 2.0");
    }

    #[test]
    fn test_subsample_even_spacing() {
        let draws: Vec<VariogramParams> = (0..100)
            .map(|i| VariogramParams::from_array([1.0 + i as f64, 0.5, 1.0]))
            .collect();
        let sample = PosteriorSample::new(draws);
        let sub = sample.subsample(10);
        assert_eq!(sub.len(), 10);
        assert_eq!(sub[0].inv_sill, 1.0);
        assert_eq!(sub[9].inv_sill, 91.0);

        // Requesting more than available returns everything.
        assert_eq!(sample.subsample(200).len(), 100);
    }

    #[test]
    fn test_rejects_proposals_with_neg_infinite_likelihood() {
        // A target that is −∞ on half the box: the sampler must stay in the
        // supported half and never panic.
        let bounds = unit_bounds();
        let loglik = |p: &VariogramParams| {
            if p.rel_nugget > 0.5 {
                f64::NEG_INFINITY
            } else {
                0.0
            }
        };
        let init = VariogramParams::from_array([2.0, 0.25, 4.0]);
        let sample = sample_posterior(loglik, &bounds, &init, &test_config());
        for draw in sample.draws() {
            assert!(draw.rel_nugget <= 0.5);
        }
    }
}
