//! Configuration for the sampling-variance prediction pipeline.

use crate::types::TransformPolicy;

/// Configuration options for one survey run.
///
/// The defaults reproduce the standard production setup: log-scale model,
/// 0.064 measurement coefficient of variation, 1000 posterior draws after a
/// 1000-draw burn-in, 100 retained draws × 100 replicates in the simulation
/// stage, and stratum counts {5, 10, …, 50}.
#[derive(Debug, Clone)]
pub struct SurveyConfig {
    // =========================================================================
    // Model variant
    // =========================================================================
    /// Scale on which the variogram model is fitted.
    ///
    /// `Log` models ln(count) with a constant measurement-error variance of
    /// `cv²`; `Identity` models the raw counts with heteroscedastic
    /// measurement-error variance `(cv · count)²`.
    pub transform: TransformPolicy,

    /// Relative measurement error (coefficient of variation) of one count.
    ///
    /// Default: 0.064.
    pub measurement_cv: f64,

    /// Upper prior bound for the inverse sill λ.
    ///
    /// A single convention is used for both transforms. Default: 1e4.
    pub lambda_upper: f64,

    // =========================================================================
    // MCMC budget
    // =========================================================================
    /// Number of parallel chains in the differential-evolution sampler.
    ///
    /// Default: 3.
    pub mcmc_chains: usize,

    /// Pooled draws discarded as burn-in. Default: 1000.
    pub mcmc_burn_in: usize,

    /// Size of the retained posterior sample after thinning. Default: 1000.
    pub posterior_size: usize,

    // =========================================================================
    // Simulation budget
    // =========================================================================
    /// Posterior draws carried into the simulation stage (evenly spaced
    /// subsample of the posterior). Default: 100.
    pub sim_draws: usize,

    /// Independent field realizations per posterior draw. Default: 100.
    pub sim_replicates: usize,

    // =========================================================================
    // Evaluation grid and reporting
    // =========================================================================
    /// Candidate stratum counts L to evaluate. Default: {5, 10, …, 50}.
    pub stratum_counts: Vec<usize>,

    /// Target for the relative uncertainty metric U, in percent.
    ///
    /// The required sample size is the stratum count at which U crosses this
    /// threshold. Default: 50.0.
    pub uncertainty_threshold: f64,

    /// Base seed from which every per-(field, draw, replicate) stream is
    /// derived. Default: 42.
    pub seed: u64,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            transform: TransformPolicy::Log,
            measurement_cv: 0.064,
            lambda_upper: 1e4,
            mcmc_chains: 3,
            mcmc_burn_in: 1_000,
            posterior_size: 1_000,
            sim_draws: 100,
            sim_replicates: 100,
            stratum_counts: (1..=10).map(|i| i * 5).collect(),
            uncertainty_threshold: 50.0,
            seed: 42,
        }
    }
}

impl SurveyConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reduced configuration for tests and rapid iteration.
    ///
    /// Uses a small MCMC budget and simulation grid so that a full pipeline
    /// run completes in seconds.
    pub fn quick() -> Self {
        Self {
            mcmc_burn_in: 200,
            posterior_size: 200,
            sim_draws: 20,
            sim_replicates: 20,
            stratum_counts: vec![2, 4, 8],
            ..Default::default()
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Set the transform policy.
    pub fn transform(mut self, transform: TransformPolicy) -> Self {
        self.transform = transform;
        self
    }

    /// Set the measurement coefficient of variation.
    pub fn measurement_cv(mut self, cv: f64) -> Self {
        assert!(cv > 0.0, "measurement_cv must be positive");
        self.measurement_cv = cv;
        self
    }

    /// Set the burn-in and retained posterior sample size.
    pub fn mcmc_budget(mut self, burn_in: usize, posterior_size: usize) -> Self {
        assert!(posterior_size > 0, "posterior_size must be positive");
        self.mcmc_burn_in = burn_in;
        self.posterior_size = posterior_size;
        self
    }

    /// Set the simulation budget (retained draws × replicates per draw).
    pub fn sim_budget(mut self, draws: usize, replicates: usize) -> Self {
        assert!(draws > 0, "sim_draws must be positive");
        assert!(replicates > 1, "sim_replicates must be at least 2");
        self.sim_draws = draws;
        self.sim_replicates = replicates;
        self
    }

    /// Set the candidate stratum counts.
    pub fn stratum_counts(mut self, counts: Vec<usize>) -> Self {
        assert!(!counts.is_empty(), "stratum_counts must be non-empty");
        self.stratum_counts = counts;
        self
    }

    /// Set the uncertainty threshold in percent.
    pub fn uncertainty_threshold(mut self, pct: f64) -> Self {
        assert!(pct > 0.0, "uncertainty_threshold must be positive");
        self.uncertainty_threshold = pct;
        self
    }

    /// Set the base seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check that the configuration is internally consistent.
    pub fn validate(&self) -> Result<(), String> {
        if self.measurement_cv <= 0.0 {
            return Err("measurement_cv must be positive".to_string());
        }
        if self.lambda_upper <= 1e-6 {
            return Err("lambda_upper must exceed the lower bound 1e-6".to_string());
        }
        if self.mcmc_chains < 3 {
            return Err("mcmc_chains must be at least 3 for differential evolution".to_string());
        }
        if self.posterior_size == 0 {
            return Err("posterior_size must be positive".to_string());
        }
        if self.sim_draws == 0 || self.sim_draws > self.posterior_size {
            return Err("sim_draws must be in 1..=posterior_size".to_string());
        }
        if self.sim_replicates < 2 {
            return Err("sim_replicates must be at least 2".to_string());
        }
        if self.stratum_counts.is_empty() {
            return Err("stratum_counts must be non-empty".to_string());
        }
        if self.stratum_counts.windows(2).any(|w| w[0] >= w[1]) {
            return Err("stratum_counts must be strictly increasing".to_string());
        }
        Ok(())
    }
}
