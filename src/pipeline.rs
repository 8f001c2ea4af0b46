//! Per-field pipeline: inference → simulation → analysis.
//!
//! Each field is a self-contained task carrying its own inputs; there is no
//! shared mutable state between fields, so a batch parallelizes trivially
//! and one field's failure never aborts the others. Within a field, the
//! simulation stage parallelizes across posterior draws (one Cholesky
//! factorization of the grid covariance per draw dominates the cost).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::analysis::{
    decompose, required_sample_size, uncertainty_metric, RequiredSampleSize,
};
use crate::blue::gls_mean;
use crate::config::SurveyConfig;
use crate::dataset::SpatialDataset;
use crate::error::FieldError;
use crate::grid::{DiscretizationGrid, GeoStratification};
use crate::rng::derived_seed;
use crate::sampler::{sample_posterior, SamplerConfig};
use crate::simulate::{
    population_variance, stratified_variance, DrawRow, FieldSimulator, VarianceArray,
};
use crate::store::ArtifactStore;
use crate::types::{FieldId, VariogramParams};
use crate::variogram::{fit_mle, log_likelihood, ParameterBounds};

/// Stage tag mixed into the sampler seed so the MCMC stream never collides
/// with a (draw, replicate) simulation stream.
const SAMPLER_STREAM: u64 = u64::MAX;

/// Aggregated statistics for one (field, stratum count) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelStatistics {
    /// Stratum count L.
    pub stratum_count: usize,
    /// Mean predicted STSI sampling variance.
    pub mean_variance: f64,
    /// Median of the pooled draws×replicates STSI variances.
    pub median_variance: f64,
    /// 90th percentile of the pooled STSI variances.
    pub p90_variance: f64,
    /// Variogram-uncertainty component `V_MCMC[E_ξ(V_STSI)]`.
    pub variogram_component: f64,
    /// Simulation-noise component `E_MCMC[V_ξ(V_STSI)]`.
    pub simulation_component: f64,
    /// Mean simple-random sampling variance S²/L at the same sample size.
    pub srs_mean_variance: f64,
    /// Median simple-random sampling variance.
    pub srs_median_variance: f64,
    /// 90th percentile simple-random sampling variance.
    pub srs_p90_variance: f64,
    /// Relative uncertainty U(L), in percent.
    pub uncertainty_pct: f64,
}

/// Final per-field deliverable for external reporting collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    /// The field this report describes.
    pub field: FieldId,
    /// Posterior mean of the BLUE field-mean estimate, on the model scale.
    pub mean_estimate: f64,
    /// Per-stratum-count statistics, in configured order.
    pub levels: Vec<LevelStatistics>,
    /// Stratum count required to reach the uncertainty threshold.
    pub required_sample_size: RequiredSampleSize,
}

/// One field's inputs and configuration, ready to run.
#[derive(Debug, Clone)]
pub struct FieldTask {
    field: FieldId,
    dataset: SpatialDataset,
    grid: DiscretizationGrid,
    stratifications: BTreeMap<usize, GeoStratification>,
    config: SurveyConfig,
}

impl FieldTask {
    /// Assemble a task, checking the configuration and that a validated
    /// stratification exists for every configured stratum count.
    pub fn new(
        field: FieldId,
        dataset: SpatialDataset,
        grid: DiscretizationGrid,
        stratifications: BTreeMap<usize, GeoStratification>,
        config: SurveyConfig,
    ) -> Result<Self, FieldError> {
        config.validate().map_err(FieldError::InvalidConfig)?;
        for &level in &config.stratum_counts {
            match stratifications.get(&level) {
                None => return Err(FieldError::MissingStratification { field, level }),
                Some(s) if s.n_strata() != level => {
                    return Err(FieldError::InvalidStratification {
                        level,
                        message: format!("stratification has {} strata", s.n_strata()),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(Self {
            field,
            dataset,
            grid,
            stratifications,
            config,
        })
    }

    /// The field this task processes.
    pub fn field(&self) -> FieldId {
        self.field
    }

    /// Stage 1: MLE seeding and posterior sampling; persists the
    /// [`crate::sampler::PosteriorSample`].
    pub fn run_inference(&self, store: &dyn ArtifactStore) -> Result<(), FieldError> {
        let bounds = ParameterBounds::from_dataset(&self.dataset, self.config.lambda_upper);
        let fit = fit_mle(&self.dataset, &bounds);
        debug!(
            field = %self.field,
            converged = fit.converged,
            log_likelihood = fit.log_likelihood,
            "MLE seed fitted"
        );

        let sampler_config = SamplerConfig {
            chains: self.config.mcmc_chains,
            burn_in: self.config.mcmc_burn_in,
            output_size: self.config.posterior_size,
            seed: derived_seed(self.config.seed, self.field.0 as u64, SAMPLER_STREAM, 0),
        };
        let sample = sample_posterior(
            |p| log_likelihood(&self.dataset, p),
            &bounds,
            &fit.params,
            &sampler_config,
        );

        store.put_posterior(self.field, sample);
        Ok(())
    }

    /// Stage 2: conditional simulation and variance aggregation; loads the
    /// posterior sample, persists the [`VarianceArray`].
    pub fn run_simulation(&self, store: &dyn ArtifactStore) -> Result<(), FieldError> {
        let posterior = store.get_posterior(self.field)?;
        let draws = posterior.subsample(self.config.sim_draws);
        let grid_distances = self.grid.distance_matrix();
        debug!(
            field = %self.field,
            draws = draws.len(),
            replicates = self.config.sim_replicates,
            grid = self.grid.len(),
            "starting simulation stage"
        );

        let simulate_draw = |(draw_idx, params): (usize, &VariogramParams)| {
            self.simulate_one_draw(draw_idx, params, &grid_distances)
        };

        #[cfg(feature = "parallel")]
        let rows: Result<Vec<DrawRow>, FieldError> = draws
            .par_iter()
            .enumerate()
            .map(simulate_draw)
            .collect();

        #[cfg(not(feature = "parallel"))]
        let rows: Result<Vec<DrawRow>, FieldError> =
            draws.iter().enumerate().map(simulate_draw).collect();

        let mut array = VarianceArray::new(
            self.config.stratum_counts.clone(),
            draws.len(),
            self.config.sim_replicates,
        );
        array.fill_from_rows(rows?);

        store.put_variances(self.field, array);
        Ok(())
    }

    /// Simulate all replicates of one posterior draw and aggregate their
    /// sampling variances.
    fn simulate_one_draw(
        &self,
        draw_idx: usize,
        params: &VariogramParams,
        grid_distances: &nalgebra::DMatrix<f64>,
    ) -> Result<DrawRow, FieldError> {
        let mean = gls_mean(&self.dataset, params)?;
        let simulator = FieldSimulator::new(
            grid_distances,
            params,
            self.dataset.transform(),
            draw_idx,
        )?;

        let levels = &self.config.stratum_counts;
        let mut stsi = vec![Vec::with_capacity(self.config.sim_replicates); levels.len()];
        let mut population = Vec::with_capacity(self.config.sim_replicates);

        for replicate in 0..self.config.sim_replicates {
            let field = simulator.simulate(
                mean.estimate,
                self.config.seed,
                self.field.0 as u64,
                draw_idx,
                replicate,
            );
            population.push(population_variance(&field));
            for (level_idx, level) in levels.iter().enumerate() {
                let stratification = &self.stratifications[level];
                stsi[level_idx].push(stratified_variance(&field, stratification)?);
            }
        }

        Ok(DrawRow { stsi, population })
    }

    /// Stage 3: decompose the variance array into per-level statistics,
    /// the uncertainty metric, and the required sample size.
    pub fn run_analysis(&self, store: &dyn ArtifactStore) -> Result<FieldReport, FieldError> {
        let array = store.get_variances(self.field)?;
        let posterior = store.get_posterior(self.field)?;

        // Posterior distribution of the BLUE field mean (model scale).
        let draws = posterior.subsample(self.config.sim_draws);
        let mut blue_sum = 0.0;
        for params in &draws {
            blue_sum += gls_mean(&self.dataset, params)?.estimate;
        }
        let mean_estimate = blue_sum / draws.len() as f64;

        // U compares against the field mean on the natural scale.
        let field_mean = self.dataset.mean_count();
        let me_sd = self.config.measurement_cv * field_mean;
        let measurement_variance = me_sd * me_sd;

        let n_draws = array.draws();
        let n_reps = array.replicates();
        let mut levels = Vec::with_capacity(array.levels().len());
        let mut u_values = Vec::with_capacity(array.levels().len());

        for (level_idx, &stratum_count) in array.levels().iter().enumerate() {
            let d = decompose(array.stsi_slice(level_idx), n_draws, n_reps);

            // SI analogue at the same sample size: S²/n with n = L.
            let srs: Vec<f64> = array
                .population_slice()
                .iter()
                .map(|s2| s2 / stratum_count as f64)
                .collect();
            let srs_d = decompose(&srs, n_draws, n_reps);

            let uncertainty_pct =
                uncertainty_metric(d.prediction, measurement_variance, field_mean);
            u_values.push(uncertainty_pct);

            levels.push(LevelStatistics {
                stratum_count,
                mean_variance: d.prediction,
                median_variance: d.median,
                p90_variance: d.p90,
                variogram_component: d.variogram_component,
                simulation_component: d.simulation_component,
                srs_mean_variance: srs_d.prediction,
                srs_median_variance: srs_d.median,
                srs_p90_variance: srs_d.p90,
                uncertainty_pct,
            });
        }

        let required = required_sample_size(
            array.levels(),
            &u_values,
            self.config.uncertainty_threshold,
        );

        Ok(FieldReport {
            field: self.field,
            mean_estimate,
            levels,
            required_sample_size: required,
        })
    }

    /// Run all three stages in order.
    pub fn run(&self, store: &dyn ArtifactStore) -> Result<FieldReport, FieldError> {
        self.run_inference(store)?;
        self.run_simulation(store)?;
        self.run_analysis(store)
    }
}

/// Run a batch of independent field tasks.
///
/// Fields are processed in parallel under the `parallel` feature; every
/// field gets its own `Result`, and no failure aborts the batch.
pub fn run_batch(
    tasks: &[FieldTask],
    store: &dyn ArtifactStore,
) -> Vec<(FieldId, Result<FieldReport, FieldError>)> {
    #[cfg(feature = "parallel")]
    {
        tasks
            .par_iter()
            .map(|task| (task.field(), task.run(store)))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        tasks
            .iter()
            .map(|task| (task.field(), task.run(store)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SamplePoint;
    use crate::store::MemoryStore;
    use crate::types::TransformPolicy;

    fn test_dataset() -> SpatialDataset {
        let points = (0..16)
            .map(|i| SamplePoint {
                easting: (i % 4) as f64 * 2.0 + 1.0,
                northing: (i / 4) as f64 * 2.0 + 1.0,
                count: 6.0 + ((i * 11) % 13) as f64,
            })
            .collect();
        SpatialDataset::new(points, TransformPolicy::Log, 0.064).expect("valid dataset")
    }

    fn test_stratifications(
        grid: &DiscretizationGrid,
        levels: &[usize],
    ) -> BTreeMap<usize, GeoStratification> {
        // Contiguous equal-size blocks of the node index range; compact
        // enough for tests.
        levels
            .iter()
            .map(|&l| {
                let per = grid.len() / l;
                let assignment: Vec<usize> =
                    (0..grid.len()).map(|i| (i / per).min(l - 1)).collect();
                (
                    l,
                    GeoStratification::new(l, assignment, grid.len()).expect("valid strata"),
                )
            })
            .collect()
    }

    fn test_task(field: FieldId) -> FieldTask {
        let config = SurveyConfig::quick().seed(42);
        let grid = DiscretizationGrid::regular(8, 8, 1.0);
        let strats = test_stratifications(&grid, &config.stratum_counts);
        FieldTask::new(field, test_dataset(), grid, strats, config).expect("valid task")
    }

    #[test]
    fn test_task_rejects_missing_stratification() {
        let config = SurveyConfig::quick();
        let grid = DiscretizationGrid::regular(8, 8, 1.0);
        let mut strats = test_stratifications(&grid, &config.stratum_counts);
        strats.remove(&4);
        let err = FieldTask::new(FieldId(1), test_dataset(), grid, strats, config).unwrap_err();
        assert_eq!(
            err,
            FieldError::MissingStratification {
                field: FieldId(1),
                level: 4,
            }
        );
    }

    #[test]
    fn test_simulation_requires_posterior_artifact() {
        let task = test_task(FieldId(3));
        let store = MemoryStore::new();
        let err = task.run_simulation(&store).unwrap_err();
        assert!(matches!(err, FieldError::MissingArtifact { .. }));
    }

    #[test]
    fn test_full_pipeline_produces_report() {
        let task = test_task(FieldId(1));
        let store = MemoryStore::new();
        let report = task.run(&store).expect("pipeline succeeds");

        assert_eq!(report.field, FieldId(1));
        assert_eq!(report.levels.len(), 3);
        for stats in &report.levels {
            assert!(stats.mean_variance > 0.0);
            assert!(stats.variogram_component >= 0.0);
            assert!(stats.simulation_component >= 0.0);
            assert!(stats.uncertainty_pct > 0.0);
            assert!(stats.srs_mean_variance > 0.0);
        }

        // More strata never hurt on a spatially structured field: the
        // predicted STSI variance decreases with L on average.
        let first = report.levels.first().expect("levels");
        let last = report.levels.last().expect("levels");
        assert!(last.mean_variance <= first.mean_variance * 1.5);

        // Artifacts were persisted for reuse.
        assert!(store.get_posterior(FieldId(1)).is_ok());
        assert!(store.get_variances(FieldId(1)).is_ok());
    }

    #[test]
    fn test_pipeline_deterministic_for_fixed_seed() {
        let task = test_task(FieldId(1));
        let store_a = MemoryStore::new();
        let store_b = MemoryStore::new();
        let a = task.run(&store_a).expect("run a");
        let b = task.run(&store_b).expect("run b");
        assert_eq!(a, b, "fixed seed must reproduce the report exactly");
    }
}
