//! Sampling-variance aggregation over simulated fields.
//!
//! For one simulated field: the population variance S² over all grid nodes
//! (the simple-random sampling variance of the mean for sample size n is
//! S²/n) and the stratified sampling variance under one point per stratum,
//! `V_STSI(L) = (1/L²)·Σ_h S²_h`. Results accumulate into the persisted
//! [`VarianceArray`] indexed `[stratum-level][draw][replicate]`.

use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::grid::GeoStratification;

/// Sample variance with the n−1 denominator (Cochran's S²).
///
/// Returns 0.0 for fewer than two values; callers that must not see a
/// degenerate variance validate their stratifications first.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64
}

/// Population variance S² of one simulated field over all grid nodes.
pub fn population_variance(field: &[f64]) -> f64 {
    sample_variance(field)
}

/// Stratified sampling variance of the mean under one point per stratum.
///
/// `V_STSI = (1/L²)·Σ_h S²_h` where S²_h is the variance of node values in
/// stratum h. The stratification was validated on construction (full
/// partition, every stratum ≥ 2 nodes), so each per-stratum variance is
/// defined; a length mismatch with the field is still rejected.
pub fn stratified_variance(
    field: &[f64],
    stratification: &GeoStratification,
) -> Result<f64, FieldError> {
    let assignment = stratification.assignment();
    if assignment.len() != field.len() {
        return Err(FieldError::InvalidStratification {
            level: stratification.n_strata(),
            message: format!(
                "field has {} nodes, stratification covers {}",
                field.len(),
                assignment.len()
            ),
        });
    }

    let l = stratification.n_strata();
    // Per-stratum Welford-style accumulation in one pass over the nodes.
    let mut count = vec![0usize; l];
    let mut mean = vec![0.0f64; l];
    let mut m2 = vec![0.0f64; l];
    for (&value, &h) in field.iter().zip(assignment.iter()) {
        count[h] += 1;
        let delta = value - mean[h];
        mean[h] += delta / count[h] as f64;
        m2[h] += delta * (value - mean[h]);
    }

    let sum: f64 = (0..l).map(|h| m2[h] / (count[h] - 1) as f64).sum();
    Ok(sum / (l * l) as f64)
}

/// Persisted 3-D array of stratified sampling variances plus the companion
/// 2-D population-variance array; the deliverable of the simulation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceArray {
    levels: Vec<usize>,
    draws: usize,
    replicates: usize,
    /// `[level][draw][replicate]`, level-major then draw-major.
    stsi: Vec<f64>,
    /// `[draw][replicate]`, draw-major.
    population: Vec<f64>,
}

impl VarianceArray {
    /// Allocate a zeroed array for the given evaluation grid.
    pub fn new(levels: Vec<usize>, draws: usize, replicates: usize) -> Self {
        let stsi = vec![0.0; levels.len() * draws * replicates];
        let population = vec![0.0; draws * replicates];
        Self {
            levels,
            draws,
            replicates,
            stsi,
            population,
        }
    }

    /// The evaluated stratum counts.
    pub fn levels(&self) -> &[usize] {
        &self.levels
    }

    /// Number of posterior draws.
    pub fn draws(&self) -> usize {
        self.draws
    }

    /// Number of replicates per draw.
    pub fn replicates(&self) -> usize {
        self.replicates
    }

    /// Store one stratified variance value.
    pub fn set_stsi(&mut self, level_idx: usize, draw: usize, replicate: usize, value: f64) {
        let i = (level_idx * self.draws + draw) * self.replicates + replicate;
        self.stsi[i] = value;
    }

    /// Store one population variance value.
    pub fn set_population(&mut self, draw: usize, replicate: usize, value: f64) {
        self.population[draw * self.replicates + replicate] = value;
    }

    /// The draws×replicates slice for one stratum level, draw-major.
    pub fn stsi_slice(&self, level_idx: usize) -> &[f64] {
        let start = level_idx * self.draws * self.replicates;
        &self.stsi[start..start + self.draws * self.replicates]
    }

    /// The draws×replicates population-variance values, draw-major.
    pub fn population_slice(&self) -> &[f64] {
        &self.population
    }

    /// Merge per-draw rows produced by parallel workers, in draw order.
    ///
    /// `rows[draw]` holds `(per-level replicate values, population replicate
    /// values)`.
    pub fn fill_from_rows(&mut self, rows: Vec<DrawRow>) {
        for (draw, row) in rows.into_iter().enumerate() {
            for (level_idx, values) in row.stsi.into_iter().enumerate() {
                for (replicate, value) in values.into_iter().enumerate() {
                    self.set_stsi(level_idx, draw, replicate, value);
                }
            }
            for (replicate, value) in row.population.into_iter().enumerate() {
                self.set_population(draw, replicate, value);
            }
        }
    }
}

/// Variance results for one posterior draw, produced by one worker.
#[derive(Debug, Clone)]
pub struct DrawRow {
    /// `stsi[level_idx][replicate]`.
    pub stsi: Vec<Vec<f64>>,
    /// `population[replicate]`.
    pub population: Vec<f64>,
}
