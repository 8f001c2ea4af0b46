//! # fieldvar
//!
//! Predict the sampling variance of spatial-mean estimators for survey
//! fields, before the survey is run.
//!
//! Given historical count observations at known coordinates, this crate:
//! - fits an exponential variogram model by maximum likelihood and samples
//!   its Bayesian posterior with a differential-evolution MCMC sampler,
//! - simulates unconditional field realizations on a fine discretization
//!   grid for a subsample of posterior draws,
//! - aggregates, per candidate stratum count L, the sampling variance of
//!   the stratified (STSI, one point per stratum) and simple random
//!   sampling mean estimators,
//! - decomposes the predicted variance into variogram-uncertainty and
//!   simulation-noise components, and
//! - inverts the relative uncertainty curve U(L) to report the sample size
//!   required to reach a target uncertainty threshold.
//!
//! Every random stream is derived deterministically from one base seed, so
//! a full run reproduces bit for bit regardless of thread scheduling.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::collections::BTreeMap;
//! use fieldvar::{
//!     DiscretizationGrid, FieldId, FieldTask, GeoStratification, MemoryStore,
//!     SamplePoint, SpatialDataset, SurveyConfig, TransformPolicy,
//! };
//!
//! let config = SurveyConfig::new().seed(42);
//! let dataset = SpatialDataset::new(points, TransformPolicy::Log, 0.064)?;
//! let grid = DiscretizationGrid::new(node_coords);
//! let task = FieldTask::new(FieldId(1), dataset, grid, stratifications, config)?;
//!
//! let store = MemoryStore::new();
//! let report = task.run(&store)?;
//! println!("required sample size: {:?}", report.required_sample_size);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod blue;
mod config;
mod dataset;
mod error;
mod grid;
mod pipeline;
mod rng;
mod store;
mod types;

// Functional modules
pub mod analysis;
pub mod sampler;
pub mod simulate;
pub mod variogram;

// Re-exports for public API
pub use analysis::{
    decompose, required_sample_size, uncertainty_metric, RequiredSampleSize,
    VarianceDecomposition,
};
pub use blue::{gls_mean, GlsMean};
pub use config::SurveyConfig;
pub use dataset::{SamplePoint, SpatialDataset, MIN_LOCATIONS, ZERO_COUNT_REMAP};
pub use error::{ArtifactKind, FieldError};
pub use grid::{DiscretizationGrid, GeoStratification};
pub use pipeline::{run_batch, FieldReport, FieldTask, LevelStatistics};
pub use rng::{derived_seed, replicate_rng};
pub use sampler::{sample_posterior, PosteriorSample, SamplerConfig};
pub use store::{ArtifactStore, MemoryStore};
pub use types::{FieldId, TransformPolicy, VariogramParams};
pub use variogram::{fit_mle, log_likelihood, MleFit, ParameterBounds};
