//! Aggregation of simulated variances into reportable statistics.

mod decompose;
mod uncertainty;

pub use decompose::{decompose, percentile_sorted, VarianceDecomposition};
pub use uncertainty::{required_sample_size, uncertainty_metric, RequiredSampleSize};
