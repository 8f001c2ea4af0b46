//! Monte-Carlo simulation stage: field realizations and their sampling
//! variances.

mod field;
mod variance;

pub use field::FieldSimulator;
pub use variance::{
    population_variance, sample_variance, stratified_variance, DrawRow, VarianceArray,
};
