//! Generalized-least-squares (BLUE) estimation of the field mean.
//!
//! For one posterior draw, the covariance over the original sample
//! locations is rebuilt with the same construction and measurement-error
//! convention as the likelihood, and the GLS mean
//! β̂ = (1ᵀC⁻¹1)⁻¹ 1ᵀC⁻¹z is computed via Cholesky solves.
//!
//! The estimate serves two purposes: it is reported as the posterior
//! distribution of the field mean, and it is the additive mean handed to
//! the field simulator when the model is on the log scale.

use nalgebra::{Cholesky, DVector};

use crate::dataset::SpatialDataset;
use crate::error::FieldError;
use crate::types::VariogramParams;
use crate::variogram::build_covariance;

/// GLS mean estimate for one posterior draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlsMean {
    /// The estimate β̂ on the model scale.
    pub estimate: f64,
    /// Its GLS variance (1ᵀC⁻¹1)⁻¹.
    pub variance: f64,
}

/// Compute the BLUE of the field mean under one parameter draw.
///
/// Unlike the likelihood, a covariance that fails to factorize here is an
/// error: the draw came out of the posterior sampler, which only accepts
/// parameters with a valid covariance, so failure indicates an upstream
/// invariant violation.
pub fn gls_mean(dataset: &SpatialDataset, params: &VariogramParams) -> Result<GlsMean, FieldError> {
    let c = build_covariance(
        dataset.distances(),
        params,
        Some(dataset.measurement_error_variance()),
    );
    let n = dataset.len();
    let chol = Cholesky::new(c).ok_or(FieldError::NonPositiveDefinite { n, draw: None })?;

    let ones = DVector::from_element(n, 1.0);
    let cinv_ones = chol.solve(&ones);
    let cinv_z = chol.solve(dataset.z());

    let denom = ones.dot(&cinv_ones);
    if !(denom.is_finite() && denom > 0.0) {
        return Err(FieldError::NonPositiveDefinite { n, draw: None });
    }

    Ok(GlsMean {
        estimate: ones.dot(&cinv_z) / denom,
        variance: 1.0 / denom,
    })
}
