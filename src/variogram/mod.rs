//! Variogram model fitting: likelihood evaluation and MLE seeding.

mod likelihood;
mod mle;

pub use likelihood::{build_covariance, log_likelihood, LOG_2PI};
pub use mle::{fit_mle, moment_guess, MleFit, ParameterBounds, EPS_BOUND};
