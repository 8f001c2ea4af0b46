//! Error types for per-field pipeline failures.
//!
//! All failures are scoped to a single field: a batch run over many fields
//! reports one `FieldError` per failed field and continues with the rest.

use std::error::Error;
use std::fmt;

use crate::types::FieldId;

/// Kind of persisted artifact expected at a stage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Posterior sample of variogram parameters.
    Posterior,
    /// 3-D array of stratified sampling variances plus population variances.
    Variances,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Posterior => write!(f, "posterior sample"),
            ArtifactKind::Variances => write!(f, "variance array"),
        }
    }
}

/// Errors arising while processing one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    /// Covariance matrix over the discretization grid failed to factorize
    /// for a posterior draw that survived the sampler. This indicates an
    /// upstream invariant violation and is fatal for the field.
    NonPositiveDefinite {
        /// Matrix dimension.
        n: usize,
        /// Posterior draw index being simulated, if known.
        draw: Option<usize>,
    },

    /// A required upstream artifact was absent from the store.
    MissingArtifact {
        /// Field whose artifact is missing.
        field: FieldId,
        /// What was expected.
        kind: ArtifactKind,
    },

    /// No geostratification supplied for a configured stratum count.
    MissingStratification {
        /// Field the stratification belongs to.
        field: FieldId,
        /// The stratum count without an assignment.
        level: usize,
    },

    /// A stratum has fewer than 2 grid nodes, so its variance is undefined.
    /// The stratification is rejected rather than coerced to NaN.
    DegenerateStratum {
        /// Stratum count of the offending stratification.
        level: usize,
        /// Zero-based id of the degenerate stratum.
        stratum: usize,
        /// Number of nodes assigned to it.
        nodes: usize,
    },

    /// A stratum assignment references a node outside the grid, or a
    /// stratum id outside `0..n_strata`.
    InvalidStratification {
        /// Stratum count of the offending stratification.
        level: usize,
        /// Description of the inconsistency.
        message: String,
    },

    /// The dataset has too few distinct locations to fit a variogram.
    InsufficientData {
        /// Distinct locations found.
        got: usize,
        /// Minimum required.
        min: usize,
    },

    /// Configuration failed validation.
    InvalidConfig(String),
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::NonPositiveDefinite { n, draw } => match draw {
                Some(d) => write!(
                    f,
                    "grid covariance ({n}x{n}) not positive definite for posterior draw {d}"
                ),
                None => write!(f, "covariance matrix ({n}x{n}) not positive definite"),
            },
            FieldError::MissingArtifact { field, kind } => {
                write!(f, "missing {kind} for {field}")
            }
            FieldError::MissingStratification { field, level } => {
                write!(f, "no geostratification for {field} at {level} strata")
            }
            FieldError::DegenerateStratum {
                level,
                stratum,
                nodes,
            } => write!(
                f,
                "stratum {stratum} of the {level}-stratum partition has {nodes} node(s); \
                 at least 2 are required for a defined variance"
            ),
            FieldError::InvalidStratification { level, message } => {
                write!(f, "invalid {level}-stratum partition: {message}")
            }
            FieldError::InsufficientData { got, min } => write!(
                f,
                "dataset has {got} distinct location(s); at least {min} required"
            ),
            FieldError::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl Error for FieldError {}
