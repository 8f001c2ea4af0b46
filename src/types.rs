//! Core parameter and identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for one survey field.
///
/// Fields are fully independent pipelines; the id participates in seed
/// derivation so that parallel execution order cannot affect reproducibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub u32);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field-{}", self.0)
    }
}

/// Which scale the variogram model is fitted on.
///
/// The policy is applied consistently by the likelihood, the BLUE mean
/// estimator, and the simulation back-transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformPolicy {
    /// Model the observed counts directly.
    Identity,
    /// Model the natural logarithm of the counts.
    Log,
}

impl TransformPolicy {
    /// Apply the forward transform to a (zero-remapped) count.
    pub fn apply(&self, count: f64) -> f64 {
        match self {
            TransformPolicy::Identity => count,
            TransformPolicy::Log => count.ln(),
        }
    }

    /// Apply the inverse transform to a simulated value.
    pub fn invert(&self, z: f64) -> f64 {
        match self {
            TransformPolicy::Identity => z,
            TransformPolicy::Log => z.exp(),
        }
    }
}

/// Exponential variogram parameters in the canonical sampling
/// parameterization.
///
/// The model is `C(d) = psill · exp(−d/φ)` off the diagonal with total
/// variance `sill = 1/λ` on the diagonal, split into `nugget = τ²rel · sill`
/// and `partial sill = sill − nugget`.
///
/// Invariants: `λ > 0`, `0 ≤ τ²rel ≤ 1`, `φ > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariogramParams {
    /// Inverse sill λ = 1/σ².
    pub inv_sill: f64,
    /// Relative nugget τ²rel, the nugget as a fraction of the sill.
    pub rel_nugget: f64,
    /// Range φ, the decay distance of the exponential covariance.
    pub range: f64,
}

impl VariogramParams {
    /// Create parameters, checking the invariants.
    pub fn new(inv_sill: f64, rel_nugget: f64, range: f64) -> Option<Self> {
        let p = Self {
            inv_sill,
            rel_nugget,
            range,
        };
        if p.is_valid() {
            Some(p)
        } else {
            None
        }
    }

    /// Whether the invariants hold (finite, λ>0, τ²rel∈[0,1], φ>0).
    pub fn is_valid(&self) -> bool {
        self.inv_sill.is_finite()
            && self.inv_sill > 0.0
            && (0.0..=1.0).contains(&self.rel_nugget)
            && self.range.is_finite()
            && self.range > 0.0
    }

    /// Total variance of the spatial process, σ² = 1/λ.
    pub fn sill(&self) -> f64 {
        1.0 / self.inv_sill
    }

    /// Nugget variance, τ²rel · σ².
    pub fn nugget(&self) -> f64 {
        self.rel_nugget * self.sill()
    }

    /// Partial sill, σ² − nugget. Non-negative whenever the invariants hold.
    pub fn partial_sill(&self) -> f64 {
        self.sill() - self.nugget()
    }

    /// View as a parameter vector (λ, τ²rel, φ) for the optimizer/sampler.
    pub fn to_array(&self) -> [f64; 3] {
        [self.inv_sill, self.rel_nugget, self.range]
    }

    /// Build from a parameter vector without checking invariants.
    ///
    /// The optimizer and sampler keep their iterates inside the prior box,
    /// so validity is established by construction there.
    pub fn from_array(v: [f64; 3]) -> Self {
        Self {
            inv_sill: v[0],
            rel_nugget: v[1],
            range: v[2],
        }
    }
}
