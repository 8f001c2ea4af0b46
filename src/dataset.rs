//! Per-field sample dataset with precomputed model inputs.

use nalgebra::{DMatrix, DVector};

use crate::error::FieldError;
use crate::types::TransformPolicy;

/// Half the reporting limit; zero counts are remapped to this value before
/// any transform so the log model stays defined.
pub const ZERO_COUNT_REMAP: f64 = 0.5;

/// Minimum number of distinct sample locations for a variogram fit.
pub const MIN_LOCATIONS: usize = 3;

/// One field observation: a 2-D coordinate and an observed count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    /// Easting coordinate.
    pub easting: f64,
    /// Northing coordinate.
    pub northing: f64,
    /// Observed count (non-negative; 0 is remapped).
    pub count: f64,
}

/// Validated sample dataset for one field.
///
/// Construction precomputes everything the likelihood needs so repeated
/// evaluations during optimization and MCMC touch read-only state only:
/// transformed values, the pairwise distance matrix, and per-observation
/// measurement-error variance.
#[derive(Debug, Clone)]
pub struct SpatialDataset {
    points: Vec<SamplePoint>,
    z: DVector<f64>,
    me_var: DVector<f64>,
    distances: DMatrix<f64>,
    transform: TransformPolicy,
    z_variance: f64,
    mean_distance: f64,
    max_distance: f64,
    mean_count: f64,
}

impl SpatialDataset {
    /// Build a dataset from raw observations.
    ///
    /// Zero counts are remapped to [`ZERO_COUNT_REMAP`] first. The derived
    /// value z is the count or its natural logarithm per `transform`. The
    /// measurement-error variance is `cv²` per observation on the log scale
    /// and `(cv · count)²` on the natural scale (heteroscedastic).
    pub fn new(
        points: Vec<SamplePoint>,
        transform: TransformPolicy,
        measurement_cv: f64,
    ) -> Result<Self, FieldError> {
        let points: Vec<SamplePoint> = points
            .into_iter()
            .map(|mut p| {
                if p.count == 0.0 {
                    p.count = ZERO_COUNT_REMAP;
                }
                p
            })
            .collect();

        let distinct = count_distinct_locations(&points);
        if distinct < MIN_LOCATIONS {
            return Err(FieldError::InsufficientData {
                got: distinct,
                min: MIN_LOCATIONS,
            });
        }

        let n = points.len();
        let z = DVector::from_iterator(n, points.iter().map(|p| transform.apply(p.count)));
        let me_var = DVector::from_iterator(
            n,
            points.iter().map(|p| match transform {
                TransformPolicy::Log => measurement_cv * measurement_cv,
                TransformPolicy::Identity => {
                    let sd = measurement_cv * p.count;
                    sd * sd
                }
            }),
        );

        let distances = pairwise_distances(&points);

        let mean = z.mean();
        let z_variance = if n > 1 {
            z.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };

        let mut dist_sum = 0.0;
        let mut dist_count = 0usize;
        let mut max_distance = 0.0f64;
        for i in 0..n {
            for j in (i + 1)..n {
                let d = distances[(i, j)];
                dist_sum += d;
                dist_count += 1;
                max_distance = max_distance.max(d);
            }
        }
        let mean_distance = if dist_count > 0 {
            dist_sum / dist_count as f64
        } else {
            0.0
        };

        let mean_count = points.iter().map(|p| p.count).sum::<f64>() / n as f64;

        Ok(Self {
            points,
            z,
            me_var,
            distances,
            transform,
            z_variance,
            mean_distance,
            max_distance,
            mean_count,
        })
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the dataset is empty (never true for a validated dataset).
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The observations after zero-count remapping.
    pub fn points(&self) -> &[SamplePoint] {
        &self.points
    }

    /// Transformed values z.
    pub fn z(&self) -> &DVector<f64> {
        &self.z
    }

    /// Per-observation measurement-error variance on the model scale.
    pub fn measurement_error_variance(&self) -> &DVector<f64> {
        &self.me_var
    }

    /// Pairwise Euclidean distance matrix of the sample locations.
    pub fn distances(&self) -> &DMatrix<f64> {
        &self.distances
    }

    /// Active transform policy.
    pub fn transform(&self) -> TransformPolicy {
        self.transform
    }

    /// Sample variance of z (n−1 denominator).
    pub fn z_variance(&self) -> f64 {
        self.z_variance
    }

    /// Mean pairwise distance; the moment-based starting guess for φ.
    pub fn mean_distance(&self) -> f64 {
        self.mean_distance
    }

    /// Maximum pairwise distance; sets the φ prior upper bound at 3·max(D).
    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    /// Mean observed count on the natural scale (after remapping); the
    /// denominator of the relative uncertainty metric.
    pub fn mean_count(&self) -> f64 {
        self.mean_count
    }
}

fn count_distinct_locations(points: &[SamplePoint]) -> usize {
    let mut distinct = 0;
    for (i, p) in points.iter().enumerate() {
        let duplicate = points[..i]
            .iter()
            .any(|q| q.easting == p.easting && q.northing == p.northing);
        if !duplicate {
            distinct += 1;
        }
    }
    distinct
}

fn pairwise_distances(points: &[SamplePoint]) -> DMatrix<f64> {
    let n = points.len();
    DMatrix::from_fn(n, n, |i, j| {
        let dx = points[i].easting - points[j].easting;
        let dy = points[i].northing - points[j].northing;
        (dx * dx + dy * dy).sqrt()
    })
}
