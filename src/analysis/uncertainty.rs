//! Relative uncertainty metric and required-sample-size inversion.
//!
//! `U(L) = 100 · 2 · √(predicted sampling variance + measurement-error
//! variance) / field mean`, in percent. The required sample size for a
//! target threshold is read off the discrete U-versus-L curve by piecewise
//! linear interpolation; the function never extrapolates beyond the
//! evaluated stratum counts.

use serde::{Deserialize, Serialize};

/// Relative measurement uncertainty in percent.
///
/// All three inputs live on the natural (back-transformed) scale.
pub fn uncertainty_metric(sampling_variance: f64, measurement_variance: f64, field_mean: f64) -> f64 {
    100.0 * 2.0 * (sampling_variance + measurement_variance).sqrt() / field_mean
}

/// Outcome of inverting U against the evaluated stratum-count grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RequiredSampleSize {
    /// U crosses the threshold between two evaluated counts; the
    /// interpolated (fractional) sample size.
    Interpolated(f64),
    /// U is already below the threshold at the smallest evaluated count.
    BelowMinimum,
    /// U never reaches the threshold within the evaluated range.
    AboveMaximum,
}

/// Invert the U curve at `threshold`.
///
/// `levels` are the evaluated stratum counts in increasing order with
/// `u_values[i] = U(levels[i])`. U is expected to decrease with sample
/// size; the first downward crossing is interpolated.
///
/// # Panics
///
/// Panics when the inputs are empty or of mismatched length.
pub fn required_sample_size(
    levels: &[usize],
    u_values: &[f64],
    threshold: f64,
) -> RequiredSampleSize {
    assert!(!levels.is_empty(), "no evaluated stratum counts");
    assert_eq!(levels.len(), u_values.len(), "levels/U length mismatch");

    if u_values[0] <= threshold {
        return RequiredSampleSize::BelowMinimum;
    }

    for i in 1..levels.len() {
        if u_values[i] <= threshold {
            let (l0, l1) = (levels[i - 1] as f64, levels[i] as f64);
            let (u0, u1) = (u_values[i - 1], u_values[i]);
            // u0 > threshold >= u1 here, so the denominator is non-zero.
            let t = (u0 - threshold) / (u0 - u1);
            return RequiredSampleSize::Interpolated(l0 + t * (l1 - l0));
        }
    }

    RequiredSampleSize::AboveMaximum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncertainty_metric() {
        // U = 100·2·√(9+16)/50 = 20%.
        let u = uncertainty_metric(9.0, 16.0, 50.0);
        assert!((u - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_inversion_interpolates_between_levels() {
        let levels = [5, 10, 15, 20];
        let u = [80.0, 60.0, 45.0, 30.0];
        match required_sample_size(&levels, &u, 50.0) {
            RequiredSampleSize::Interpolated(n) => {
                assert!(n > 10.0 && n < 15.0, "required size {n} outside (10, 15)");
                // Exact crossing: 10 + (60−50)/(60−45)·5 = 13.33…
                assert!((n - 13.333333333333334).abs() < 1e-9);
            }
            other => panic!("expected interpolation, got {other:?}"),
        }
    }

    #[test]
    fn test_inversion_above_maximum_sentinel() {
        let levels = [5, 10, 15, 20];
        let u = [80.0, 70.0, 65.0, 60.0];
        assert_eq!(
            required_sample_size(&levels, &u, 50.0),
            RequiredSampleSize::AboveMaximum
        );
    }

    #[test]
    fn test_inversion_below_minimum_sentinel() {
        let levels = [5, 10];
        let u = [40.0, 30.0];
        assert_eq!(
            required_sample_size(&levels, &u, 50.0),
            RequiredSampleSize::BelowMinimum
        );
    }

    #[test]
    fn test_exact_hit_on_evaluated_level() {
        let levels = [5, 10, 15];
        let u = [80.0, 50.0, 40.0];
        match required_sample_size(&levels, &u, 50.0) {
            RequiredSampleSize::Interpolated(n) => assert!((n - 10.0).abs() < 1e-12),
            other => panic!("expected interpolation at 10, got {other:?}"),
        }
    }
}
