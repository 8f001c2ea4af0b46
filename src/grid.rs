//! Discretization grid and geostratification inputs.
//!
//! Both are read-only inputs owned by an external stratification
//! collaborator: the grid discretizes one field at fine resolution, and a
//! stratification partitions its nodes into L compact, approximately
//! equal-area strata for each candidate stratum count.

use nalgebra::DMatrix;

use crate::error::FieldError;

/// Fine discretization grid of one field.
#[derive(Debug, Clone)]
pub struct DiscretizationGrid {
    coords: Vec<[f64; 2]>,
}

impl DiscretizationGrid {
    /// Build a grid from node coordinates.
    pub fn new(coords: Vec<[f64; 2]>) -> Self {
        Self { coords }
    }

    /// Convenience constructor: a regular `nx` × `ny` grid with the given
    /// spacing, node-centered at (spacing/2, spacing/2).
    pub fn regular(nx: usize, ny: usize, spacing: f64) -> Self {
        let mut coords = Vec::with_capacity(nx * ny);
        for iy in 0..ny {
            for ix in 0..nx {
                coords.push([
                    (ix as f64 + 0.5) * spacing,
                    (iy as f64 + 0.5) * spacing,
                ]);
            }
        }
        Self { coords }
    }

    /// Number of grid nodes.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Whether the grid has no nodes.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Node coordinates.
    pub fn coords(&self) -> &[[f64; 2]] {
        &self.coords
    }

    /// Pairwise Euclidean distance matrix over the grid nodes.
    ///
    /// This is the dominant allocation of the simulation stage
    /// (O(grid-size²) memory); it is built once per field and shared by all
    /// posterior draws.
    pub fn distance_matrix(&self) -> DMatrix<f64> {
        let n = self.coords.len();
        DMatrix::from_fn(n, n, |i, j| {
            let dx = self.coords[i][0] - self.coords[j][0];
            let dy = self.coords[i][1] - self.coords[j][1];
            (dx * dx + dy * dy).sqrt()
        })
    }
}

/// Partition of a grid into L strata, one sampling point each under STSI.
///
/// `assignment[node]` is the stratum id in `0..n_strata`. A validated
/// stratification covers every node and gives every stratum at least 2
/// nodes; degenerate strata are rejected outright so no undefined variance
/// can propagate downstream.
#[derive(Debug, Clone)]
pub struct GeoStratification {
    n_strata: usize,
    assignment: Vec<usize>,
}

impl GeoStratification {
    /// Build and validate a stratification for a grid of `grid_len` nodes.
    pub fn new(
        n_strata: usize,
        assignment: Vec<usize>,
        grid_len: usize,
    ) -> Result<Self, FieldError> {
        if assignment.len() != grid_len {
            return Err(FieldError::InvalidStratification {
                level: n_strata,
                message: format!(
                    "assignment covers {} nodes, grid has {}",
                    assignment.len(),
                    grid_len
                ),
            });
        }
        if n_strata == 0 {
            return Err(FieldError::InvalidStratification {
                level: n_strata,
                message: "stratum count must be positive".to_string(),
            });
        }

        let mut counts = vec![0usize; n_strata];
        for (node, &h) in assignment.iter().enumerate() {
            if h >= n_strata {
                return Err(FieldError::InvalidStratification {
                    level: n_strata,
                    message: format!("node {node} assigned to out-of-range stratum {h}"),
                });
            }
            counts[h] += 1;
        }
        for (stratum, &nodes) in counts.iter().enumerate() {
            if nodes < 2 {
                return Err(FieldError::DegenerateStratum {
                    level: n_strata,
                    stratum,
                    nodes,
                });
            }
        }

        Ok(Self {
            n_strata,
            assignment,
        })
    }

    /// Number of strata L.
    pub fn n_strata(&self) -> usize {
        self.n_strata
    }

    /// Node → stratum assignment.
    pub fn assignment(&self) -> &[usize] {
        &self.assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_grid_layout() {
        let grid = DiscretizationGrid::regular(3, 2, 2.0);
        assert_eq!(grid.len(), 6);
        assert_eq!(grid.coords()[0], [1.0, 1.0]);
        assert_eq!(grid.coords()[5], [5.0, 3.0]);
    }

    #[test]
    fn test_distance_matrix() {
        let grid = DiscretizationGrid::new(vec![[0.0, 0.0], [3.0, 4.0]]);
        let d = grid.distance_matrix();
        assert_eq!(d[(0, 0)], 0.0);
        assert!((d[(0, 1)] - 5.0).abs() < 1e-12);
        assert_eq!(d[(0, 1)], d[(1, 0)]);
    }

    #[test]
    fn test_stratification_validation() {
        // Valid: 2 strata × 2 nodes.
        assert!(GeoStratification::new(2, vec![0, 0, 1, 1], 4).is_ok());

        // Wrong length.
        assert!(matches!(
            GeoStratification::new(2, vec![0, 1], 4),
            Err(FieldError::InvalidStratification { .. })
        ));

        // Out-of-range stratum id.
        assert!(matches!(
            GeoStratification::new(2, vec![0, 0, 1, 2], 4),
            Err(FieldError::InvalidStratification { .. })
        ));

        // Degenerate stratum (single node) is rejected, not coerced.
        assert!(matches!(
            GeoStratification::new(3, vec![0, 0, 1, 1, 2], 5),
            Err(FieldError::DegenerateStratum {
                level: 3,
                stratum: 2,
                nodes: 1,
            })
        ));
    }
}
