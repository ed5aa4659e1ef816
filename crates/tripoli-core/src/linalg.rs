//! Small linear-algebra interface used by the chain.
//!
//! The proposal, acceptance and convergence code only needs five dense
//! operations. Keeping them behind [`LinearAlgebra`] lets that logic stay
//! independent of the numerics library; [`NalgebraBackend`] is the
//! implementation used everywhere in this workspace.

use crate::error::{Result, TripoliError};
use crate::types::{Matrix, Vector};

/// Relative singular-value cutoff for least-squares rank detection.
const RANK_TOLERANCE: f64 = 1e-12;

/// Dense operations needed by the inversion.
pub trait LinearAlgebra {
    /// `a · x`.
    fn mat_vec(&self, a: &Matrix, x: &Vector) -> Vector;

    /// Minimum-norm least-squares solution of `a · x ≈ b`.
    ///
    /// Fails with [`TripoliError::NumericalInitialization`] when `a` is rank
    /// deficient or the system is underdetermined.
    fn least_squares(&self, a: &Matrix, b: &Vector) -> Result<Vector>;

    /// Lower Cholesky factor `L` with `a = L·Lᵀ`, or `None` if `a` is not
    /// positive definite.
    fn cholesky_lower(&self, a: &Matrix) -> Option<Matrix>;

    /// Sample mean and covariance (normalized by `n − 1`) of row-wise samples.
    fn sample_covariance(&self, samples: &[Vector]) -> (Vector, Matrix);

    /// `ln det(a)` for a symmetric positive-definite `a`, or `None`.
    fn log_determinant(&self, a: &Matrix) -> Option<f64>;
}

/// [`LinearAlgebra`] backed by nalgebra.
#[derive(Debug, Clone, Copy, Default)]
pub struct NalgebraBackend;

impl LinearAlgebra for NalgebraBackend {
    fn mat_vec(&self, a: &Matrix, x: &Vector) -> Vector {
        a * x
    }

    fn least_squares(&self, a: &Matrix, b: &Vector) -> Result<Vector> {
        if a.nrows() != b.len() {
            return Err(TripoliError::DimensionMismatch {
                context: "least-squares right-hand side",
                expected: a.nrows(),
                actual: b.len(),
            });
        }
        if a.nrows() < a.ncols() {
            return Err(TripoliError::NumericalInitialization(format!(
                "least-squares system has {} rows for {} unknowns",
                a.nrows(),
                a.ncols()
            )));
        }

        let svd = a.clone().svd(true, true);
        let largest = svd.singular_values.max();
        let cutoff = largest * RANK_TOLERANCE * a.nrows().max(a.ncols()) as f64;
        let rank = svd.rank(cutoff);
        if largest <= 0.0 || rank < a.ncols() {
            return Err(TripoliError::NumericalInitialization(format!(
                "rank-deficient least-squares matrix (rank {rank} of {})",
                a.ncols()
            )));
        }
        svd.solve(b, cutoff)
            .map_err(|msg| TripoliError::NumericalInitialization(msg.to_string()))
    }

    fn cholesky_lower(&self, a: &Matrix) -> Option<Matrix> {
        if !a.iter().all(|v| v.is_finite()) {
            return None;
        }
        nalgebra::Cholesky::new(a.clone()).map(|c| c.l())
    }

    fn sample_covariance(&self, samples: &[Vector]) -> (Vector, Matrix) {
        let Some(first) = samples.first() else {
            return (Vector::zeros(0), Matrix::zeros(0, 0));
        };
        let dim = first.len();
        let n = samples.len() as f64;

        let mut mean = Vector::zeros(dim);
        for x in samples {
            mean += x;
        }
        mean /= n;

        let mut cov = Matrix::zeros(dim, dim);
        if samples.len() < 2 {
            return (mean, cov);
        }
        for x in samples {
            let d = x - &mean;
            cov.ger(1.0, &d, &d, 1.0);
        }
        cov /= n - 1.0;
        (mean, cov)
    }

    fn log_determinant(&self, a: &Matrix) -> Option<f64> {
        let l = self.cholesky_lower(a)?;
        Some(2.0 * l.diagonal().iter().map(|d| d.ln()).sum::<f64>())
    }
}
