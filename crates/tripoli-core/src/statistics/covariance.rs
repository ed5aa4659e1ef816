//! Adaptive covariance of the free parameters.
//!
//! Two interchangeable ways of keeping the running estimate:
//!
//! - **Incremental**: every iteration folds the current state in with
//!   ```text
//!   μ' = μ + (x − μ)/m
//!   C' = C·(m−1)/m + (x − μ)(x − μ')ᵀ·(m−1)/m²
//!   ```
//! - **Windowed**: on every save the estimate is recomputed from scratch
//!   over the saved ensemble from a fixed start index onward.
//!
//! Both are symmetrized after every update. The joint proposal draws from
//!
//! ```text
//! C = C0                                   while m ≤ 2P
//! C = β·C0 + (1−β)·s²/P·C_running          afterwards (s = 2.38)
//! ```
//!
//! via its Cholesky factor. A refresh whose blended matrix is not positive
//! definite is skipped and the previous factor kept.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TripoliError};
use crate::linalg::LinearAlgebra;
use crate::types::{Matrix, Vector};

/// Replace `m` by `(m + mᵀ)/2`.
pub fn symmetrize(m: &mut Matrix) {
    let t = m.transpose();
    *m += t;
    *m *= 0.5;
}

/// How the running covariance is maintained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CovarianceStrategy {
    /// Streaming update on every iteration.
    Incremental,
    /// Recompute from saved states `start..` on every save, once there are
    /// more than `start` of them.
    Windowed { start: usize },
}

impl Default for CovarianceStrategy {
    fn default() -> Self {
        CovarianceStrategy::Incremental
    }
}

/// Running mean and covariance of the flat parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningCovariance {
    count: usize,
    mean: Vector,
    cov: Matrix,
}

impl RunningCovariance {
    /// Empty estimate in `dim` dimensions.
    pub fn new(dim: usize) -> Self {
        Self {
            count: 0,
            mean: Vector::zeros(dim),
            cov: Matrix::zeros(dim, dim),
        }
    }

    /// Estimate recomputed from a window of samples.
    pub fn from_samples<L>(samples: &[Vector], linalg: &L) -> Self
    where
        L: LinearAlgebra + ?Sized,
    {
        let (mean, mut cov) = linalg.sample_covariance(samples);
        symmetrize(&mut cov);
        Self {
            count: samples.len(),
            mean,
            cov,
        }
    }

    /// Fold one state into the estimate.
    pub fn update(&mut self, x: &Vector) {
        self.count += 1;
        let m = self.count as f64;

        let delta_old = x - &self.mean;
        self.mean += &delta_old / m;
        let delta_new = x - &self.mean;

        // C' = C·(m−1)/m + (m−1)/m²·(x − μ)(x − μ')ᵀ
        self.cov *= (m - 1.0) / m;
        self.cov.ger((m - 1.0) / (m * m), &delta_old, &delta_new, 1.0);
        symmetrize(&mut self.cov);
    }

    /// Number of states folded in.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> &Vector {
        &self.mean
    }

    pub fn covariance(&self) -> &Matrix {
        &self.cov
    }

    /// Symmetric within `tol` and no negative diagonal entry.
    pub fn is_valid(&self, tol: f64) -> bool {
        is_valid_covariance(&self.cov, tol)
    }
}

fn is_valid_covariance(m: &Matrix, tol: f64) -> bool {
    let n = m.nrows();
    if m.ncols() != n {
        return false;
    }
    for i in 0..n {
        if m[(i, i)].is_nan() || m[(i, i)] < 0.0 {
            return false;
        }
        for j in (i + 1)..n {
            let scale = m[(i, j)].abs().max(m[(j, i)].abs()).max(1.0);
            if (m[(i, j)] - m[(j, i)]).abs() > tol * scale {
                return false;
            }
        }
    }
    true
}

/// Joint-proposal covariance and its cached Cholesky factor.
#[derive(Debug, Clone)]
pub struct ProposalCovariance {
    initial: Matrix,
    blend_weight: f64,
    scaling: f64,
    covariance: Matrix,
    factor: Matrix,
    skipped_refreshes: usize,
}

impl ProposalCovariance {
    /// Start from the initial covariance `C0`.
    ///
    /// # Errors
    ///
    /// [`TripoliError::NumericalInitialization`] if `C0` is not positive
    /// definite.
    pub fn new<L>(initial: Matrix, blend_weight: f64, scaling: f64, linalg: &L) -> Result<Self>
    where
        L: LinearAlgebra + ?Sized,
    {
        let mut covariance = initial.clone();
        symmetrize(&mut covariance);
        let factor = linalg.cholesky_lower(&covariance).ok_or_else(|| {
            TripoliError::NumericalInitialization(
                "initial proposal covariance is not positive definite".to_string(),
            )
        })?;
        Ok(Self {
            initial: covariance.clone(),
            blend_weight,
            scaling,
            covariance,
            factor,
            skipped_refreshes: 0,
        })
    }

    /// Matrix the next refresh will try to factor.
    ///
    /// `C0` is returned while `running` holds at most `2P` states. For a
    /// windowed estimate that count is the window's, so the proposal stays
    /// on `C0` until more than `2P` saves lie past the window start.
    pub fn target(&self, running: &RunningCovariance) -> Matrix {
        let p = self.initial.nrows();
        // Window length, not chain length, in windowed mode.
        if running.count() <= 2 * p {
            return self.initial.clone();
        }
        let adapted = running.covariance() * (self.scaling * self.scaling / p as f64);
        let mut c = if self.blend_weight > 0.0 {
            &self.initial * self.blend_weight + adapted * (1.0 - self.blend_weight)
        } else {
            adapted
        };
        symmetrize(&mut c);
        c
    }

    /// Rebuild the proposal from `running`.
    ///
    /// Returns `false`, leaving the previous proposal in place, if the new
    /// matrix cannot be factored.
    pub fn refresh<L>(&mut self, running: &RunningCovariance, linalg: &L) -> bool
    where
        L: LinearAlgebra + ?Sized,
    {
        let target = self.target(running);
        match linalg.cholesky_lower(&target) {
            Some(factor) => {
                self.covariance = target;
                self.factor = factor;
                true
            }
            None => {
                self.skipped_refreshes += 1;
                false
            }
        }
    }

    /// Draw one perturbation `L·z`, `z ~ N(0, I)`.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Vector {
        let z = Vector::from_fn(self.factor.nrows(), |_, _| rng.sample(StandardNormal));
        &self.factor * z
    }

    /// Current proposal covariance.
    pub fn covariance(&self) -> &Matrix {
        &self.covariance
    }

    /// The initial covariance `C0`.
    pub fn initial(&self) -> &Matrix {
        &self.initial
    }

    /// Refreshes skipped because the matrix was not positive definite.
    pub fn skipped_refreshes(&self) -> usize {
        self.skipped_refreshes
    }

    /// Symmetric within `tol` and no negative diagonal entry.
    pub fn is_valid(&self, tol: f64) -> bool {
        is_valid_covariance(&self.covariance, tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::NalgebraBackend;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn correlated_samples(n: usize, seed: u64) -> Vec<Vector> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let a: f64 = rng.sample(StandardNormal);
                let b: f64 = rng.sample(StandardNormal);
                Vector::from_vec(vec![a, 0.5 * a + b, 3.0 - a])
            })
            .collect()
    }

    #[test]
    fn test_incremental_tracks_sample_covariance() {
        let samples = correlated_samples(20_000, 1);
        let mut running = RunningCovariance::new(3);
        for x in &samples {
            running.update(x);
        }
        let (mean, cov) = NalgebraBackend.sample_covariance(&samples);
        assert!((running.mean() - mean).norm() < 1e-9);
        // The streaming form shrinks early contributions slightly.
        let rel = (running.covariance() - &cov).norm() / cov.norm();
        assert!(rel < 5e-3, "relative error {rel}");
    }

    #[test]
    fn test_updates_stay_symmetric_with_nonnegative_diagonal() {
        let mut running = RunningCovariance::new(3);
        for x in correlated_samples(500, 2) {
            running.update(&x);
            assert!(running.is_valid(1e-12));
        }
    }

    #[test]
    fn test_windowed_matches_backend() {
        let samples = correlated_samples(300, 3);
        let windowed = RunningCovariance::from_samples(&samples[100..], &NalgebraBackend);
        assert_eq!(windowed.count(), 200);
        assert!(windowed.is_valid(1e-12));
    }

    #[test]
    fn test_initial_covariance_used_until_enough_states() {
        let c0 = Matrix::from_diagonal(&Vector::from_vec(vec![1.0, 2.0, 3.0]));
        let mut proposal = ProposalCovariance::new(c0.clone(), 0.05, 2.38, &NalgebraBackend).unwrap();
        let mut running = RunningCovariance::new(3);
        for x in correlated_samples(6, 4) {
            running.update(&x);
        }
        assert!(proposal.refresh(&running, &NalgebraBackend));
        assert_eq!(proposal.covariance(), &c0);

        running.update(&Vector::from_vec(vec![0.1, 0.2, 0.3]));
        assert!(proposal.refresh(&running, &NalgebraBackend));
        let expected = &c0 * 0.05 + running.covariance() * (0.95 * 2.38 * 2.38 / 3.0);
        assert!((proposal.covariance() - expected).norm() < 1e-12);
        assert!(proposal.is_valid(1e-12));
    }

    #[test]
    fn test_short_window_falls_back_to_initial() {
        let c0 = Matrix::from_diagonal(&Vector::from_vec(vec![1.0, 2.0, 3.0]));
        let proposal = ProposalCovariance::new(c0.clone(), 0.05, 2.38, &NalgebraBackend).unwrap();
        let samples = correlated_samples(400, 5);

        // Plenty of saves overall, but only six inside the window.
        let window = RunningCovariance::from_samples(&samples[394..], &NalgebraBackend);
        assert_eq!(window.count(), 6);
        assert_eq!(proposal.target(&window), c0);

        let window = RunningCovariance::from_samples(&samples[393..], &NalgebraBackend);
        assert_eq!(window.count(), 7);
        assert_ne!(proposal.target(&window), c0);
    }

    #[test]
    fn test_singular_refresh_is_skipped() {
        let c0 = Matrix::identity(2, 2);
        let mut proposal = ProposalCovariance::new(c0.clone(), 0.0, 2.38, &NalgebraBackend).unwrap();
        let mut running = RunningCovariance::new(2);
        // Second coordinate never moves: singular running covariance.
        for i in 0..10 {
            running.update(&Vector::from_vec(vec![i as f64, 5.0]));
        }
        assert!(!proposal.refresh(&running, &NalgebraBackend));
        assert_eq!(proposal.skipped_refreshes(), 1);
        assert_eq!(proposal.covariance(), &c0);
    }

    #[test]
    fn test_non_positive_initial_rejected() {
        let c0 = Matrix::zeros(2, 2);
        let err = ProposalCovariance::new(c0, 0.05, 2.38, &NalgebraBackend).unwrap_err();
        assert!(matches!(err, TripoliError::NumericalInitialization(_)));
    }

    #[test]
    fn test_draws_follow_proposal_covariance() {
        let c0 = Matrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 2.0]);
        let proposal = ProposalCovariance::new(c0.clone(), 0.05, 2.38, &NalgebraBackend).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(8);
        let draws: Vec<Vector> = (0..40_000).map(|_| proposal.draw(&mut rng)).collect();
        let (_, cov) = NalgebraBackend.sample_covariance(&draws);
        assert!((cov - c0).norm() < 0.15);
    }
}
