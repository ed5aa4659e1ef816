//! Early-exit convergence diagnostic.
//!
//! The target effective sample size for `P` free parameters follows the
//! multivariate ESS bound of Vats, Flegal & Jones (2019):
//!
//! ```text
//! ESS = 2^(2/P)·π / (P·Γ(P/2))^(2/P) · χ²_{P,1−α} / ε²
//! ```
//!
//! The chain may stop once a batch-means potential scale reduction factor
//! computed from the saved ensemble falls to `sqrt(1 + chains/ESS)`.
//! Checks happen only when the saved count is a perfect square `g²`, so
//! the ensemble splits into `g` consecutive groups of `g` states.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use statrs::function::gamma::gamma;

use crate::linalg::LinearAlgebra;
use crate::types::{Matrix, Vector};

/// Target effective sample size for `parameter_count` parameters.
pub fn target_effective_sample_size(parameter_count: usize, alpha: f64, epsilon: f64) -> f64 {
    let p = parameter_count.max(1) as f64;
    let quantile = match ChiSquared::new(p) {
        Ok(chi2) => chi2.inverse_cdf(1.0 - alpha),
        Err(_) => return f64::INFINITY,
    };
    let numerator = 2f64.powf(2.0 / p) * std::f64::consts::PI;
    let denominator = (p * gamma(p / 2.0)).powf(2.0 / p);
    numerator / denominator * quantile / (epsilon * epsilon)
}

/// Whether `n` is a perfect square.
pub fn is_perfect_square(n: usize) -> bool {
    let root = (n as f64).sqrt().round() as usize;
    root * root == n
}

/// Batch-means potential scale reduction of a single chain's saved states.
///
/// With `g = round(sqrt(n))` groups of `n / g` consecutive states:
///
/// ```text
/// W = mean of the per-group covariances
/// B = diag(variance of each coordinate's group means)
/// R = sqrt((g − 1)/g + (det B / det W)^(1/P) / g)
/// ```
///
/// `B` is diagonal so it stays full rank when there are no more groups
/// than parameters. Returns `None` when there are fewer than two groups of
/// two states or either matrix is not positive definite.
pub fn gelman_rubin_statistic<L>(samples: &[Vector], linalg: &L) -> Option<f64>
where
    L: LinearAlgebra + ?Sized,
{
    let n = samples.len();
    let groups = (n as f64).sqrt().round() as usize;
    if groups < 2 {
        return None;
    }
    let size = n / groups;
    if size < 2 {
        return None;
    }
    let dim = samples[0].len();

    let mut mean_of_cov = Matrix::zeros(dim, dim);
    let mut means = Vec::with_capacity(groups);
    for chunk in samples.chunks_exact(size).take(groups) {
        let (mean, cov) = linalg.sample_covariance(chunk);
        mean_of_cov += cov;
        means.push(mean);
    }
    mean_of_cov /= groups as f64;
    let (_, cov_of_means) = linalg.sample_covariance(&means);
    let var_of_means = Matrix::from_diagonal(&cov_of_means.diagonal());

    let log_det_b = linalg.log_determinant(&var_of_means)?;
    let log_det_w = linalg.log_determinant(&mean_of_cov)?;
    let g = groups as f64;
    let ratio = ((log_det_b - log_det_w) / dim as f64).exp();
    let r2 = (g - 1.0) / g + ratio / g;
    r2.is_finite().then(|| r2.sqrt())
}

/// Result of one convergence check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConvergenceCheck {
    /// The saved count is not a check point.
    NotDue,
    /// Checked, statistic above threshold (or not computable).
    Continue { statistic: Option<f64> },
    /// Checked, statistic at or below threshold.
    Converged { statistic: f64 },
}

/// Thresholds derived once per chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceCriterion {
    pub parameter_count: usize,
    pub target_ess: f64,
    pub exit_threshold: f64,
    /// Smallest saved count at which a check may happen.
    pub min_saved: usize,
}

impl ConvergenceCriterion {
    /// Criterion for one chain saving every `save_interval` iterations.
    pub fn new(parameter_count: usize, alpha: f64, epsilon: f64, save_interval: usize) -> Self {
        let target_ess = target_effective_sample_size(parameter_count, alpha, epsilon);
        let chains = 1.0;
        let min_saved = (target_ess / save_interval.max(1) as f64).ceil();
        Self {
            parameter_count,
            target_ess,
            exit_threshold: (1.0 + chains / target_ess).sqrt(),
            min_saved: if min_saved.is_finite() {
                min_saved as usize
            } else {
                usize::MAX
            },
        }
    }

    /// Whether a check is due at `saved` ensemble entries.
    pub fn is_due(&self, saved: usize) -> bool {
        saved >= self.min_saved.max(4) && is_perfect_square(saved)
    }

    /// Check the flattened saved states.
    pub fn check<L>(&self, samples: &[Vector], linalg: &L) -> ConvergenceCheck
    where
        L: LinearAlgebra + ?Sized,
    {
        if !self.is_due(samples.len()) {
            return ConvergenceCheck::NotDue;
        }
        match gelman_rubin_statistic(samples, linalg) {
            Some(r) if r <= self.exit_threshold => ConvergenceCheck::Converged { statistic: r },
            statistic => ConvergenceCheck::Continue { statistic },
        }
    }
}
