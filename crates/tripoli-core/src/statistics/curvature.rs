//! Curvature-based initial proposal covariance.
//!
//! For each free parameter the normalized misfit `Σ r²/Dsig` is scanned on a
//! symmetric grid of offsets around the current value (other parameters
//! and `Dsig` held fixed). The offsets are weighted by
//! `p ∝ exp(−(E − E_min)/2)` and their second moment is taken as that
//! parameter's variance. The grid half-width adapts between rounds: it
//! grows while the edge points still carry weight and shrinks while the
//! centre point carries almost all of it. The result is floored at
//! `(spacing/2)²` of the final grid. Off-diagonal terms are zero.

use tracing::debug;

use crate::analysis::{evaluate_misfit, ForwardModel};
use crate::linalg::LinearAlgebra;
use crate::model::{BlockModel, ParameterLayout};
use crate::types::{Matrix, ParameterKind, Vector};

/// Grid settings for the curvature scans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvatureConfig {
    /// Initial half-width of the log-ratio grid.
    pub ratio_half_width: f64,
    pub ratio_points: usize,
    /// Knot grids start at ± the mean baseline std.
    pub intensity_points: usize,
    /// Initial half-width of the gain grid.
    pub gain_half_width: f64,
    pub gain_points: usize,
    /// Baseline grids start at ± that detector's baseline std.
    pub baseline_points: usize,
    /// Maximum number of scans per parameter.
    pub max_rounds: usize,
}

impl Default for CurvatureConfig {
    fn default() -> Self {
        Self {
            ratio_half_width: 0.5,
            ratio_points: 1001,
            intensity_points: 101,
            gain_half_width: 0.1,
            gain_points: 1001,
            baseline_points: 1001,
            max_rounds: 8,
        }
    }
}

/// Weight the edge points may carry before the grid is widened.
const EDGE_MASS: f64 = 1e-3;

/// Weight on the single heaviest point above which the grid is narrowed.
const PEAK_MASS: f64 = 0.5;

struct Scan {
    variance: f64,
    spacing: f64,
    edge_mass: f64,
    peak_mass: f64,
}

fn scan<F>(half_width: f64, points: usize, mut misfit_at: F) -> Scan
where
    F: FnMut(f64) -> f64,
{
    let points = points.max(3);
    let spacing = 2.0 * half_width / (points - 1) as f64;
    let offsets: Vec<f64> = (0..points)
        .map(|k| -half_width + spacing * k as f64)
        .collect();
    let misfits: Vec<f64> = offsets.iter().map(|&o| misfit_at(o)).collect();
    let min = misfits
        .iter()
        .copied()
        .filter(|e| e.is_finite())
        .fold(f64::INFINITY, f64::min);

    let weights: Vec<f64> = misfits
        .iter()
        .map(|&e| {
            if e.is_finite() && min.is_finite() {
                (-(e - min) / 2.0).exp()
            } else {
                0.0
            }
        })
        .collect();
    let total: f64 = weights.iter().sum();
    if total.is_nan() || total <= 0.0 {
        return Scan {
            variance: 0.0,
            spacing,
            edge_mass: 0.0,
            peak_mass: 1.0,
        };
    }

    let variance = weights
        .iter()
        .zip(&offsets)
        .map(|(w, o)| w * o * o)
        .sum::<f64>()
        / total;
    let edge_mass = (weights[0] + weights[points - 1]) / total;
    let peak_mass = weights.iter().copied().fold(0.0, f64::max) / total;
    Scan {
        variance,
        spacing,
        edge_mass,
        peak_mass,
    }
}

/// Curvature variance of every free parameter of `model`.
pub fn curvature_variances<L>(
    forward: &ForwardModel<'_>,
    model: &BlockModel,
    layout: &ParameterLayout,
    config: &CurvatureConfig,
    linalg: &L,
) -> Vec<f64>
where
    L: LinearAlgebra + ?Sized,
{
    let data = forward.dataset();
    let prediction = forward.evaluate(model, linalg);
    let variance = forward.data_variance(model, &prediction);
    let mean_baseline_std = model.baseline_std_devs.iter().sum::<f64>()
        / model.baseline_std_devs.len().max(1) as f64;

    let mut result = Vec::with_capacity(layout.len());
    for i in 0..layout.len() {
        let kind = layout.kind(i);
        let offset = i - layout.range(kind).start;
        let (mut half_width, points) = match kind {
            ParameterKind::LogRatio => (config.ratio_half_width, config.ratio_points),
            ParameterKind::Intensity => (mean_baseline_std, config.intensity_points),
            ParameterKind::Gain => (config.gain_half_width, config.gain_points),
            ParameterKind::Baseline => (model.baseline_std_devs[offset], config.baseline_points),
        };
        if !half_width.is_finite() || half_width <= 0.0 {
            half_width = layout.get(model, i).abs().max(1.0) * 1e-3;
        }

        let center = layout.get(model, i);
        let mut shifted = model.clone();
        let mut misfit_at = |o: f64| {
            layout.set(&mut shifted, i, center + o);
            let p = forward.evaluate(&shifted, linalg);
            evaluate_misfit(data.intensities(), &p.predicted, &variance, data.row_kinds(), 1.0)
                .normalized
        };

        let mut s = scan(half_width, points, &mut misfit_at);
        for _ in 1..config.max_rounds {
            if s.edge_mass > EDGE_MASS {
                half_width *= 10.0;
            } else if s.peak_mass > PEAK_MASS {
                half_width /= 10.0;
            } else {
                break;
            }
            s = scan(half_width, points, &mut misfit_at);
        }

        let floor = (s.spacing / 2.0).powi(2);
        debug!(
            parameter = i,
            ?kind,
            variance = s.variance,
            half_width,
            "curvature scan"
        );
        result.push(s.variance.max(floor));
    }
    result
}

/// `scale · diag(variances)`.
pub fn initial_covariance(variances: &[f64], scale: f64) -> Matrix {
    Matrix::from_diagonal(&Vector::from_iterator(
        variances.len(),
        variances.iter().map(|v| v * scale),
    ))
}
