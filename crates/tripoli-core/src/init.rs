//! Starting model for a block.
//!
//! The initializer derives every parameter directly from the data:
//!
//! 1. Faraday index map from the sorted baseline detector ordinals.
//! 2. Baseline mean and sample standard deviation per Faraday detector.
//! 3. Gain from separate least-squares fits of the knots to the reference
//!    isotope's Faraday rows (baseline subtracted) and photomultiplier rows.
//! 4. Knot intensities from a least-squares fit to all reference rows,
//!    Faraday rows converted to photomultiplier units.
//! 5. Log ratios from the mean of `reading / I(t)` per minor isotope.
//! 6. Noise sigmas: baseline std per Faraday detector, zero for the
//!    photomultiplier, `1 / report_interval` per isotope.
//!
//! Prior bounds, proposal steps and the initial joint covariance follow.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::analysis::ForwardModel;
use crate::constants::{LOG_RATIO_LIMIT, OPTIMAL_SCALING, REPORT_INTERVAL};
use crate::data::BlockDataSet;
use crate::error::{Result, TripoliError};
use crate::linalg::LinearAlgebra;
use crate::model::{BlockModel, NoiseLayout, ParameterLayout, PriorBounds, ProposalScales};
use crate::statistics::{curvature_variances, initial_covariance, CurvatureConfig, OnlineStats};
use crate::types::{Matrix, RowKind, Vector};

/// Initializer settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitConfig {
    /// Integration time of one reading, seconds.
    pub report_interval: f64,
    /// Grids for the curvature scans.
    pub curvature: CurvatureConfig,
    /// Multiplier of the curvature variances in `C0`.
    /// `None` means `2.38² / P`.
    pub curvature_scale: Option<f64>,
    /// Scan the misfit for `C0`. When false `C0` is the diagonal of the
    /// squared single-parameter steps.
    pub estimate_curvature: bool,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            report_interval: REPORT_INTERVAL,
            curvature: CurvatureConfig::default(),
            curvature_scale: None,
            estimate_curvature: true,
        }
    }
}

impl InitConfig {
    /// Set the report interval.
    pub fn report_interval(mut self, seconds: f64) -> Self {
        assert!(
            seconds > 0.0 && seconds.is_finite(),
            "report_interval must be > 0"
        );
        self.report_interval = seconds;
        self
    }

    /// Set the `C0` multiplier.
    pub fn curvature_scale(mut self, scale: f64) -> Self {
        assert!(scale > 0.0 && scale.is_finite(), "curvature_scale must be > 0");
        self.curvature_scale = Some(scale);
        self
    }

    /// Enable or disable the curvature scans.
    pub fn estimate_curvature(mut self, enabled: bool) -> Self {
        self.estimate_curvature = enabled;
        self
    }

    /// Override the curvature grids.
    pub fn curvature(mut self, curvature: CurvatureConfig) -> Self {
        assert!(curvature.max_rounds > 0, "max_rounds must be > 0");
        self.curvature = curvature;
        self
    }
}

/// Everything a chain needs to start.
#[derive(Debug, Clone)]
pub struct InitialModel {
    pub model: BlockModel,
    pub priors: PriorBounds,
    pub scales: ProposalScales,
    /// Initial joint-proposal covariance `C0`.
    pub initial_covariance: Matrix,
}

impl InitialModel {
    /// Free-parameter layout of the starting model.
    pub fn layout(&self) -> ParameterLayout {
        ParameterLayout::for_model(&self.model)
    }
}

/// Least-squares fit of the knots to `(time_index, value)` pairs.
fn fit_knots<L>(dataset: &BlockDataSet, points: &[(usize, f64)], linalg: &L) -> Result<Vector>
where
    L: LinearAlgebra + ?Sized,
{
    let interp = dataset.interpolation();
    let knots = interp.ncols();
    let a = Matrix::from_fn(points.len(), knots, |r, c| interp[(points[r].0, c)]);
    let b = Vector::from_iterator(points.len(), points.iter().map(|p| p.1));
    linalg.least_squares(&a, &b)
}

/// Reading converted to photomultiplier units.
fn to_photomultiplier_units(
    kind: RowKind,
    value: f64,
    baseline: f64,
    gain: f64,
) -> Option<f64> {
    match kind {
        RowKind::Baseline => None,
        RowKind::Faraday => Some((value - baseline) * gain),
        RowKind::Photomultiplier => Some(value),
    }
}

/// Build the starting model, priors, steps and `C0` for `dataset`.
///
/// # Errors
///
/// [`TripoliError::NumericalInitialization`] when a least-squares fit is
/// rank deficient, a Faraday detector's baseline has no spread, a minor
/// isotope has no on-peak readings, or `C0` is not positive definite.
pub fn initialize_model<L>(
    dataset: &BlockDataSet,
    config: &InitConfig,
    linalg: &L,
) -> Result<InitialModel>
where
    L: LinearAlgebra + ?Sized,
{
    let block = dataset.block_number();
    let faraday_map: BTreeMap<usize, usize> = dataset
        .faraday_ordinals()
        .iter()
        .enumerate()
        .map(|(index, &detector)| (detector, index))
        .collect();
    let faraday_count = faraday_map.len();

    // Baselines
    let mut baseline_stats = vec![OnlineStats::new(); faraday_count];
    let baseline = dataset.baseline();
    for (detector, &value) in baseline.detector_ordinals.iter().zip(&baseline.intensities) {
        baseline_stats[faraday_map[detector]].update(value);
    }
    let baseline_means: Vec<f64> = baseline_stats.iter().map(|s| s.mean()).collect();
    let baseline_std_devs: Vec<f64> = baseline_stats
        .iter()
        .map(|s| s.finalize().std_dev())
        .collect();
    if let Some(d) = baseline_std_devs.iter().position(|s| s.is_nan() || *s <= 0.0) {
        return Err(TripoliError::NumericalInitialization(format!(
            "block {block}: baseline of Faraday detector {} has zero spread",
            dataset.faraday_ordinals()[d]
        )));
    }

    let reference = dataset.reference_isotope();
    let kinds = dataset.row_kinds();
    let isotopes = dataset.isotope_ordinals();
    let times = dataset.time_indices();
    let values = dataset.intensities();
    let detectors = dataset.detector_ordinals();
    let baseline_of = |row: usize| baseline_means[faraday_map[&detectors[row]]];

    // Gain
    let mut faraday_points = Vec::new();
    let mut pm_points = Vec::new();
    for row in 0..dataset.len() {
        if isotopes[row] != reference {
            continue;
        }
        match kinds[row] {
            RowKind::Faraday => faraday_points.push((times[row], values[row] - baseline_of(row))),
            RowKind::Photomultiplier => pm_points.push((times[row], values[row])),
            RowKind::Baseline => {}
        }
    }
    let gain = if faraday_points.is_empty() || pm_points.is_empty() {
        warn!(block, "reference isotope not seen on both detector types, gain starts at 1");
        1.0
    } else {
        let far = fit_knots(dataset, &faraday_points, linalg)?;
        let pm = fit_knots(dataset, &pm_points, linalg)?;
        let k = far.len();
        let interior = if k > 2 { 1..k - 1 } else { 0..k };
        let mut stats = OnlineStats::new();
        for i in interior {
            let r = pm[i] / far[i];
            if r.is_finite() {
                stats.update(r);
            }
        }
        if stats.count() == 0 || stats.mean().is_nan() || stats.mean() <= 0.0 {
            return Err(TripoliError::NumericalInitialization(format!(
                "block {block}: gain estimate is not positive"
            )));
        }
        stats.mean()
    };

    // Knots
    let reference_points: Vec<(usize, f64)> = (0..dataset.len())
        .filter(|&row| isotopes[row] == reference)
        .filter_map(|row| {
            let b = match kinds[row] {
                RowKind::Faraday => baseline_of(row),
                _ => 0.0,
            };
            to_photomultiplier_units(kinds[row], values[row], b, gain).map(|v| (times[row], v))
        })
        .collect();
    let knots = fit_knots(dataset, &reference_points, linalg)?;
    let intensity = linalg.mat_vec(dataset.interpolation(), &knots);

    // Log ratios
    let mut ratio_stats = vec![OnlineStats::new(); dataset.isotope_count() - 1];
    for row in 0..dataset.len() {
        let iso = isotopes[row];
        if iso == reference {
            continue;
        }
        let b = match kinds[row] {
            RowKind::Faraday => baseline_of(row),
            _ => 0.0,
        };
        if let Some(v) = to_photomultiplier_units(kinds[row], values[row], b, gain) {
            let r = v / intensity[times[row]];
            if r.is_finite() {
                ratio_stats[iso].update(r);
            }
        }
    }
    let mut log_ratios = Vec::with_capacity(ratio_stats.len());
    for (iso, stats) in ratio_stats.iter().enumerate() {
        if stats.count() == 0 {
            return Err(TripoliError::NumericalInitialization(format!(
                "block {block}: isotope {iso} has no usable on-peak readings"
            )));
        }
        log_ratios.push(stats.mean().max((-LOG_RATIO_LIMIT).exp()).ln());
    }

    // Noise
    let noise = NoiseLayout::new(faraday_count, dataset.isotope_count());
    let mut noise_sigma = baseline_std_devs.clone();
    noise_sigma.push(0.0);
    let signal_count = noise.len() - noise.detector_count();
    noise_sigma.extend(std::iter::repeat(1.0 / config.report_interval).take(signal_count));

    let max_intensity = intensity.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let priors = PriorBounds::from_data(max_intensity, config.report_interval);
    let max_std = baseline_std_devs.iter().copied().fold(0.0, f64::max);
    let scales = ProposalScales::from_data(max_std, knots.as_slice());

    let mut model = BlockModel {
        log_ratios,
        knot_intensities: knots.iter().copied().collect(),
        baseline_means,
        baseline_std_devs,
        gain,
        noise_sigma,
        faraday_map,
    };
    let layout = ParameterLayout::for_model(&model);
    for i in 0..layout.len() {
        let bound = priors.for_kind(layout.kind(i));
        let v = layout.get(&model, i);
        layout.set(&mut model, i, bound.clamp(v));
    }
    for i in 0..noise.len() {
        model.noise_sigma[i] = priors.for_noise(&noise, i).clamp(model.noise_sigma[i]);
    }

    let p = layout.len();
    let variances: Vec<f64> = if config.estimate_curvature {
        let forward = ForwardModel::new(dataset, &model.faraday_map)?;
        curvature_variances(&forward, &model, &layout, &config.curvature, linalg)
    } else {
        layout
            .kinds()
            .iter()
            .map(|&kind| scales.for_kind(kind).powi(2))
            .collect()
    };
    let scale = config
        .curvature_scale
        .unwrap_or(OPTIMAL_SCALING * OPTIMAL_SCALING / p as f64);
    let c0 = initial_covariance(&variances, scale);
    if linalg.cholesky_lower(&c0).is_none() {
        return Err(TripoliError::NumericalInitialization(format!(
            "block {block}: initial covariance is not positive definite"
        )));
    }

    debug!(
        block,
        gain = model.gain,
        log_ratios = ?model.log_ratios,
        parameters = p,
        "initialized block model"
    );

    Ok(InitialModel {
        model,
        priors,
        scales,
        initial_covariance: c0,
    })
}
