//! Prior bounds and Gaussian proposal steps per parameter kind.

use serde::{Deserialize, Serialize};

use super::{NoiseEntry, NoiseLayout};
use crate::constants::{
    DETECTOR_NOISE_LIMIT, GAIN_STEP, LOG_RATIO_LIMIT, LOG_RATIO_STEP, SIGNAL_NOISE_STEP,
};
use crate::types::ParameterKind;

/// Closed interval `[min, max]`; either end may be infinite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    /// Lower end.
    pub min: f64,
    /// Upper end.
    pub max: f64,
}

impl Bound {
    /// Create a bound. Panics if `min > max` or either end is NaN.
    pub fn new(min: f64, max: f64) -> Self {
        assert!(min <= max, "bound requires min <= max, got [{min}, {max}]");
        Self { min, max }
    }

    /// The whole real line.
    pub fn unbounded() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    /// `[0, max]`.
    pub fn non_negative(max: f64) -> Self {
        Self::new(0.0, max)
    }

    /// Whether `value` lies inside the bound. NaN never does.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Nearest point of the bound.
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Prior support of every parameter kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorBounds {
    pub log_ratio: Bound,
    pub intensity: Bound,
    pub baseline: Bound,
    pub gain: Bound,
    pub detector_noise: Bound,
    pub signal_noise: Bound,
}

impl PriorBounds {
    /// Bounds derived from the initial intensity function and report interval.
    ///
    /// Knot intensities are capped at 1.5 times the largest initial
    /// intensity-function value.
    pub fn from_data(max_intensity: f64, report_interval: f64) -> Self {
        let intensity_max = if max_intensity.is_finite() && max_intensity > 0.0 {
            1.5 * max_intensity
        } else {
            f64::INFINITY
        };
        Self {
            log_ratio: Bound::new(-LOG_RATIO_LIMIT, LOG_RATIO_LIMIT),
            intensity: Bound::non_negative(intensity_max),
            baseline: Bound::unbounded(),
            gain: Bound::non_negative(f64::INFINITY),
            detector_noise: Bound::non_negative(DETECTOR_NOISE_LIMIT),
            signal_noise: Bound::non_negative(10.0 / report_interval),
        }
    }

    /// Bound of a free parameter.
    pub fn for_kind(&self, kind: ParameterKind) -> Bound {
        match kind {
            ParameterKind::LogRatio => self.log_ratio,
            ParameterKind::Intensity => self.intensity,
            ParameterKind::Baseline => self.baseline,
            ParameterKind::Gain => self.gain,
        }
    }

    /// Bound of noise entry `index`.
    pub fn for_noise(&self, layout: &NoiseLayout, index: usize) -> Bound {
        match layout.entry(index) {
            NoiseEntry::Detector(_) => self.detector_noise,
            NoiseEntry::Signal(_) => self.signal_noise,
        }
    }
}

/// Standard deviation of the single-parameter Gaussian step per kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProposalScales {
    pub log_ratio: f64,
    pub intensity: f64,
    pub baseline: f64,
    pub gain: f64,
    pub detector_noise: f64,
    pub signal_noise: f64,
}

impl ProposalScales {
    /// Steps derived from the baseline spread and the initial knots.
    pub fn from_data(max_baseline_std: f64, knots: &[f64]) -> Self {
        let min = knots.iter().copied().fold(f64::INFINITY, f64::min);
        let max = knots.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut intensity = (max - min) / 100.0;
        if intensity.is_nan() || intensity <= 0.0 {
            let mean = knots.iter().sum::<f64>() / knots.len().max(1) as f64;
            intensity = (mean.abs() / 100.0).max(f64::MIN_POSITIVE);
        }
        let baseline_std = if max_baseline_std > 0.0 {
            max_baseline_std
        } else {
            1.0
        };
        Self {
            log_ratio: LOG_RATIO_STEP,
            intensity,
            baseline: baseline_std / 10.0,
            gain: GAIN_STEP,
            detector_noise: baseline_std,
            signal_noise: SIGNAL_NOISE_STEP,
        }
    }

    /// Step of a free parameter.
    pub fn for_kind(&self, kind: ParameterKind) -> f64 {
        match kind {
            ParameterKind::LogRatio => self.log_ratio,
            ParameterKind::Intensity => self.intensity,
            ParameterKind::Baseline => self.baseline,
            ParameterKind::Gain => self.gain,
        }
    }

    /// Step of noise entry `index`.
    pub fn for_noise(&self, layout: &NoiseLayout, index: usize) -> f64 {
        match layout.entry(index) {
            NoiseEntry::Detector(_) => self.detector_noise,
            NoiseEntry::Signal(_) => self.signal_noise,
        }
    }
}
