//! The Markov chain's state: baselines, gain, log ratios, knot intensities
//! and noise sigmas for one block.
//!
//! A [`BlockModel`] is a plain value. Every accepted step replaces the
//! current model with a new one; nothing mutates a model that the chain
//! has already scored.

mod layout;
mod priors;

pub use layout::ParameterLayout;
pub use priors::{Bound, PriorBounds, ProposalScales};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Model parameters for one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockModel {
    /// Log ratio of every non-reference isotope to the reference isotope.
    pub log_ratios: Vec<f64>,
    /// Knot intensities of the interpolated ion beam, photomultiplier units.
    pub knot_intensities: Vec<f64>,
    /// Baseline mean per Faraday detector.
    pub baseline_means: Vec<f64>,
    /// Baseline standard deviation per Faraday detector (fixed by the data).
    pub baseline_std_devs: Vec<f64>,
    /// Photomultiplier/Faraday gain.
    pub gain: f64,
    /// Noise sigmas, laid out as described by [`NoiseLayout`].
    pub noise_sigma: Vec<f64>,
    /// Detector ordinal to Faraday index.
    pub faraday_map: BTreeMap<usize, usize>,
}

impl BlockModel {
    /// Ratio of `isotope` to the reference isotope; the reference itself is 1.
    pub fn ratio(&self, isotope: usize) -> f64 {
        self.log_ratios.get(isotope).map_or(1.0, |lr| lr.exp())
    }

    /// Number of isotopes implied by the log-ratio vector.
    pub fn isotope_count(&self) -> usize {
        self.log_ratios.len() + 1
    }

    /// Faraday index of a detector ordinal.
    pub fn faraday_index(&self, detector: usize) -> Option<usize> {
        self.faraday_map.get(&detector).copied()
    }

    /// Layout of the noise-sigma vector for this model.
    pub fn noise_layout(&self) -> NoiseLayout {
        NoiseLayout::new(self.baseline_means.len(), self.isotope_count())
    }
}

/// Entry of the noise-sigma vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseEntry {
    /// Signal-independent sigma of one detector.
    Detector(usize),
    /// Signal-dependent sigma of one isotope.
    Signal(usize),
}

/// Layout of the noise-sigma vector.
///
/// ```text
/// [ faraday_0 .. faraday_{F-1}, photomultiplier, signal_0 .. signal_{I-1} ]
/// ```
///
/// Per-row data variance is `sigma[det]² + sigma[detector_count + isotope] · signal`,
/// where `det` is the Faraday index or `faraday_count` for photomultiplier rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseLayout {
    faraday_count: usize,
    isotope_count: usize,
}

impl NoiseLayout {
    /// Layout for `faraday_count` Faraday detectors and one photomultiplier.
    pub fn new(faraday_count: usize, isotope_count: usize) -> Self {
        Self {
            faraday_count,
            isotope_count,
        }
    }

    /// Detector sigmas: every Faraday plus the photomultiplier.
    pub fn detector_count(&self) -> usize {
        self.faraday_count + 1
    }

    /// Index of the photomultiplier's detector sigma.
    pub fn photomultiplier(&self) -> usize {
        self.faraday_count
    }

    /// Index of the signal-dependent sigma of `isotope`.
    pub fn signal(&self, isotope: usize) -> usize {
        self.detector_count() + isotope
    }

    /// Total length of the noise vector.
    pub fn len(&self) -> usize {
        self.detector_count() + self.isotope_count
    }

    /// Always false; a layout has at least the photomultiplier entry.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// What the noise entry at `index` describes.
    pub fn entry(&self, index: usize) -> NoiseEntry {
        if index < self.detector_count() {
            NoiseEntry::Detector(index)
        } else {
            NoiseEntry::Signal(index - self.detector_count())
        }
    }
}
