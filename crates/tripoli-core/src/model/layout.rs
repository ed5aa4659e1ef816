//! Flat free-parameter vector: `[log ratios, knot intensities, baselines, gain]`.
//!
//! The layout is a per-chain context object. Each flat index carries a
//! [`ParameterKind`] tag so a flat vector can always be written back into
//! a structured [`BlockModel`]. Noise sigmas are not part of the layout.

use std::ops::Range;

use super::BlockModel;
use crate::error::{Result, TripoliError};
use crate::types::{ParameterKind, Vector};

/// Partition sizes and type tags of the flat parameter vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterLayout {
    ratio_count: usize,
    knot_count: usize,
    faraday_count: usize,
    kinds: Vec<ParameterKind>,
}

impl ParameterLayout {
    /// Build a layout from partition sizes.
    pub fn new(ratio_count: usize, knot_count: usize, faraday_count: usize) -> Self {
        let mut kinds = Vec::with_capacity(ratio_count + knot_count + faraday_count + 1);
        kinds.extend(std::iter::repeat(ParameterKind::LogRatio).take(ratio_count));
        kinds.extend(std::iter::repeat(ParameterKind::Intensity).take(knot_count));
        kinds.extend(std::iter::repeat(ParameterKind::Baseline).take(faraday_count));
        kinds.push(ParameterKind::Gain);
        Self {
            ratio_count,
            knot_count,
            faraday_count,
            kinds,
        }
    }

    /// Layout matching the partition sizes of `model`.
    pub fn for_model(model: &BlockModel) -> Self {
        Self::new(
            model.log_ratios.len(),
            model.knot_intensities.len(),
            model.baseline_means.len(),
        )
    }

    /// Total number of free parameters.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Always false; the gain is always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Type tag of every flat index.
    pub fn kinds(&self) -> &[ParameterKind] {
        &self.kinds
    }

    /// Type tag of flat index `index`.
    pub fn kind(&self, index: usize) -> ParameterKind {
        self.kinds[index]
    }

    /// Flat index range occupied by `kind`.
    pub fn range(&self, kind: ParameterKind) -> Range<usize> {
        let ratios = 0..self.ratio_count;
        let knots = ratios.end..ratios.end + self.knot_count;
        let baselines = knots.end..knots.end + self.faraday_count;
        match kind {
            ParameterKind::LogRatio => ratios,
            ParameterKind::Intensity => knots,
            ParameterKind::Baseline => baselines,
            ParameterKind::Gain => baselines.end..baselines.end + 1,
        }
    }

    /// Check that `model` has the partition sizes of this layout.
    pub fn check(&self, model: &BlockModel) -> Result<()> {
        for (context, expected, actual) in [
            ("log ratios", self.ratio_count, model.log_ratios.len()),
            ("knot intensities", self.knot_count, model.knot_intensities.len()),
            ("baseline means", self.faraday_count, model.baseline_means.len()),
        ] {
            if expected != actual {
                return Err(TripoliError::DimensionMismatch {
                    context,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Read flat parameter `index` from `model`.
    pub fn get(&self, model: &BlockModel, index: usize) -> f64 {
        let kind = self.kinds[index];
        let offset = index - self.range(kind).start;
        match kind {
            ParameterKind::LogRatio => model.log_ratios[offset],
            ParameterKind::Intensity => model.knot_intensities[offset],
            ParameterKind::Baseline => model.baseline_means[offset],
            ParameterKind::Gain => model.gain,
        }
    }

    /// Write flat parameter `index` into `model`.
    pub fn set(&self, model: &mut BlockModel, index: usize, value: f64) {
        let kind = self.kinds[index];
        let offset = index - self.range(kind).start;
        match kind {
            ParameterKind::LogRatio => model.log_ratios[offset] = value,
            ParameterKind::Intensity => model.knot_intensities[offset] = value,
            ParameterKind::Baseline => model.baseline_means[offset] = value,
            ParameterKind::Gain => model.gain = value,
        }
    }

    /// Flatten the free parameters of `model`.
    pub fn pack(&self, model: &BlockModel) -> Vector {
        debug_assert!(self.check(model).is_ok());
        Vector::from_iterator(
            self.len(),
            model
                .log_ratios
                .iter()
                .chain(&model.knot_intensities)
                .chain(&model.baseline_means)
                .chain(std::iter::once(&model.gain))
                .copied(),
        )
    }

    /// Write a flat vector back into a copy of `template`.
    ///
    /// Fields outside the layout (baseline std devs, noise sigmas, the
    /// Faraday map) are taken from `template` unchanged.
    pub fn unpack(&self, values: &Vector, template: &BlockModel) -> BlockModel {
        debug_assert_eq!(values.len(), self.len());
        let slice = values.as_slice();
        let mut model = template.clone();
        model.log_ratios = slice[self.range(ParameterKind::LogRatio)].to_vec();
        model.knot_intensities = slice[self.range(ParameterKind::Intensity)].to_vec();
        model.baseline_means = slice[self.range(ParameterKind::Baseline)].to_vec();
        model.gain = slice[self.range(ParameterKind::Gain).start];
        model
    }
}
