//! Block dataset: categorized readings plus the knot-interpolation matrix.
//!
//! A block holds three sub-datasets (baseline, on-peak Faraday, on-peak
//! photomultiplier), each a set of parallel sequences. The flattened row
//! arrays concatenate them in that fixed order and every per-row array
//! shares the same index space. The dataset is validated once on
//! construction and is read-only afterwards.
//!
//! Isotope ordinals are zero-based. The reference isotope is the highest
//! ordinal, `isotope_count - 1`. Baseline rows carry no isotope; their
//! isotope ordinal is ignored.

use std::collections::BTreeSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TripoliError};
use crate::types::{Matrix, RowKind};

/// One raw reading, used to append to a [`DetectorReadings`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Detector ordinal as assigned by the instrument configuration.
    pub detector: usize,
    /// Measured intensity.
    pub intensity: f64,
    /// Acquisition time in seconds.
    pub time: f64,
    /// Row of the interpolation matrix for this acquisition time.
    pub time_index: usize,
    /// Isotope ordinal (ignored for baseline readings).
    pub isotope: usize,
    /// Cycle number within the block.
    pub cycle: usize,
}

/// Parallel sequences describing one category of readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorReadings {
    /// Detector ordinal per reading.
    pub detector_ordinals: Vec<usize>,
    /// Measured intensity per reading.
    pub intensities: Vec<f64>,
    /// Acquisition time per reading.
    pub times: Vec<f64>,
    /// Interpolation-matrix row per reading.
    pub time_indices: Vec<usize>,
    /// Isotope ordinal per reading.
    pub isotope_ordinals: Vec<usize>,
    /// Cycle number per reading.
    pub cycles: Vec<usize>,
}

impl DetectorReadings {
    /// Create an empty set of readings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one reading to every sequence.
    pub fn push(&mut self, reading: Reading) {
        self.detector_ordinals.push(reading.detector);
        self.intensities.push(reading.intensity);
        self.times.push(reading.time);
        self.time_indices.push(reading.time_index);
        self.isotope_ordinals.push(reading.isotope);
        self.cycles.push(reading.cycle);
    }

    /// Number of readings.
    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    /// Whether there are no readings.
    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }

    fn check_aligned(&self, name: &str) -> Result<()> {
        let n = self.intensities.len();
        let lengths = [
            self.detector_ordinals.len(),
            self.times.len(),
            self.time_indices.len(),
            self.isotope_ordinals.len(),
            self.cycles.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            return Err(TripoliError::InvalidDataset(format!(
                "{name} readings have misaligned sequences"
            )));
        }
        if let Some(pos) = self.intensities.iter().position(|v| !v.is_finite()) {
            return Err(TripoliError::InvalidDataset(format!(
                "{name} reading {pos} has a non-finite intensity"
            )));
        }
        Ok(())
    }
}

/// Immutable dataset for one acquisition block.
#[derive(Debug, Clone)]
pub struct BlockDataSet {
    block_number: usize,
    isotope_count: usize,
    baseline: DetectorReadings,
    faraday: DetectorReadings,
    photomultiplier: DetectorReadings,
    interpolation: Matrix,

    // Flattened rows: baseline, then Faraday, then photomultiplier.
    row_kinds: Vec<RowKind>,
    detector_ordinals: Vec<usize>,
    intensities: Vec<f64>,
    time_indices: Vec<usize>,
    isotope_ordinals: Vec<usize>,

    /// Sorted distinct baseline detector ordinals.
    faraday_ordinals: Vec<usize>,
}

impl BlockDataSet {
    /// Validate the three sub-datasets and build the flattened rows.
    ///
    /// # Errors
    ///
    /// Returns [`TripoliError::InvalidDataset`] when sequences are misaligned,
    /// a time index falls outside the interpolation matrix, an isotope
    /// ordinal is out of range, an on-peak Faraday detector has no baseline
    /// readings, or there is nothing to invert.
    pub fn new(
        block_number: usize,
        isotope_count: usize,
        baseline: DetectorReadings,
        faraday: DetectorReadings,
        photomultiplier: DetectorReadings,
        interpolation: Matrix,
    ) -> Result<Self> {
        if isotope_count < 2 {
            return Err(TripoliError::InvalidDataset(format!(
                "need at least two isotopes, got {isotope_count}"
            )));
        }
        if interpolation.ncols() == 0 || interpolation.nrows() == 0 {
            return Err(TripoliError::InvalidDataset(
                "interpolation matrix is empty".to_string(),
            ));
        }
        baseline.check_aligned("baseline")?;
        faraday.check_aligned("faraday")?;
        photomultiplier.check_aligned("photomultiplier")?;

        if baseline.is_empty() {
            return Err(TripoliError::InvalidDataset(
                "block has no baseline readings".to_string(),
            ));
        }
        if faraday.is_empty() && photomultiplier.is_empty() {
            return Err(TripoliError::InvalidDataset(
                "block has no on-peak readings".to_string(),
            ));
        }

        let faraday_ordinals: Vec<usize> = baseline
            .detector_ordinals
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        for (name, readings) in [("faraday", &faraday), ("photomultiplier", &photomultiplier)] {
            for i in 0..readings.len() {
                if readings.time_indices[i] >= interpolation.nrows() {
                    return Err(TripoliError::InvalidDataset(format!(
                        "{name} reading {i} has time index {} beyond {} interpolation rows",
                        readings.time_indices[i],
                        interpolation.nrows()
                    )));
                }
                if readings.isotope_ordinals[i] >= isotope_count {
                    return Err(TripoliError::InvalidDataset(format!(
                        "{name} reading {i} has isotope ordinal {} but block has {isotope_count} isotopes",
                        readings.isotope_ordinals[i]
                    )));
                }
            }
        }
        if let Some(missing) = faraday
            .detector_ordinals
            .iter()
            .find(|d| faraday_ordinals.binary_search(d).is_err())
        {
            return Err(TripoliError::InvalidDataset(format!(
                "faraday detector {missing} has no baseline readings"
            )));
        }

        let total = baseline.len() + faraday.len() + photomultiplier.len();
        let mut row_kinds = Vec::with_capacity(total);
        let mut detector_ordinals = Vec::with_capacity(total);
        let mut intensities = Vec::with_capacity(total);
        let mut time_indices = Vec::with_capacity(total);
        let mut isotope_ordinals = Vec::with_capacity(total);
        for (kind, readings) in [
            (RowKind::Baseline, &baseline),
            (RowKind::Faraday, &faraday),
            (RowKind::Photomultiplier, &photomultiplier),
        ] {
            row_kinds.extend(std::iter::repeat(kind).take(readings.len()));
            detector_ordinals.extend_from_slice(&readings.detector_ordinals);
            intensities.extend_from_slice(&readings.intensities);
            time_indices.extend_from_slice(&readings.time_indices);
            isotope_ordinals.extend_from_slice(&readings.isotope_ordinals);
        }

        Ok(Self {
            block_number,
            isotope_count,
            baseline,
            faraday,
            photomultiplier,
            interpolation,
            row_kinds,
            detector_ordinals,
            intensities,
            time_indices,
            isotope_ordinals,
            faraday_ordinals,
        })
    }

    /// Block number within the analysis.
    pub fn block_number(&self) -> usize {
        self.block_number
    }

    /// Number of isotopes, including the reference isotope.
    pub fn isotope_count(&self) -> usize {
        self.isotope_count
    }

    /// Ordinal of the reference (denominator) isotope.
    pub fn reference_isotope(&self) -> usize {
        self.isotope_count - 1
    }

    /// Number of knots (interpolation-matrix columns).
    pub fn knot_count(&self) -> usize {
        self.interpolation.ncols()
    }

    /// Number of Faraday detectors (distinct baseline detector ordinals).
    pub fn faraday_count(&self) -> usize {
        self.faraday_ordinals.len()
    }

    /// Sorted distinct Faraday detector ordinals.
    pub fn faraday_ordinals(&self) -> &[usize] {
        &self.faraday_ordinals
    }

    /// Interpolation matrix (rows = time samples, columns = knots).
    pub fn interpolation(&self) -> &Matrix {
        &self.interpolation
    }

    /// Baseline readings.
    pub fn baseline(&self) -> &DetectorReadings {
        &self.baseline
    }

    /// On-peak Faraday readings.
    pub fn faraday(&self) -> &DetectorReadings {
        &self.faraday
    }

    /// On-peak photomultiplier readings.
    pub fn photomultiplier(&self) -> &DetectorReadings {
        &self.photomultiplier
    }

    /// Total number of rows.
    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    /// Always false for a validated dataset.
    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }

    /// Flattened row ranges, in order.
    pub fn baseline_rows(&self) -> Range<usize> {
        0..self.baseline.len()
    }

    /// Rows holding on-peak Faraday readings.
    pub fn faraday_rows(&self) -> Range<usize> {
        let start = self.baseline.len();
        start..start + self.faraday.len()
    }

    /// Rows holding on-peak photomultiplier readings.
    pub fn photomultiplier_rows(&self) -> Range<usize> {
        let start = self.baseline.len() + self.faraday.len();
        start..start + self.photomultiplier.len()
    }

    /// Category of every row.
    pub fn row_kinds(&self) -> &[RowKind] {
        &self.row_kinds
    }

    /// Detector ordinal of every row.
    pub fn detector_ordinals(&self) -> &[usize] {
        &self.detector_ordinals
    }

    /// Observed intensity of every row.
    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// Interpolation-matrix row of every row.
    pub fn time_indices(&self) -> &[usize] {
        &self.time_indices
    }

    /// Isotope ordinal of every row.
    pub fn isotope_ordinals(&self) -> &[usize] {
        &self.isotope_ordinals
    }
}
