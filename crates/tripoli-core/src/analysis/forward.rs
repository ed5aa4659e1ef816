//! Forward model: predicted reading of every data row.
//!
//! ```text
//! baseline row        → baseline[detector]
//! Faraday row         → ratio[isotope] / gain · I(t) + baseline[detector]
//! photomultiplier row → ratio[isotope] · I(t)
//! ```
//!
//! where `I(t)` is the interpolation-matrix row for the reading's time index
//! dotted with the knot intensities, and the reference isotope has ratio 1.
//! Evaluation is a straight sequential pass, so identical inputs give
//! bit-identical outputs.

use std::collections::BTreeMap;

use crate::data::BlockDataSet;
use crate::error::{Result, TripoliError};
use crate::linalg::LinearAlgebra;
use crate::model::{BlockModel, NoiseLayout};
use crate::types::{RowKind, Vector};

/// Predicted readings for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Predicted reading per row.
    pub predicted: Vec<f64>,
    /// Predicted reading minus baseline per row (zero on baseline rows).
    pub signal: Vec<f64>,
}

/// Forward model bound to one dataset and one detector map.
///
/// Built once per chain; the per-row detector lookups are resolved here so
/// evaluation never touches the map.
#[derive(Debug, Clone)]
pub struct ForwardModel<'a> {
    dataset: &'a BlockDataSet,
    noise: NoiseLayout,
    /// Noise-detector index per row: Faraday index, or the photomultiplier slot.
    detector_index: Vec<usize>,
}

impl<'a> ForwardModel<'a> {
    /// Resolve every row's detector against `faraday_map`.
    ///
    /// # Errors
    ///
    /// [`TripoliError::InvalidDataset`] if a baseline or Faraday row's
    /// detector is missing from the map or maps past the Faraday count.
    pub fn new(dataset: &'a BlockDataSet, faraday_map: &BTreeMap<usize, usize>) -> Result<Self> {
        let faraday_count = dataset.faraday_count();
        let noise = NoiseLayout::new(faraday_count, dataset.isotope_count());
        let mut detector_index = Vec::with_capacity(dataset.len());
        for (row, (&kind, &detector)) in dataset
            .row_kinds()
            .iter()
            .zip(dataset.detector_ordinals())
            .enumerate()
        {
            let index = match kind {
                RowKind::Photomultiplier => noise.photomultiplier(),
                RowKind::Baseline | RowKind::Faraday => match faraday_map.get(&detector) {
                    Some(&idx) if idx < faraday_count => idx,
                    _ => {
                        return Err(TripoliError::InvalidDataset(format!(
                            "row {row}: detector {detector} has no Faraday index"
                        )))
                    }
                },
            };
            detector_index.push(index);
        }
        Ok(Self {
            dataset,
            noise,
            detector_index,
        })
    }

    /// The dataset this model predicts.
    pub fn dataset(&self) -> &'a BlockDataSet {
        self.dataset
    }

    /// Noise layout implied by the dataset.
    pub fn noise_layout(&self) -> NoiseLayout {
        self.noise
    }

    /// Intensity function at every time sample: `interpolation · knots`.
    pub fn intensity_function<L>(&self, model: &BlockModel, linalg: &L) -> Vector
    where
        L: LinearAlgebra + ?Sized,
    {
        let knots = Vector::from_column_slice(&model.knot_intensities);
        linalg.mat_vec(self.dataset.interpolation(), &knots)
    }

    /// Predicted reading of every row.
    pub fn evaluate<L>(&self, model: &BlockModel, linalg: &L) -> Prediction
    where
        L: LinearAlgebra + ?Sized,
    {
        let intensity = self.intensity_function(model, linalg);
        let ratios: Vec<f64> = (0..self.dataset.isotope_count())
            .map(|iso| model.ratio(iso))
            .collect();

        let n = self.dataset.len();
        let mut predicted = Vec::with_capacity(n);
        let mut signal = Vec::with_capacity(n);
        let kinds = self.dataset.row_kinds();
        let times = self.dataset.time_indices();
        let isotopes = self.dataset.isotope_ordinals();

        for row in 0..n {
            let det = self.detector_index[row];
            match kinds[row] {
                RowKind::Baseline => {
                    predicted.push(model.baseline_means[det]);
                    signal.push(0.0);
                }
                RowKind::Faraday => {
                    let s = ratios[isotopes[row]] / model.gain * intensity[times[row]];
                    predicted.push(s + model.baseline_means[det]);
                    signal.push(s);
                }
                RowKind::Photomultiplier => {
                    let s = ratios[isotopes[row]] * intensity[times[row]];
                    predicted.push(s);
                    signal.push(s);
                }
            }
        }

        Prediction { predicted, signal }
    }

    /// Per-row data variance `sigma[det]² + sigma[signal(isotope)] · signal`.
    ///
    /// Baseline rows carry only the detector term.
    pub fn data_variance(&self, model: &BlockModel, prediction: &Prediction) -> Vec<f64> {
        let sigma = &model.noise_sigma;
        let kinds = self.dataset.row_kinds();
        let isotopes = self.dataset.isotope_ordinals();
        (0..self.dataset.len())
            .map(|row| {
                let det = sigma[self.detector_index[row]];
                let base = det * det;
                match kinds[row] {
                    RowKind::Baseline => base,
                    RowKind::Faraday | RowKind::Photomultiplier => {
                        base + sigma[self.noise.signal(isotopes[row])] * prediction.signal[row]
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DetectorReadings, Reading};
    use crate::linalg::NalgebraBackend;
    use crate::types::Matrix;

    fn reading(detector: usize, intensity: f64, time_index: usize, isotope: usize) -> Reading {
        Reading {
            detector,
            intensity,
            time: time_index as f64,
            time_index,
            isotope,
            cycle: 0,
        }
    }

    fn dataset() -> BlockDataSet {
        let mut baseline = DetectorReadings::new();
        baseline.push(reading(5, 0.0, 0, 0));
        let mut faraday = DetectorReadings::new();
        faraday.push(reading(5, 0.0, 0, 1));
        faraday.push(reading(5, 0.0, 1, 0));
        let mut pm = DetectorReadings::new();
        pm.push(reading(9, 0.0, 1, 0));
        pm.push(reading(9, 0.0, 0, 1));
        // Two time samples, two knots: linear halfway point at t1.
        let interp = Matrix::from_row_slice(2, 2, &[1.0, 0.0, 0.5, 0.5]);
        BlockDataSet::new(0, 2, baseline, faraday, pm, interp).unwrap()
    }

    fn model() -> BlockModel {
        BlockModel {
            log_ratios: vec![0.25_f64.ln()],
            knot_intensities: vec![100.0, 200.0],
            baseline_means: vec![3.0],
            baseline_std_devs: vec![1.0],
            gain: 0.5,
            noise_sigma: vec![2.0, 0.5, 10.0, 20.0],
            faraday_map: BTreeMap::from([(5, 0)]),
        }
    }

    #[test]
    fn test_prediction_per_row_kind() {
        let data = dataset();
        let m = model();
        let fm = ForwardModel::new(&data, &m.faraday_map).unwrap();
        let p = fm.evaluate(&m, &NalgebraBackend);

        // baseline
        assert_eq!(p.predicted[0], 3.0);
        // Faraday reference isotope at t0: 1/0.5 * 100 + 3
        assert!((p.predicted[1] - 203.0).abs() < 1e-9);
        // Faraday minor isotope at t1: 0.25/0.5 * 150 + 3
        assert!((p.predicted[2] - 78.0).abs() < 1e-9);
        // photomultiplier minor at t1: 0.25 * 150
        assert!((p.predicted[3] - 37.5).abs() < 1e-9);
        // photomultiplier reference at t0
        assert!((p.predicted[4] - 100.0).abs() < 1e-9);
        assert_eq!(p.signal[0], 0.0);
        assert!((p.signal[1] - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_evaluation_is_bit_identical() {
        let data = dataset();
        let m = model();
        let fm = ForwardModel::new(&data, &m.faraday_map).unwrap();
        let a = fm.evaluate(&m, &NalgebraBackend);
        let b = fm.evaluate(&m, &NalgebraBackend);
        for (x, y) in a.predicted.iter().zip(&b.predicted) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_data_variance_layout() {
        let data = dataset();
        let m = model();
        let fm = ForwardModel::new(&data, &m.faraday_map).unwrap();
        let p = fm.evaluate(&m, &NalgebraBackend);
        let v = fm.data_variance(&m, &p);
        assert_eq!(v[0], 4.0);
        // Faraday reference: 2² + sigma_signal(1)=20 * 200
        assert!((v[1] - (4.0 + 20.0 * 200.0)).abs() < 1e-9);
        // photomultiplier minor: 0.5² + sigma_signal(0)=10 * 37.5
        assert!((v[3] - (0.25 + 375.0)).abs() < 1e-9);
    }

    #[test]
    fn test_unmapped_detector_rejected() {
        let data = dataset();
        let map = BTreeMap::from([(6, 0)]);
        assert!(ForwardModel::new(&data, &map).is_err());
    }
}
