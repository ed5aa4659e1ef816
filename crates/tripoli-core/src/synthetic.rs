//! Synthetic blocks with a known true model.
//!
//! One Faraday detector and one photomultiplier peak-hop through the
//! isotopes together: at time sample `j` the photomultiplier reads isotope
//! `j mod n` and the Faraday reads isotope `(j + 1) mod n`. The beam decays
//! linearly over the block, so linear knots at every cycle start (plus one
//! at the end) represent it exactly. Baseline readings are taken at the
//! start of every cycle.
//!
//! On-peak noise follows the model's variance: Faraday
//! `σ_BL² + signal/Δt`, photomultiplier `signal/Δt`, both multiplied by
//! `noise_scale²`.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::constants::{DEFAULT_SEED, REPORT_INTERVAL};
use crate::data::{BlockDataSet, DetectorReadings, Reading};
use crate::error::Result;
use crate::model::{BlockModel, NoiseLayout};
use crate::types::Matrix;

/// Linear-interpolation matrix of `times` onto `knot_times`.
///
/// `knot_times` must be strictly increasing; times outside the knot span
/// are extrapolated from the nearest interval.
pub fn linear_knot_matrix(times: &[f64], knot_times: &[f64]) -> Matrix {
    let k = knot_times.len();
    let mut m = Matrix::zeros(times.len(), k);
    if k == 1 {
        m.fill(1.0);
        return m;
    }
    for (row, &t) in times.iter().enumerate() {
        let upper = knot_times
            .iter()
            .position(|&kt| kt > t)
            .unwrap_or(k - 1)
            .clamp(1, k - 1);
        let lower = upper - 1;
        let w = (t - knot_times[lower]) / (knot_times[upper] - knot_times[lower]);
        m[(row, lower)] = 1.0 - w;
        m[(row, upper)] = w;
    }
    m
}

/// Generator settings for one synthetic block.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticBlock {
    pub block_number: usize,
    /// True log ratio of every non-reference isotope.
    pub log_ratios: Vec<f64>,
    pub baseline: f64,
    pub baseline_sigma: f64,
    pub gain: f64,
    /// Reference-isotope intensity at the first sample, photomultiplier units.
    pub reference_intensity: f64,
    /// Fractional intensity lost by the end of the block.
    pub intensity_decay: f64,
    pub cycles: usize,
    pub samples_per_cycle: usize,
    pub baseline_per_cycle: usize,
    pub report_interval: f64,
    /// Multiplier of the on-peak noise standard deviation.
    pub noise_scale: f64,
    pub faraday_detector: usize,
    pub photomultiplier_detector: usize,
    pub seed: u64,
}

impl Default for SyntheticBlock {
    fn default() -> Self {
        Self {
            block_number: 1,
            log_ratios: vec![0.1_f64.ln()],
            baseline: 100.0,
            baseline_sigma: 1.0,
            gain: 0.9,
            reference_intensity: 1.0e6,
            intensity_decay: 0.2,
            cycles: 10,
            samples_per_cycle: 20,
            baseline_per_cycle: 10,
            report_interval: REPORT_INTERVAL,
            noise_scale: 1.0,
            faraday_detector: 3,
            photomultiplier_detector: 7,
            seed: DEFAULT_SEED,
        }
    }
}

impl SyntheticBlock {
    pub fn block_number(mut self, n: usize) -> Self {
        self.block_number = n;
        self
    }

    /// Set the true log ratios; their count fixes the isotope count.
    pub fn log_ratios(mut self, log_ratios: Vec<f64>) -> Self {
        assert!(!log_ratios.is_empty(), "log_ratios must not be empty");
        self.log_ratios = log_ratios;
        self
    }

    pub fn baseline(mut self, mean: f64) -> Self {
        self.baseline = mean;
        self
    }

    pub fn baseline_sigma(mut self, sigma: f64) -> Self {
        assert!(sigma >= 0.0, "baseline_sigma must be >= 0");
        self.baseline_sigma = sigma;
        self
    }

    pub fn gain(mut self, gain: f64) -> Self {
        assert!(gain > 0.0, "gain must be > 0");
        self.gain = gain;
        self
    }

    pub fn reference_intensity(mut self, intensity: f64) -> Self {
        assert!(intensity > 0.0, "reference_intensity must be > 0");
        self.reference_intensity = intensity;
        self
    }

    pub fn cycles(mut self, cycles: usize) -> Self {
        assert!(cycles > 0, "cycles must be > 0");
        self.cycles = cycles;
        self
    }

    pub fn samples_per_cycle(mut self, samples: usize) -> Self {
        assert!(samples >= 2, "samples_per_cycle must be >= 2");
        self.samples_per_cycle = samples;
        self
    }

    pub fn noise_scale(mut self, scale: f64) -> Self {
        assert!(scale >= 0.0, "noise_scale must be >= 0");
        self.noise_scale = scale;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of isotopes including the reference.
    pub fn isotope_count(&self) -> usize {
        self.log_ratios.len() + 1
    }

    fn ratio(&self, isotope: usize) -> f64 {
        self.log_ratios.get(isotope).map_or(1.0, |lr| lr.exp())
    }

    /// Draw the readings and return them with the model that produced them.
    pub fn generate(&self) -> Result<(BlockDataSet, BlockModel)> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let n_iso = self.isotope_count();
        let samples = self.cycles * self.samples_per_cycle;
        let dt = self.report_interval;

        let times: Vec<f64> = (0..samples).map(|j| j as f64 * dt).collect();
        let span = times.last().copied().unwrap_or(0.0).max(dt);
        let mut knot_times: Vec<f64> = (0..self.cycles)
            .map(|c| times[c * self.samples_per_cycle])
            .collect();
        knot_times.push(span);
        let interpolation = linear_knot_matrix(&times, &knot_times);

        let beam = |t: f64| self.reference_intensity * (1.0 - self.intensity_decay * t / span);
        let knot_intensities: Vec<f64> = knot_times.iter().map(|&t| beam(t)).collect();

        let mut baseline = DetectorReadings::new();
        let mut faraday = DetectorReadings::new();
        let mut photomultiplier = DetectorReadings::new();

        for cycle in 0..self.cycles {
            let start = cycle * self.samples_per_cycle;
            for _ in 0..self.baseline_per_cycle {
                let z: f64 = rng.sample(StandardNormal);
                baseline.push(Reading {
                    detector: self.faraday_detector,
                    intensity: self.baseline + self.baseline_sigma * z,
                    time: times[start],
                    time_index: start,
                    isotope: 0,
                    cycle,
                });
            }
            for j in start..start + self.samples_per_cycle {
                let intensity = beam(times[j]);

                let iso = (j + 1) % n_iso;
                let signal = self.ratio(iso) / self.gain * intensity;
                let sd = self.noise_scale * (self.baseline_sigma.powi(2) + signal / dt).sqrt();
                let z: f64 = rng.sample(StandardNormal);
                faraday.push(Reading {
                    detector: self.faraday_detector,
                    intensity: signal + self.baseline + sd * z,
                    time: times[j],
                    time_index: j,
                    isotope: iso,
                    cycle,
                });

                let iso = j % n_iso;
                let signal = self.ratio(iso) * intensity;
                let sd = self.noise_scale * (signal / dt).sqrt();
                let z: f64 = rng.sample(StandardNormal);
                photomultiplier.push(Reading {
                    detector: self.photomultiplier_detector,
                    intensity: signal + sd * z,
                    time: times[j],
                    time_index: j,
                    isotope: iso,
                    cycle,
                });
            }
        }

        let dataset = BlockDataSet::new(
            self.block_number,
            n_iso,
            baseline,
            faraday,
            photomultiplier,
            interpolation,
        )?;

        let noise = NoiseLayout::new(1, n_iso);
        let mut noise_sigma = vec![self.baseline_sigma, 0.0];
        noise_sigma.resize(noise.len(), 1.0 / dt);
        let truth = BlockModel {
            log_ratios: self.log_ratios.clone(),
            knot_intensities,
            baseline_means: vec![self.baseline],
            baseline_std_devs: vec![self.baseline_sigma],
            gain: self.gain,
            noise_sigma,
            faraday_map: BTreeMap::from([(self.faraday_detector, 0)]),
        };
        Ok((dataset, truth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_knot_matrix_rows_sum_to_one() {
        let m = linear_knot_matrix(&[0.0, 0.5, 1.0, 1.5, 2.0], &[0.0, 1.0, 2.0]);
        for r in 0..m.nrows() {
            assert!((m.row(r).sum() - 1.0).abs() < 1e-12);
        }
        assert_eq!(m[(1, 0)], 0.5);
        assert_eq!(m[(2, 1)], 1.0);
        assert_eq!(m[(4, 2)], 1.0);
    }

    #[test]
    fn test_default_block_shape() {
        let (data, truth) = SyntheticBlock::default().generate().unwrap();
        assert_eq!(data.isotope_count(), 2);
        assert_eq!(data.faraday_count(), 1);
        assert_eq!(data.knot_count(), 11);
        assert_eq!(data.baseline().len(), 100);
        assert_eq!(data.faraday().len(), 200);
        assert_eq!(data.photomultiplier().len(), 200);
        assert_eq!(truth.noise_sigma.len(), NoiseLayout::new(1, 2).len());
    }

    #[test]
    fn test_noiseless_readings_match_truth() {
        let (data, truth) = SyntheticBlock::default().noise_scale(0.0).generate().unwrap();
        let pm = data.photomultiplier();
        // First sample: photomultiplier reads isotope 0 at the full beam.
        assert_eq!(pm.isotope_ordinals[0], 0);
        assert!((pm.intensities[0] - truth.ratio(0) * 1.0e6).abs() < 1e-6);
    }

    #[test]
    fn test_same_seed_same_block() {
        let (a, _) = SyntheticBlock::default().seed(5).generate().unwrap();
        let (b, _) = SyntheticBlock::default().seed(5).generate().unwrap();
        let (c, _) = SyntheticBlock::default().seed(6).generate().unwrap();
        assert_eq!(a.intensities(), b.intensities());
        assert_ne!(a.intensities(), c.intensities());
    }

    #[test]
    #[should_panic(expected = "cycles must be > 0")]
    fn test_zero_cycles_panics() {
        let _ = SyntheticBlock::default().cycles(0);
    }
}
