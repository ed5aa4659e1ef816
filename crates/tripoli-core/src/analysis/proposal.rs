//! Operation selection and candidate construction.
//!
//! Each iteration selects exactly one [`Operation`], either by drawing
//! against cumulative thresholds ([`OperationWeights`]) or by walking a
//! shuffled permutation of every scalar parameter. The [`ProposalEngine`]
//! then builds a brand-new candidate model; the current model is never
//! touched.
//!
//! Out-of-prior handling differs by regime:
//! - single parameter: the perturbation is discarded (value reverts)
//! - joint: each coordinate that leaves its bound reverts on its own
//! - noise: the perturbed sigma is clamped into its bound

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::model::{BlockModel, NoiseLayout, ParameterLayout, PriorBounds, ProposalScales};
use crate::types::{Matrix, Operation, ParameterKind, Vector};

// =============================================================================
// OPERATION SELECTION
// =============================================================================

/// Cumulative thresholds over `[0, range)` selecting an operation.
///
/// A uniform draw `u ∈ [0, range)` selects the first entry whose
/// threshold exceeds `u`; `range` is the last threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationWeights {
    thresholds: Vec<(f64, Operation)>,
}

impl OperationWeights {
    /// Build from cumulative `(threshold, operation)` pairs.
    ///
    /// # Panics
    ///
    /// If the list is empty, a threshold is not finite, or thresholds
    /// are not strictly increasing from a positive first value.
    pub fn new(thresholds: Vec<(f64, Operation)>) -> Self {
        assert!(!thresholds.is_empty(), "operation weights must not be empty");
        let mut previous = 0.0;
        for &(t, _) in &thresholds {
            assert!(
                t.is_finite() && t > previous,
                "operation thresholds must be finite and strictly increasing"
            );
            previous = t;
        }
        Self { thresholds }
    }

    /// Non-hierarchical thresholds over `[0, 100)`.
    pub fn standard() -> Self {
        Self::new(vec![
            (40.0, Operation::ChangeIntensity),
            (60.0, Operation::ChangeRatio),
            (80.0, Operation::ChangeBaseline),
            (100.0, Operation::ChangeGain),
        ])
    }

    /// Hierarchical thresholds over `[0, 120)`, including noise updates.
    pub fn hierarchical() -> Self {
        Self::new(vec![
            (60.0, Operation::ChangeIntensity),
            (80.0, Operation::ChangeRatio),
            (90.0, Operation::ChangeBaseline),
            (100.0, Operation::ChangeGain),
            (120.0, Operation::ChangeNoise),
        ])
    }

    /// Upper end of the draw range.
    pub fn range(&self) -> f64 {
        self.thresholds.last().map_or(0.0, |&(t, _)| t)
    }

    /// Whether `operation` can be selected.
    pub fn includes(&self, operation: Operation) -> bool {
        self.thresholds.iter().any(|&(_, op)| op == operation)
    }

    /// Probability of selecting `operation`.
    pub fn probability(&self, operation: Operation) -> f64 {
        let mut previous = 0.0;
        let mut mass = 0.0;
        for &(t, op) in &self.thresholds {
            if op == operation {
                mass += t - previous;
            }
            previous = t;
        }
        mass / self.range()
    }

    /// Draw one operation.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> Operation {
        let u = rng.random::<f64>() * self.range();
        self.thresholds
            .iter()
            .find(|&&(t, _)| u < t)
            .or(self.thresholds.last())
            .map(|&(_, op)| op)
            .unwrap_or(Operation::ChangeIntensity)
    }
}

impl Default for OperationWeights {
    fn default() -> Self {
        Self::standard()
    }
}

/// How the next operation is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperationSchedule {
    /// Independent draw against cumulative thresholds each iteration.
    Weighted(OperationWeights),
    /// A shuffled permutation of every scalar parameter, cycled, so every
    /// parameter is visited equally often per pass.
    Permutation,
}

/// Operation for one iteration, with the scalar it targets when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub operation: Operation,
    /// Flat parameter index, or noise index for [`Operation::ChangeNoise`].
    pub index: Option<usize>,
}

#[derive(Debug, Clone)]
enum SelectorMode {
    Weighted(OperationWeights),
    Permutation { order: Vec<usize>, cursor: usize },
}

/// Per-chain operation selector.
#[derive(Debug, Clone)]
pub struct OperationSelector {
    mode: SelectorMode,
    layout: ParameterLayout,
}

impl OperationSelector {
    /// Build a selector. For the permutation schedule the shuffle is drawn
    /// here, once; noise indices join the permutation only when
    /// `include_noise` is set.
    pub fn new<R: Rng + ?Sized>(
        schedule: &OperationSchedule,
        layout: &ParameterLayout,
        noise: &NoiseLayout,
        include_noise: bool,
        rng: &mut R,
    ) -> Self {
        let mode = match schedule {
            OperationSchedule::Weighted(weights) => SelectorMode::Weighted(weights.clone()),
            OperationSchedule::Permutation => {
                let total = layout.len() + if include_noise { noise.len() } else { 0 };
                let mut order: Vec<usize> = (0..total).collect();
                order.shuffle(rng);
                SelectorMode::Permutation { order, cursor: 0 }
            }
        };
        Self {
            mode,
            layout: layout.clone(),
        }
    }

    /// Operation for the next iteration.
    pub fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Selection {
        match &mut self.mode {
            SelectorMode::Weighted(weights) => Selection {
                operation: weights.select(rng),
                index: None,
            },
            SelectorMode::Permutation { order, cursor } => {
                let slot = order[*cursor];
                *cursor = (*cursor + 1) % order.len();
                if slot < self.layout.len() {
                    Selection {
                        operation: Operation::for_kind(self.layout.kind(slot)),
                        index: Some(slot),
                    }
                } else {
                    Selection {
                        operation: Operation::ChangeNoise,
                        index: Some(slot - self.layout.len()),
                    }
                }
            }
        }
    }
}

// =============================================================================
// CANDIDATE CONSTRUCTION
// =============================================================================

/// Builds candidate models from the current one.
#[derive(Debug, Clone, Copy)]
pub struct ProposalEngine<'a> {
    layout: &'a ParameterLayout,
    noise: NoiseLayout,
    priors: &'a PriorBounds,
    scales: &'a ProposalScales,
}

impl<'a> ProposalEngine<'a> {
    pub fn new(
        layout: &'a ParameterLayout,
        noise: NoiseLayout,
        priors: &'a PriorBounds,
        scales: &'a ProposalScales,
    ) -> Self {
        Self {
            layout,
            noise,
            priors,
            scales,
        }
    }

    pub fn layout(&self) -> &ParameterLayout {
        self.layout
    }

    /// Perturb one scalar of `kind`.
    ///
    /// `index` picks the flat parameter; otherwise one is drawn uniformly
    /// from the kind's range. The step is the fixed proposal scale, or
    /// `sqrt(cov[i][i])` when `adaptive` is given and that entry is positive.
    /// A result outside the prior is discarded.
    pub fn propose_single<R: Rng + ?Sized>(
        &self,
        current: &BlockModel,
        kind: ParameterKind,
        index: Option<usize>,
        adaptive: Option<&Matrix>,
        rng: &mut R,
    ) -> BlockModel {
        let range = self.layout.range(kind);
        let i = index.unwrap_or_else(|| range.start + rng.random_range(0..range.len()));
        let kind = self.layout.kind(i);

        let step = adaptive
            .map(|cov| cov[(i, i)])
            .filter(|v| v.is_finite() && *v > 0.0)
            .map(f64::sqrt)
            .unwrap_or_else(|| self.scales.for_kind(kind));
        let z: f64 = rng.sample(StandardNormal);

        let mut candidate = current.clone();
        let value = self.layout.get(current, i) + step * z;
        if self.priors.for_kind(kind).contains(value) {
            self.layout.set(&mut candidate, i, value);
        }
        candidate
    }

    /// Add `step` to every free parameter; coordinates leaving their prior
    /// keep the current value.
    pub fn propose_joint(&self, current: &BlockModel, step: &Vector) -> BlockModel {
        debug_assert_eq!(step.len(), self.layout.len());
        let mut candidate = current.clone();
        for i in 0..self.layout.len() {
            let value = self.layout.get(current, i) + step[i];
            if self.priors.for_kind(self.layout.kind(i)).contains(value) {
                self.layout.set(&mut candidate, i, value);
            }
        }
        candidate
    }

    /// Perturb one noise sigma with its fixed step and clamp it into its prior.
    pub fn propose_noise<R: Rng + ?Sized>(
        &self,
        current: &BlockModel,
        index: Option<usize>,
        rng: &mut R,
    ) -> BlockModel {
        let i = index.unwrap_or_else(|| rng.random_range(0..self.noise.len()));
        let z: f64 = rng.sample(StandardNormal);
        let step = self.scales.for_noise(&self.noise, i);
        let bound = self.priors.for_noise(&self.noise, i);

        let mut candidate = current.clone();
        candidate.noise_sigma[i] = bound.clamp(current.noise_sigma[i] + step * z);
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Bound;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::collections::BTreeMap;

    fn model() -> BlockModel {
        BlockModel {
            log_ratios: vec![-2.0],
            knot_intensities: vec![1000.0, 1200.0, 1100.0],
            baseline_means: vec![50.0],
            baseline_std_devs: vec![1.0],
            gain: 0.9,
            noise_sigma: vec![1.0, 0.0, 10.0, 10.0],
            faraday_map: BTreeMap::from([(1, 0)]),
        }
    }

    fn priors() -> PriorBounds {
        PriorBounds::from_data(1200.0, 0.1)
    }

    fn scales() -> ProposalScales {
        ProposalScales::from_data(1.0, &[1000.0, 1200.0, 1100.0])
    }

    #[test]
    fn test_standard_weights_exclude_noise() {
        let w = OperationWeights::standard();
        assert!(!w.includes(Operation::ChangeNoise));
        assert_eq!(w.range(), 100.0);
        assert!((w.probability(Operation::ChangeIntensity) - 0.4).abs() < 1e-12);
        let h = OperationWeights::hierarchical();
        assert!((h.probability(Operation::ChangeNoise) - 20.0 / 120.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_selection_frequencies() {
        let w = OperationWeights::standard();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let mut counts = [0usize; 5];
        let n = 20_000;
        for _ in 0..n {
            counts[w.select(&mut rng).index()] += 1;
        }
        let frac = |op: Operation| counts[op.index()] as f64 / n as f64;
        assert!((frac(Operation::ChangeIntensity) - 0.4).abs() < 0.02);
        assert!((frac(Operation::ChangeRatio) - 0.2).abs() < 0.02);
        assert_eq!(counts[Operation::ChangeNoise.index()], 0);
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn test_non_increasing_thresholds_panic() {
        let _ = OperationWeights::new(vec![
            (50.0, Operation::ChangeGain),
            (50.0, Operation::ChangeRatio),
        ]);
    }

    #[test]
    fn test_permutation_visits_every_parameter_once_per_pass() {
        let m = model();
        let layout = ParameterLayout::for_model(&m);
        let noise = m.noise_layout();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let mut selector =
            OperationSelector::new(&OperationSchedule::Permutation, &layout, &noise, true, &mut rng);
        let total = layout.len() + noise.len();
        for _pass in 0..3 {
            let mut params = vec![0usize; layout.len()];
            let mut noises = vec![0usize; noise.len()];
            for _ in 0..total {
                let s = selector.next(&mut rng);
                let i = s.index.unwrap();
                if s.operation == Operation::ChangeNoise {
                    noises[i] += 1;
                } else {
                    assert_eq!(Operation::for_kind(layout.kind(i)), s.operation);
                    params[i] += 1;
                }
            }
            assert!(params.iter().all(|&c| c == 1));
            assert!(noises.iter().all(|&c| c == 1));
        }
    }

    #[test]
    fn test_single_proposal_changes_one_scalar_of_kind() {
        let m = model();
        let layout = ParameterLayout::for_model(&m);
        let (p, s) = (priors(), scales());
        let engine = ProposalEngine::new(&layout, m.noise_layout(), &p, &s);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let c = engine.propose_single(&m, ParameterKind::Intensity, None, None, &mut rng);
        let changed: Vec<usize> = (0..layout.len())
            .filter(|&i| layout.get(&c, i) != layout.get(&m, i))
            .collect();
        assert!(changed.len() <= 1);
        for i in changed {
            assert_eq!(layout.kind(i), ParameterKind::Intensity);
        }
        assert_eq!(c.noise_sigma, m.noise_sigma);
    }

    #[test]
    fn test_single_proposal_out_of_prior_reverts() {
        let m = model();
        let layout = ParameterLayout::for_model(&m);
        let mut p = priors();
        p.gain = Bound::new(0.9, 0.9);
        let s = scales();
        let engine = ProposalEngine::new(&layout, m.noise_layout(), &p, &s);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
        for _ in 0..50 {
            let c = engine.propose_single(&m, ParameterKind::Gain, None, None, &mut rng);
            assert_eq!(c.gain, 0.9);
        }
    }

    #[test]
    fn test_adaptive_single_proposal_stays_inside_prior() {
        let m = model();
        let layout = ParameterLayout::for_model(&m);
        let (p, s) = (priors(), scales());
        let engine = ProposalEngine::new(&layout, m.noise_layout(), &p, &s);
        // Variances far wider than any prior, so most steps leave it.
        let cov = Matrix::from_diagonal(&Vector::from_vec(vec![1e6, 1e12, 1e12, 1e12, 1e8, 1e4]));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(13);
        let mut moved = 0;
        for kind in [
            ParameterKind::LogRatio,
            ParameterKind::Intensity,
            ParameterKind::Baseline,
            ParameterKind::Gain,
        ] {
            for _ in 0..200 {
                let c = engine.propose_single(&m, kind, None, Some(&cov), &mut rng);
                for i in 0..layout.len() {
                    let value = layout.get(&c, i);
                    assert!(
                        p.for_kind(layout.kind(i)).contains(value),
                        "parameter {i} left its prior: {value}"
                    );
                    if value != layout.get(&m, i) {
                        moved += 1;
                    }
                }
            }
        }
        assert!(moved > 0);
    }

    #[test]
    fn test_joint_proposal_clips_per_coordinate() {
        let m = model();
        let layout = ParameterLayout::for_model(&m);
        let (p, s) = (priors(), scales());
        let engine = ProposalEngine::new(&layout, m.noise_layout(), &p, &s);
        // Log ratio jumps past +20, everything else moves a little.
        let step = Vector::from_vec(vec![30.0, 1.0, 1.0, 1.0, 0.5, 0.01]);
        let c = engine.propose_joint(&m, &step);
        assert_eq!(c.log_ratios[0], -2.0);
        assert_eq!(c.knot_intensities, vec![1001.0, 1201.0, 1101.0]);
        assert_eq!(c.baseline_means[0], 50.5);
        assert!((c.gain - 0.91).abs() < 1e-12);
    }

    #[test]
    fn test_noise_proposal_clamps_at_zero() {
        let m = model();
        let layout = ParameterLayout::for_model(&m);
        let (p, s) = (priors(), scales());
        let engine = ProposalEngine::new(&layout, m.noise_layout(), &p, &s);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        for _ in 0..200 {
            let c = engine.propose_noise(&m, Some(1), &mut rng);
            assert!(c.noise_sigma[1] >= 0.0);
            assert_eq!(c.gain, m.gain);
        }
    }
}
