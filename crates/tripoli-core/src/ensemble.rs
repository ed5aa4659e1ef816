//! Saved chain states.
//!
//! The ensemble is append-only. A snapshot is taken every `save_interval`
//! iterations from the chain's current state, so for `N` iterations the
//! ensemble holds `N / save_interval` entries unless the chain stops early.

use serde::{Deserialize, Serialize};

use crate::analysis::ScoredModel;

/// Lightweight copy of one saved state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSnapshot {
    /// 1-based iteration at which the state was saved.
    pub iteration: usize,
    pub log_ratios: Vec<f64>,
    pub knot_intensities: Vec<f64>,
    pub baseline_means: Vec<f64>,
    pub gain: f64,
    pub noise_sigma: Vec<f64>,
    /// Weighted misfit of the saved state.
    pub weighted_misfit: f64,
    /// Residual sum of squares of the saved state.
    pub unweighted_misfit: f64,
}

impl EnsembleSnapshot {
    /// Copy the free parameters, noise and misfit of `state`.
    pub fn capture(iteration: usize, state: &ScoredModel) -> Self {
        let model = &state.model;
        Self {
            iteration,
            log_ratios: model.log_ratios.clone(),
            knot_intensities: model.knot_intensities.clone(),
            baseline_means: model.baseline_means.clone(),
            gain: model.gain,
            noise_sigma: model.noise_sigma.clone(),
            weighted_misfit: state.misfit.weighted,
            unweighted_misfit: state.misfit.residual_sum_squares,
        }
    }
}

/// Ordered list of saved states.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    snapshots: Vec<EnsembleSnapshot>,
}

impl Ensemble {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensemble with room for `capacity` snapshots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            snapshots: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, snapshot: EnsembleSnapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> &[EnsembleSnapshot] {
        &self.snapshots
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EnsembleSnapshot> {
        self.snapshots.iter()
    }

    pub fn last(&self) -> Option<&EnsembleSnapshot> {
        self.snapshots.last()
    }

    /// Number of leading snapshots discarded as burn-in.
    pub fn burn_in_count(&self, fraction: f64) -> usize {
        let fraction = fraction.clamp(0.0, 1.0);
        ((self.len() as f64) * fraction).floor() as usize
    }

    /// Snapshots after the burn-in.
    pub fn after_burn_in(&self, fraction: f64) -> &[EnsembleSnapshot] {
        &self.snapshots[self.burn_in_count(fraction)..]
    }
}

impl<'a> IntoIterator for &'a Ensemble {
    type Item = &'a EnsembleSnapshot;
    type IntoIter = std::slice::Iter<'a, EnsembleSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshots.iter()
    }
}
