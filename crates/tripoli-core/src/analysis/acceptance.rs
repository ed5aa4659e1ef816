//! Misfit, Metropolis acceptance rule, temperature schedule and counters.
//!
//! Non-noise operations compare the weighted misfit
//! `E = Σ w·r²/Dsig` (photomultiplier rows weighted by the baseline
//! weighting multiplier) scaled by the current temperature:
//!
//! ```text
//! accept = min(1, exp(−(E_cand − E_cur) / (2T)))
//! ```
//!
//! Noise operations change `Dsig` itself, so they use the unweighted
//! normalized misfit and the log-determinant term `Σ −ln Dsig`:
//!
//! ```text
//! accept = min(1, exp(Δlogdet/2 − ΔE/2))
//! ```
//!
//! A probability that is not a number (for example from a zero data
//! variance) is an automatic rejection and is reported separately.

use serde::{Deserialize, Serialize};

use super::forward::{ForwardModel, Prediction};
use crate::linalg::LinearAlgebra;
use crate::model::BlockModel;
use crate::types::{Operation, RowKind};

/// Misfit terms of one model against the data.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Misfit {
    /// `Σ w·r²/Dsig`, `w` = baseline weighting on photomultiplier rows, else 1.
    pub weighted: f64,
    /// `Σ r²/Dsig`.
    pub normalized: f64,
    /// `Σ r²`.
    pub residual_sum_squares: f64,
    /// `Σ −ln Dsig`.
    pub log_det: f64,
}

/// Sum the misfit terms over every row.
pub fn evaluate_misfit(
    observed: &[f64],
    predicted: &[f64],
    variance: &[f64],
    kinds: &[RowKind],
    baseline_weighting: f64,
) -> Misfit {
    let mut misfit = Misfit::default();
    for row in 0..observed.len() {
        let r = observed[row] - predicted[row];
        let r2 = r * r;
        let scaled = r2 / variance[row];
        let weight = match kinds[row] {
            RowKind::Photomultiplier => baseline_weighting,
            RowKind::Baseline | RowKind::Faraday => 1.0,
        };
        misfit.weighted += weight * scaled;
        misfit.normalized += scaled;
        misfit.residual_sum_squares += r2;
        misfit.log_det -= variance[row].ln();
    }
    misfit
}

/// A model together with everything derived from it.
///
/// This is the chain's current state: replaced wholesale on acceptance.
#[derive(Debug, Clone)]
pub struct ScoredModel {
    pub model: BlockModel,
    pub prediction: Prediction,
    pub variance: Vec<f64>,
    pub misfit: Misfit,
}

impl ScoredModel {
    /// Run the forward model and score `model` against the data.
    pub fn score<L>(
        forward: &ForwardModel<'_>,
        model: BlockModel,
        baseline_weighting: f64,
        linalg: &L,
    ) -> Self
    where
        L: LinearAlgebra + ?Sized,
    {
        let prediction = forward.evaluate(&model, linalg);
        let variance = forward.data_variance(&model, &prediction);
        let data = forward.dataset();
        let misfit = evaluate_misfit(
            data.intensities(),
            &prediction.predicted,
            &variance,
            data.row_kinds(),
            baseline_weighting,
        );
        Self {
            model,
            prediction,
            variance,
            misfit,
        }
    }

    /// Root-mean-square residual, `sqrt(Σ r² / rows)`.
    pub fn rms_error(&self) -> f64 {
        let n = self.prediction.predicted.len().max(1) as f64;
        (self.misfit.residual_sum_squares / n).sqrt()
    }
}

/// Metropolis acceptance probability of moving from `current` to `candidate`.
///
/// Returns NaN when the misfit terms are not comparable; [`decide`]
/// treats that as a rejection.
pub fn acceptance_probability(
    operation: Operation,
    current: &Misfit,
    candidate: &Misfit,
    temperature: f64,
) -> f64 {
    let exponent = match operation {
        Operation::ChangeNoise => {
            let delta_e = candidate.normalized - current.normalized;
            let delta_log_det = candidate.log_det - current.log_det;
            delta_log_det / 2.0 - delta_e / 2.0
        }
        _ => {
            let delta_e = (candidate.weighted - current.weighted) / temperature;
            -delta_e / 2.0
        }
    };
    if exponent.is_nan() {
        return f64::NAN;
    }
    exponent.exp().min(1.0)
}

/// Outcome of one Metropolis test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Accepted,
    Rejected,
    /// The acceptance probability was NaN.
    RejectedNonFinite,
}

impl Decision {
    /// Whether the candidate becomes the current state.
    pub fn is_accepted(self) -> bool {
        matches!(self, Decision::Accepted)
    }
}

/// Accept iff `uniform ≤ probability`; a zero probability never accepts.
pub fn decide(probability: f64, uniform: f64) -> Decision {
    if probability.is_nan() {
        Decision::RejectedNonFinite
    } else if probability > 0.0 && uniform <= probability {
        Decision::Accepted
    } else {
        Decision::Rejected
    }
}

/// Temperature applied to non-noise misfit differences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TemperatureSchedule {
    /// Fixed temperature.
    Constant(f64),
    /// Linear ramp from `start` down to 1 over the first `iterations`
    /// iterations, then 1.
    Annealed { start: f64, iterations: usize },
}

impl Default for TemperatureSchedule {
    fn default() -> Self {
        TemperatureSchedule::Constant(1.0)
    }
}

impl TemperatureSchedule {
    /// The standard annealing ramp: 5 → 1 over 10,000 iterations.
    pub fn annealed() -> Self {
        TemperatureSchedule::Annealed {
            start: 5.0,
            iterations: 10_000,
        }
    }

    /// Temperature at 1-based `iteration`.
    pub fn temperature(&self, iteration: usize) -> f64 {
        match *self {
            TemperatureSchedule::Constant(t) => t,
            TemperatureSchedule::Annealed { start, iterations } => {
                if iterations <= 1 || iteration > iterations {
                    return 1.0;
                }
                let frac = iteration.saturating_sub(1) as f64 / (iterations - 1) as f64;
                start + (1.0 - start) * frac
            }
        }
    }
}

/// Accepted and attempted proposals per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceCounters {
    accepted: [u64; 5],
    attempted: [u64; 5],
}

impl AcceptanceCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one attempt of `operation`.
    pub fn record(&mut self, operation: Operation, accepted: bool) {
        let i = operation.index();
        self.attempted[i] += 1;
        if accepted {
            self.accepted[i] += 1;
        }
    }

    pub fn accepted(&self, operation: Operation) -> u64 {
        self.accepted[operation.index()]
    }

    pub fn attempted(&self, operation: Operation) -> u64 {
        self.attempted[operation.index()]
    }

    /// Acceptance rate of `operation`, `None` if never attempted.
    pub fn rate(&self, operation: Operation) -> Option<f64> {
        let attempted = self.attempted(operation);
        (attempted > 0).then(|| self.accepted(operation) as f64 / attempted as f64)
    }

    /// Attempts across all operations.
    pub fn total_attempted(&self) -> u64 {
        self.attempted.iter().sum()
    }

    /// Acceptances across all operations.
    pub fn total_accepted(&self) -> u64 {
        self.accepted.iter().sum()
    }

    /// Add another set of counters to this one.
    pub fn merge(&mut self, other: &Self) {
        for i in 0..5 {
            self.accepted[i] += other.accepted[i];
            self.attempted[i] += other.attempted[i];
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
