//! Mutable state of one running chain.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use tripoli_core::analysis::{AcceptanceCounters, Decision, ScoredModel};
use tripoli_core::statistics::{ProposalCovariance, RunningCovariance};
use tripoli_core::types::{Operation, Vector};
use tripoli_core::{Ensemble, EnsembleSnapshot, ParameterLayout};

/// Everything the loop carries from one iteration to the next.
///
/// Owned by exactly one chain; nothing here is shared.
pub(crate) struct ChainState {
    /// Current accepted model with its prediction and misfit.
    pub current: ScoredModel,
    /// Lowest weighted misfit state seen so far, the starting state included.
    pub best: ScoredModel,
    pub running: RunningCovariance,
    pub proposal: ProposalCovariance,
    pub ensemble: Ensemble,
    /// Flat parameters of every saved snapshot, kept beside the ensemble
    /// for the covariance window and the convergence check.
    saved_parameters: Vec<Vector>,
    /// Counters over the whole chain.
    pub totals: AcceptanceCounters,
    /// Counters since the last progress snippet.
    pub window: AcceptanceCounters,
    pub nan_rejections: usize,
    pub convergence_checks: usize,
    pub last_statistic: Option<f64>,
    start_time: Instant,
}

impl ChainState {
    pub fn new(
        current: ScoredModel,
        parameter_count: usize,
        proposal: ProposalCovariance,
        expected_saves: usize,
    ) -> Self {
        Self {
            best: current.clone(),
            current,
            running: RunningCovariance::new(parameter_count),
            proposal,
            ensemble: Ensemble::with_capacity(expected_saves),
            saved_parameters: Vec::with_capacity(expected_saves),
            totals: AcceptanceCounters::new(),
            window: AcceptanceCounters::new(),
            nan_rejections: 0,
            convergence_checks: 0,
            last_statistic: None,
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Count one Metropolis test; returns whether the candidate was accepted.
    pub fn record(&mut self, operation: Operation, decision: Decision) -> bool {
        let accepted = decision.is_accepted();
        self.totals.record(operation, accepted);
        self.window.record(operation, accepted);
        if decision == Decision::RejectedNonFinite {
            self.nan_rejections += 1;
        }
        accepted
    }

    /// Make `candidate` the current state, keeping it as the best state if
    /// its weighted misfit is strictly lower.
    pub fn accept(&mut self, candidate: ScoredModel) {
        if candidate.misfit.weighted < self.best.misfit.weighted {
            self.best = candidate.clone();
        }
        self.current = candidate;
    }

    /// Append the current state to the ensemble.
    pub fn save(&mut self, iteration: usize, layout: &ParameterLayout) {
        self.ensemble
            .push(EnsembleSnapshot::capture(iteration, &self.current));
        self.saved_parameters.push(layout.pack(&self.current.model));
    }

    pub fn saved_parameters(&self) -> &[Vector] {
        &self.saved_parameters
    }

    /// Progress line for `iteration`; resets the window counters.
    pub fn progress_snippet(&mut self, iteration: usize, max_iterations: usize) -> String {
        let mut line = format!(
            "iteration {iteration}/{max_iterations} | {:.2} s | RMS {:.6e}",
            self.elapsed().as_secs_f64(),
            self.current.rms_error()
        );
        for op in Operation::ALL {
            let attempted = self.window.attempted(op);
            if attempted == 0 {
                continue;
            }
            let accepted = self.window.accepted(op);
            let _ = write!(
                line,
                " | {} {accepted}/{attempted} ({:.1}%)",
                op.label(),
                100.0 * accepted as f64 / attempted as f64
            );
        }
        self.window.reset();
        line
    }
}
