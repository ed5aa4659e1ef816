//! What a finished chain hands back.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tripoli_core::analysis::AcceptanceCounters;
use tripoli_core::statistics::PosteriorSummary;
use tripoli_core::types::Operation;
use tripoli_core::{BlockModel, Ensemble};

/// Why the chain stopped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Termination {
    /// The iteration budget was used up.
    Completed,
    /// The convergence statistic fell to the exit threshold.
    Converged {
        /// Statistic at the check that ended the chain.
        statistic: f64,
        /// Exit threshold `sqrt(1 + 1/ESS)`.
        threshold: f64,
    },
    /// The cancellation token was set.
    Cancelled,
}

impl Termination {
    /// Whether the chain stopped before its budget.
    pub fn is_early(&self) -> bool {
        !matches!(self, Termination::Completed)
    }
}

/// Counters gathered over the whole chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDiagnostics {
    /// Iterations run.
    pub iterations: usize,
    /// Accepted and attempted proposals per operation.
    pub acceptance: AcceptanceCounters,
    /// Proposal refreshes skipped because the covariance was not positive definite.
    pub skipped_refreshes: usize,
    /// Candidates rejected because the acceptance probability was NaN.
    pub nan_rejections: usize,
    /// Convergence checks performed.
    pub convergence_checks: usize,
    /// Statistic of the latest convergence check that produced one.
    pub last_statistic: Option<f64>,
    /// Target effective sample size, when the check is enabled.
    pub target_ess: Option<f64>,
    /// Wall time spent in the loop.
    pub elapsed: Duration,
}

impl ChainDiagnostics {
    /// Overall acceptance rate, `None` before any attempt.
    pub fn acceptance_rate(&self) -> Option<f64> {
        let attempted = self.acceptance.total_attempted();
        (attempted > 0).then(|| self.acceptance.total_accepted() as f64 / attempted as f64)
    }

    /// Acceptance rate of one operation.
    pub fn operation_rate(&self, operation: Operation) -> Option<f64> {
        self.acceptance.rate(operation)
    }
}

/// Result of one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainOutcome {
    /// Block the chain inverted.
    pub block_number: usize,
    /// Why the loop ended.
    pub termination: Termination,
    /// Saved states in order.
    pub ensemble: Ensemble,
    /// The chain's state at the last iteration.
    pub final_model: BlockModel,
    /// Lowest weighted misfit model the chain visited.
    pub best_model: BlockModel,
    /// Weighted misfit of `best_model`.
    pub best_misfit: f64,
    /// Posterior summary after burn-in, if any snapshots remain.
    pub summary: Option<PosteriorSummary>,
    /// Loop counters.
    pub diagnostics: ChainDiagnostics,
}

impl ChainOutcome {
    /// Whether the convergence check ended the chain.
    pub fn is_converged(&self) -> bool {
        matches!(self.termination, Termination::Converged { .. })
    }

    /// Whether the chain was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.termination, Termination::Cancelled)
    }
}
