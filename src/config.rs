//! Configuration of one Markov chain.

use serde::{Deserialize, Serialize};

use tripoli_core::analysis::{OperationSchedule, OperationWeights, TemperatureSchedule};
use tripoli_core::constants::{
    BASELINE_WEIGHTING, CONVERGENCE_ALPHA, CONVERGENCE_EPSILON, DEFAULT_SEED, OPTIMAL_SCALING,
};
use tripoli_core::statistics::CovarianceStrategy;
use tripoli_core::types::Operation;
use tripoli_core::InitConfig;

/// Which proposal regime non-noise operations use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalMode {
    /// Perturb one scalar of the selected kind.
    Single,
    /// Perturb every free parameter with one draw from the proposal
    /// covariance. The selected operation only labels the attempt.
    Joint,
    /// Single-parameter proposals up to `switch_at` iterations, joint after.
    SingleThenJoint {
        /// Last iteration that uses single-parameter proposals.
        switch_at: usize,
    },
}

impl ProposalMode {
    /// Whether 1-based `iteration` uses the joint regime.
    pub fn is_joint(&self, iteration: usize) -> bool {
        match *self {
            ProposalMode::Single => false,
            ProposalMode::Joint => true,
            ProposalMode::SingleThenJoint { switch_at } => iteration > switch_at,
        }
    }
}

/// Settings of the early-exit convergence check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    /// Significance level of the effective-sample-size target.
    pub alpha: f64,
    /// Relative precision of the effective-sample-size target.
    pub epsilon: f64,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            alpha: CONVERGENCE_ALPHA,
            epsilon: CONVERGENCE_EPSILON,
        }
    }
}

/// Configuration of one chain.
///
/// Builder methods validate their argument and panic with a message naming
/// the field; [`ChainConfig::validate`] checks a struct built by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    // =========================================================================
    // Budget and cadence
    // =========================================================================
    /// Iteration budget. Default: 100,000.
    pub max_iterations: usize,

    /// A snapshot is saved every this many iterations. Default: 10.
    pub save_interval: usize,

    /// Progress snippets are emitted every `progress_every` saves. Default: 10.
    pub progress_every: usize,

    // =========================================================================
    // Proposals
    // =========================================================================
    /// How each iteration's operation is chosen.
    pub operation_schedule: OperationSchedule,

    /// Enables noise updates. Default: false.
    pub hierarchical: bool,

    /// Single-parameter or joint proposals. Default: joint.
    pub proposal_mode: ProposalMode,

    /// Iteration after which single-parameter steps come from the proposal
    /// covariance diagonal. `None` means `2P`.
    pub adaptive_start: Option<usize>,

    /// How the running covariance is maintained. Default: incremental.
    pub covariance_strategy: CovarianceStrategy,

    /// The proposal covariance is rebuilt every this many saves. Default: 1.
    pub proposal_refresh_interval: usize,

    /// Weight `β` of `C0` in the blended proposal covariance. Default: 0.05.
    pub blend_weight: f64,

    /// Optimal-scaling constant `s` in `s²/P`. Default: 2.38.
    pub optimal_scaling: f64,

    // =========================================================================
    // Acceptance
    // =========================================================================
    /// Weight of photomultiplier rows in the non-noise misfit. Default: 0.1.
    pub baseline_weighting: f64,

    /// Temperature applied to non-noise misfit differences.
    pub temperature: TemperatureSchedule,

    // =========================================================================
    // Termination and reporting
    // =========================================================================
    /// Early-exit check; `None` always runs to the budget.
    pub convergence: Option<ConvergenceConfig>,

    /// Leading fraction of the ensemble dropped from the summary. Default: 0.1.
    pub burn_in_fraction: f64,

    /// Chain random seed.
    pub seed: u64,

    /// Initializer settings used by [`crate::invert_block`] and the driver.
    #[serde(skip)]
    pub init: InitConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100_000,
            save_interval: 10,
            progress_every: 10,

            operation_schedule: OperationSchedule::Weighted(OperationWeights::default()),
            hierarchical: false,
            proposal_mode: ProposalMode::Joint,
            adaptive_start: None,
            covariance_strategy: CovarianceStrategy::Incremental,
            proposal_refresh_interval: 1,
            blend_weight: 0.05,
            optimal_scaling: OPTIMAL_SCALING,

            baseline_weighting: BASELINE_WEIGHTING,
            temperature: TemperatureSchedule::default(),

            convergence: Some(ConvergenceConfig::default()),
            burn_in_fraction: 0.1,
            seed: DEFAULT_SEED,
            init: InitConfig::default(),
        }
    }
}

impl ChainConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Short chains for development and tests:
    /// - 20,000 iterations
    /// - no convergence check
    pub fn quick() -> Self {
        Self {
            max_iterations: 20_000,
            convergence: None,
            ..Default::default()
        }
    }

    /// Long chains for final results:
    /// - 1,000,000 iterations
    /// - annealed start
    pub fn thorough() -> Self {
        Self {
            max_iterations: 1_000_000,
            temperature: TemperatureSchedule::annealed(),
            ..Default::default()
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Set the iteration budget.
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        assert!(iterations > 0, "max_iterations must be > 0");
        self.max_iterations = iterations;
        self
    }

    /// Set the save interval.
    pub fn save_interval(mut self, interval: usize) -> Self {
        assert!(interval > 0, "save_interval must be > 0");
        self.save_interval = interval;
        self
    }

    /// Set how many saves separate two progress snippets.
    pub fn progress_every(mut self, saves: usize) -> Self {
        assert!(saves > 0, "progress_every must be > 0");
        self.progress_every = saves;
        self
    }

    /// Set the operation schedule.
    pub fn operation_schedule(mut self, schedule: OperationSchedule) -> Self {
        self.operation_schedule = schedule;
        self
    }

    /// Use custom cumulative operation thresholds.
    pub fn operation_weights(mut self, weights: OperationWeights) -> Self {
        self.operation_schedule = OperationSchedule::Weighted(weights);
        self
    }

    /// Enable or disable noise updates.
    ///
    /// Switching a weighted schedule that is still on one of the standard
    /// threshold sets moves it to the matching set for the new mode.
    pub fn hierarchical(mut self, enabled: bool) -> Self {
        self.hierarchical = enabled;
        if let OperationSchedule::Weighted(weights) = &self.operation_schedule {
            if enabled && *weights == OperationWeights::standard() {
                self.operation_schedule = OperationSchedule::Weighted(OperationWeights::hierarchical());
            } else if !enabled && *weights == OperationWeights::hierarchical() {
                self.operation_schedule = OperationSchedule::Weighted(OperationWeights::standard());
            }
        }
        self
    }

    /// Set the proposal regime.
    pub fn proposal_mode(mut self, mode: ProposalMode) -> Self {
        self.proposal_mode = mode;
        self
    }

    /// Set the adaptive-phase start for single-parameter proposals.
    pub fn adaptive_start(mut self, iteration: usize) -> Self {
        self.adaptive_start = Some(iteration);
        self
    }

    /// Set the covariance strategy.
    pub fn covariance_strategy(mut self, strategy: CovarianceStrategy) -> Self {
        self.covariance_strategy = strategy;
        self
    }

    /// Set how many saves separate two proposal refreshes.
    pub fn proposal_refresh_interval(mut self, saves: usize) -> Self {
        assert!(saves > 0, "proposal_refresh_interval must be > 0");
        self.proposal_refresh_interval = saves;
        self
    }

    /// Set the weight of `C0` in the blended proposal; 0 disables blending.
    pub fn blend_weight(mut self, weight: f64) -> Self {
        assert!((0.0..1.0).contains(&weight), "blend_weight must be in [0, 1)");
        self.blend_weight = weight;
        self
    }

    /// Set the optimal-scaling constant.
    pub fn optimal_scaling(mut self, scaling: f64) -> Self {
        assert!(scaling > 0.0 && scaling.is_finite(), "optimal_scaling must be > 0");
        self.optimal_scaling = scaling;
        self
    }

    /// Set the photomultiplier row weight.
    pub fn baseline_weighting(mut self, weight: f64) -> Self {
        assert!(weight > 0.0 && weight.is_finite(), "baseline_weighting must be > 0");
        self.baseline_weighting = weight;
        self
    }

    /// Set the temperature schedule.
    pub fn temperature(mut self, schedule: TemperatureSchedule) -> Self {
        if let TemperatureSchedule::Constant(t) = schedule {
            assert!(t > 0.0 && t.is_finite(), "temperature must be > 0");
        }
        if let TemperatureSchedule::Annealed { start, .. } = schedule {
            assert!(start >= 1.0 && start.is_finite(), "annealing start must be >= 1");
        }
        self.temperature = schedule;
        self
    }

    /// Enable the convergence check with the given settings.
    pub fn convergence(mut self, convergence: ConvergenceConfig) -> Self {
        assert!(
            convergence.alpha > 0.0 && convergence.alpha < 1.0,
            "convergence alpha must be in (0, 1)"
        );
        assert!(convergence.epsilon > 0.0, "convergence epsilon must be > 0");
        self.convergence = Some(convergence);
        self
    }

    /// Disable the convergence check.
    pub fn without_convergence(mut self) -> Self {
        self.convergence = None;
        self
    }

    /// Set the burn-in fraction used by the summary.
    pub fn burn_in_fraction(mut self, fraction: f64) -> Self {
        assert!((0.0..1.0).contains(&fraction), "burn_in_fraction must be in [0, 1)");
        self.burn_in_fraction = fraction;
        self
    }

    /// Set the chain seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the initializer settings.
    pub fn init(mut self, init: InitConfig) -> Self {
        self.init = init;
        self
    }

    // =========================================================================
    // Resolution and validation
    // =========================================================================

    /// Iteration after which single-parameter steps turn adaptive.
    pub fn resolve_adaptive_start(&self, parameter_count: usize) -> usize {
        self.adaptive_start.unwrap_or(2 * parameter_count)
    }

    /// Expected ensemble length when the chain runs to its budget.
    pub fn expected_saves(&self) -> usize {
        self.max_iterations / self.save_interval
    }

    /// Check a configuration that may have been built field by field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_iterations == 0 {
            return Err("max_iterations must be > 0".to_string());
        }
        if self.save_interval == 0 {
            return Err("save_interval must be > 0".to_string());
        }
        if self.progress_every == 0 {
            return Err("progress_every must be > 0".to_string());
        }
        if self.proposal_refresh_interval == 0 {
            return Err("proposal_refresh_interval must be > 0".to_string());
        }
        if !(0.0..1.0).contains(&self.blend_weight) {
            return Err("blend_weight must be in [0, 1)".to_string());
        }
        if !(0.0..1.0).contains(&self.burn_in_fraction) {
            return Err("burn_in_fraction must be in [0, 1)".to_string());
        }
        if let OperationSchedule::Weighted(weights) = &self.operation_schedule {
            if weights.includes(Operation::ChangeNoise) && !self.hierarchical {
                return Err("noise operations require hierarchical mode".to_string());
            }
        }
        Ok(())
    }
}
