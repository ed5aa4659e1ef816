//! Per-iteration machinery of the chain.
//!
//! - **Forward model** (`forward`): predicted readings for a model
//! - **Acceptance** (`acceptance`): misfit, Metropolis rule, temperature, counters
//! - **Proposals** (`proposal`): operation selection and candidate construction
//! - **Convergence** (`convergence`): effective-sample-size target and early exit

pub mod acceptance;
pub mod convergence;
pub mod forward;
pub mod proposal;

pub use acceptance::{
    acceptance_probability, decide, evaluate_misfit, AcceptanceCounters, Decision, Misfit,
    ScoredModel, TemperatureSchedule,
};
pub use convergence::{
    gelman_rubin_statistic, target_effective_sample_size, ConvergenceCheck, ConvergenceCriterion,
};
pub use forward::{ForwardModel, Prediction};
pub use proposal::{OperationSchedule, OperationSelector, OperationWeights, ProposalEngine, Selection};
