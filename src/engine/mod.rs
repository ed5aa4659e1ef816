//! Chain execution: the iteration loop, its state, and its outcome.

mod outcome;
mod runner;
mod state;

pub use outcome::{ChainDiagnostics, ChainOutcome, Termination};
pub use runner::{invert_block, run_chain};
