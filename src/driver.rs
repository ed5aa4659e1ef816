//! Multi-block driver.
//!
//! Every block runs its own initializer and chain with its own seed. With
//! the `parallel` feature the blocks run on the rayon pool; a block that
//! fails is reported and the rest carry on.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{error, info};

use tripoli_core::{BlockDataSet, TripoliError};

use crate::cancel::CancellationToken;
use crate::config::ChainConfig;
use crate::engine::{invert_block, ChainOutcome};
use crate::logging::TracingLogger;

/// Seed of the chain at `index`, mixed from the run's base seed.
///
/// SplitMix64 finalizer over `base + index·golden`, so neighbouring
/// indices give uncorrelated streams.
pub fn block_seed(base: u64, index: u64) -> u64 {
    let mut z = base.wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Per-block result of a multi-block run.
#[derive(Debug, Clone)]
pub enum BlockReport {
    /// The chain ran (to completion, convergence, or cancellation).
    Completed(Box<ChainOutcome>),
    /// The block could not be started.
    Failed {
        /// Block number of the failed dataset.
        block_number: usize,
        /// Why it failed.
        error: TripoliError,
    },
}

impl BlockReport {
    /// Block number the report belongs to.
    pub fn block_number(&self) -> usize {
        match self {
            BlockReport::Completed(outcome) => outcome.block_number,
            BlockReport::Failed { block_number, .. } => *block_number,
        }
    }

    /// The chain outcome, if the block ran.
    pub fn outcome(&self) -> Option<&ChainOutcome> {
        match self {
            BlockReport::Completed(outcome) => Some(outcome.as_ref()),
            BlockReport::Failed { .. } => None,
        }
    }

    /// Whether the block failed to start.
    pub fn is_failed(&self) -> bool {
        matches!(self, BlockReport::Failed { .. })
    }
}

fn run_one(
    index: usize,
    dataset: &BlockDataSet,
    config: &ChainConfig,
    cancel: &CancellationToken,
) -> BlockReport {
    let block_config = config.clone().seed(block_seed(config.seed, index as u64));
    let mut logger = TracingLogger {
        block: dataset.block_number(),
    };
    match invert_block(dataset, &block_config, &mut logger, cancel) {
        Ok(outcome) => BlockReport::Completed(Box::new(outcome)),
        Err(err) => {
            error!(block = dataset.block_number(), %err, "block skipped");
            BlockReport::Failed {
                block_number: dataset.block_number(),
                error: err,
            }
        }
    }
}

/// Run every block, returning one report per block in input order.
pub fn run_blocks(
    datasets: &[BlockDataSet],
    config: &ChainConfig,
    cancel: &CancellationToken,
) -> Vec<BlockReport> {
    info!(blocks = datasets.len(), "starting multi-block run");

    #[cfg(feature = "parallel")]
    let reports: Vec<BlockReport> = datasets
        .par_iter()
        .enumerate()
        .map(|(i, d)| run_one(i, d, config, cancel))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let reports: Vec<BlockReport> = datasets
        .iter()
        .enumerate()
        .map(|(i, d)| run_one(i, d, config, cancel))
        .collect();

    let failed = reports.iter().filter(|r| r.is_failed()).count();
    info!(blocks = reports.len(), failed, "multi-block run finished");
    reports
}
