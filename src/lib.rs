//! # tripoli
//!
//! Bayesian inversion of single-block mass spectrometer isotope-ratio data
//! by adaptive Metropolis Markov chain Monte Carlo.
//!
//! A block holds baseline, Faraday and photomultiplier readings for several
//! isotopes. The chain samples the log ratios to the reference isotope,
//! the knot intensities of the ion beam, the Faraday baselines, the
//! photomultiplier/Faraday gain, and (in hierarchical mode) the noise
//! model, returning a saved ensemble of states.
//!
//! The numerical pieces live in [`tripoli_core`]; this crate adds run
//! configuration, the iteration loop, cancellation, progress logging, the
//! multi-block driver, and JSON output.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tripoli::{invert_block, CancellationToken, ChainConfig, NoopLogger};
//! use tripoli_core::synthetic::SyntheticBlock;
//!
//! let (dataset, _truth) = SyntheticBlock::default().generate()?;
//! let outcome = invert_block(
//!     &dataset,
//!     &ChainConfig::quick(),
//!     &mut NoopLogger,
//!     &CancellationToken::new(),
//! )?;
//!
//! if let Some(summary) = &outcome.summary {
//!     println!("ratio = {:.6}", summary.ratios[0]);
//! }
//! ```
//!
//! ## Progress
//!
//! Any `FnMut(&str) + Send` closure receives a progress line every
//! `10 × save_interval` iterations:
//!
//! ```ignore
//! let mut sink = |line: &str| eprintln!("{line}");
//! invert_block(&dataset, &config, &mut sink, &cancel)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cancel;
mod config;
mod driver;
mod engine;
mod logging;

pub mod output;

pub use cancel::CancellationToken;
pub use config::{ChainConfig, ConvergenceConfig, ProposalMode};
pub use driver::{block_seed, run_blocks, BlockReport};
pub use engine::{invert_block, run_chain, ChainDiagnostics, ChainOutcome, Termination};
pub use logging::{LoggingCallback, NoopLogger, TracingLogger};

pub use tripoli_core;
