//! Numerical core for single-block isotope-ratio inversion.
//!
//! This crate holds everything the Markov chain needs that is free of I/O:
//! the block dataset, the model structure and its flat parameter layout,
//! the forward model, the Metropolis acceptance rule, the proposal engine,
//! adaptive covariance estimation, and the convergence diagnostic. It also
//! provides a model initializer and a synthetic block generator.
//!
//! The chain loop itself, run configuration, progress logging and the
//! multi-block driver live in the `tripoli` crate.
//!
//! ```ignore
//! use tripoli_core::{
//!     analysis::{ForwardModel, ProposalEngine},
//!     init::{initialize_model, InitConfig},
//!     linalg::NalgebraBackend,
//!     synthetic::SyntheticBlock,
//! };
//! ```

pub mod analysis;
pub mod constants;
pub mod data;
pub mod ensemble;
pub mod error;
pub mod init;
pub mod linalg;
pub mod model;
pub mod statistics;
pub mod synthetic;
pub mod types;

// Re-export commonly used items at crate root
pub use data::{BlockDataSet, DetectorReadings, Reading};
pub use ensemble::{Ensemble, EnsembleSnapshot};
pub use error::{Result, TripoliError};
pub use init::{initialize_model, InitConfig, InitialModel};
pub use linalg::{LinearAlgebra, NalgebraBackend};
pub use model::{BlockModel, Bound, NoiseLayout, ParameterLayout, PriorBounds, ProposalScales};
pub use types::{Matrix, Operation, ParameterKind, RowKind, Vector};
