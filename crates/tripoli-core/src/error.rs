//! Domain error type.
//!
//! Numerical-library failures are translated into these variants at the
//! point where they occur; callers never see nalgebra or statrs types.

/// Errors produced while building a block dataset, initializing a model,
/// or checking a model against a dataset.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TripoliError {
    /// The block dataset is internally inconsistent.
    #[error("invalid block dataset: {0}")]
    InvalidDataset(String),

    /// A least-squares solve or decomposition needed to start a chain failed.
    #[error("numerical initialization failure: {0}")]
    NumericalInitialization(String),

    /// A vector or matrix had the wrong size for the parameter layout.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Which quantity was checked.
        context: &'static str,
        /// Size implied by the layout.
        expected: usize,
        /// Size actually supplied.
        actual: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TripoliError>;
