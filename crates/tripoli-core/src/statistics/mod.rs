//! Statistical estimators used around the chain.
//!
//! - Running and windowed covariance of the free parameters, and the
//!   joint-proposal covariance built from them
//! - Curvature-based initial proposal covariance (`C0`)
//! - Online scalar statistics and posterior summaries of the ensemble

mod covariance;
mod curvature;
mod online_stats;
mod summary;

pub use covariance::{symmetrize, CovarianceStrategy, ProposalCovariance, RunningCovariance};
pub use curvature::{curvature_variances, initial_covariance, CurvatureConfig};
pub use online_stats::{OnlineStats, StatsSnapshot};
pub use summary::{summarize, ParameterSummary, PosteriorSummary};
