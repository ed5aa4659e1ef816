//! Constants shared across the inversion.

/// Default deterministic seed for chain RNGs.
///
/// The value `0x7472_6970_6F6C_69` is "tripoli" encoded in ASCII.
pub const DEFAULT_SEED: u64 = 0x7472_6970_6F6C_69;

/// Random-walk Metropolis optimal scaling constant (Gelman, Roberts & Gilks).
///
/// Joint proposals use `OPTIMAL_SCALING² / P` times the running covariance.
pub const OPTIMAL_SCALING: f64 = 2.38;

/// Symmetric prior bound on every log ratio.
pub const LOG_RATIO_LIMIT: f64 = 20.0;

/// Integration time of one on-peak reading in seconds.
///
/// Photomultiplier count rates measured over this interval have variance
/// `rate / REPORT_INTERVAL`, which seeds the signal-dependent noise term.
pub const REPORT_INTERVAL: f64 = 0.1;

/// Weight applied to photomultiplier rows in the non-noise misfit.
pub const BASELINE_WEIGHTING: f64 = 0.1;

/// Upper prior bound on a per-detector noise sigma.
pub const DETECTOR_NOISE_LIMIT: f64 = 1.0e6;

/// Gaussian step for the signal-dependent noise sigmas.
pub const SIGNAL_NOISE_STEP: f64 = 0.5;

/// Gaussian step for the log ratios.
pub const LOG_RATIO_STEP: f64 = 1.0e-4;

/// Gaussian step for the gain.
pub const GAIN_STEP: f64 = 1.0e-3;

/// Default significance level of the convergence target.
pub const CONVERGENCE_ALPHA: f64 = 0.025;

/// Default relative precision of the convergence target.
pub const CONVERGENCE_EPSILON: f64 = 0.025;
