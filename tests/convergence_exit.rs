//! Early exit on the convergence statistic.
//!
//! A small block (one ratio, three knots, one baseline, gain) saved every
//! iteration reaches the effective-sample-size check well inside the
//! budget; the chain must stop there rather than run to the end.

use tripoli::{invert_block, CancellationToken, ChainConfig, ConvergenceConfig, NoopLogger, Termination};
use tripoli_core::analysis::target_effective_sample_size;
use tripoli_core::synthetic::SyntheticBlock;

// =============================================================================
// TARGET EFFECTIVE SAMPLE SIZE
// =============================================================================

#[test]
fn target_ess_is_in_expected_range() {
    let config = ConvergenceConfig::default();
    for p in [6, 10, 14] {
        let ess = target_effective_sample_size(p, config.alpha, config.epsilon);
        assert!(ess > 1.0e4 && ess < 1.0e5, "P = {p}: ESS {ess}");
    }
}

// =============================================================================
// EARLY EXIT
// =============================================================================

#[test]
fn small_block_converges_before_budget() {
    let (data, _) = SyntheticBlock::default().cycles(2).generate().unwrap();
    let max_iterations = 300_000;
    let config = ChainConfig::new()
        .max_iterations(max_iterations)
        .save_interval(1)
        .progress_every(10_000);

    let outcome = invert_block(&data, &config, &mut NoopLogger, &CancellationToken::new()).unwrap();

    match outcome.termination {
        Termination::Converged {
            statistic,
            threshold,
        } => {
            assert!(statistic <= threshold);
            assert!(threshold > 1.0);
        }
        other => panic!("expected convergence, got {other:?}"),
    }
    let diag = &outcome.diagnostics;
    assert!(diag.iterations < max_iterations);
    assert!(diag.convergence_checks >= 1);

    // Checks only happen at perfect-square ensemble sizes past the target.
    let saved = outcome.ensemble.len();
    let root = (saved as f64).sqrt().round() as usize;
    assert_eq!(root * root, saved);
    let target = diag.target_ess.unwrap();
    assert!(saved as f64 >= target);
}

#[test]
fn near_noiseless_block_converges_at_first_checks() {
    let (data, _) = SyntheticBlock::default().noise_scale(1e-3).generate().unwrap();
    let config = ChainConfig::new();
    let max_iterations = config.max_iterations;

    let outcome = invert_block(&data, &config, &mut NoopLogger, &CancellationToken::new()).unwrap();

    assert!(
        outcome.is_converged(),
        "expected convergence, got {:?}",
        outcome.termination
    );
    let diag = &outcome.diagnostics;
    assert!(diag.iterations < max_iterations);
    assert_eq!(diag.iterations, outcome.ensemble.len() * config.save_interval);

    let saved = outcome.ensemble.len();
    let root = (saved as f64).sqrt().round() as usize;
    assert_eq!(root * root, saved);
    assert!(saved as f64 >= diag.target_ess.unwrap() / config.save_interval as f64);
}

#[test]
fn disabled_check_runs_to_budget() {
    let (data, _) = SyntheticBlock::default().cycles(2).generate().unwrap();
    let config = ChainConfig::quick().max_iterations(5_000).save_interval(1);

    let outcome = invert_block(&data, &config, &mut NoopLogger, &CancellationToken::new()).unwrap();

    assert_eq!(outcome.termination, Termination::Completed);
    assert_eq!(outcome.diagnostics.convergence_checks, 0);
    assert!(outcome.diagnostics.target_ess.is_none());
    assert_eq!(outcome.ensemble.len(), 5_000);
}
