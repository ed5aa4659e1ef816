//! Ensemble cache and JSON output.

use tripoli::output::{
    read_ensemble_cache, to_json, to_json_pretty, write_ensemble_cache, OutputError,
    ENSEMBLE_CACHE_FILE,
};
use tripoli::{invert_block, CancellationToken, ChainConfig, ChainOutcome, NoopLogger};
use tripoli_core::synthetic::SyntheticBlock;
use tripoli_core::InitConfig;

fn short_outcome() -> ChainOutcome {
    let (data, _) = SyntheticBlock::default().block_number(4).generate().unwrap();
    let config = ChainConfig::quick()
        .max_iterations(1_000)
        .init(InitConfig::default().estimate_curvature(false));
    invert_block(&data, &config, &mut NoopLogger, &CancellationToken::new()).unwrap()
}

// =============================================================================
// ENSEMBLE CACHE
// =============================================================================

#[test]
fn cache_round_trips_through_fixed_file_name() {
    let outcome = short_outcome();
    let dir = tempfile::tempdir().unwrap();

    let path = write_ensemble_cache(&outcome.ensemble, dir.path()).unwrap();
    assert_eq!(path, dir.path().join(ENSEMBLE_CACHE_FILE));
    assert!(path.exists());

    let restored = read_ensemble_cache(dir.path()).unwrap();
    assert_eq!(restored.len(), 100);
    assert_eq!(restored, outcome.ensemble);
}

#[test]
fn second_write_replaces_first() {
    let outcome = short_outcome();
    let dir = tempfile::tempdir().unwrap();

    write_ensemble_cache(&outcome.ensemble, dir.path()).unwrap();
    write_ensemble_cache(&tripoli_core::Ensemble::new(), dir.path()).unwrap();

    let restored = read_ensemble_cache(dir.path()).unwrap();
    assert!(restored.is_empty());
}

#[test]
fn corrupt_cache_is_serialization_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(ENSEMBLE_CACHE_FILE), "{ not json").unwrap();

    let err = read_ensemble_cache(dir.path()).unwrap_err();
    assert!(matches!(err, OutputError::Serialization(_)));
}

// =============================================================================
// OUTCOME JSON
// =============================================================================

#[test]
fn outcome_json_carries_block_and_summary() {
    let outcome = short_outcome();

    let json = to_json(&outcome).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["block_number"], 4);
    assert_eq!(value["termination"], "Completed");
    assert!(value["summary"]["log_ratios"].is_array());
    assert_eq!(value["diagnostics"]["iterations"], 1_000);
    assert!(value["best_model"]["log_ratios"].is_array());
    assert!(value["best_misfit"].is_number());

    let pretty = to_json_pretty(&outcome).unwrap();
    let back: ChainOutcome = serde_json::from_str(&pretty).unwrap();
    assert_eq!(back.ensemble, outcome.ensemble);
    assert_eq!(back.best_model, outcome.best_model);
}

// =============================================================================
// LOGGING
// =============================================================================

#[test]
fn chain_runs_under_a_tracing_subscriber() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("tripoli=debug"))
        .with_test_writer()
        .finish();

    let outcome = tracing::subscriber::with_default(subscriber, short_outcome);
    assert_eq!(outcome.ensemble.len(), 100);
}
