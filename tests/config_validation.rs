//! Tests for configuration validation.
//!
//! Invalid values are rejected by the builder methods with a panic
//! message naming the field.

use tripoli_core::analysis::{OperationWeights, TemperatureSchedule};
use tripoli_core::types::Operation;
use tripoli_core::InitConfig;
use tripoli::{ChainConfig, ConvergenceConfig};

// =============================================================================
// BUDGET AND CADENCE
// =============================================================================

#[test]
#[should_panic(expected = "max_iterations must be > 0")]
fn max_iterations_zero_panics() {
    let _ = ChainConfig::new().max_iterations(0);
}

#[test]
fn max_iterations_one_valid() {
    let config = ChainConfig::new().max_iterations(1);
    assert_eq!(config.max_iterations, 1);
    assert_eq!(config.expected_saves(), 0);
}

#[test]
#[should_panic(expected = "save_interval must be > 0")]
fn save_interval_zero_panics() {
    let _ = ChainConfig::new().save_interval(0);
}

#[test]
#[should_panic(expected = "progress_every must be > 0")]
fn progress_every_zero_panics() {
    let _ = ChainConfig::new().progress_every(0);
}

#[test]
#[should_panic(expected = "proposal_refresh_interval must be > 0")]
fn refresh_interval_zero_panics() {
    let _ = ChainConfig::new().proposal_refresh_interval(0);
}

// =============================================================================
// PROPOSAL SETTINGS
// =============================================================================

#[test]
fn blend_weight_zero_disables_blending() {
    let config = ChainConfig::new().blend_weight(0.0);
    assert_eq!(config.blend_weight, 0.0);
}

#[test]
#[should_panic(expected = "blend_weight must be in [0, 1)")]
fn blend_weight_one_panics() {
    let _ = ChainConfig::new().blend_weight(1.0);
}

#[test]
#[should_panic(expected = "blend_weight must be in [0, 1)")]
fn blend_weight_negative_panics() {
    let _ = ChainConfig::new().blend_weight(-0.1);
}

#[test]
#[should_panic(expected = "optimal_scaling must be > 0")]
fn optimal_scaling_zero_panics() {
    let _ = ChainConfig::new().optimal_scaling(0.0);
}

#[test]
#[should_panic(expected = "operation weights must not be empty")]
fn empty_operation_weights_panic() {
    let _ = OperationWeights::new(vec![]);
}

#[test]
#[should_panic(expected = "operation thresholds must be finite and strictly increasing")]
fn decreasing_operation_weights_panic() {
    let _ = OperationWeights::new(vec![
        (50.0, Operation::ChangeRatio),
        (40.0, Operation::ChangeGain),
    ]);
}

#[test]
fn custom_weights_are_kept() {
    let weights = OperationWeights::new(vec![
        (10.0, Operation::ChangeRatio),
        (20.0, Operation::ChangeIntensity),
    ]);
    let config = ChainConfig::new().operation_weights(weights);
    assert!(config.validate().is_ok());
}

#[test]
fn noise_weights_require_hierarchical() {
    let mut config = ChainConfig::new();
    config.operation_schedule =
        tripoli_core::analysis::OperationSchedule::Weighted(OperationWeights::hierarchical());
    assert!(config.validate().is_err());
    config.hierarchical = true;
    assert!(config.validate().is_ok());
}

// =============================================================================
// ACCEPTANCE SETTINGS
// =============================================================================

#[test]
#[should_panic(expected = "baseline_weighting must be > 0")]
fn baseline_weighting_zero_panics() {
    let _ = ChainConfig::new().baseline_weighting(0.0);
}

#[test]
#[should_panic(expected = "temperature must be > 0")]
fn zero_temperature_panics() {
    let _ = ChainConfig::new().temperature(TemperatureSchedule::Constant(0.0));
}

#[test]
#[should_panic(expected = "annealing start must be >= 1")]
fn cold_annealing_start_panics() {
    let _ = ChainConfig::new().temperature(TemperatureSchedule::Annealed {
        start: 0.5,
        iterations: 100,
    });
}

// =============================================================================
// CONVERGENCE AND SUMMARY
// =============================================================================

#[test]
#[should_panic(expected = "convergence alpha must be in (0, 1)")]
fn convergence_alpha_zero_panics() {
    let _ = ChainConfig::new().convergence(ConvergenceConfig {
        alpha: 0.0,
        epsilon: 0.025,
    });
}

#[test]
#[should_panic(expected = "convergence epsilon must be > 0")]
fn convergence_epsilon_zero_panics() {
    let _ = ChainConfig::new().convergence(ConvergenceConfig {
        alpha: 0.025,
        epsilon: 0.0,
    });
}

#[test]
fn convergence_can_be_disabled() {
    let config = ChainConfig::new().without_convergence();
    assert!(config.convergence.is_none());
}

#[test]
#[should_panic(expected = "burn_in_fraction must be in [0, 1)")]
fn burn_in_fraction_one_panics() {
    let _ = ChainConfig::new().burn_in_fraction(1.0);
}

// =============================================================================
// INITIALIZER
// =============================================================================

#[test]
#[should_panic(expected = "report_interval must be > 0")]
fn report_interval_negative_panics() {
    let _ = InitConfig::default().report_interval(-0.1);
}

#[test]
#[should_panic(expected = "curvature_scale must be > 0")]
fn curvature_scale_zero_panics() {
    let _ = InitConfig::default().curvature_scale(0.0);
}

// =============================================================================
// VALIDATE ON HAND-BUILT CONFIGS
// =============================================================================

#[test]
fn validate_catches_fields_set_directly() {
    let mut config = ChainConfig::default();
    config.save_interval = 0;
    assert_eq!(config.validate(), Err("save_interval must be > 0".to_string()));

    let mut config = ChainConfig::default();
    config.burn_in_fraction = 1.5;
    assert!(config.validate().is_err());
}

#[test]
#[should_panic(expected = "invalid chain configuration")]
fn run_with_invalid_config_panics() {
    use tripoli_core::synthetic::SyntheticBlock;
    use tripoli::{invert_block, CancellationToken, NoopLogger};

    let (data, _) = SyntheticBlock::default().generate().unwrap();
    let mut config = ChainConfig::quick().init(InitConfig::default().estimate_curvature(false));
    config.save_interval = 0;
    let _ = invert_block(&data, &config, &mut NoopLogger, &CancellationToken::new());
}
