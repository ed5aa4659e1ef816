//! The Metropolis loop for one block.
//!
//! Each iteration:
//! 1. Select one operation
//! 2. Build a candidate (single-parameter, joint, or noise)
//! 3. Score the candidate and apply the Metropolis rule
//! 4. Fold the current state into the running covariance
//! 5. Every `save_interval` iterations: save a snapshot, refresh the
//!    proposal covariance, check convergence, and emit progress
//!
//! The cancellation token is polled at the top of every iteration.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{debug, info, info_span, warn};

use tripoli_core::analysis::{
    acceptance_probability, decide, ConvergenceCheck, ConvergenceCriterion, ForwardModel,
    OperationSelector, ProposalEngine, ScoredModel,
};
use tripoli_core::statistics::{summarize, CovarianceStrategy, ProposalCovariance, RunningCovariance};
use tripoli_core::{
    initialize_model, BlockDataSet, InitialModel, NalgebraBackend, Result, TripoliError,
};

use super::outcome::{ChainDiagnostics, ChainOutcome, Termination};
use super::state::ChainState;
use crate::cancel::CancellationToken;
use crate::config::ChainConfig;
use crate::logging::LoggingCallback;

/// Initialize `dataset` with `config.init` and run one chain on it.
///
/// # Errors
///
/// Any initializer failure for the block, or the errors of [`run_chain`].
pub fn invert_block(
    dataset: &BlockDataSet,
    config: &ChainConfig,
    logger: &mut dyn LoggingCallback,
    cancel: &CancellationToken,
) -> Result<ChainOutcome> {
    let initial = initialize_model(dataset, &config.init, &NalgebraBackend)?;
    run_chain(dataset, &initial, config, logger, cancel)
}

/// Run one chain from `initial` over `dataset`.
///
/// # Errors
///
/// - [`TripoliError::DimensionMismatch`] if the model or `C0` does not fit
///   the dataset
/// - [`TripoliError::InvalidDataset`] if a detector of the dataset is not
///   in the model's Faraday map
/// - [`TripoliError::NumericalInitialization`] if the starting misfit is
///   not finite or `C0` is not positive definite
///
/// # Panics
///
/// If `config` fails [`ChainConfig::validate`].
pub fn run_chain(
    dataset: &BlockDataSet,
    initial: &InitialModel,
    config: &ChainConfig,
    logger: &mut dyn LoggingCallback,
    cancel: &CancellationToken,
) -> Result<ChainOutcome> {
    if let Err(message) = config.validate() {
        panic!("invalid chain configuration: {message}");
    }
    let block = dataset.block_number();
    let _span = info_span!("chain", block).entered();
    let linalg = NalgebraBackend;

    let layout = initial.layout();
    layout.check(&initial.model)?;
    let p = layout.len();
    let c0 = &initial.initial_covariance;
    if c0.nrows() != p || c0.ncols() != p {
        return Err(TripoliError::DimensionMismatch {
            context: "initial covariance",
            expected: p,
            actual: c0.nrows(),
        });
    }
    let forward = ForwardModel::new(dataset, &initial.model.faraday_map)?;
    let noise = forward.noise_layout();
    if initial.model.noise_sigma.len() != noise.len() {
        return Err(TripoliError::DimensionMismatch {
            context: "noise sigmas",
            expected: noise.len(),
            actual: initial.model.noise_sigma.len(),
        });
    }

    let current = ScoredModel::score(
        &forward,
        initial.model.clone(),
        config.baseline_weighting,
        &linalg,
    );
    if !current.misfit.weighted.is_finite() {
        return Err(TripoliError::NumericalInitialization(format!(
            "block {block}: starting model has a non-finite misfit"
        )));
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
    let proposal = ProposalCovariance::new(
        c0.clone(),
        config.blend_weight,
        config.optimal_scaling,
        &linalg,
    )?;
    let engine = ProposalEngine::new(&layout, noise, &initial.priors, &initial.scales);
    let mut selector = OperationSelector::new(
        &config.operation_schedule,
        &layout,
        &noise,
        config.hierarchical,
        &mut rng,
    );
    let criterion = config
        .convergence
        .map(|c| ConvergenceCriterion::new(p, c.alpha, c.epsilon, config.save_interval));
    let adaptive_start = config.resolve_adaptive_start(p);

    info!(
        parameters = p,
        rows = dataset.len(),
        max_iterations = config.max_iterations,
        target_ess = criterion.map(|c| c.target_ess),
        "starting chain"
    );

    let mut state = ChainState::new(current, p, proposal, config.expected_saves());
    let mut termination = Termination::Completed;
    let mut iterations = 0;

    for iteration in 1..=config.max_iterations {
        if cancel.is_cancelled() {
            let notice = format!("block {block}: cancelled after {iterations} iterations");
            info!(iterations, "chain cancelled");
            logger.log(&notice);
            termination = Termination::Cancelled;
            break;
        }
        iterations = iteration;

        let temperature = config.temperature.temperature(iteration);
        let selection = selector.next(&mut rng);
        let operation = selection.operation;
        let model = &state.current.model;

        let candidate = match operation.kind() {
            None => engine.propose_noise(model, selection.index, &mut rng),
            Some(_) if config.proposal_mode.is_joint(iteration) => {
                let step = state.proposal.draw(&mut rng);
                engine.propose_joint(model, &step)
            }
            Some(kind) => {
                let adaptive = (iteration > adaptive_start).then(|| state.proposal.covariance());
                engine.propose_single(model, kind, selection.index, adaptive, &mut rng)
            }
        };

        let scored = ScoredModel::score(&forward, candidate, config.baseline_weighting, &linalg);
        let probability =
            acceptance_probability(operation, &state.current.misfit, &scored.misfit, temperature);
        let decision = decide(probability, rng.random::<f64>());
        if state.record(operation, decision) {
            state.accept(scored);
        }

        if config.covariance_strategy == CovarianceStrategy::Incremental {
            let x = layout.pack(&state.current.model);
            state.running.update(&x);
        }

        if iteration % config.save_interval != 0 {
            continue;
        }

        state.save(iteration, &layout);
        let saved = state.ensemble.len();

        if let CovarianceStrategy::Windowed { start } = config.covariance_strategy {
            if saved > start {
                state.running =
                    RunningCovariance::from_samples(&state.saved_parameters()[start..], &linalg);
            }
        }

        if saved % config.proposal_refresh_interval == 0
            && !state.proposal.refresh(&state.running, &linalg)
        {
            warn!(
                iteration,
                skipped = state.proposal.skipped_refreshes(),
                "proposal covariance is not positive definite, keeping the previous one"
            );
        }

        if let Some(criterion) = &criterion {
            match criterion.check(state.saved_parameters(), &linalg) {
                ConvergenceCheck::NotDue => {}
                ConvergenceCheck::Continue { statistic } => {
                    state.convergence_checks += 1;
                    if statistic.is_some() {
                        state.last_statistic = statistic;
                    }
                    debug!(
                        saved,
                        statistic,
                        threshold = criterion.exit_threshold,
                        "not converged"
                    );
                }
                ConvergenceCheck::Converged { statistic } => {
                    state.convergence_checks += 1;
                    state.last_statistic = Some(statistic);
                    info!(
                        iteration,
                        saved,
                        statistic,
                        threshold = criterion.exit_threshold,
                        "chain converged"
                    );
                    termination = Termination::Converged {
                        statistic,
                        threshold: criterion.exit_threshold,
                    };
                    break;
                }
            }
        }

        if saved % config.progress_every == 0 {
            let snippet = state.progress_snippet(iteration, config.max_iterations);
            debug!("{snippet}");
            logger.log(&snippet);
        }
    }

    let diagnostics = ChainDiagnostics {
        iterations,
        acceptance: state.totals,
        skipped_refreshes: state.proposal.skipped_refreshes(),
        nan_rejections: state.nan_rejections,
        convergence_checks: state.convergence_checks,
        last_statistic: state.last_statistic,
        target_ess: criterion.map(|c| c.target_ess),
        elapsed: state.elapsed(),
    };
    let summary = summarize(&state.ensemble, config.burn_in_fraction);

    info!(
        iterations,
        saved = state.ensemble.len(),
        acceptance = diagnostics.acceptance_rate(),
        nan_rejections = diagnostics.nan_rejections,
        best_misfit = state.best.misfit.weighted,
        elapsed_s = diagnostics.elapsed.as_secs_f64(),
        "chain finished"
    );

    Ok(ChainOutcome {
        block_number: block,
        termination,
        ensemble: state.ensemble,
        final_model: state.current.model,
        best_model: state.best.model,
        best_misfit: state.best.misfit.weighted,
        summary,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoopLogger;
    use tripoli_core::synthetic::SyntheticBlock;
    use tripoli_core::InitConfig;

    fn short_config() -> ChainConfig {
        ChainConfig::quick()
            .max_iterations(2_000)
            .init(InitConfig::default().estimate_curvature(false))
    }

    #[test]
    fn test_ensemble_length_matches_budget() {
        let (data, _) = SyntheticBlock::default().generate().unwrap();
        let config = short_config().save_interval(7);
        let outcome = invert_block(&data, &config, &mut NoopLogger, &CancellationToken::new()).unwrap();
        assert_eq!(outcome.termination, Termination::Completed);
        assert_eq!(outcome.diagnostics.iterations, 2_000);
        assert_eq!(outcome.ensemble.len(), 2_000 / 7);
        assert_eq!(outcome.ensemble.snapshots()[0].iteration, 7);
    }

    #[test]
    fn test_cancelled_before_start_keeps_empty_ensemble() {
        let (data, _) = SyntheticBlock::default().generate().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut notices = Vec::new();
        let mut sink = |s: &str| notices.push(s.to_string());
        let outcome = invert_block(&data, &short_config(), &mut sink, &cancel).unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.diagnostics.iterations, 0);
        assert!(outcome.ensemble.is_empty());
        assert!(outcome.summary.is_none());
        assert!(notices.iter().any(|n| n.contains("cancelled")));
    }

    #[test]
    fn test_progress_snippets_every_ten_saves() {
        let (data, _) = SyntheticBlock::default().generate().unwrap();
        let config = short_config().save_interval(10);
        let mut lines = Vec::new();
        let mut sink = |s: &str| lines.push(s.to_string());
        invert_block(&data, &config, &mut sink, &CancellationToken::new()).unwrap();
        assert_eq!(lines.len(), 20);
        assert!(lines[0].starts_with("iteration 100/2000"));
        assert!(lines[0].contains("RMS"));
    }

    #[test]
    fn test_mismatched_initial_covariance_is_rejected() {
        let (data, _) = SyntheticBlock::default().generate().unwrap();
        let mut initial =
            initialize_model(&data, &InitConfig::default().estimate_curvature(false), &NalgebraBackend)
                .unwrap();
        initial.initial_covariance = tripoli_core::Matrix::identity(2, 2);
        let err = run_chain(
            &data,
            &initial,
            &short_config(),
            &mut NoopLogger,
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, TripoliError::DimensionMismatch { .. }));
    }
}
