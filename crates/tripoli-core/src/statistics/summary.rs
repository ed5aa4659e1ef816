//! Posterior summary of a saved ensemble.

use serde::{Deserialize, Serialize};

use super::online_stats::OnlineStats;
use crate::ensemble::{Ensemble, EnsembleSnapshot};

/// Mean and standard deviation of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub mean: f64,
    pub std_dev: f64,
}

/// Per-parameter summaries after discarding burn-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorSummary {
    /// Snapshots discarded as burn-in.
    pub burn_in: usize,
    /// Snapshots summarized.
    pub samples: usize,
    pub log_ratios: Vec<ParameterSummary>,
    /// `exp` of each mean log ratio.
    pub ratios: Vec<f64>,
    pub knot_intensities: Vec<ParameterSummary>,
    pub baselines: Vec<ParameterSummary>,
    pub gain: ParameterSummary,
    /// Mean of every noise sigma.
    pub noise_sigma: Vec<f64>,
}

fn summarize_field<F>(snapshots: &[EnsembleSnapshot], len: usize, field: F) -> Vec<ParameterSummary>
where
    F: Fn(&EnsembleSnapshot) -> &[f64],
{
    let mut stats = vec![OnlineStats::new(); len];
    for s in snapshots {
        for (acc, &x) in stats.iter_mut().zip(field(s)) {
            acc.update(x);
        }
    }
    stats
        .iter()
        .map(|acc| {
            let snap = acc.finalize();
            ParameterSummary {
                mean: snap.mean,
                std_dev: snap.std_dev(),
            }
        })
        .collect()
}

/// Summarize `ensemble` after dropping the first `burn_in_fraction` of it.
///
/// Returns `None` if nothing is left to summarize.
pub fn summarize(ensemble: &Ensemble, burn_in_fraction: f64) -> Option<PosteriorSummary> {
    let kept = ensemble.after_burn_in(burn_in_fraction);
    let first = kept.first()?;

    let log_ratios = summarize_field(kept, first.log_ratios.len(), |s| &s.log_ratios);
    let knot_intensities =
        summarize_field(kept, first.knot_intensities.len(), |s| &s.knot_intensities);
    let baselines = summarize_field(kept, first.baseline_means.len(), |s| &s.baseline_means);
    let gain = summarize_field(kept, 1, |s| std::slice::from_ref(&s.gain))[0];
    let noise_sigma = summarize_field(kept, first.noise_sigma.len(), |s| &s.noise_sigma)
        .into_iter()
        .map(|p| p.mean)
        .collect();

    Some(PosteriorSummary {
        burn_in: ensemble.burn_in_count(burn_in_fraction),
        samples: kept.len(),
        ratios: log_ratios.iter().map(|p| p.mean.exp()).collect(),
        log_ratios,
        knot_intensities,
        baselines,
        gain,
        noise_sigma,
    })
}
