//! Shared type aliases and small tag enums.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Dense column-major matrix of `f64`.
pub type Matrix = DMatrix<f64>;

/// Dense column vector of `f64`.
pub type Vector = DVector<f64>;

/// Type tag of one entry in the flat free-parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Natural log of a minor isotope relative to the reference isotope.
    LogRatio,
    /// Knot intensity of the interpolated beam.
    Intensity,
    /// Baseline mean of one Faraday detector.
    Baseline,
    /// Photomultiplier/Faraday gain.
    Gain,
}

/// Category of a data row. Rows are ordered baseline, Faraday, photomultiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowKind {
    /// Zero-signal reading of a Faraday detector.
    Baseline,
    /// On-peak Faraday reading.
    Faraday,
    /// On-peak photomultiplier reading.
    Photomultiplier,
}

/// The five ways a chain step may perturb the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Perturb log ratios.
    ChangeRatio,
    /// Perturb knot intensities.
    ChangeIntensity,
    /// Perturb baseline means.
    ChangeBaseline,
    /// Perturb the gain.
    ChangeGain,
    /// Perturb one noise sigma.
    ChangeNoise,
}

impl Operation {
    /// All operations in counter order.
    pub const ALL: [Operation; 5] = [
        Operation::ChangeRatio,
        Operation::ChangeIntensity,
        Operation::ChangeBaseline,
        Operation::ChangeGain,
        Operation::ChangeNoise,
    ];

    /// Position of this operation in [`Operation::ALL`].
    pub fn index(self) -> usize {
        match self {
            Operation::ChangeRatio => 0,
            Operation::ChangeIntensity => 1,
            Operation::ChangeBaseline => 2,
            Operation::ChangeGain => 3,
            Operation::ChangeNoise => 4,
        }
    }

    /// Short label used in progress snippets.
    pub fn label(self) -> &'static str {
        match self {
            Operation::ChangeRatio => "ratio",
            Operation::ChangeIntensity => "intensity",
            Operation::ChangeBaseline => "baseline",
            Operation::ChangeGain => "gain",
            Operation::ChangeNoise => "noise",
        }
    }

    /// The operation that perturbs parameters of `kind`.
    pub fn for_kind(kind: ParameterKind) -> Self {
        match kind {
            ParameterKind::LogRatio => Operation::ChangeRatio,
            ParameterKind::Intensity => Operation::ChangeIntensity,
            ParameterKind::Baseline => Operation::ChangeBaseline,
            ParameterKind::Gain => Operation::ChangeGain,
        }
    }

    /// The parameter kind this operation perturbs, `None` for noise.
    pub fn kind(self) -> Option<ParameterKind> {
        match self {
            Operation::ChangeRatio => Some(ParameterKind::LogRatio),
            Operation::ChangeIntensity => Some(ParameterKind::Intensity),
            Operation::ChangeBaseline => Some(ParameterKind::Baseline),
            Operation::ChangeGain => Some(ParameterKind::Gain),
            Operation::ChangeNoise => None,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_index_matches_all() {
        for (i, op) in Operation::ALL.iter().enumerate() {
            assert_eq!(op.index(), i);
        }
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            ParameterKind::LogRatio,
            ParameterKind::Intensity,
            ParameterKind::Baseline,
            ParameterKind::Gain,
        ] {
            assert_eq!(Operation::for_kind(kind).kind(), Some(kind));
        }
        assert_eq!(Operation::ChangeNoise.kind(), None);
    }
}
