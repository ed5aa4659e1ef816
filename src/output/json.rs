//! JSON serialization of chain outcomes and the ensemble cache.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use tripoli_core::Ensemble;

use crate::engine::ChainOutcome;

/// File name of the ensemble cache inside the chosen directory.
pub const ENSEMBLE_CACHE_FILE: &str = "tripoli-ensemble-cache.json";

/// Failure writing or reading the ensemble cache.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// The file could not be created, written or opened.
    #[error("ensemble cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The ensemble could not be encoded or decoded.
    #[error("ensemble cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Serialize an outcome to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for ChainOutcome).
pub fn to_json(outcome: &ChainOutcome) -> Result<String, serde_json::Error> {
    serde_json::to_string(outcome)
}

/// Serialize an outcome to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for ChainOutcome).
pub fn to_json_pretty(outcome: &ChainOutcome) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(outcome)
}

/// Dump `ensemble` to [`ENSEMBLE_CACHE_FILE`] in `dir`, replacing any
/// previous dump. Returns the path written.
pub fn write_ensemble_cache(ensemble: &Ensemble, dir: &Path) -> Result<PathBuf, OutputError> {
    let path = dir.join(ENSEMBLE_CACHE_FILE);
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer(&mut writer, ensemble)?;
    writer.flush()?;
    debug!(path = %path.display(), snapshots = ensemble.len(), "wrote ensemble cache");
    Ok(path)
}

/// Read the ensemble dumped by [`write_ensemble_cache`] in `dir`.
pub fn read_ensemble_cache(dir: &Path) -> Result<Ensemble, OutputError> {
    let reader = BufReader::new(File::open(dir.join(ENSEMBLE_CACHE_FILE))?);
    Ok(serde_json::from_reader(reader)?)
}
