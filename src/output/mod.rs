//! Serialization of chain results.
//!
//! - JSON strings of an outcome
//! - The development cache: the ensemble dumped to one fixed file name in a
//!   directory, overwritten on every run. It is not a stable format.

mod json;

pub use json::{
    read_ensemble_cache, to_json, to_json_pretty, write_ensemble_cache, OutputError,
    ENSEMBLE_CACHE_FILE,
};
