//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Seed string could not be parsed as an unsigned 64-bit number.
    #[error("failed to parse chooser seed '{value}': {source}")]
    SeedParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// A cache capacity was zero.
    #[error("invalid {name}: cache capacity must be at least 1")]
    InvalidCapacity { name: &'static str },

    /// Path exists but is not a directory (when a directory was expected).
    #[error("path is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}
