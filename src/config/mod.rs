//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `SXS_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_JUDGMENT_CACHE_CAPACITY, DEFAULT_QUERY_CACHE_CAPACITY, DEFAULT_RESULT_CACHE_CAPACITY,
};
use crate::storage::CacheCapacities;

/// Storage and selection settings loaded from environment variables.
///
/// Use [`Config::from_env`] to read `SXS_*` overrides on top of defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Storage root. Default: `./.data`.
    pub storage_path: PathBuf,

    /// Query lists kept by the query-set cache. Default: `64`.
    pub query_cache_capacity: u64,

    /// Assessor logs kept by the judgment cache. Default: `256`.
    pub judgment_cache_capacity: u64,

    /// Snapshot pairs kept by the judgment cache. Default: `1024`.
    pub result_cache_capacity: u64,

    /// Seed for the chooser's random draws; `None` seeds from the OS.
    pub chooser_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./.data"),
            query_cache_capacity: DEFAULT_QUERY_CACHE_CAPACITY,
            judgment_cache_capacity: DEFAULT_JUDGMENT_CACHE_CAPACITY,
            result_cache_capacity: DEFAULT_RESULT_CACHE_CAPACITY,
            chooser_seed: None,
        }
    }
}

impl Config {
    const ENV_STORAGE_PATH: &'static str = "SXS_STORAGE_PATH";
    const ENV_QUERY_CACHE_CAPACITY: &'static str = "SXS_QUERY_CACHE_CAPACITY";
    const ENV_JUDGMENT_CACHE_CAPACITY: &'static str = "SXS_JUDGMENT_CACHE_CAPACITY";
    const ENV_RESULT_CACHE_CAPACITY: &'static str = "SXS_RESULT_CACHE_CAPACITY";
    const ENV_CHOOSER_SEED: &'static str = "SXS_CHOOSER_SEED";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let storage_path = Self::parse_path_from_env(Self::ENV_STORAGE_PATH, defaults.storage_path);
        let query_cache_capacity =
            Self::parse_u64_from_env(Self::ENV_QUERY_CACHE_CAPACITY, defaults.query_cache_capacity);
        let judgment_cache_capacity = Self::parse_u64_from_env(
            Self::ENV_JUDGMENT_CACHE_CAPACITY,
            defaults.judgment_cache_capacity,
        );
        let result_cache_capacity = Self::parse_u64_from_env(
            Self::ENV_RESULT_CACHE_CAPACITY,
            defaults.result_cache_capacity,
        );
        let chooser_seed = Self::parse_seed_from_env()?;

        Ok(Self {
            storage_path,
            query_cache_capacity,
            judgment_cache_capacity,
            result_cache_capacity,
            chooser_seed,
        })
    }

    /// Validates the storage root and capacities (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_path.exists() && !self.storage_path.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.storage_path.clone(),
            });
        }

        for (name, value) in [
            (Self::ENV_QUERY_CACHE_CAPACITY, self.query_cache_capacity),
            (Self::ENV_JUDGMENT_CACHE_CAPACITY, self.judgment_cache_capacity),
            (Self::ENV_RESULT_CACHE_CAPACITY, self.result_cache_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidCapacity { name });
            }
        }

        Ok(())
    }

    pub fn cache_capacities(&self) -> CacheCapacities {
        CacheCapacities {
            query_sets: self.query_cache_capacity,
            judgment_logs: self.judgment_cache_capacity,
            result_pairs: self.result_cache_capacity,
        }
    }

    fn parse_seed_from_env() -> Result<Option<u64>, ConfigError> {
        match env::var(Self::ENV_CHOOSER_SEED) {
            Ok(value) if value.trim().is_empty() => Ok(None),
            Ok(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| ConfigError::SeedParseError { value, source: e }),
            Err(_) => Ok(None),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}
