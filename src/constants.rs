//! Cross-cutting, shared constants.
//!
//! # Storage layout
//!
//! Everything lives under one storage root:
//!
//! ```text
//! <root>/
//! ├── prefs                 scoring profiles, password, administrators
//! ├── queries/
//! │   ├── queryPrefs        active sets, prefer-unjudged, show-sets
//! │   └── qs_<name>         one query per line, sorted, deduplicated
//! ├── users/
//! │   └── <assessor>        append-only judgment log
//! ├── results               content-addressed result snapshots
//! └── resultPrefs           result display/saving flags
//! ```

pub const PREFS_FILE: &str = "prefs";
pub const QUERIES_DIR: &str = "queries";
pub const QUERY_PREFS_FILE: &str = "queryPrefs";
pub const QUERY_SET_PREFIX: &str = "qs_";
pub const USERS_DIR: &str = "users";
pub const RESULTS_FILE: &str = "results";
pub const RESULT_PREFS_FILE: &str = "resultPrefs";

/// Length in bytes of a content digest.
pub const DIGEST_LEN: usize = 32;

/// Length in bytes of a password salt.
pub const SALT_LEN: usize = 32;

/// Raw queries an assessor may queue before the chooser gives up resolving them
/// one by one and rebuilds from the judgment log instead.
pub const UNRESOLVED_QUEUE_CAPACITY: usize = 5;

/// Attempts the chooser makes before falling back to a plain random draw when
/// concurrent invalidations keep racing it.
pub const MAX_CHOOSE_ATTEMPTS: usize = 4;

pub const DEFAULT_QUERY_CACHE_CAPACITY: u64 = 64;
pub const DEFAULT_JUDGMENT_CACHE_CAPACITY: u64 = 256;
pub const DEFAULT_RESULT_CACHE_CAPACITY: u64 = 1024;
